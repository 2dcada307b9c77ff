//! Product listing extraction from series pages
//!
//! Listing markup is not uniform across series, so extraction is an ordered
//! list of strategies. The first strategy producing any product wins.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{
    element_text, resolve_link, resolved_attr, resolved_background, select_all,
    select_all_preferred, select_first, select_preferred,
};
use crate::crawler::renderer::PageRenderer;
use crate::model::{ProductStub, Series};
use crate::{FetchError, FetchResult};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

static DETAIL_LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/product/\d+").expect("detail link regex is valid"));

/// One way of reading product rows out of a series page
pub trait ListingStrategy: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Extracts product stubs; an empty result means "not applicable here"
    fn extract(&self, document: &Html, series: &Series, page_url: &Url) -> Vec<ProductStub>;
}

/// Grouped "item-type" sections, each with a heading, an optional image and
/// a list of product rows
#[derive(Debug, Default)]
pub struct GroupedSections;

impl GroupedSections {
    const SECTIONS: &'static [&'static str] = &[
        "div.item-type",
        r#"div[class*="item"][class*="type"]"#,
        r#"div[class*="product"][class*="group"]"#,
    ];
    const HEADINGS: &'static [&'static str] = &["h5", "h4", "h3"];
    const IMAGES: &'static [&'static str] = &["div.box-img", r#"div[class*="img"]"#];

    fn extract_row(
        row: ElementRef<'_>,
        series: &Series,
        page_url: &Url,
    ) -> Option<(String, String, String)> {
        let spans = select_all(row, "span");
        if spans.len() < 3 {
            return None;
        }

        let code = element_text(spans[0]);
        if code.is_empty() {
            return None;
        }
        let features = element_text(spans[1]);
        let detail_url = select_first(spans[2], "a[href]")
            .and_then(|link| resolved_attr(link, "href", page_url));

        match detail_url {
            Some(detail_url) => Some((code, features, detail_url)),
            None => {
                tracing::debug!("Row {} in {} has no detail link", code, series.name);
                None
            }
        }
    }
}

impl ListingStrategy for GroupedSections {
    fn name(&self) -> &'static str {
        "grouped-sections"
    }

    fn extract(&self, document: &Html, series: &Series, page_url: &Url) -> Vec<ProductStub> {
        let mut products = Vec::new();

        for section in select_all_preferred(document.root_element(), Self::SECTIONS) {
            let group_name = select_preferred(section, Self::HEADINGS)
                .map(element_text)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| crate::model::UNKNOWN_GROUP.to_string());

            let group_thumbnail_url = select_preferred(section, Self::IMAGES)
                .and_then(|div| resolved_background(div, page_url))
                .unwrap_or_default();

            for row in select_all(section, "li") {
                if let Some((code, features, detail_url)) = Self::extract_row(row, series, page_url) {
                    products.push(
                        ProductStub::new(code, features, detail_url, series)
                            .in_group(group_name.clone(), group_thumbnail_url.clone()),
                    );
                }
            }
        }

        products
    }
}

/// Whole-page scan for product detail links, recovering code and features
/// from the spans of the enclosing row
#[derive(Debug, Default)]
pub struct DetailLinkScan;

impl DetailLinkScan {
    /// Nearest enclosing `li`, else the nearest enclosing `div`
    fn enclosing_row(link: ElementRef<'_>) -> Option<ElementRef<'_>> {
        let ancestors = || link.ancestors().filter_map(ElementRef::wrap);
        ancestors()
            .find(|el| el.value().name() == "li")
            .or_else(|| ancestors().find(|el| el.value().name() == "div"))
    }
}

impl ListingStrategy for DetailLinkScan {
    fn name(&self) -> &'static str {
        "detail-link-scan"
    }

    fn extract(&self, document: &Html, series: &Series, page_url: &Url) -> Vec<ProductStub> {
        let mut seen = HashSet::new();
        let mut products = Vec::new();

        for link in select_all(document.root_element(), "a[href]") {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if !DETAIL_LINK_PATTERN.is_match(href) {
                continue;
            }
            let Some(detail_url) = resolve_link(href, page_url) else {
                continue;
            };
            if seen.contains(&detail_url) {
                continue;
            }

            let Some(row) = Self::enclosing_row(link) else {
                continue;
            };
            let spans = select_all(row, "span");
            if spans.len() < 2 {
                continue;
            }

            let code = element_text(spans[0]);
            if code.is_empty() {
                continue;
            }
            let features = element_text(spans[1]);

            seen.insert(detail_url.clone());
            products.push(ProductStub::new(code, features, detail_url, series));
        }

        products
    }
}

/// Strategies in order of preference
pub fn default_strategies() -> Vec<Box<dyn ListingStrategy>> {
    vec![Box::new(GroupedSections), Box::new(DetailLinkScan)]
}

/// Runs the strategies in order and returns the first non-empty result
pub fn parse_products(
    html: &str,
    series: &Series,
    page_url: &Url,
    strategies: &[Box<dyn ListingStrategy>],
) -> Vec<ProductStub> {
    let document = Html::parse_document(html);

    for strategy in strategies {
        let products = strategy.extract(&document, series, page_url);
        if !products.is_empty() {
            tracing::debug!(
                "Strategy {} found {} products in {}",
                strategy.name(),
                products.len(),
                series.name
            );
            return products;
        }
    }

    Vec::new()
}

/// Fetches a series page and extracts its product stubs
///
/// The static page is tried first. When it lists nothing and
/// `render_fallback` is set, the page is fetched again through a
/// script-executing renderer.
///
/// # Returns
///
/// * `Ok(Vec<ProductStub>)` - Products in page order (possibly empty)
/// * `Err(FetchError)` - The page could not be loaded
pub async fn extract_products(
    fetcher: &Fetcher,
    renderer: &dyn PageRenderer,
    strategies: &[Box<dyn ListingStrategy>],
    series: &Series,
    render_fallback: Option<Duration>,
) -> FetchResult<Vec<ProductStub>> {
    let page_url = Url::parse(&series.url).map_err(|_| FetchError::InvalidUrl {
        url: series.url.clone(),
    })?;

    let html = fetcher.fetch_text(&series.url).await?;
    let products = parse_products(&html, series, &page_url, strategies);
    if !products.is_empty() {
        return Ok(products);
    }

    match render_fallback {
        Some(timeout) if renderer.executes_scripts() => {
            tracing::debug!("No static listing for {}, rendering", series.url);
            let html = renderer.render(&series.url, "body", timeout).await?;
            Ok(parse_products(&html, series, &page_url, strategies))
        }
        _ => Ok(products),
    }
}
