//! Series extraction from category pages

use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{
    element_text, resolved_attr, resolved_background, select_all, select_first,
};
use crate::model::{Series, UNKNOWN_SERIES};
use crate::{FetchError, FetchResult};
use scraper::Html;
use url::Url;

/// Container holding the series cards
const SERIES_CONTAINER: &str = "section.bg-light";

/// One card per series inside the container
const SERIES_CARD: &str = "div.card.mb-4";

/// Fetches a category page and extracts its series
///
/// # Arguments
///
/// * `fetcher` - The shared fetch client
/// * `category_url` - Absolute URL of the category page
///
/// # Returns
///
/// * `Ok(Vec<Series>)` - Series in page order (possibly empty)
/// * `Err(FetchError)` - The page could not be fetched
pub async fn extract_series(fetcher: &Fetcher, category_url: &str) -> FetchResult<Vec<Series>> {
    let page_url = Url::parse(category_url).map_err(|_| FetchError::InvalidUrl {
        url: category_url.to_string(),
    })?;

    let html = fetcher.fetch_text(category_url).await?;
    let series = parse_series(&html, &page_url);

    tracing::debug!("Found {} series on {}", series.len(), category_url);
    Ok(series)
}

/// Parses series cards out of a category page
///
/// A card without a link is skipped; other missing fields fall back to
/// defaults. A page without the card container yields an empty list.
pub fn parse_series(html: &str, page_url: &Url) -> Vec<Series> {
    let document = Html::parse_document(html);

    let Some(container) = select_first(document.root_element(), SERIES_CONTAINER) else {
        tracing::warn!("No series container on {}", page_url);
        return Vec::new();
    };

    let mut series = Vec::new();
    for (index, card) in select_all(container, SERIES_CARD).into_iter().enumerate() {
        let Some(url) = select_first(card, "a.stretched-link")
            .and_then(|link| resolved_attr(link, "href", page_url))
        else {
            tracing::warn!("Skipping series card {} on {}: no link", index + 1, page_url);
            continue;
        };

        let name = select_first(card, "h4")
            .map(element_text)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_SERIES.to_string());

        let thumbnail_url = select_first(card, "div.box-img")
            .and_then(|div| resolved_background(div, page_url))
            .unwrap_or_default();

        let description = select_first(card, "p.txt-l3")
            .map(element_text)
            .unwrap_or_default();

        series.push(Series {
            name,
            url,
            thumbnail_url,
            description,
        });
    }

    series
}
