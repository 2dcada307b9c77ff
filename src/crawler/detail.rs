//! Product detail extraction

use crate::crawler::parser::{
    element_text, resolved_attr, select_all, select_first, select_preferred,
};
use crate::crawler::renderer::PageRenderer;
use crate::model::{ProductDetail, ProductStub};
use crate::{FetchError, FetchResult};
use scraper::Html;
use std::time::Duration;
use url::Url;

/// Selector that must match before a detail page counts as loaded
///
/// Any of the title card, gallery or specification tabs will do; a shell
/// page still waiting on its scripts has none of them.
pub const DETAIL_READY_SELECTOR: &str =
    "p.title-card, div.gallery, div.tab-content, div#myTabContent";

const TITLE_CANDIDATES: &[&str] = &["p.title-card", "h1", "h2", r#"div[class*="title"]"#];
const GALLERY_CANDIDATES: &[&str] = &["div.gallery", r#"div[class*="gallery"]"#];
const TABS_CANDIDATES: &[&str] = &["div.tab-content", "div#myTabContent"];

/// Renders a product page and extracts its detail record
///
/// # Arguments
///
/// * `renderer` - Backend producing the script-rendered markup
/// * `stub` - The listing record; its fields are carried over unchanged
/// * `timeout` - Wait-for-ready timeout
///
/// # Returns
///
/// * `Ok(ProductDetail)` - Detail record (fields absent on the page stay unset)
/// * `Err(FetchError)` - The page never loaded
pub async fn extract_detail(
    renderer: &dyn PageRenderer,
    stub: ProductStub,
    timeout: Duration,
) -> FetchResult<ProductDetail> {
    let page_url = Url::parse(&stub.detail_url).map_err(|_| FetchError::InvalidUrl {
        url: stub.detail_url.clone(),
    })?;

    let html = renderer
        .render(&stub.detail_url, DETAIL_READY_SELECTOR, timeout)
        .await?;

    Ok(parse_detail(&html, &page_url, stub))
}

/// Parses a rendered detail page
pub fn parse_detail(html: &str, page_url: &Url, stub: ProductStub) -> ProductDetail {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let mut detail = ProductDetail::from_stub(stub);

    detail.title = select_preferred(root, TITLE_CANDIDATES)
        .map(element_text)
        .unwrap_or_default();

    if let Some(gallery) = select_preferred(root, GALLERY_CANDIDATES) {
        detail.gallery_image_urls = select_all(gallery, "div.item a[href]")
            .into_iter()
            .filter_map(|link| resolved_attr(link, "href", page_url))
            .collect();
    }

    if let Some(tabs) = select_preferred(root, TABS_CANDIDATES) {
        let tab_image = |id: &str| {
            select_first(tabs, &format!("div#{} img[src]", id))
                .and_then(|img| resolved_attr(img, "src", page_url))
        };
        detail.spec_image_url = tab_image("tab1");
        detail.wiring_image_url = tab_image("tab2");
        detail.dimension_image_url = tab_image("tab3");
    }

    detail
}
