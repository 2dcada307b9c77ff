//! Category partitioning
//!
//! The category key is the path segment following a marker in the series
//! URL, e.g. `72` in `https://host/en-gb/product-category/72/113`.

use crate::model::EnrichedProduct;
use std::collections::BTreeMap;

/// Partition for products whose series URL carries no category key
pub const UNKNOWN_PARTITION: &str = "unknown";

/// Derives the category key of a series URL
///
/// The segment must be non-empty and made of ASCII letters, digits, `-` or
/// `_`; anything else yields [`UNKNOWN_PARTITION`]. Never fails.
pub fn category_key(series_url: &str, path_marker: &str) -> String {
    let marker = format!("/{}/", path_marker.trim_matches('/'));

    let Some(idx) = series_url.find(&marker) else {
        return UNKNOWN_PARTITION.to_string();
    };

    let rest = &series_url[idx + marker.len()..];
    let segment = rest.split(['/', '?', '#']).next().unwrap_or_default();

    let valid = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        segment.to_string()
    } else {
        UNKNOWN_PARTITION.to_string()
    }
}

/// Groups products by category key, preserving input order inside a group
pub fn partition_by_category<'a>(
    products: &'a [EnrichedProduct],
    path_marker: &str,
) -> BTreeMap<String, Vec<&'a EnrichedProduct>> {
    let mut partitions: BTreeMap<String, Vec<&EnrichedProduct>> = BTreeMap::new();
    for product in products {
        partitions
            .entry(category_key(&product.stub().series_url, path_marker))
            .or_default()
            .push(product);
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProductDetail, ProductImages, ProductStub, Series};

    const MARKER: &str = "/product-category/";

    fn product(code: &str, series_url: &str) -> EnrichedProduct {
        let series = Series {
            name: "S".to_string(),
            url: series_url.to_string(),
            thumbnail_url: String::new(),
            description: String::new(),
        };
        let stub = ProductStub::new(code, "", "https://example.com/product/1", &series);
        EnrichedProduct::new(ProductDetail::from_stub(stub), ProductImages::default())
    }

    #[test]
    fn test_category_key_from_series_url() {
        assert_eq!(
            category_key("https://www.fotek.com.tw/en-gb/product-category/72/113", MARKER),
            "72"
        );
        assert_eq!(
            category_key("https://example.com/product-category/sensors", MARKER),
            "sensors"
        );
        assert_eq!(
            category_key("https://example.com/product-category/72?page=2", MARKER),
            "72"
        );
    }

    #[test]
    fn test_marker_slashes_are_normalized() {
        assert_eq!(
            category_key("https://example.com/product-category/72/113", "product-category"),
            "72"
        );
    }

    #[test]
    fn test_unmatched_urls_are_unknown() {
        assert_eq!(category_key("https://example.com/series/113", MARKER), UNKNOWN_PARTITION);
        assert_eq!(category_key("https://example.com/product-category/", MARKER), UNKNOWN_PARTITION);
        assert_eq!(
            category_key("https://example.com/product-category/a%20b/1", MARKER),
            UNKNOWN_PARTITION
        );
        assert_eq!(category_key("", MARKER), UNKNOWN_PARTITION);
    }

    #[test]
    fn test_partition_keeps_every_product() {
        let products = vec![
            product("A", "https://example.com/product-category/72/1"),
            product("B", "https://example.com/other/1"),
            product("C", "https://example.com/product-category/72/2"),
            product("D", "https://example.com/product-category/80/1"),
        ];

        let partitions = partition_by_category(&products, MARKER);
        let keys: Vec<&str> = partitions.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["72", "80", UNKNOWN_PARTITION]);

        let codes: Vec<&str> = partitions["72"].iter().map(|p| p.code()).collect();
        assert_eq!(codes, vec!["A", "C"]);
        assert_eq!(partitions[UNKNOWN_PARTITION][0].code(), "B");
        assert_eq!(partitions.values().map(Vec::len).sum::<usize>(), 4);
    }
}
