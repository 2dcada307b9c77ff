use super::Series;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Listing metadata for one product, before detail extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStub {
    /// Natural key of the product (never empty)
    pub code: String,

    /// Feature text shown next to the code in the listing
    pub features: String,

    /// Absolute URL of the product detail page
    pub detail_url: String,

    /// Heading of the group the product was listed under
    pub group_name: String,

    /// Thumbnail of the product group (empty when absent)
    pub group_thumbnail_url: String,

    /// URL of the series page the product was listed on
    pub series_url: String,

    /// Name of the series the product was listed on
    pub series_name: String,
}

impl ProductStub {
    /// Creates a stub listed under the given series
    pub fn new(
        code: impl Into<String>,
        features: impl Into<String>,
        detail_url: impl Into<String>,
        series: &Series,
    ) -> Self {
        Self {
            code: code.into(),
            features: features.into(),
            detail_url: detail_url.into(),
            group_name: super::UNKNOWN_GROUP.to_string(),
            group_thumbnail_url: String::new(),
            series_url: series.url.clone(),
            series_name: series.name.clone(),
        }
    }

    /// Sets the group this product was listed under
    pub fn in_group(mut self, name: impl Into<String>, thumbnail_url: impl Into<String>) -> Self {
        self.group_name = name.into();
        self.group_thumbnail_url = thumbnail_url.into();
        self
    }
}

/// A product stub extended with detail-page data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub stub: ProductStub,

    /// Product title from the detail page (empty when not found)
    pub title: String,

    /// Full-size gallery images, in page order
    pub gallery_image_urls: Vec<String>,

    /// First image of the specifications tab
    pub spec_image_url: Option<String>,

    /// First image of the wiring diagram tab
    pub wiring_image_url: Option<String>,

    /// First image of the dimensions tab
    pub dimension_image_url: Option<String>,
}

impl ProductDetail {
    /// Creates an empty detail record for the stub
    pub fn from_stub(stub: ProductStub) -> Self {
        Self {
            stub,
            title: String::new(),
            gallery_image_urls: Vec::new(),
            spec_image_url: None,
            wiring_image_url: None,
            dimension_image_url: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.stub.code
    }
}

/// Local paths of downloaded images; each is set only on success
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImages {
    pub product_local_path: Option<PathBuf>,
    pub spec_local_path: Option<PathBuf>,
    pub wiring_local_path: Option<PathBuf>,
    pub dimension_local_path: Option<PathBuf>,
}

/// A fully processed product, ready for persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedProduct {
    #[serde(flatten)]
    pub detail: ProductDetail,

    #[serde(flatten)]
    pub images: ProductImages,

    /// Translated product name, when enrichment succeeded
    pub translated_name: Option<String>,

    /// Specification table derived from the specification image
    pub spec_table_html: Option<String>,
}

impl EnrichedProduct {
    /// Wraps a detail record with the image paths acquired for it
    pub fn new(detail: ProductDetail, images: ProductImages) -> Self {
        Self {
            detail,
            images,
            translated_name: None,
            spec_table_html: None,
        }
    }

    pub fn code(&self) -> &str {
        self.detail.code()
    }

    pub fn stub(&self) -> &ProductStub {
        &self.detail.stub
    }
}
