//! AI-assisted enrichment
//!
//! The external capability is consumed through the [`Enricher`] trait. When no
//! capability is configured the stage passes products through untouched.

mod cleanup;
mod gemini;

pub use cleanup::{
    clean_name, strip_code_fences, TableCleaner, DEFAULT_TABLE_BOILERPLATE, NAME_CUT_MARKERS,
};
pub use gemini::GeminiClient;

use crate::config::EnrichmentConfig;
use crate::model::{EnrichedProduct, ItemFailure};
use crate::state::RunPhase;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Enrichment errors
///
/// Never fatal: the affected field is left unset.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("Enrichment unavailable: {0}")]
    Unavailable(String),

    #[error("Enrichment request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Enrichment service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Enrichment service returned no text")]
    EmptyResponse,

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

/// External text and vision enrichment capability
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Translates a short text into `target_language`
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, EnrichmentError>;

    /// Derives text (an HTML table) from an image, following `instructions`
    async fn extract_table_from_image(
        &self,
        image: &[u8],
        mime_type: &str,
        instructions: &str,
    ) -> Result<String, EnrichmentError>;
}

/// Guesses an image MIME type from its file extension
pub fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Per-product enrichment stage
///
/// Cheap to clone; clones share the capability.
#[derive(Clone)]
pub struct EnrichmentStage {
    enricher: Option<Arc<dyn Enricher>>,
    target_language: String,
    name_suffix: Option<String>,
    cleaner: TableCleaner,
}

impl EnrichmentStage {
    pub fn new(enricher: Option<Arc<dyn Enricher>>, config: &EnrichmentConfig) -> Self {
        Self {
            enricher,
            target_language: config.target_language.clone(),
            name_suffix: config.name_suffix.clone(),
            cleaner: TableCleaner::new(
                &config.boilerplate,
                &config.attribution_label,
                &config.attribution_value,
            ),
        }
    }

    /// True if a capability is configured
    pub fn is_available(&self) -> bool {
        self.enricher.is_some()
    }

    /// Instructions sent with a specification image
    pub fn table_instructions(&self, code: &str) -> String {
        format!(
            "Analyze this technical specification image and extract every specification it shows.\n\
             Translate the labels and values into {language} and return an HTML table in this shape:\n\
             <table id=\"specifications\" border=\"1\" cellpadding=\"8\" cellspacing=\"0\" style=\"border-collapse: collapse; font-family: Arial; width: 100%;\">\n\
             <thead><tr style=\"background-color: #f2f2f2;\"><th>Parameter</th><th>Value</th></tr></thead>\n\
             <tbody>\n\
             <tr><td style=\"font-weight: bold;\">Product code</td><td>{code}</td></tr>\n\
             [one row per specification]\n\
             {attribution}\n\
             </tbody>\n\
             </table>\n\
             The final attribution row is mandatory.\n\
             Return only the HTML table: no markdown fences, no text before or after it.",
            language = self.target_language,
            code = code,
            attribution = self.cleaner.attribution_row(),
        )
    }

    /// Enriches one product
    ///
    /// Translation and table extraction are attempted independently; each
    /// failure leaves its field unset and is reported alongside the product.
    pub async fn enrich(&self, mut product: EnrichedProduct) -> (EnrichedProduct, Vec<ItemFailure>) {
        let Some(enricher) = &self.enricher else {
            return (product, Vec::new());
        };

        let code = product.code().to_string();
        let mut failures = Vec::new();

        if !product.detail.title.is_empty() {
            match enricher
                .translate(&product.detail.title, &self.target_language)
                .await
            {
                Ok(raw) => {
                    product.translated_name = clean_name(&raw, self.name_suffix.as_deref());
                    if product.translated_name.is_none() {
                        tracing::warn!("Unusable translation for {}", code);
                    }
                }
                Err(e) => {
                    tracing::warn!("Translation failed for {}: {}", code, e);
                    failures.push(ItemFailure::new(
                        RunPhase::Enriching,
                        code.clone(),
                        format!("translate: {}", e),
                    ));
                }
            }
        }

        if let Some(path) = product.images.spec_local_path.clone() {
            match self.extract_table(enricher.as_ref(), &code, &path).await {
                Ok(table) => {
                    if table.is_none() {
                        tracing::warn!("No table in enrichment response for {}", code);
                    }
                    product.spec_table_html = table;
                }
                Err(e) => {
                    tracing::warn!("Table extraction failed for {}: {}", code, e);
                    failures.push(ItemFailure::new(
                        RunPhase::Enriching,
                        code.clone(),
                        format!("spec table: {}", e),
                    ));
                }
            }
        }

        (product, failures)
    }

    async fn extract_table(
        &self,
        enricher: &dyn Enricher,
        code: &str,
        path: &Path,
    ) -> Result<Option<String>, EnrichmentError> {
        let image = tokio::fs::read(path).await?;
        let raw = enricher
            .extract_table_from_image(&image, mime_type_for(path), &self.table_instructions(code))
            .await?;
        Ok(self.cleaner.clean(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProductDetail, ProductImages, ProductStub, Series};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedEnricher {
        calls: AtomicUsize,
        fail_translation: bool,
    }

    #[async_trait]
    impl Enricher for ScriptedEnricher {
        async fn translate(&self, text: &str, _target: &str) -> Result<String, EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_translation {
                return Err(EnrichmentError::EmptyResponse);
            }
            Ok(format!("**Dịch {}**\nOption 2: other", text))
        }

        async fn extract_table_from_image(
            &self,
            image: &[u8],
            mime_type: &str,
            _instructions: &str,
        ) -> Result<String, EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!(
                "```html\n<table><tbody><tr><td>{}</td><td>{}</td></tr></tbody></table>\n```",
                mime_type,
                image.len()
            ))
        }
    }

    fn product(spec: Option<PathBuf>) -> EnrichedProduct {
        let series = Series {
            name: "PS".to_string(),
            url: "https://example.com/product-category/72/113".to_string(),
            thumbnail_url: String::new(),
            description: String::new(),
        };
        let stub = ProductStub::new("PS-05N", "", "https://example.com/product/1", &series);
        let mut detail = ProductDetail::from_stub(stub);
        detail.title = "Proximity Sensor".to_string();
        let images = ProductImages {
            spec_local_path: spec,
            ..ProductImages::default()
        };
        EnrichedProduct::new(detail, images)
    }

    fn config() -> EnrichmentConfig {
        EnrichmentConfig {
            name_suffix: Some("FOTEK".to_string()),
            ..EnrichmentConfig::default()
        }
    }

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for(Path::new("a/PS-SPEC.jpg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a/PS-SPEC.PNG")), "image/png");
        assert_eq!(mime_type_for(Path::new("a/PS-SPEC.webp")), "image/webp");
        assert_eq!(mime_type_for(Path::new("a/PS-SPEC")), "image/jpeg");
    }

    #[tokio::test]
    async fn test_unavailable_is_pass_through() {
        let stage = EnrichmentStage::new(None, &config());
        assert!(!stage.is_available());

        let original = product(None);
        let (enriched, failures) = stage.enrich(original.clone()).await;
        assert_eq!(enriched, original);
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_enrich_sets_both_fields() {
        let dir = tempfile::tempdir().unwrap();
        let spec = dir.path().join("PS-05N-SPEC.jpg");
        std::fs::write(&spec, b"jpegbytes").unwrap();

        let enricher = Arc::new(ScriptedEnricher {
            calls: AtomicUsize::new(0),
            fail_translation: false,
        });
        let stage = EnrichmentStage::new(Some(enricher.clone() as Arc<dyn Enricher>), &config());

        let (enriched, failures) = stage.enrich(product(Some(spec))).await;
        assert!(failures.is_empty());
        assert_eq!(
            enriched.translated_name.as_deref(),
            Some("Dịch Proximity Sensor FOTEK")
        );
        let table = enriched.spec_table_html.unwrap();
        assert!(table.starts_with("<table>"));
        assert!(table.contains("<td>image/jpeg</td><td>9</td>"));
        assert!(table.contains("Haiphongtech.vn"));
        assert_eq!(enricher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_leave_fields_unset() {
        let enricher = Arc::new(ScriptedEnricher {
            calls: AtomicUsize::new(0),
            fail_translation: true,
        });
        let stage = EnrichmentStage::new(Some(enricher as Arc<dyn Enricher>), &config());

        let missing = PathBuf::from("/nonexistent/PS-05N-SPEC.jpg");
        let (enriched, failures) = stage.enrich(product(Some(missing))).await;

        assert_eq!(enriched.translated_name, None);
        assert_eq!(enriched.spec_table_html, None);
        assert_eq!(enriched.code(), "PS-05N");
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| f.phase == RunPhase::Enriching));
    }

    #[test]
    fn test_table_instructions_carry_code_and_attribution() {
        let stage = EnrichmentStage::new(None, &config());
        let instructions = stage.table_instructions("PS-05N");
        assert!(instructions.contains("<td>PS-05N</td>"));
        assert!(instructions.contains("Haiphongtech.vn"));
        assert!(instructions.contains("Vietnamese"));
    }
}
