use serde::Deserialize;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
    /// Category page URLs to harvest
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Pipeline behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Worker count shared by the extraction and image stages
    #[serde(rename = "workers", default = "default_workers")]
    pub workers: usize,

    /// Upper bound on concurrent enrichment calls
    #[serde(rename = "enrichment-workers", default = "default_enrichment_workers")]
    pub enrichment_workers: usize,

    /// Timeout for a single network fetch (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for a rendered page to become ready (seconds)
    #[serde(rename = "render-timeout-secs", default = "default_render_timeout")]
    pub render_timeout_secs: u64,

    /// Total attempts per fetch, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for each later attempt (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Which rendered-fetch backend to use
    #[serde(rename = "renderer", default)]
    pub renderer: RendererKind,

    /// Re-fetch a series page through the renderer when static markup lists no products
    #[serde(rename = "render-series-fallback", default = "default_true")]
    pub render_series_fallback: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            enrichment_workers: default_enrichment_workers(),
            request_timeout_secs: default_request_timeout(),
            render_timeout_secs: default_render_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            renderer: RendererKind::default(),
            render_series_fallback: true,
        }
    }
}

impl ScraperConfig {
    /// Worker count for the enrichment stage
    ///
    /// Never exceeds the scraper worker count or `MAX_ENRICHMENT_WORKERS`.
    pub fn effective_enrichment_workers(&self) -> usize {
        self.workers
            .min(self.enrichment_workers)
            .min(crate::config::MAX_ENRICHMENT_WORKERS)
            .max(1)
    }
}

/// Rendered-fetch backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Plain GET with a readiness check on the returned markup
    #[default]
    Static,
    /// Headless Chrome (requires the `browser` feature)
    Chrome,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory for images and exports
    #[serde(rename = "directory", default = "default_output_dir")]
    pub directory: String,

    /// Prefix for export file names
    #[serde(rename = "file-prefix", default = "default_file_prefix")]
    pub file_prefix: String,

    /// Path to the SQLite run ledger
    #[serde(rename = "ledger-path", default = "default_ledger_path")]
    pub ledger_path: String,

    /// Quality used when re-encoding images (1-100)
    #[serde(rename = "image-quality", default = "default_image_quality")]
    pub image_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            file_prefix: default_file_prefix(),
            ledger_path: default_ledger_path(),
            image_quality: default_image_quality(),
        }
    }
}

/// External enrichment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Master switch for the enrichment stage
    #[serde(rename = "enabled", default = "default_true")]
    pub enabled: bool,

    /// Environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model identifier
    #[serde(rename = "model", default = "default_model")]
    pub model: String,

    /// API endpoint base URL
    #[serde(rename = "endpoint", default = "default_endpoint")]
    pub endpoint: String,

    /// Timeout for a single enrichment call (seconds)
    #[serde(rename = "timeout-secs", default = "default_enrichment_timeout")]
    pub timeout_secs: u64,

    /// Language product names and tables are translated into
    #[serde(rename = "target-language", default = "default_target_language")]
    pub target_language: String,

    /// Brand suffix appended to translated names
    #[serde(rename = "name-suffix", default)]
    pub name_suffix: Option<String>,

    /// Label of the attribution row closing every specification table
    #[serde(rename = "attribution-label", default = "default_attribution_label")]
    pub attribution_label: String,

    /// Value of the attribution row closing every specification table
    #[serde(rename = "attribution-value", default = "default_attribution_value")]
    pub attribution_value: String,

    /// Extra boilerplate phrases stripped from table responses
    #[serde(rename = "boilerplate", default)]
    pub boilerplate: Vec<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: default_api_key_env(),
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_enrichment_timeout(),
            target_language: default_target_language(),
            name_suffix: None,
            attribution_label: default_attribution_label(),
            attribution_value: default_attribution_value(),
            boilerplate: Vec::new(),
        }
    }
}

/// Category partitioning configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionConfig {
    /// Path segment preceding the category key in series URLs
    #[serde(rename = "path-marker", default = "default_path_marker")]
    pub path_marker: String,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            path_marker: default_path_marker(),
        }
    }
}

fn default_workers() -> usize {
    5
}

fn default_enrichment_workers() -> usize {
    3
}

fn default_request_timeout() -> u64 {
    30
}

fn default_render_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_output_dir() -> String {
    "./harvest_data".to_string()
}

fn default_file_prefix() -> String {
    "catalog".to_string()
}

fn default_ledger_path() -> String {
    "./harvest_data/ledger.db".to_string()
}

fn default_image_quality() -> u8 {
    85
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_enrichment_timeout() -> u64 {
    60
}

fn default_target_language() -> String {
    "Vietnamese".to_string()
}

fn default_attribution_label() -> String {
    "Copyright".to_string()
}

fn default_attribution_value() -> String {
    "Haiphongtech.vn".to_string()
}

fn default_path_marker() -> String {
    "/product-category/".to_string()
}
