use crate::config::types::{Config, EnrichmentConfig, OutputConfig, PartitionConfig, ScraperConfig};
use crate::config::MAX_WORKERS;
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_scraper_config(&config.scraper)?;
    validate_output_config(&config.output)?;
    validate_enrichment_config(&config.enrichment)?;
    validate_partition_config(&config.partition)?;
    validate_category_urls(&config.categories)?;
    Ok(())
}

/// Validates pipeline behavior configuration
fn validate_scraper_config(config: &ScraperConfig) -> ConfigResult<()> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.enrichment_workers < 1 {
        return Err(ConfigError::Validation(format!(
            "enrichment_workers must be >= 1, got {}",
            config.enrichment_workers
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.request_timeout_secs == 0 || config.render_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request and render timeouts must be > 0 seconds".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.ledger_path.is_empty() {
        return Err(ConfigError::Validation(
            "ledger_path cannot be empty".to_string(),
        ));
    }

    // File prefixes end up in file names
    if config.file_prefix.is_empty()
        || !config
            .file_prefix
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "file_prefix must be non-empty and contain only alphanumerics, '-' or '_', got '{}'",
            config.file_prefix
        )));
    }

    if config.image_quality == 0 || config.image_quality > 100 {
        return Err(ConfigError::Validation(format!(
            "image_quality must be between 1 and 100, got {}",
            config.image_quality
        )));
    }

    Ok(())
}

/// Validates enrichment configuration
fn validate_enrichment_config(config: &EnrichmentConfig) -> ConfigResult<()> {
    if !config.enabled {
        return Ok(());
    }

    Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid enrichment endpoint: {}", e)))?;

    if config.model.is_empty() {
        return Err(ConfigError::Validation(
            "enrichment model cannot be empty".to_string(),
        ));
    }

    if config.attribution_value.trim().is_empty() {
        return Err(ConfigError::Validation(
            "attribution_value cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates partitioning configuration
fn validate_partition_config(config: &PartitionConfig) -> ConfigResult<()> {
    let marker = config.path_marker.trim_matches('/');
    if marker.is_empty() {
        return Err(ConfigError::Validation(
            "partition path_marker cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates category URLs
fn validate_category_urls(urls: &[String]) -> ConfigResult<()> {
    for raw in urls {
        validate_category_url(raw)?;
    }
    Ok(())
}

/// Validates a single category URL
pub fn validate_category_url(raw: &str) -> ConfigResult<()> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid category URL '{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Category URL '{}' must use HTTP or HTTPS",
            raw
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_worker_bounds() {
        let mut config = Config::default();
        config.scraper.workers = 11;
        assert!(validate(&config).is_err());

        config.scraper.workers = 10;
        assert!(validate(&config).is_ok());

        config.scraper.workers = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_enrichment_workers_capped() {
        let mut config = Config::default();
        config.scraper.workers = 10;
        config.scraper.enrichment_workers = 10;
        assert!(validate(&config).is_ok());
        assert_eq!(config.scraper.effective_enrichment_workers(), 3);

        config.scraper.enrichment_workers = 2;
        assert_eq!(config.scraper.effective_enrichment_workers(), 2);

        config.scraper.workers = 1;
        assert_eq!(config.scraper.effective_enrichment_workers(), 1);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = Config::default();
        config.scraper.max_attempts = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_category_url() {
        assert!(validate_category_url("https://www.fotek.com.tw/en-gb/product-category/72").is_ok());
        assert!(validate_category_url("http://localhost:8080/product-category/1").is_ok());

        assert!(validate_category_url("").is_err());
        assert!(validate_category_url("not a url").is_err());
        assert!(validate_category_url("ftp://example.com/product-category/1").is_err());
    }

    #[test]
    fn test_file_prefix_rules() {
        let mut config = Config::default();
        config.output.file_prefix = "fotek_2024".to_string();
        assert!(validate(&config).is_ok());

        config.output.file_prefix = "../escape".to_string();
        assert!(validate(&config).is_err());

        config.output.file_prefix = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_disabled_enrichment_skips_checks() {
        let mut config = Config::default();
        config.enrichment.enabled = false;
        config.enrichment.endpoint = "not a url".to_string();
        assert!(validate(&config).is_ok());

        config.enrichment.enabled = true;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_path_marker_rejected() {
        let mut config = Config::default();
        config.partition.path_marker = "//".to_string();
        assert!(validate(&config).is_err());
    }
}
