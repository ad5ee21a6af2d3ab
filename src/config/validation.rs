use crate::config::types::{
    Config, CoverageConfig, CrawlerConfig, RetryConfig, SiteConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_coverage_config(&config.coverage)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

/// Validates the site configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    let base_host = base
        .host_str()
        .ok_or_else(|| ConfigError::InvalidUrl("base-url has no host".to_string()))?;

    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;
        if url.host_str() != Some(base_host) {
            return Err(ConfigError::Validation(format!(
                "seed URL '{}' is not on the portal host '{}'",
                seed, base_host
            )));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.checkpoint_every < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint_every must be >= 1, got {}",
            config.checkpoint_every
        )));
    }

    if config.timeout_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_seconds must be >= 1, got {}",
            config.timeout_seconds
        )));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "base_delay must be > 0ms".to_string(),
        ));
    }

    if config.max_delay_ms < config.base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max_delay ({}ms) must be >= base_delay ({}ms)",
            config.max_delay_ms, config.base_delay_ms
        )));
    }

    Ok(())
}

/// Validates coverage thresholds: each must be a percentage and the bands
/// must be ordered excellent >= good >= acceptable
fn validate_coverage_config(config: &CoverageConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("excellent", config.excellent),
        ("good", config.good),
        ("acceptable", config.acceptable),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "coverage threshold '{}' must be between 0 and 100, got {}",
                name, value
            )));
        }
    }

    if config.excellent < config.good || config.good < config.acceptable {
        return Err(ConfigError::Validation(format!(
            "coverage thresholds must be ordered excellent >= good >= acceptable, got {}/{}/{}",
            config.excellent, config.good, config.acceptable
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Basic email shape check: one '@' with a dotted domain after it
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "contact_email does not look like an email address: '{}'",
            email
        )));
    }
    Ok(())
}
