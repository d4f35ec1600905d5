//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check listen prefixes and the upstream base URL
//! - Validate value ranges (limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::ProxyConfig;
use crate::net::listener::ListenPrefix;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.prefixes must not be empty")]
    NoPrefixes,
    #[error("invalid listen prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },
    #[error("listener.max_connections must be greater than zero")]
    ZeroConnections,
    #[error("invalid upstream.base_url {url:?}: {reason}")]
    InvalidUpstream { url: String, reason: String },
    #[error("upstream.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
    #[error("cache.root must not be empty")]
    EmptyCacheRoot,
    #[error("invalid observability.metrics_address {0:?}")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.prefixes.is_empty() {
        errors.push(ValidationError::NoPrefixes);
    }
    for prefix in &config.listener.prefixes {
        if let Err(e) = ListenPrefix::parse(prefix) {
            errors.push(ValidationError::InvalidPrefix {
                prefix: prefix.clone(),
                reason: e.to_string(),
            });
        }
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }

    if let Err(reason) = check_upstream(&config.upstream.base_url) {
        errors.push(ValidationError::InvalidUpstream {
            url: config.upstream.base_url.clone(),
            reason,
        });
    }
    if config.upstream.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if config.cache.root.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyCacheRoot);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme {:?}, only http is supported", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment".to_string());
    }
    Ok(())
}
