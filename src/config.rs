//! Run configuration.
//!
//! [`PipelineConfig`] drives the stages; [`ServiceConfig`] describes how to
//! reach the external services. Both are plain values passed into the
//! pipeline, never process-wide state.

use anyhow::{bail, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::service::RetryPolicy;

pub const API_KEY_ENV: &str = "SCHOLAR_API_KEY";
pub const DEFAULT_SCHOLAR_URL: &str = "https://serpapi.com/search.json";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_WORKERS: usize = 16;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How a citing author's affiliation string is chosen from their profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AffiliationPolicy {
    /// Structured organization when present, else last comma segment
    #[default]
    Conservative,
    /// Always the last comma segment of the free-text affiliation
    Aggressive,
}

impl std::fmt::Display for AffiliationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AffiliationPolicy::Conservative => f.write_str("conservative"),
            AffiliationPolicy::Aggressive => f.write_str("aggressive"),
        }
    }
}

/// One retry policy per external endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagePolicies {
    pub metadata: RetryPolicy,
    pub citations: RetryPolicy,
    pub authors: RetryPolicy,
    pub reconcile: RetryPolicy,
    pub geocode: RetryPolicy,
}

impl Default for StagePolicies {
    fn default() -> Self {
        Self {
            metadata: RetryPolicy::publication_metadata(),
            citations: RetryPolicy::citation_listing(),
            authors: RetryPolicy::author_lookup(),
            reconcile: RetryPolicy::reconciliation(),
            geocode: RetryPolicy::geocoding(),
        }
    }
}

impl StagePolicies {
    /// Same attempt budgets without any delay
    pub fn immediate(max_attempts: u32) -> Self {
        let policy = RetryPolicy::immediate(max_attempts);
        Self {
            metadata: policy.clone(),
            citations: policy.clone(),
            authors: policy.clone(),
            reconcile: policy.clone(),
            geocode: policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub researcher_id: String,
    /// `None` disables caching entirely
    pub cache_dir: Option<PathBuf>,
    pub policy: AffiliationPolicy,
    /// Worker-pool width for the parallel stages; 1 runs them sequentially
    pub workers: usize,
    pub resume: bool,
    pub proxy: Option<String>,
    pub timeout_secs: u64,
    pub retry: StagePolicies,
    /// Drop v2 cache rows that carry no author id at all
    pub skip_authorless_cached_rows: bool,
}

impl PipelineConfig {
    pub fn new(researcher_id: &str) -> Self {
        Self {
            researcher_id: researcher_id.to_string(),
            cache_dir: None,
            policy: AffiliationPolicy::default(),
            workers: DEFAULT_WORKERS,
            resume: true,
            proxy: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: StagePolicies::default(),
            skip_authorless_cached_rows: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.researcher_id.trim().is_empty() {
            bail!("Researcher id must not be empty");
        }
        if self.researcher_id.contains(['/', '\\']) {
            bail!("Researcher id '{}' contains a path separator", self.researcher_id);
        }
        if self.workers == 0 {
            bail!("Worker count must be at least 1");
        }
        if self.timeout_secs == 0 {
            bail!("Request timeout must be at least 1 second");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub scholar_base_url: String,
    pub api_key: String,
    pub geocoder_base_url: String,
    pub user_agent: String,
    /// Minimum spacing between geocoder requests
    pub geocoder_interval: Duration,
    /// Upper bound on result pages fetched per listing
    pub max_pages: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            scholar_base_url: DEFAULT_SCHOLAR_URL.to_string(),
            api_key: String::new(),
            geocoder_base_url: DEFAULT_GEOCODER_URL.to_string(),
            user_agent: format!("citation-geomap/{}", env!("CARGO_PKG_VERSION")),
            geocoder_interval: Duration::from_secs(1),
            max_pages: 50,
        }
    }
}

impl ServiceConfig {
    /// Resolve the API key from the explicit value or the environment
    pub fn with_api_key(mut self, explicit: Option<String>) -> Result<Self> {
        let key = match explicit {
            Some(key) if !key.trim().is_empty() => key,
            _ => env::var(API_KEY_ENV).unwrap_or_default(),
        };
        if key.trim().is_empty() {
            bail!(
                "No search API key: pass --api-key or set the {} environment variable",
                API_KEY_ENV
            );
        }
        self.api_key = key.trim().to_string();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new("abc123");
        assert_eq!(config.workers, 16);
        assert!(config.resume);
        assert_eq!(config.policy, AffiliationPolicy::Conservative);
        assert!(!config.skip_authorless_cached_rows);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::new("abc123");
        config.workers = 0;
        assert!(config.validate().is_err());

        let config = PipelineConfig::new("  ");
        assert!(config.validate().is_err());

        let config = PipelineConfig::new("../escape");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_serde_is_lowercase() {
        let json = serde_json::to_string(&AffiliationPolicy::Aggressive).unwrap();
        assert_eq!(json, "\"aggressive\"");
        let parsed: AffiliationPolicy = serde_json::from_str("\"conservative\"").unwrap();
        assert_eq!(parsed, AffiliationPolicy::Conservative);
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let config = ServiceConfig::default()
            .with_api_key(Some(" key-1 ".to_string()))
            .unwrap();
        assert_eq!(config.api_key, "key-1");
    }
}
