//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file
//! (`~/.config/paper-scout/config.toml` or an explicit path), then
//! `PAPER_SCOUT_*` environment variables.
//!
//! ```toml
//! [courtesy]
//! openalex_mailto = "you@example.com"
//! crossref_mailto = "you@example.com"
//! semantic_scholar_api_key = "your-api-key"
//!
//! [providers]
//! enabled = ["openalex", "crossref", "semantic", "arxiv"]
//!
//! [pipeline]
//! limit = 20
//! parallel_queries = 3
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] config::ConfigError),

    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Courtesy identifiers and API keys for higher provider rate tiers
    #[serde(default)]
    pub courtesy: CourtesyConfig,

    /// Which providers participate in the fan-out
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Pipeline defaults
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Courtesy identifiers for external services.
///
/// Providers missing their identifier self-throttle to the anonymous rate
/// tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourtesyConfig {
    /// OpenAlex polite-pool contact address
    #[serde(default)]
    pub openalex_mailto: Option<String>,

    /// CrossRef polite-pool contact address
    #[serde(default)]
    pub crossref_mailto: Option<String>,

    /// Semantic Scholar API key
    #[serde(default)]
    pub semantic_scholar_api_key: Option<String>,
}

impl Default for CourtesyConfig {
    fn default() -> Self {
        Self {
            openalex_mailto: std::env::var("OPENALEX_MAILTO").ok(),
            crossref_mailto: std::env::var("CROSSREF_MAILTO").ok(),
            semantic_scholar_api_key: std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok(),
        }
    }
}

/// Provider enablement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Providers to register, in fan-out order
    #[serde(default = "default_enabled_providers")]
    pub enabled: Vec<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_providers(),
        }
    }
}

impl ProvidersConfig {
    /// Whether a provider participates in searches
    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.iter().any(|e| e == id)
    }
}

fn default_enabled_providers() -> Vec<String> {
    vec![
        "openalex".to_string(),
        "crossref".to_string(),
        "semantic".to_string(),
        "arxiv".to_string(),
    ]
}

/// Pipeline defaults applied when the caller does not override them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Default result limit
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Default number of parallel query variants
    #[serde(default = "default_parallel_queries")]
    pub parallel_queries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            parallel_queries: default_parallel_queries(),
        }
    }
}

fn default_limit() -> usize {
    20
}

fn default_parallel_queries() -> usize {
    3
}

/// Default configuration file location under the user config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("paper-scout").join("config.toml"))
}

/// Load configuration: defaults, then the TOML file (explicit path or the
/// default location when present), then `PAPER_SCOUT_*` environment
/// variables (`PAPER_SCOUT_COURTESY__OPENALEX_MAILTO=...`).
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    match explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            builder = builder.add_source(config::File::from(path));
        }
        None => {
            if let Some(path) = default_config_path().filter(|p| p.exists()) {
                builder = builder.add_source(config::File::from(path));
            }
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PAPER_SCOUT")
            .separator("__")
            .try_parsing(true),
    );

    let loaded = builder.build()?;
    let config: Config = loaded.try_deserialize()?;
    Ok(config)
}
