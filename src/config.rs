//! Configuration loading.
//!
//! Grimoire reads a TOML file (default `./config/grimoire.toml`):
//!
//! ```toml
//! [db]
//! path = "./data/grimoire.sqlite"
//!
//! [search]
//! default_limit = 20
//! max_limit = 500
//!
//! [import]
//! default_origin = "user-import"
//! ```
//!
//! Only `[db]` is required.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use grimoire_core::query::QueryLimits;
use grimoire_core::SourceOrigin;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl SearchConfig {
    pub fn limits(&self) -> QueryLimits {
        QueryLimits {
            default_limit: self.default_limit,
            max_limit: self.max_limit,
        }
    }
}

fn default_limit() -> i64 {
    20
}
fn default_max_limit() -> i64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    /// Origin for OrcBrew files imported without `--origin`.
    #[serde(default = "default_origin")]
    pub default_origin: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_origin: default_origin(),
        }
    }
}

impl ImportConfig {
    pub fn origin(&self) -> Result<SourceOrigin> {
        self.default_origin
            .parse()
            .with_context(|| "import.default_origin")
    }
}

fn default_origin() -> String {
    SourceOrigin::UserImport.as_str().to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.search.default_limit < 1 {
        anyhow::bail!("search.default_limit must be >= 1");
    }

    if config.search.max_limit < config.search.default_limit {
        anyhow::bail!(
            "search.max_limit ({}) must be >= search.default_limit ({})",
            config.search.max_limit,
            config.search.default_limit
        );
    }

    config.import.origin()?;

    Ok(config)
}
