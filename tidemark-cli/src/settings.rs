//! Resolve the effective `MigrateConfig` for one invocation
//!
//! Precedence, highest first: command-line flags, the config file and
//! `TIDEMARK__MIGRATE__*` variables, then `DATABASE_URL` for the URL only.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tidemark::config::{MigrateConfig, DEFAULT_CONFIG_FILE};

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub dir: Option<PathBuf>,
    pub dialect: Option<String>,
    pub table: Option<String>,
    pub schema: Option<String>,
}

impl Overrides {
    /// Apply every flag that was given on top of `config`
    pub fn apply(self, mut config: MigrateConfig) -> MigrateConfig {
        if let Some(url) = self.database_url {
            config.url = Some(url);
        }
        if let Some(dir) = self.dir {
            config.directory = dir;
        }
        if let Some(dialect) = self.dialect {
            config.dialect = dialect;
        }
        if let Some(table) = self.table {
            config.table = table;
        }
        if self.schema.is_some() {
            config.schema = self.schema;
        }
        config
    }
}

/// Load the config file (`config_file` or the default location), overlay
/// `overrides`, and fall back to `database_url_env` when no URL is set
///
/// # Errors
///
/// Fails if the configuration cannot be loaded or is invalid.
pub fn resolve(
    config_file: Option<&Path>,
    overrides: Overrides,
    database_url_env: Option<String>,
) -> Result<MigrateConfig> {
    let path = config_file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    let loaded = MigrateConfig::load_from(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    let mut config = overrides.apply(loaded);
    if config.url.as_deref().map_or(true, str::is_empty) {
        config.url = database_url_env.filter(|url| !url.is_empty());
    }

    config.validate().context("Invalid configuration")?;
    log::debug!(
        "Using dialect {} with migrations in {} (table {})",
        config.dialect,
        config.directory.display(),
        config.table
    );
    Ok(config)
}
