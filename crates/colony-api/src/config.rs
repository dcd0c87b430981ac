use std::fs;
use std::net::{AddrParseError, SocketAddr};
use std::path::{Path, PathBuf};

use colony_core::{CatalogError, RecipeCatalog};
use contracts::PlannerConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const BIND_ADDR_ENV: &str = "COLONY_BIND_ADDR";
pub const CATALOG_ENV: &str = "COLONY_CATALOG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid service config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid bind address {value:?}: {source}")]
    BindAddr {
        value: String,
        source: AddrParseError,
    },
    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),
}

/// Service settings. Loaded from TOML, then overridden by `COLONY_*` env vars.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    /// JSON item and recipe tables; an empty catalog is used when unset.
    pub catalog_path: Option<PathBuf>,
    pub planner: PlannerConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            catalog_path: None,
            planner: PlannerConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Read `path` when given, fall back to defaults otherwise, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_toml_str(&read(path)?)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let set = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(value) = set(BIND_ADDR_ENV) {
            self.bind_addr = value
                .trim()
                .parse()
                .map_err(|source| ConfigError::BindAddr { value, source })?;
        }
        if let Some(value) = set(CATALOG_ENV) {
            self.catalog_path = Some(PathBuf::from(value));
        }
        Ok(self)
    }
}

pub fn load_catalog(path: Option<&Path>) -> Result<RecipeCatalog, ConfigError> {
    let Some(path) = path else {
        warn!("no catalog configured; crafting and production will find no recipes");
        return Ok(RecipeCatalog::default());
    };
    let catalog = RecipeCatalog::from_json_str(&read(path)?)?;
    info!(
        path = %path.display(),
        items = catalog.items().len(),
        recipes = catalog.recipes().len(),
        "catalog loaded"
    );
    Ok(catalog)
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_only_the_keys_it_names() {
        let config = ServiceConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:9000"

            [planner]
            meal_batch = 4
            "#,
        )
        .expect("valid toml");
        assert_eq!(config.bind_addr, SocketAddr::from(([0, 0, 0, 0], 9000)));
        assert_eq!(config.planner.meal_batch, 4);
        assert_eq!(
            config.planner.storage_category,
            PlannerConfig::default().storage_category
        );
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn env_overrides_win_and_blank_values_are_ignored() {
        let config = ServiceConfig::default()
            .with_overrides(|key| match key {
                BIND_ADDR_ENV => Some("127.0.0.1:7777".to_string()),
                CATALOG_ENV => Some("  ".to_string()),
                _ => None,
            })
            .expect("valid overrides");
        assert_eq!(config.bind_addr.port(), 7777);
        assert!(config.catalog_path.is_none());

        let err = ServiceConfig::default()
            .with_overrides(|key| (key == BIND_ADDR_ENV).then(|| "nowhere".to_string()))
            .expect_err("bad address");
        assert!(matches!(err, ConfigError::BindAddr { .. }));
    }

    #[test]
    fn missing_catalog_file_is_a_read_error() {
        let err = load_catalog(Some(Path::new("/definitely/not/here.json"))).expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(load_catalog(None).expect("empty").recipes().is_empty());
    }
}
