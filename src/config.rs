// ⚙️ Configuration - environment variables with local-friendly defaults

use crate::statistics::StatsConfig;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

/// Dashboard configuration loaded from environment variables.
///
/// | Env Var            | Default                     |
/// |--------------------|-----------------------------|
/// | `DATASET_PATH`     | `all_entities_detailed.csv` |
/// | `HOST`             | `0.0.0.0`                   |
/// | `PORT`             | `3000`                      |
/// | `TOP_GESTORAS`     | `15`                        |
/// | `MARKET_SHARE_TOP` | `10`                        |
/// | `CONNECTIVITY_TOP` | `5`                         |
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub dataset_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub stats: StatsConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            dataset_path: PathBuf::from("all_entities_detailed.csv"),
            host: "0.0.0.0".to_string(),
            port: 3000,
            stats: StatsConfig::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = DashboardConfig::default();

        let dataset_path = lookup("DATASET_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.dataset_path);
        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "PORT", defaults.port)?;

        let stats = StatsConfig {
            top_gestoras: parse_var(&lookup, "TOP_GESTORAS", defaults.stats.top_gestoras)?,
            market_share_top: parse_var(&lookup, "MARKET_SHARE_TOP", defaults.stats.market_share_top)?,
            connectivity_top: parse_var(&lookup, "CONNECTIVITY_TOP", defaults.stats.connectivity_top)?,
            ..defaults.stats
        };

        Ok(DashboardConfig {
            dataset_path,
            host,
            port,
            stats,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number, got {:?}", key, raw)),
        None => Ok(default),
    }
}
