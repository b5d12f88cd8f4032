//! Runtime configuration.
//!
//! Defaults point at the public IBGE services. Every value can be overridden
//! from the environment (a `.env` file is loaded first when present).
//!
//! | Variable                 | Default                                               |
//! |--------------------------|-------------------------------------------------------|
//! | `IBGE_LOCALIDADES_URL`   | `https://servicodados.ibge.gov.br/api/v1/localidades` |
//! | `IBGE_SIDRA_URL`         | `https://apisidra.ibge.gov.br`                        |
//! | `IBGE_AGREGADOS_URL`     | `https://servicodados.ibge.gov.br/api/v3/agregados`   |
//! | `IBGE_TABLE_API`         | `sidra` (or `agregados`)                              |
//! | `IBGE_TIMEOUT_SECS`      | `30`                                                  |
//! | `CENSO_CACHE_DIR`        | `.censo/cache`                                        |
//! | `CENSO_CACHE_TTL_HOURS`  | `24`                                                  |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// IBGE "localidades" service (states and municipalities).
pub const DEFAULT_LOCALIDADES_URL: &str = "https://servicodados.ibge.gov.br/api/v1/localidades";

/// SIDRA values API (columnar responses).
pub const DEFAULT_SIDRA_URL: &str = "https://apisidra.ibge.gov.br";

/// Aggregates v3 API (nested responses).
pub const DEFAULT_AGREGADOS_URL: &str = "https://servicodados.ibge.gov.br/api/v3/agregados";

/// Per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where raw responses are cached (relative to current dir).
pub const DEFAULT_CACHE_DIR: &str = ".censo/cache";

/// Cached responses older than this are refetched.
pub const DEFAULT_CACHE_TTL_HOURS: i64 = 24;

/// Which IBGE table API serves the aggregate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableApi {
    /// `apisidra.ibge.gov.br/values` - header row followed by data rows.
    Sidra,
    /// `servicodados.ibge.gov.br/api/v3/agregados` - nested per variable and locality.
    Agregados,
}

impl FromStr for TableApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sidra" | "values" => Ok(TableApi::Sidra),
            "agregados" | "v3" => Ok(TableApi::Agregados),
            other => Err(format!("unknown table API '{}' (expected 'sidra' or 'agregados')", other)),
        }
    }
}

/// Service endpoints, timeout and cache settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub localidades_url: String,
    pub sidra_url: String,
    pub agregados_url: String,
    pub table_api: TableApi,
    pub timeout_secs: u64,
    pub cache_dir: PathBuf,
    pub cache_ttl_hours: i64,
    /// Skip the response cache entirely (no reads, no writes).
    pub no_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            localidades_url: DEFAULT_LOCALIDADES_URL.to_string(),
            sidra_url: DEFAULT_SIDRA_URL.to_string(),
            agregados_url: DEFAULT_AGREGADOS_URL.to_string(),
            table_api: TableApi::Sidra,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            cache_ttl_hours: DEFAULT_CACHE_TTL_HOURS,
            no_cache: false,
        }
    }
}

impl Config {
    /// Build the configuration from environment variables.
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Self {
            localidades_url: env_string("IBGE_LOCALIDADES_URL").unwrap_or(defaults.localidades_url),
            sidra_url: env_string("IBGE_SIDRA_URL").unwrap_or(defaults.sidra_url),
            agregados_url: env_string("IBGE_AGREGADOS_URL").unwrap_or(defaults.agregados_url),
            table_api: env_parse("IBGE_TABLE_API").unwrap_or(defaults.table_api),
            timeout_secs: env_parse("IBGE_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            cache_dir: env_string("CENSO_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            cache_ttl_hours: env_parse("CENSO_CACHE_TTL_HOURS").unwrap_or(defaults.cache_ttl_hours),
            no_cache: false,
        }
    }

    /// Disable the response cache.
    pub fn without_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.table_api, TableApi::Sidra);
        assert!(!config.no_cache);
        assert!(config.without_cache().no_cache);
    }

    #[test]
    fn test_table_api_parse() {
        assert_eq!("SIDRA".parse::<TableApi>(), Ok(TableApi::Sidra));
        assert_eq!(" agregados ".parse::<TableApi>(), Ok(TableApi::Agregados));
        assert!("graphql".parse::<TableApi>().is_err());
    }
}
