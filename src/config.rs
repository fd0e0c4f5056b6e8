use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::core::trademark::query::QueryBoosts;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TRADEMARK_CONFIG";
/// Prefix of environment overrides, e.g. `TRADEMARK_ELASTICSEARCH__HOST`.
pub const ENV_PREFIX: &str = "TRADEMARK_";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub elasticsearch: ElasticsearchConfig,
    pub data: DataConfig,
    pub paging: PagingConfig,
    pub phonetic: PhoneticConfig,
    pub query: QueryConfig,
    pub view_count: ViewCountConfig,
    pub log: LogConfig,
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Elasticsearch,
    /// In-process store; nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

/// Elasticsearch connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    pub host: String,
    pub port: u16,
    pub scheme: String,
    /// Trademark index name.
    pub index: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl ElasticsearchConfig {
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// What happens to the index at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitMode {
    /// Drop and recreate the index; loads replace all documents.
    #[default]
    Create,
    /// Create the index only if missing.
    Update,
    /// Leave the index alone.
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Load the data file at startup.
    #[default]
    Auto,
    /// Load only through the load-data endpoint.
    Manual,
}

/// Index lifecycle and the bundled data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub init_mode: InitMode,
    pub load_mode: LoadMode,
    pub file_path: PathBuf,
}

/// Result window limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub default_size: u32,
    pub max_size: u32,
    pub autocomplete_default_size: u32,
    pub autocomplete_max_size: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryConverter {
    /// Rule-based grapheme-to-phoneme conversion.
    #[default]
    Rules,
    /// Alphabet-name spelling only.
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneticConfig {
    pub primary: PrimaryConverter,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub boosts: QueryBoosts,
}

/// Optimistic view-count updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewCountConfig {
    /// Attempts before giving up with a version conflict.
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    /// Override the log directory.
    pub dir: Option<PathBuf>,
    /// Write JSON log files next to stdout output.
    pub json_file: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9200,
            scheme: "http".to_string(),
            index: "trademarks".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            init_mode: InitMode::default(),
            load_mode: LoadMode::default(),
            file_path: PathBuf::from("data/trademark_sample.json"),
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_size: 10,
            max_size: 100,
            autocomplete_default_size: 10,
            autocomplete_max_size: 20,
        }
    }
}

impl Default for ViewCountConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json_file: true,
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file at `path` (if present), then
    /// `TRADEMARK_*` environment variables.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration, failing on malformed input.
    pub fn load_from(path: &Path) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// Load configuration from [`config_path`](Self::config_path).
    /// Returns `Default` if it cannot be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match Self::load_from(&config_path) {
            Ok(config) => {
                log::info!("Loaded config (file: {})", config_path.display());
                config
            }
            Err(e) => {
                log::warn!(
                    "Failed to load config from {}: {} - using defaults",
                    config_path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// `$TRADEMARK_CONFIG`, else `<config dir>/trademark-search/config.toml`
    /// when it exists, else `./config.toml`.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .map(|d| d.join("trademark-search").join("config.toml"))
            .filter(|p| p.exists())
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.store.backend, StoreBackend::Elasticsearch);
        assert_eq!(config.elasticsearch.url(), "http://localhost:9200");
        assert_eq!(config.elasticsearch.index, "trademarks");
        assert_eq!(config.data.init_mode, InitMode::Create);
        assert_eq!(config.data.load_mode, LoadMode::Auto);
        assert_eq!(config.paging.max_size, 100);
        assert_eq!(config.paging.autocomplete_max_size, 20);
        assert_eq!(config.view_count.max_retries, 3);
        assert_eq!(config.phonetic.primary, PrimaryConverter::Rules);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = AppConfig::load_from(Path::new("absent.toml"))?;
            assert_eq!(config, AppConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [elasticsearch]
                host = "es.internal"
                index = "marks"

                [data]
                init_mode = "update"
                load_mode = "manual"

                [query.boosts]
                product_name = 6.0
                "#,
            )?;
            let config = AppConfig::load_from(Path::new("config.toml"))?;
            assert_eq!(config.elasticsearch.host, "es.internal");
            assert_eq!(config.elasticsearch.index, "marks");
            assert_eq!(config.elasticsearch.port, 9200);
            assert_eq!(config.data.init_mode, InitMode::Update);
            assert_eq!(config.data.load_mode, LoadMode::Manual);
            assert_eq!(config.query.boosts.product_name, 6.0);
            assert_eq!(config.query.boosts.product_name_eng, 2.5);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[elasticsearch]\nport = 9300\n")?;
            jail.set_env("TRADEMARK_ELASTICSEARCH__PORT", "9400");
            jail.set_env("TRADEMARK_STORE__BACKEND", "memory");
            jail.set_env("TRADEMARK_PHONETIC__PRIMARY", "none");
            let config = AppConfig::load_from(Path::new("config.toml"))?;
            assert_eq!(config.elasticsearch.port, 9400);
            assert_eq!(config.store.backend, StoreBackend::Memory);
            assert_eq!(config.phonetic.primary, PrimaryConverter::None);
            Ok(())
        });
    }

    #[test]
    fn test_malformed_value_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[paging]\nmax_size = \"lots\"\n")?;
            assert!(AppConfig::load_from(Path::new("config.toml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_config_path_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env(CONFIG_ENV, "/etc/trademark/config.toml");
            assert_eq!(
                AppConfig::config_path(),
                PathBuf::from("/etc/trademark/config.toml")
            );
            Ok(())
        });
    }
}
