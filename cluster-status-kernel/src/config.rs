use sqlx::mysql::MySqlConnectOptions;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("MySQL configuration is required when storage type is mysql")]
    MissingMysql,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Json,
    Mysql,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub json_path: PathBuf,
    pub mysql: Option<MySqlConfig>,
}

#[derive(Clone)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

// le mot de passe ne doit jamais finir dans les logs
impl fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl MySqlConfig {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

impl Config {
    /// Lit la config depuis les variables d'environnement du process
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Même chose avec une source arbitraire (tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // une variable vide compte comme absente
        let var = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = parse_port("PORT", var("PORT", "8080"))?;

        let kind = match var("STORAGE_TYPE", "json").as_str() {
            "mysql" => StorageKind::Mysql,
            "json" => StorageKind::Json,
            other => {
                tracing::warn!(storage_type = other, "unknown STORAGE_TYPE, using json");
                StorageKind::Json
            }
        };

        let mysql = if kind == StorageKind::Mysql {
            Some(MySqlConfig {
                host: var("DB_HOST", "localhost"),
                port: parse_port("DB_PORT", var("DB_PORT", "3306"))?,
                database: var("DB_NAME", "cluster_status"),
                user: var("DB_USER", "cluster_user"),
                password: var("DB_PASSWORD", "cluster_pass"),
            })
        } else {
            None
        };

        let config = Config {
            port,
            storage: StorageConfig {
                kind,
                json_path: PathBuf::from(var("STORAGE_PATH", "./data")),
                mysql,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.kind == StorageKind::Mysql && self.storage.mysql.is_none() {
            return Err(ConfigError::MissingMysql);
        }
        Ok(())
    }
}

fn parse_port(name: &'static str, value: String) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidValue { name, value })
}
