pub mod tracing;

use figment::providers::{Env, Format, Json};
use figment::Figment;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct AppCfg {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub db: DbCfg,
    #[serde(default)]
    pub session: SessionCfg,
    #[serde(default)]
    pub cors: CorsCfg,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DbCfg {
    /// `postgres://` URL. Without one the in-memory store is used.
    pub url: Option<String>,
    pub max_size: usize,
    pub wait_timeout_secs: Option<u64>,
    pub run_migrations: bool,
}

impl Default for DbCfg {
    fn default() -> Self {
        Self {
            url: None,
            max_size: 10,
            wait_timeout_secs: None,
            run_migrations: true,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SessionCfg {
    pub expiry_minutes: i64,
    pub secure: bool,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            expiry_minutes: 60,
            secure: false,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CorsCfg {
    pub allowed_origins: Vec<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppCfg {
    /// `appsettings.json`, overridden by `APP_` variables (`APP_DB__URL` sets `db.url`).
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Json::file("appsettings.json"))
            .merge(Env::prefixed("APP_").split("__"))
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}
