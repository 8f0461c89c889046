use std::{
    collections::HashMap,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

/// Runtime configuration. Every key has a default; an optional `Settings.toml`
/// in the working directory overrides those and environment variables
/// (`APP_PORT`, `SOCKET_HOST`, ...) override both.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub app_port: u16,
    pub socket_port: u16,
    pub socket_host: String,
    pub store_uri: String,
    pub store_db: String,
    pub store_collection: String,
    pub store_compression: bool,
    pub static_root: PathBuf,
    pub relay_timeout_secs: u64,
    pub sink_timeout_secs: u64,
    pub socket_backlog: u32,
    pub log_level: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        defaults()?
            .add_source(File::with_name("Settings").required(false))
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Same layering as `new` minus the file, reading variables from `vars`
    /// instead of the process environment.
    pub fn from_env_map(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        defaults()?
            .add_source(Environment::default().try_parsing(true).source(Some(vars)))
            .build()?
            .try_deserialize()
    }

    /// Where the front door sends submissions.
    pub fn relay_addr(&self) -> String {
        format!("{}:{}", self.socket_host, self.socket_port)
    }

    /// The ingest worker listens on every interface.
    pub fn ingest_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.socket_port))
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.app_port))
    }

    /// Directory of the sled database, `<store_uri>/<store_db>`.
    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(&self.store_uri).join(&self.store_db)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_secs(self.sink_timeout_secs)
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("app_port", 3000_i64)?
        .set_default("socket_port", 5000_i64)?
        .set_default("socket_host", "127.0.0.1")?
        .set_default("store_uri", "./data")?
        .set_default("store_db", "messages_db")?
        .set_default("store_collection", "messages")?
        .set_default("store_compression", false)?
        .set_default("static_root", "./public")?
        .set_default("relay_timeout_secs", 5_i64)?
        .set_default("sink_timeout_secs", 5_i64)?
        .set_default("socket_backlog", 5_i64)?
        .set_default("log_level", "info")
}
