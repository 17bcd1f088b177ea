//! API process configuration, read once at startup.

use std::net::SocketAddr;

use anyhow::Context;

use palletflow_infra::EngineConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Use Postgres-backed stores (requires the `postgres` feature).
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub engine: EngineConfig,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let raw_addr =
            std::env::var("PALLETFLOW_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .parse()
            .with_context(|| format!("invalid PALLETFLOW_BIND_ADDR: {raw_addr}"))?;

        let use_persistent_stores = std::env::var("USE_PERSISTENT_STORES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        Ok(Self {
            bind_addr,
            use_persistent_stores,
            database_url: std::env::var("DATABASE_URL").ok(),
            engine: EngineConfig::from_env(),
        })
    }
}
