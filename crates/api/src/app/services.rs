//! Store selection and engine construction.

use palletflow_infra::{LedgerEngine, LedgerStores};

use crate::config::ApiConfig;

/// In-memory engine (dev/test).
pub fn in_memory_engine(config: &ApiConfig) -> LedgerEngine {
    LedgerEngine::new(LedgerStores::in_memory(), config.engine)
}

#[cfg(feature = "postgres")]
async fn persistent_engine(config: &ApiConfig) -> anyhow::Result<LedgerEngine> {
    use anyhow::Context;

    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;

    let pool = sqlx::PgPool::connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    palletflow_infra::store::apply_schema(&pool)
        .await
        .context("failed to apply ledger schema")?;

    tracing::info!("using Postgres-backed stores");
    Ok(LedgerEngine::new(LedgerStores::postgres(pool), config.engine))
}

/// Pick the backend from `USE_PERSISTENT_STORES`.
pub async fn build_engine(config: &ApiConfig) -> anyhow::Result<LedgerEngine> {
    if config.use_persistent_stores {
        #[cfg(feature = "postgres")]
        {
            return persistent_engine(config).await;
        }
        #[cfg(not(feature = "postgres"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory"
            );
        }
    }
    Ok(in_memory_engine(config))
}
