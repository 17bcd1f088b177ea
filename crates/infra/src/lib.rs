//! Infrastructure layer: stores, directories, configuration and the
//! `LedgerEngine` facade the binaries talk to.
//!
//! In-memory backends are always available; Postgres backends sit behind the
//! `postgres` feature.

pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod store;

pub use config::EngineConfig;
pub use engine::{LedgerEngine, LedgerStores};
pub use error::{EngineError, EngineResult, StoreError};
