//! HTTP API for the pallet storage ledger: server wiring, routing and
//! request/response mapping.

pub mod app;
pub mod config;
pub mod middleware;
