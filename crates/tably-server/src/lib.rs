//! # tably-server
//!
//! HTTP wiring for the Tably backend: configuration loading, the auth
//! component graph, the route table, and background maintenance. All
//! auth behavior lives in `tably-auth`; controllers here only translate
//! between the wire and the orchestrator.

pub mod config;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod tasks;

pub use config::AppConfig;
pub use routes::router;
pub use state::AppState;
