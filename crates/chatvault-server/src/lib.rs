//! ChatVault server: local persistence surface, remote ingest endpoint and
//! the query API consumed by the dashboard.

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
