//! The `ratchet` server: configuration, HTTP app and scheduler.

pub mod config;
pub mod scheduler;

use axum::{Router, routing::get};
use ratchet_api::{ApiState, api_router};
use ratchet_core::store::LearningStore;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use scheduler::Scheduler;

/// The full HTTP app: the API under `/api` plus a liveness check.
pub fn app<S>(state: ApiState<S>) -> Router
where
  S: LearningStore + 'static,
{
  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}
