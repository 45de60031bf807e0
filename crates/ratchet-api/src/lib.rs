//! JSON REST API for the ratchet learning core.
//!
//! Exposes an axum [`Router`] backed by a [`LearningEngine`] over any
//! [`ratchet_core::store::LearningStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ratchet_api::api_router(ApiState::new(engine.clone())))
//! ```

pub mod artifacts;
pub mod error;
pub mod executions;
pub mod knowledge;
pub mod patterns;
pub mod rules;
pub mod runs;
pub mod trigger;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use ratchet_core::store::LearningStore;
use ratchet_engine::LearningEngine;

pub use error::ApiError;
pub use trigger::MiningTrigger;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub engine:  Arc<LearningEngine<S>>,
  /// Notified as executions complete, when the server mines on volume.
  pub trigger: Option<Arc<MiningTrigger>>,
}

impl<S> ApiState<S> {
  pub fn new(engine: Arc<LearningEngine<S>>) -> Self { Self { engine, trigger: None } }

  pub fn with_trigger(mut self, trigger: Arc<MiningTrigger>) -> Self {
    self.trigger = Some(trigger);
    self
  }
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { engine: self.engine.clone(), trigger: self.trigger.clone() }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: LearningStore + 'static,
{
  Router::new()
    // Executions
    .route("/executions", post(executions::start::<S>))
    .route("/executions/{id}/complete", post(executions::complete::<S>))
    // Patterns and artifacts
    .route("/patterns", get(patterns::list::<S>))
    .route("/patterns/{signature}", get(patterns::get_one::<S>))
    .route("/artifacts", get(artifacts::list::<S>))
    .route("/artifacts/{id}", get(artifacts::get_one::<S>))
    .route("/artifacts/{id}/deactivate", post(artifacts::deactivate::<S>))
    // Rules
    .route("/rules", get(rules::list::<S>).post(rules::create::<S>))
    .route("/rules/{id}", get(rules::get_one::<S>))
    .route("/rules/{id}/applications", get(rules::applications::<S>))
    .route("/applications", post(rules::record_application::<S>))
    // On-demand runs
    .route("/mining/run", post(runs::mine::<S>))
    .route("/propagation/run", post(runs::propagate::<S>))
    // Audit trail
    .route("/knowledge", get(knowledge::list::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
