//! Core types and trait definitions for the ratchet learning core.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The engine, the SQLite backend and the API all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod execution;
pub mod knowledge;
pub mod pattern;
pub mod rule;
pub mod scope;
pub mod store;

pub use error::{Error, Result};
pub use scope::Scope;
