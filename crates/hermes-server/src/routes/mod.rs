//! HTTP route modules. Each exposes a `router()` over the shared state.

pub mod config;
pub mod documents;
pub mod health;
pub mod upload;
