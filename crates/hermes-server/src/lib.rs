//! Hermes HTTP server.
//!
//! Wires the core library and a blob store into an Axum application that
//! accepts document uploads, lists the documents a requester may see,
//! deletes documents and serves the portal feature flags. Optionally serves
//! the static portal pages at `/`.

pub mod app;
pub mod config;
pub mod error;
pub mod requester;
pub mod routes;
pub mod state;
