//! Core library for Hermes.
//!
//! Holds the document model and every rule the portal applies to it: the
//! sidecar metadata store, upload validation and persistence, the document
//! lister, the department access filter and the portal feature flags. This
//! crate depends on `hermes-storage` for the blob backend trait and knows
//! nothing about HTTP.

pub mod access;
pub mod error;
pub mod flags;
pub mod lister;
pub mod metadata;
pub mod upload;
