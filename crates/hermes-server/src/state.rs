//! Shared application state for the Hermes server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. The feature flags are loaded once and live here;
//! nothing reads configuration from a global.

use hermes_core::access::DepartmentResolver;
use hermes_core::flags::FeatureFlags;
use hermes_core::lister::DocumentLister;
use hermes_core::metadata::MetadataStore;
use hermes_core::upload::UploadHandler;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Sidecar-aware document store, used for deletes.
    pub metadata: MetadataStore,
    /// Upload validation and persistence.
    pub uploads: UploadHandler,
    /// Document listing with access filtering.
    pub lister: DocumentLister,
    /// Maps requester role claims to a department.
    pub departments: DepartmentResolver,
    /// Portal feature flags.
    pub flags: FeatureFlags,
    /// Most files accepted in one upload request.
    pub max_files_per_upload: usize,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
