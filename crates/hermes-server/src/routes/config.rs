//! Portal configuration route: `GET /api/config`.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use hermes_core::flags::FeatureFlags;

use crate::state::AppState;

/// Build the config router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/config", get(get_config))
}

/// Return the feature flags loaded at startup.
async fn get_config(State(state): State<Arc<AppState>>) -> Json<FeatureFlags> {
    Json(state.flags.clone())
}
