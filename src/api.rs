use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::history::{self, ItemListing};
use crate::lookup::registry::SourceRegistry;
use crate::store::Store;
use crate::update::{self, UpdateCfg};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub registry: Arc<SourceRegistry>,
    pub update: UpdateCfg,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/update", post(run_update))
        .route("/items", get(list_items))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct UpdateResp {
    results: usize,
}

/// Trigger entrypoint: run an update cycle now. Reports success with a
/// count (possibly 0) even when some or all lookups failed; only a storage
/// failure surfaces as a cycle-level error.
async fn run_update(State(state): State<AppState>) -> Result<Json<UpdateResp>, StatusCode> {
    match update::run_cycle(&state.store, &state.registry, state.update).await {
        Ok(n) => Ok(Json(UpdateResp { results: n })),
        Err(err) => {
            tracing::error!(error = %err, "update cycle failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Listing read model for the presentation layer: each item with its
/// chronologically ascending price history and latest-offer annotation.
async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<ItemListing>>, StatusCode> {
    match history::listing(&state.store).await {
        Ok(items) => Ok(Json(items)),
        Err(err) => {
            tracing::error!(error = %err, "listing query failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
