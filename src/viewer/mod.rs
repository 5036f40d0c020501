//! Read-only map viewer over the `locations` table

mod template;

use axum::{extract::State, response::Html, routing::get, Json, Router};

use crate::db::Store;
use crate::error::AppError;
use crate::models::StoredLocation;

pub fn routes(store: Store) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/index", get(index))
        .route("/api/locations", get(list_locations))
        .route("/health", get(health_check))
        .with_state(store)
}

/// GET / - Map page with every stored location embedded as JSON
async fn index(State(store): State<Store>) -> Result<Html<String>, AppError> {
    let locations = store.list_locations().await?;
    Ok(Html(template::render_map(&locations)))
}

/// GET /api/locations - All stored locations
async fn list_locations(State(store): State<Store>) -> Result<Json<Vec<StoredLocation>>, AppError> {
    Ok(Json(store.list_locations().await?))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
