use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::models::{Cinema, Screen};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cinemas", get(list_cinemas))
        .route("/cinemas/{id}", get(get_cinema))
        .route("/cinemas/{id}/screens", get(screens_by_cinema))
}

// GET /api/cinemas
async fn list_cinemas(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Cinema>>> {
    Ok(Json(state.store.list_cinemas().await?))
}

// GET /api/cinemas/{id}
async fn get_cinema(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Cinema>> {
    let cinema = state
        .store
        .get_cinema(id)
        .await?
        .ok_or(ApiError::NotFound("cinema"))?;
    Ok(Json(cinema))
}

// GET /api/cinemas/{id}/screens
async fn screens_by_cinema(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Screen>>> {
    if state.store.get_cinema(id).await?.is_none() {
        return Err(ApiError::NotFound("cinema"));
    }
    Ok(Json(state.store.screens_by_cinema(id).await?))
}
