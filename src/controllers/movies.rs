use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AdminUser;
use crate::models::Movie;
use crate::store::{MovieUpdate, NewMovie};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies))
        .route("/movies/now-showing", get(now_showing))
        .route("/movies/coming-soon", get(coming_soon))
        .route("/movies/{id}", get(get_movie))
        .route("/admin/movies", post(create_movie))
        .route("/admin/movies/{id}", put(update_movie))
        .route("/admin/movies/{id}", delete(delete_movie))
}

// GET /api/movies
async fn list_movies(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Movie>>> {
    Ok(Json(state.store.list_movies().await?))
}

// GET /api/movies/now-showing
async fn now_showing(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Movie>>> {
    let movies = state.store.list_movies().await?;
    Ok(Json(movies.into_iter().filter(|m| m.is_now_showing).collect()))
}

// GET /api/movies/coming-soon
async fn coming_soon(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Movie>>> {
    let movies = state.store.list_movies().await?;
    Ok(Json(movies.into_iter().filter(|m| m.is_coming_soon).collect()))
}

// GET /api/movies/{id}
async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Movie>> {
    let movie = state
        .store
        .get_movie(id)
        .await?
        .ok_or(ApiError::NotFound("movie"))?;
    Ok(Json(movie))
}

// POST /api/admin/movies
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateMovieRequest {
    #[validate(length(min = 1))]
    title: String,
    description: String,
    #[validate(url)]
    poster_url: String,
    #[validate(url)]
    banner_url: String,
    release_year: i32,
    #[validate(range(min = 1))]
    duration: i32,
    rating: String,
    imdb_rating: Option<f64>,
    #[serde(default)]
    genres: Vec<String>,
    trailer: Option<String>,
    #[serde(default)]
    is_now_showing: bool,
    #[serde(default)]
    is_coming_soon: bool,
    release_date: Option<DateTime<Utc>>,
}

async fn create_movie(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMovieRequest>,
) -> ApiResult<(StatusCode, Json<Movie>)> {
    req.validate()?;

    let movie = state
        .store
        .create_movie(NewMovie {
            title: req.title,
            description: req.description,
            poster_url: req.poster_url,
            banner_url: req.banner_url,
            release_year: req.release_year,
            duration: req.duration,
            rating: req.rating,
            imdb_rating: req.imdb_rating,
            genres: req.genres,
            trailer: req.trailer,
            is_now_showing: req.is_now_showing,
            is_coming_soon: req.is_coming_soon,
            release_date: req.release_date,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(movie)))
}

// PUT /api/admin/movies/{id}
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateMovieRequest {
    title: Option<String>,
    description: Option<String>,
    poster_url: Option<String>,
    banner_url: Option<String>,
    release_year: Option<i32>,
    duration: Option<i32>,
    rating: Option<String>,
    imdb_rating: Option<f64>,
    genres: Option<Vec<String>>,
    trailer: Option<String>,
    is_now_showing: Option<bool>,
    is_coming_soon: Option<bool>,
    release_date: Option<DateTime<Utc>>,
}

async fn update_movie(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateMovieRequest>,
) -> ApiResult<Json<Movie>> {
    let update = MovieUpdate {
        title: req.title,
        description: req.description,
        poster_url: req.poster_url,
        banner_url: req.banner_url,
        release_year: req.release_year,
        duration: req.duration,
        rating: req.rating,
        imdb_rating: req.imdb_rating,
        genres: req.genres,
        trailer: req.trailer,
        is_now_showing: req.is_now_showing,
        is_coming_soon: req.is_coming_soon,
        release_date: req.release_date,
    };
    let movie = state
        .store
        .update_movie(id, update)
        .await?
        .ok_or(ApiError::NotFound("movie"))?;
    Ok(Json(movie))
}

// DELETE /api/admin/movies/{id}
async fn delete_movie(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !state.store.delete_movie(id).await? {
        return Err(ApiError::NotFound("movie"));
    }
    Ok(Json(json!({ "message": "Movie deleted successfully" })))
}
