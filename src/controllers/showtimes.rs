use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AdminUser;
use crate::models::{Cinema, Screen, Showtime};
use crate::store::NewShowtime;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies/{movie_id}/showtimes", get(showtimes_by_movie))
        .route(
            "/movies/{movie_id}/showtimes/date/{date}",
            get(showtimes_by_movie_on_date),
        )
        .route("/showtimes/{id}", get(get_showtime))
        .route("/admin/showtimes", post(create_showtime))
}

/// Showtime with its screen and cinema resolved for display.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShowtimeDetails {
    #[serde(flatten)]
    showtime: Showtime,
    screen: Option<Screen>,
    cinema: Option<Cinema>,
}

async fn hydrate(state: &Arc<AppState>, showtimes: Vec<Showtime>) -> Vec<ShowtimeDetails> {
    join_all(showtimes.into_iter().map(|showtime| {
        let store = state.store.clone();
        async move {
            let screen = store.get_screen(showtime.screen_id).await.ok().flatten();
            let cinema = match &screen {
                Some(screen) => store.get_cinema(screen.cinema_id).await.ok().flatten(),
                None => None,
            };
            ShowtimeDetails {
                showtime,
                screen,
                cinema,
            }
        }
    }))
    .await
}

// GET /api/movies/{movie_id}/showtimes
async fn showtimes_by_movie(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i64>,
) -> ApiResult<Json<Vec<ShowtimeDetails>>> {
    if state.store.get_movie(movie_id).await?.is_none() {
        return Err(ApiError::NotFound("movie"));
    }
    let showtimes = state.store.showtimes_by_movie(movie_id).await?;
    Ok(Json(hydrate(&state, showtimes).await))
}

// GET /api/movies/{movie_id}/showtimes/date/{date}
async fn showtimes_by_movie_on_date(
    State(state): State<Arc<AppState>>,
    Path((movie_id, date)): Path<(i64, String)>,
) -> ApiResult<Json<Vec<ShowtimeDetails>>> {
    if state.store.get_movie(movie_id).await?.is_none() {
        return Err(ApiError::NotFound("movie"));
    }
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("date must be formatted as YYYY-MM-DD".to_string()))?;
    let showtimes = state.store.showtimes_by_movie_on(movie_id, date).await?;
    Ok(Json(hydrate(&state, showtimes).await))
}

// GET /api/showtimes/{id}
async fn get_showtime(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ShowtimeDetails>> {
    let showtime = state
        .store
        .get_showtime(id)
        .await?
        .ok_or(ApiError::NotFound("showtime"))?;
    let mut hydrated = hydrate(&state, vec![showtime]).await;
    // hydrate returns exactly one entry for one showtime
    hydrated
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("showtime"))
}

// POST /api/admin/showtimes
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateShowtimeRequest {
    #[validate(range(min = 1))]
    movie_id: i64,
    #[validate(range(min = 1))]
    screen_id: i64,
    start_time: DateTime<Utc>,
    /// Base ticket price in cents.
    #[validate(range(min = 0))]
    price: i64,
}

async fn create_showtime(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateShowtimeRequest>,
) -> ApiResult<(StatusCode, Json<Showtime>)> {
    req.validate()?;

    let movie = state
        .store
        .get_movie(req.movie_id)
        .await?
        .ok_or(ApiError::NotFound("movie"))?;
    if state.store.get_screen(req.screen_id).await?.is_none() {
        return Err(ApiError::NotFound("screen"));
    }

    let end_time = req.start_time + Duration::minutes(movie.duration as i64);
    let showtime = state
        .store
        .create_showtime(NewShowtime {
            movie_id: req.movie_id,
            screen_id: req.screen_id,
            start_time: req.start_time,
            end_time,
            price: req.price,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(showtime)))
}
