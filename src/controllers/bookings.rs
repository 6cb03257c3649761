use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::middleware::{AdminUser, AuthUser};
use crate::models::{
    Booking, BookingSeat, BookingStatus, Cinema, Movie, Screen, SeatId, Showtime,
};
use crate::services::allocation::SelectedSeat;
use crate::services::booking::BookingError;
use crate::AppState;

use super::auth::UserProfile;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/showtimes/{id}/seats", get(taken_seats))
        .route("/bookings", post(create_booking))
        .route("/bookings", get(my_bookings))
        .route("/bookings/{id}", get(get_booking))
        .route("/admin/bookings", get(all_bookings))
        .route("/admin/bookings/{id}/status", put(update_status))
}

/* ---------- SEATS ---------- */

// GET /api/showtimes/{id}/seats
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TakenSeatsResponse {
    showtime_id: i64,
    taken_seats: Vec<String>,
}

async fn taken_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TakenSeatsResponse>> {
    let seats = state.bookings.taken_seats(id).await?;
    Ok(Json(TakenSeatsResponse {
        showtime_id: id,
        taken_seats: seats.iter().map(ToString::to_string).collect(),
    }))
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectedSeatRequest {
    seat_number: String,
    ticket_type: String,
    /// Unit price in cents.
    price: i64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    #[validate(range(min = 1))]
    showtime_id: i64,
    seats: Vec<SelectedSeatRequest>,
    /// Client-side total, advisory only. The server recomputes.
    total_amount: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingResponse {
    booking: Booking,
    message: String,
}

fn parse_selection(seats: Vec<SelectedSeatRequest>) -> ApiResult<Vec<SelectedSeat>> {
    seats
        .into_iter()
        .map(|s| {
            if s.price < 0 {
                return Err(ApiError::BadRequest(format!(
                    "negative price for seat {}",
                    s.seat_number
                )));
            }
            let seat_number = SeatId::from_str(&s.seat_number).map_err(|e| {
                ApiError::BadRequest(e.to_string())
            })?;
            Ok(SelectedSeat {
                seat_number,
                ticket_type: s.ticket_type,
                price: s.price,
            })
        })
        .collect()
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<CreateBookingResponse>)> {
    req.validate()?;

    let selection = parse_selection(req.seats)?;
    let booking = state
        .bookings
        .submit_booking(user.user_id, req.showtime_id, &selection, req.total_amount)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            booking,
            message: "Booking created successfully".to_string(),
        }),
    ))
}

// GET /api/bookings and GET /api/bookings/{id}
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingDetails {
    #[serde(flatten)]
    booking: Booking,
    seats: Vec<BookingSeat>,
    showtime: Option<Showtime>,
    movie: Option<Movie>,
    screen: Option<Screen>,
    cinema: Option<Cinema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserProfile>,
}

async fn hydrate(state: &Arc<AppState>, bookings: Vec<Booking>, with_user: bool) -> Vec<BookingDetails> {
    join_all(bookings.into_iter().map(|booking| {
        let store = state.store.clone();
        async move {
            let seats = store.seats_by_booking(booking.id).await.unwrap_or_default();
            let showtime = store.get_showtime(booking.showtime_id).await.ok().flatten();
            let movie = match &showtime {
                Some(st) => store.get_movie(st.movie_id).await.ok().flatten(),
                None => None,
            };
            let screen = match &showtime {
                Some(st) => store.get_screen(st.screen_id).await.ok().flatten(),
                None => None,
            };
            let cinema = match &screen {
                Some(s) => store.get_cinema(s.cinema_id).await.ok().flatten(),
                None => None,
            };
            let user = if with_user {
                store
                    .get_user(booking.user_id)
                    .await
                    .ok()
                    .flatten()
                    .map(UserProfile::from)
            } else {
                None
            };
            BookingDetails {
                booking,
                seats,
                showtime,
                movie,
                screen,
                cinema,
                user,
            }
        }
    }))
    .await
}

async fn my_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<BookingDetails>>> {
    let bookings = state.store.bookings_by_user(user.user_id).await?;
    Ok(Json(hydrate(&state, bookings, false).await))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<BookingDetails>> {
    let booking = state
        .store
        .get_booking(id)
        .await?
        .ok_or(BookingError::BookingNotFound(id))?;
    if booking.user_id != user.user_id && !user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    let mut hydrated = hydrate(&state, vec![booking], false).await;
    hydrated
        .pop()
        .map(Json)
        .ok_or(ApiError::NotFound("booking"))
}

/* ---------- ADMIN ---------- */

// GET /api/admin/bookings
async fn all_bookings(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<BookingDetails>>> {
    let bookings = state.store.list_bookings().await?;
    Ok(Json(hydrate(&state, bookings, true).await))
}

// PUT /api/admin/bookings/{id}/status
#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateStatusResponse {
    booking: Booking,
    message: String,
}

async fn update_status(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<UpdateStatusResponse>> {
    let to = BookingStatus::from_str(&req.status).map_err(|_| {
        ApiError::BadRequest("status must be pending, confirmed or cancelled".to_string())
    })?;
    let booking = state.bookings.update_status(id, to).await?;
    Ok(Json(UpdateStatusResponse {
        booking,
        message: "Booking status updated successfully".to_string(),
    }))
}
