//! Storage backends.
//!
//! Everything the service persists goes through the [`Store`] trait, so
//! the booking engine is oblivious to where the data lives. Two
//! backends exist: [`MemStore`] for development and tests, and
//! [`PgStore`] for production. Both uphold the same contract for
//! [`Store::commit_booking`] and [`Store::update_booking_status`]; the
//! booking engine's correctness depends on it.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

use crate::models::{
    Booking, BookingSeat, BookingStatus, Cinema, Movie, Screen, SeatLayout, Showtime, User,
};
use crate::services::allocation::SelectedSeat;

pub mod memory;
pub mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Commit lost the race: these seats were taken by another booking.
    #[error("seats already taken: {}", seats.join(", "))]
    SeatsTaken { seats: Vec<String> },
    #[error("booking reference already in use")]
    ReferenceInUse,
    /// Compare-and-set on a booking status failed; `actual` is the
    /// status found in the store.
    #[error("booking status changed concurrently (now {actual})")]
    StatusConflict { actual: BookingStatus },
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage failure: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct NewMovie {
    pub title: String,
    pub description: String,
    pub poster_url: String,
    pub banner_url: String,
    pub release_year: i32,
    pub duration: i32,
    pub rating: String,
    pub imdb_rating: Option<f64>,
    pub genres: Vec<String>,
    pub trailer: Option<String>,
    pub is_now_showing: bool,
    pub is_coming_soon: bool,
    pub release_date: Option<DateTime<Utc>>,
}

/// Partial movie update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct MovieUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub poster_url: Option<String>,
    pub banner_url: Option<String>,
    pub release_year: Option<i32>,
    pub duration: Option<i32>,
    pub rating: Option<String>,
    pub imdb_rating: Option<f64>,
    pub genres: Option<Vec<String>>,
    pub trailer: Option<String>,
    pub is_now_showing: Option<bool>,
    pub is_coming_soon: Option<bool>,
    pub release_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewCinema {
    pub name: String,
    pub address: String,
    pub city: String,
    pub image_url: String,
    pub rating: Option<f64>,
    pub review_count: i32,
}

#[derive(Debug, Clone)]
pub struct NewScreen {
    pub cinema_id: i64,
    pub name: String,
    pub total_seats: i32,
    pub seat_layout: SeatLayout,
}

#[derive(Debug, Clone)]
pub struct NewShowtime {
    pub movie_id: i64,
    pub screen_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: i64,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i64,
    pub showtime_id: i64,
    pub total_amount: i64,
    pub status: BookingStatus,
    pub booking_reference: String,
}

#[async_trait]
pub trait Store: Send + Sync {
    // === Users ===
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    // === Movies ===
    async fn create_movie(&self, movie: NewMovie) -> StoreResult<Movie>;
    async fn get_movie(&self, id: i64) -> StoreResult<Option<Movie>>;
    async fn list_movies(&self) -> StoreResult<Vec<Movie>>;
    async fn update_movie(&self, id: i64, update: MovieUpdate) -> StoreResult<Option<Movie>>;
    async fn delete_movie(&self, id: i64) -> StoreResult<bool>;

    // === Cinemas & screens ===
    async fn create_cinema(&self, cinema: NewCinema) -> StoreResult<Cinema>;
    async fn get_cinema(&self, id: i64) -> StoreResult<Option<Cinema>>;
    async fn list_cinemas(&self) -> StoreResult<Vec<Cinema>>;
    async fn create_screen(&self, screen: NewScreen) -> StoreResult<Screen>;
    async fn get_screen(&self, id: i64) -> StoreResult<Option<Screen>>;
    async fn screens_by_cinema(&self, cinema_id: i64) -> StoreResult<Vec<Screen>>;

    // === Showtimes ===
    async fn create_showtime(&self, showtime: NewShowtime) -> StoreResult<Showtime>;
    async fn get_showtime(&self, id: i64) -> StoreResult<Option<Showtime>>;
    async fn showtimes_by_movie(&self, movie_id: i64) -> StoreResult<Vec<Showtime>>;
    async fn showtimes_by_movie_on(
        &self,
        movie_id: i64,
        date: NaiveDate,
    ) -> StoreResult<Vec<Showtime>>;

    // === Bookings ===
    async fn get_booking(&self, id: i64) -> StoreResult<Option<Booking>>;
    async fn bookings_by_user(&self, user_id: i64) -> StoreResult<Vec<Booking>>;
    async fn list_bookings(&self) -> StoreResult<Vec<Booking>>;

    /// Atomically creates a booking together with its seat rows.
    ///
    /// Submissions for the same showtime are serialized. Under that
    /// serialization the requested seats are re-checked against all
    /// seats currently held by non-cancelled bookings of the showtime;
    /// any overlap fails the whole commit with
    /// [`StoreError::SeatsTaken`] and writes nothing. Either the
    /// booking row and every seat row land, or none do.
    async fn commit_booking(
        &self,
        booking: NewBooking,
        seats: &[SelectedSeat],
    ) -> StoreResult<Booking>;

    /// Compare-and-set of a booking's status.
    ///
    /// Writes `to` only if the stored status still equals `expect`,
    /// otherwise fails with [`StoreError::StatusConflict`]. Returns
    /// `None` when the booking does not exist. Since availability is
    /// derived from status, a successful cancel releases the booking's
    /// seats in the same atomic write.
    async fn update_booking_status(
        &self,
        id: i64,
        expect: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<Option<Booking>>;

    // === Booking seats ===
    async fn seats_by_booking(&self, booking_id: i64) -> StoreResult<Vec<BookingSeat>>;

    /// Seat rows of all non-cancelled bookings for a showtime.
    async fn booked_seats_by_showtime(&self, showtime_id: i64) -> StoreResult<Vec<BookingSeat>>;
}

/// UTC day boundaries for filtering showtimes by calendar date.
pub(crate) fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}
