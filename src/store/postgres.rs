//! Postgres-backed store.
//!
//! Booking commits run inside a transaction that first takes a row
//! lock on the showtime (`SELECT ... FOR UPDATE`), which serializes
//! concurrent submissions for that showtime. The availability re-check
//! then happens under the lock, so two commits can never both see a
//! contested seat as free. Reads never take the lock.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use crate::models::{
    Booking, BookingSeat, BookingStatus, Cinema, Movie, Screen, Showtime, User,
};
use crate::services::allocation::SelectedSeat;

use super::{
    day_bounds, MovieUpdate, NewBooking, NewCinema, NewMovie, NewScreen, NewShowtime, NewUser,
    Store, StoreError, StoreResult,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }
}

/// `bookings` row with the status still in its wire form.
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: i64,
    user_id: i64,
    showtime_id: i64,
    total_amount: i64,
    status: String,
    created_at: DateTime<Utc>,
    booking_reference: String,
}

impl BookingRow {
    fn into_booking(self) -> StoreResult<Booking> {
        let status = BookingStatus::from_str(&self.status)
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(Booking {
            id: self.id,
            user_id: self.user_id,
            showtime_id: self.showtime_id,
            total_amount: self.total_amount,
            status,
            created_at: self.created_at,
            booking_reference: self.booking_reference,
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> StoreResult<Vec<Booking>> {
    rows.into_iter().map(BookingRow::into_booking).collect()
}

/// Maps postgres unique violations onto typed conflicts by constraint
/// name; anything else stays a database error.
fn map_unique_violation(err: sqlx::Error) -> StoreError {
    let constraint = match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            db.constraint().map(str::to_owned)
        }
        _ => None,
    };
    match constraint.as_deref() {
        Some("uq_users_username") => StoreError::Conflict("username"),
        Some("uq_users_email") => StoreError::Conflict("email"),
        Some("uq_bookings_reference") => StoreError::ReferenceInUse,
        _ => StoreError::Database(err),
    }
}

const BOOKING_COLUMNS: &str =
    "id, user_id, showtime_id, total_amount, status, created_at, booking_reference";

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password_hash, email, full_name, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, username, password_hash, email, full_name, role",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_movie(&self, movie: NewMovie) -> StoreResult<Movie> {
        let created = sqlx::query_as::<_, Movie>(
            "INSERT INTO movies (title, description, poster_url, banner_url, release_year,
                                 duration, rating, imdb_rating, genres, trailer,
                                 is_now_showing, is_coming_soon, release_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING *",
        )
        .bind(&movie.title)
        .bind(&movie.description)
        .bind(&movie.poster_url)
        .bind(&movie.banner_url)
        .bind(movie.release_year)
        .bind(movie.duration)
        .bind(&movie.rating)
        .bind(movie.imdb_rating)
        .bind(Json(&movie.genres))
        .bind(&movie.trailer)
        .bind(movie.is_now_showing)
        .bind(movie.is_coming_soon)
        .bind(movie.release_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_movie(&self, id: i64) -> StoreResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(movie)
    }

    async fn list_movies(&self) -> StoreResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>("SELECT * FROM movies ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(movies)
    }

    async fn update_movie(&self, id: i64, update: MovieUpdate) -> StoreResult<Option<Movie>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE movies SET id = id");
        if let Some(title) = &update.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(description) = &update.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(poster_url) = &update.poster_url {
            builder.push(", poster_url = ").push_bind(poster_url);
        }
        if let Some(banner_url) = &update.banner_url {
            builder.push(", banner_url = ").push_bind(banner_url);
        }
        if let Some(release_year) = update.release_year {
            builder.push(", release_year = ").push_bind(release_year);
        }
        if let Some(duration) = update.duration {
            builder.push(", duration = ").push_bind(duration);
        }
        if let Some(rating) = &update.rating {
            builder.push(", rating = ").push_bind(rating);
        }
        if let Some(imdb_rating) = update.imdb_rating {
            builder.push(", imdb_rating = ").push_bind(imdb_rating);
        }
        if let Some(genres) = &update.genres {
            builder.push(", genres = ").push_bind(Json(genres));
        }
        if let Some(trailer) = &update.trailer {
            builder.push(", trailer = ").push_bind(trailer);
        }
        if let Some(is_now_showing) = update.is_now_showing {
            builder.push(", is_now_showing = ").push_bind(is_now_showing);
        }
        if let Some(is_coming_soon) = update.is_coming_soon {
            builder.push(", is_coming_soon = ").push_bind(is_coming_soon);
        }
        if let Some(release_date) = update.release_date {
            builder.push(", release_date = ").push_bind(release_date);
        }
        builder.push(" WHERE id = ").push_bind(id);
        builder.push(" RETURNING *");

        let movie = builder
            .build_query_as::<Movie>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(movie)
    }

    async fn delete_movie(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_cinema(&self, cinema: NewCinema) -> StoreResult<Cinema> {
        let created = sqlx::query_as::<_, Cinema>(
            "INSERT INTO cinemas (name, address, city, image_url, rating, review_count)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(&cinema.name)
        .bind(&cinema.address)
        .bind(&cinema.city)
        .bind(&cinema.image_url)
        .bind(cinema.rating)
        .bind(cinema.review_count)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_cinema(&self, id: i64) -> StoreResult<Option<Cinema>> {
        let cinema = sqlx::query_as::<_, Cinema>("SELECT * FROM cinemas WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cinema)
    }

    async fn list_cinemas(&self) -> StoreResult<Vec<Cinema>> {
        let cinemas = sqlx::query_as::<_, Cinema>("SELECT * FROM cinemas ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(cinemas)
    }

    async fn create_screen(&self, screen: NewScreen) -> StoreResult<Screen> {
        let created = sqlx::query_as::<_, Screen>(
            "INSERT INTO screens (cinema_id, name, total_seats, seat_layout)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(screen.cinema_id)
        .bind(&screen.name)
        .bind(screen.total_seats)
        .bind(Json(&screen.seat_layout))
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_screen(&self, id: i64) -> StoreResult<Option<Screen>> {
        let screen = sqlx::query_as::<_, Screen>("SELECT * FROM screens WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(screen)
    }

    async fn screens_by_cinema(&self, cinema_id: i64) -> StoreResult<Vec<Screen>> {
        let screens =
            sqlx::query_as::<_, Screen>("SELECT * FROM screens WHERE cinema_id = $1 ORDER BY id")
                .bind(cinema_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(screens)
    }

    async fn create_showtime(&self, showtime: NewShowtime) -> StoreResult<Showtime> {
        let created = sqlx::query_as::<_, Showtime>(
            "INSERT INTO showtimes (movie_id, screen_id, start_time, end_time, price)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(showtime.movie_id)
        .bind(showtime.screen_id)
        .bind(showtime.start_time)
        .bind(showtime.end_time)
        .bind(showtime.price)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_showtime(&self, id: i64) -> StoreResult<Option<Showtime>> {
        let showtime = sqlx::query_as::<_, Showtime>("SELECT * FROM showtimes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(showtime)
    }

    async fn showtimes_by_movie(&self, movie_id: i64) -> StoreResult<Vec<Showtime>> {
        let showtimes = sqlx::query_as::<_, Showtime>(
            "SELECT * FROM showtimes WHERE movie_id = $1 ORDER BY start_time, id",
        )
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(showtimes)
    }

    async fn showtimes_by_movie_on(
        &self,
        movie_id: i64,
        date: NaiveDate,
    ) -> StoreResult<Vec<Showtime>> {
        let (start, end) = day_bounds(date);
        let showtimes = sqlx::query_as::<_, Showtime>(
            "SELECT * FROM showtimes
             WHERE movie_id = $1 AND start_time >= $2 AND start_time < $3
             ORDER BY start_time, id",
        )
        .bind(movie_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(showtimes)
    }

    async fn get_booking(&self, id: i64) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(BookingRow::into_booking).transpose()
    }

    async fn bookings_by_user(&self, user_id: i64) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        into_bookings(rows)
    }

    async fn list_bookings(&self) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        into_bookings(rows)
    }

    async fn commit_booking(
        &self,
        booking: NewBooking,
        seats: &[SelectedSeat],
    ) -> StoreResult<Booking> {
        let mut tx = self.pool.begin().await?;

        // row lock serializes commits per showtime
        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM showtimes WHERE id = $1 FOR UPDATE")
            .bind(booking.showtime_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(StoreError::Internal(format!(
                "showtime {} disappeared during commit",
                booking.showtime_id
            )));
        }

        // authoritative availability re-check under the lock
        let taken: Vec<String> = sqlx::query_scalar(
            "SELECT bs.seat_number
             FROM booking_seats bs
             JOIN bookings b ON b.id = bs.booking_id
             WHERE b.showtime_id = $1 AND b.status <> 'cancelled'",
        )
        .bind(booking.showtime_id)
        .fetch_all(&mut *tx)
        .await?;
        let taken: HashSet<String> = taken.into_iter().collect();
        let conflicts: Vec<String> = seats
            .iter()
            .map(|s| s.seat_number.to_string())
            .filter(|n| taken.contains(n))
            .collect();
        if !conflicts.is_empty() {
            tx.rollback().await?;
            return Err(StoreError::SeatsTaken { seats: conflicts });
        }

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "INSERT INTO bookings (user_id, showtime_id, total_amount, status, booking_reference)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.user_id)
        .bind(booking.showtime_id)
        .bind(booking.total_amount)
        .bind(booking.status.as_str())
        .bind(&booking.booking_reference)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        for seat in seats {
            sqlx::query(
                "INSERT INTO booking_seats (booking_id, seat_number, ticket_type, price)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(row.id)
            .bind(seat.seat_number.to_string())
            .bind(&seat.ticket_type)
            .bind(seat.price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        row.into_booking()
    }

    async fn update_booking_status(
        &self,
        id: i64,
        expect: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET status = $1
             WHERE id = $2 AND status = $3
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(to.as_str())
        .bind(id)
        .bind(expect.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.into_booking()?)),
            None => {
                // either the booking is gone or the CAS lost a race
                let actual: Option<String> =
                    sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await?;
                match actual {
                    None => Ok(None),
                    Some(raw) => {
                        let actual = BookingStatus::from_str(&raw)
                            .map_err(|e| StoreError::Internal(e.to_string()))?;
                        Err(StoreError::StatusConflict { actual })
                    }
                }
            }
        }
    }

    async fn seats_by_booking(&self, booking_id: i64) -> StoreResult<Vec<BookingSeat>> {
        let seats = sqlx::query_as::<_, BookingSeat>(
            "SELECT * FROM booking_seats WHERE booking_id = $1 ORDER BY id",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }

    async fn booked_seats_by_showtime(&self, showtime_id: i64) -> StoreResult<Vec<BookingSeat>> {
        let seats = sqlx::query_as::<_, BookingSeat>(
            "SELECT bs.*
             FROM booking_seats bs
             JOIN bookings b ON b.id = bs.booking_id
             WHERE b.showtime_id = $1 AND b.status <> 'cancelled'
             ORDER BY bs.id",
        )
        .bind(showtime_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }
}
