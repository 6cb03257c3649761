//! In-memory store used in development mode and by the test suite.
//! Same visible behavior as the postgres backend, without the server.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::models::{
    Booking, BookingSeat, BookingStatus, Cinema, Movie, Screen, Showtime, User,
};
use crate::services::allocation::SelectedSeat;

use super::{
    day_bounds, MovieUpdate, NewBooking, NewCinema, NewMovie, NewScreen, NewShowtime, NewUser,
    Store, StoreError, StoreResult,
};

#[derive(Debug, Default)]
struct Counters {
    users: i64,
    movies: i64,
    cinemas: i64,
    screens: i64,
    showtimes: i64,
    bookings: i64,
    booking_seats: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<i64, User>,
    movies: HashMap<i64, Movie>,
    cinemas: HashMap<i64, Cinema>,
    screens: HashMap<i64, Screen>,
    showtimes: HashMap<i64, Showtime>,
    bookings: HashMap<i64, Booking>,
    booking_seats: HashMap<i64, BookingSeat>,
    counters: Counters,
}

impl Inner {
    /// Seat numbers held by non-cancelled bookings of a showtime.
    fn taken_seat_numbers(&self, showtime_id: i64) -> HashSet<String> {
        let holding: HashSet<i64> = self
            .bookings
            .values()
            .filter(|b| b.showtime_id == showtime_id && b.status.holds_seats())
            .map(|b| b.id)
            .collect();
        self.booking_seats
            .values()
            .filter(|s| holding.contains(&s.booking_id))
            .map(|s| s.seat_number.clone())
            .collect()
    }
}

pub struct MemStore {
    inner: RwLock<Inner>,
    /// One mutex per showtime, allocated lazily. Serializes booking
    /// commits per showtime the way the postgres backend does with a
    /// row lock.
    showtime_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
    #[cfg(test)]
    fail_seat_writes_at: std::sync::Mutex<Option<usize>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            showtime_locks: Mutex::new(HashMap::new()),
            #[cfg(test)]
            fail_seat_writes_at: std::sync::Mutex::new(None),
        }
    }

    async fn showtime_lock(&self, showtime_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.showtime_locks.lock().await;
        locks
            .entry(showtime_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Makes the next commit fail while writing seat row `index`,
    /// leaving a half-written transaction for rollback to clean up.
    #[cfg(test)]
    pub fn fail_seat_write_at(&self, index: usize) {
        *self.fail_seat_writes_at.lock().unwrap() = Some(index);
    }

    #[cfg(test)]
    fn take_seat_write_failure(&self, index: usize) -> bool {
        let mut slot = self.fail_seat_writes_at.lock().unwrap();
        match *slot {
            Some(at) if index >= at => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    #[cfg(not(test))]
    #[inline]
    fn take_seat_write_failure(&self, _index: usize) -> bool {
        false
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("username"));
        }
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email"));
        }
        let id = next_id(&mut inner.counters.users);
        let user = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_movie(&self, movie: NewMovie) -> StoreResult<Movie> {
        let mut inner = self.inner.write().await;
        let id = next_id(&mut inner.counters.movies);
        let movie = Movie {
            id,
            title: movie.title,
            description: movie.description,
            poster_url: movie.poster_url,
            banner_url: movie.banner_url,
            release_year: movie.release_year,
            duration: movie.duration,
            rating: movie.rating,
            imdb_rating: movie.imdb_rating,
            genres: movie.genres,
            trailer: movie.trailer,
            is_now_showing: movie.is_now_showing,
            is_coming_soon: movie.is_coming_soon,
            release_date: movie.release_date,
        };
        inner.movies.insert(id, movie.clone());
        Ok(movie)
    }

    async fn get_movie(&self, id: i64) -> StoreResult<Option<Movie>> {
        Ok(self.inner.read().await.movies.get(&id).cloned())
    }

    async fn list_movies(&self) -> StoreResult<Vec<Movie>> {
        let inner = self.inner.read().await;
        let mut movies: Vec<Movie> = inner.movies.values().cloned().collect();
        movies.sort_by_key(|m| m.id);
        Ok(movies)
    }

    async fn update_movie(&self, id: i64, update: MovieUpdate) -> StoreResult<Option<Movie>> {
        let mut inner = self.inner.write().await;
        let Some(movie) = inner.movies.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            movie.title = title;
        }
        if let Some(description) = update.description {
            movie.description = description;
        }
        if let Some(poster_url) = update.poster_url {
            movie.poster_url = poster_url;
        }
        if let Some(banner_url) = update.banner_url {
            movie.banner_url = banner_url;
        }
        if let Some(release_year) = update.release_year {
            movie.release_year = release_year;
        }
        if let Some(duration) = update.duration {
            movie.duration = duration;
        }
        if let Some(rating) = update.rating {
            movie.rating = rating;
        }
        if let Some(imdb_rating) = update.imdb_rating {
            movie.imdb_rating = Some(imdb_rating);
        }
        if let Some(genres) = update.genres {
            movie.genres = genres;
        }
        if let Some(trailer) = update.trailer {
            movie.trailer = Some(trailer);
        }
        if let Some(is_now_showing) = update.is_now_showing {
            movie.is_now_showing = is_now_showing;
        }
        if let Some(is_coming_soon) = update.is_coming_soon {
            movie.is_coming_soon = is_coming_soon;
        }
        if let Some(release_date) = update.release_date {
            movie.release_date = Some(release_date);
        }
        Ok(Some(movie.clone()))
    }

    async fn delete_movie(&self, id: i64) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.movies.remove(&id).is_some())
    }

    async fn create_cinema(&self, cinema: NewCinema) -> StoreResult<Cinema> {
        let mut inner = self.inner.write().await;
        let id = next_id(&mut inner.counters.cinemas);
        let cinema = Cinema {
            id,
            name: cinema.name,
            address: cinema.address,
            city: cinema.city,
            image_url: cinema.image_url,
            rating: cinema.rating,
            review_count: cinema.review_count,
        };
        inner.cinemas.insert(id, cinema.clone());
        Ok(cinema)
    }

    async fn get_cinema(&self, id: i64) -> StoreResult<Option<Cinema>> {
        Ok(self.inner.read().await.cinemas.get(&id).cloned())
    }

    async fn list_cinemas(&self) -> StoreResult<Vec<Cinema>> {
        let inner = self.inner.read().await;
        let mut cinemas: Vec<Cinema> = inner.cinemas.values().cloned().collect();
        cinemas.sort_by_key(|c| c.id);
        Ok(cinemas)
    }

    async fn create_screen(&self, screen: NewScreen) -> StoreResult<Screen> {
        let mut inner = self.inner.write().await;
        let id = next_id(&mut inner.counters.screens);
        let screen = Screen {
            id,
            cinema_id: screen.cinema_id,
            name: screen.name,
            total_seats: screen.total_seats,
            seat_layout: screen.seat_layout,
        };
        inner.screens.insert(id, screen.clone());
        Ok(screen)
    }

    async fn get_screen(&self, id: i64) -> StoreResult<Option<Screen>> {
        Ok(self.inner.read().await.screens.get(&id).cloned())
    }

    async fn screens_by_cinema(&self, cinema_id: i64) -> StoreResult<Vec<Screen>> {
        let inner = self.inner.read().await;
        let mut screens: Vec<Screen> = inner
            .screens
            .values()
            .filter(|s| s.cinema_id == cinema_id)
            .cloned()
            .collect();
        screens.sort_by_key(|s| s.id);
        Ok(screens)
    }

    async fn create_showtime(&self, showtime: NewShowtime) -> StoreResult<Showtime> {
        let mut inner = self.inner.write().await;
        let id = next_id(&mut inner.counters.showtimes);
        let showtime = Showtime {
            id,
            movie_id: showtime.movie_id,
            screen_id: showtime.screen_id,
            start_time: showtime.start_time,
            end_time: showtime.end_time,
            price: showtime.price,
        };
        inner.showtimes.insert(id, showtime.clone());
        Ok(showtime)
    }

    async fn get_showtime(&self, id: i64) -> StoreResult<Option<Showtime>> {
        Ok(self.inner.read().await.showtimes.get(&id).cloned())
    }

    async fn showtimes_by_movie(&self, movie_id: i64) -> StoreResult<Vec<Showtime>> {
        let inner = self.inner.read().await;
        let mut showtimes: Vec<Showtime> = inner
            .showtimes
            .values()
            .filter(|s| s.movie_id == movie_id)
            .cloned()
            .collect();
        showtimes.sort_by_key(|s| (s.start_time, s.id));
        Ok(showtimes)
    }

    async fn showtimes_by_movie_on(
        &self,
        movie_id: i64,
        date: NaiveDate,
    ) -> StoreResult<Vec<Showtime>> {
        let (start, end) = day_bounds(date);
        let inner = self.inner.read().await;
        let mut showtimes: Vec<Showtime> = inner
            .showtimes
            .values()
            .filter(|s| s.movie_id == movie_id && s.start_time >= start && s.start_time < end)
            .cloned()
            .collect();
        showtimes.sort_by_key(|s| (s.start_time, s.id));
        Ok(showtimes)
    }

    async fn get_booking(&self, id: i64) -> StoreResult<Option<Booking>> {
        Ok(self.inner.read().await.bookings.get(&id).cloned())
    }

    async fn bookings_by_user(&self, user_id: i64) -> StoreResult<Vec<Booking>> {
        let inner = self.inner.read().await;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.id);
        Ok(bookings)
    }

    async fn list_bookings(&self) -> StoreResult<Vec<Booking>> {
        let inner = self.inner.read().await;
        let mut bookings: Vec<Booking> = inner.bookings.values().cloned().collect();
        bookings.sort_by_key(|b| b.id);
        Ok(bookings)
    }

    async fn commit_booking(
        &self,
        booking: NewBooking,
        seats: &[SelectedSeat],
    ) -> StoreResult<Booking> {
        // serialize commits per showtime, then re-check availability
        let lock = self.showtime_lock(booking.showtime_id).await;
        let _guard = lock.lock().await;

        let mut inner = self.inner.write().await;
        let taken = inner.taken_seat_numbers(booking.showtime_id);
        let conflicts: Vec<String> = seats
            .iter()
            .map(|s| s.seat_number.to_string())
            .filter(|n| taken.contains(n))
            .collect();
        if !conflicts.is_empty() {
            return Err(StoreError::SeatsTaken { seats: conflicts });
        }
        if inner
            .bookings
            .values()
            .any(|b| b.booking_reference == booking.booking_reference)
        {
            return Err(StoreError::ReferenceInUse);
        }

        let booking_id = next_id(&mut inner.counters.bookings);
        let created = Booking {
            id: booking_id,
            user_id: booking.user_id,
            showtime_id: booking.showtime_id,
            total_amount: booking.total_amount,
            status: booking.status,
            created_at: Utc::now(),
            booking_reference: booking.booking_reference,
        };
        inner.bookings.insert(booking_id, created.clone());

        let mut written: Vec<i64> = Vec::with_capacity(seats.len());
        for (index, seat) in seats.iter().enumerate() {
            if self.take_seat_write_failure(index) {
                // roll the partial transaction back
                for seat_id in &written {
                    inner.booking_seats.remove(seat_id);
                }
                inner.bookings.remove(&booking_id);
                return Err(StoreError::Internal(format!(
                    "seat write failed at index {index}"
                )));
            }
            let seat_row_id = next_id(&mut inner.counters.booking_seats);
            inner.booking_seats.insert(
                seat_row_id,
                BookingSeat {
                    id: seat_row_id,
                    booking_id,
                    seat_number: seat.seat_number.to_string(),
                    ticket_type: seat.ticket_type.clone(),
                    price: seat.price,
                },
            );
            written.push(seat_row_id);
        }
        Ok(created)
    }

    async fn update_booking_status(
        &self,
        id: i64,
        expect: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<Option<Booking>> {
        let mut inner = self.inner.write().await;
        let Some(booking) = inner.bookings.get_mut(&id) else {
            return Ok(None);
        };
        if booking.status != expect {
            return Err(StoreError::StatusConflict {
                actual: booking.status,
            });
        }
        booking.status = to;
        Ok(Some(booking.clone()))
    }

    async fn seats_by_booking(&self, booking_id: i64) -> StoreResult<Vec<BookingSeat>> {
        let inner = self.inner.read().await;
        let mut seats: Vec<BookingSeat> = inner
            .booking_seats
            .values()
            .filter(|s| s.booking_id == booking_id)
            .cloned()
            .collect();
        seats.sort_by_key(|s| s.id);
        Ok(seats)
    }

    async fn booked_seats_by_showtime(&self, showtime_id: i64) -> StoreResult<Vec<BookingSeat>> {
        let inner = self.inner.read().await;
        let holding: HashSet<i64> = inner
            .bookings
            .values()
            .filter(|b| b.showtime_id == showtime_id && b.status.holds_seats())
            .map(|b| b.id)
            .collect();
        let mut seats: Vec<BookingSeat> = inner
            .booking_seats
            .values()
            .filter(|s| holding.contains(&s.booking_id))
            .cloned()
            .collect();
        seats.sort_by_key(|s| s.id);
        Ok(seats)
    }
}
