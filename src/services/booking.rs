//! Booking engine.
//!
//! Owns the three operations the whole platform hangs on:
//!
//! - `taken_seats`: the availability index for one showtime, derived
//!   from the seats of its non-cancelled bookings. Asking about an
//!   unknown showtime is an error, an empty answer always means "the
//!   showtime exists and nothing is taken".
//! - `submit_booking`: validates a seat selection, recomputes the total
//!   server-side and commits booking plus seat rows atomically. The
//!   store re-checks availability under per-showtime serialization, so
//!   of two concurrent submissions for overlapping seats exactly one
//!   wins; the loser gets the contested seats back in the error.
//! - `update_status`: drives the pending/confirmed/cancelled state
//!   machine with compare-and-set writes. Cancelling releases the
//!   booking's seats immediately because availability is derived from
//!   status.
//!
//! Validation failures are all distinct, so callers can tell an
//! unknown showtime from an empty selection from a seat conflict.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, SeatId};
use crate::store::{NewBooking, Store, StoreError};

use super::allocation::SelectedSeat;

/// Attempts per submission before giving up on reference collisions.
const MAX_REFERENCE_RETRIES: usize = 4;

/// Retries of the status compare-and-set before reporting contention.
const MAX_STATUS_RETRIES: usize = 3;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("showtime {0} not found")]
    ShowtimeNotFound(i64),
    #[error("booking {0} not found")]
    BookingNotFound(i64),
    #[error("no seats selected")]
    EmptySelection,
    #[error("seat {0} appears more than once in the selection")]
    DuplicateSeat(SeatId),
    #[error("seat {0} does not exist in this screen's layout")]
    InvalidSeat(SeatId),
    #[error("seats no longer available: {}", fmt_seats(.0))]
    SeatConflict(Vec<SeatId>),
    #[error("cannot change booking status from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error(transparent)]
    Storage(#[from] StoreError),
}

fn fmt_seats(seats: &[SeatId]) -> String {
    seats
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// "CT" plus eight hex characters, e.g. "CT5A1F09B3".
fn new_booking_reference() -> String {
    let entropy = Uuid::new_v4().simple().to_string();
    format!("CT{}", entropy[..8].to_uppercase())
}

fn conflict_seats(raw: Vec<String>) -> Vec<SeatId> {
    let mut seats: Vec<SeatId> = raw.iter().filter_map(|s| s.parse().ok()).collect();
    seats.sort();
    seats.dedup();
    seats
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn Store>,
}

impl BookingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Seats of `showtime_id` currently held by non-cancelled bookings,
    /// sorted. Fails with [`BookingError::ShowtimeNotFound`] for an
    /// unknown showtime rather than answering with an empty set.
    pub async fn taken_seats(&self, showtime_id: i64) -> Result<Vec<SeatId>, BookingError> {
        if self.store.get_showtime(showtime_id).await?.is_none() {
            return Err(BookingError::ShowtimeNotFound(showtime_id));
        }
        let rows = self.store.booked_seats_by_showtime(showtime_id).await?;
        let mut seats: Vec<SeatId> = rows.iter().filter_map(|r| r.seat_id()).collect();
        seats.sort();
        seats.dedup();
        Ok(seats)
    }

    /// Books `selection` for `user_id` on `showtime_id`.
    ///
    /// Checks run in a fixed order: showtime existence, non-empty
    /// selection, duplicate seats within the submission, seats against
    /// the screen layout. The authoritative availability check happens
    /// inside the store commit. `client_total` is advisory only; a
    /// mismatch with the recomputed total is logged and the computed
    /// value stored.
    pub async fn submit_booking(
        &self,
        user_id: i64,
        showtime_id: i64,
        selection: &[SelectedSeat],
        client_total: Option<i64>,
    ) -> Result<Booking, BookingError> {
        let showtime = self
            .store
            .get_showtime(showtime_id)
            .await?
            .ok_or(BookingError::ShowtimeNotFound(showtime_id))?;
        if selection.is_empty() {
            return Err(BookingError::EmptySelection);
        }
        let mut seen = HashSet::new();
        for seat in selection {
            if !seen.insert(seat.seat_number) {
                return Err(BookingError::DuplicateSeat(seat.seat_number));
            }
        }

        let screen = self
            .store
            .get_screen(showtime.screen_id)
            .await?
            .ok_or_else(|| {
                StoreError::Internal(format!(
                    "screen {} of showtime {} is missing",
                    showtime.screen_id, showtime_id
                ))
            })?;
        if let Some(bad) = selection
            .iter()
            .find(|s| !screen.seat_layout.contains(&s.seat_number))
        {
            return Err(BookingError::InvalidSeat(bad.seat_number));
        }

        // the server's total wins over whatever the client computed
        let total: i64 = selection.iter().map(|s| s.price).sum();
        if let Some(expected) = client_total {
            if expected != total {
                warn!(
                    user_id,
                    showtime_id,
                    client_total = expected,
                    computed = total,
                    "client total disagrees with computed total, storing computed"
                );
            }
        }

        let mut attempts = 0;
        loop {
            let booking = NewBooking {
                user_id,
                showtime_id,
                total_amount: total,
                status: BookingStatus::Confirmed,
                booking_reference: new_booking_reference(),
            };
            match self.store.commit_booking(booking, selection).await {
                Ok(created) => {
                    info!(
                        booking_id = created.id,
                        reference = %created.booking_reference,
                        seats = selection.len(),
                        total,
                        "booking confirmed"
                    );
                    return Ok(created);
                }
                Err(StoreError::SeatsTaken { seats }) => {
                    return Err(BookingError::SeatConflict(conflict_seats(seats)));
                }
                Err(StoreError::ReferenceInUse) if attempts < MAX_REFERENCE_RETRIES => {
                    attempts += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Moves a booking to `to` if the state machine allows it.
    ///
    /// The write is a compare-and-set against the status that was
    /// validated, so a transition can never be judged against a stale
    /// status. A lost race re-reads and re-validates before giving up.
    pub async fn update_status(
        &self,
        booking_id: i64,
        to: BookingStatus,
    ) -> Result<Booking, BookingError> {
        for _ in 0..MAX_STATUS_RETRIES {
            let booking = self
                .store
                .get_booking(booking_id)
                .await?
                .ok_or(BookingError::BookingNotFound(booking_id))?;
            let from = booking.status;
            if !from.can_transition_to(to) {
                return Err(BookingError::InvalidTransition { from, to });
            }
            match self.store.update_booking_status(booking_id, from, to).await {
                Ok(Some(updated)) => {
                    info!(booking_id, from = %from, to = %to, "booking status updated");
                    return Ok(updated);
                }
                Ok(None) => return Err(BookingError::BookingNotFound(booking_id)),
                Err(StoreError::StatusConflict { .. }) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(BookingError::Storage(StoreError::Internal(format!(
            "status update for booking {booking_id} kept losing races"
        ))))
    }
}
