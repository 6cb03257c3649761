use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

use super::SeatId;

/// Lifecycle of a booking.
///
/// Only three transitions are legal: pending -> confirmed,
/// pending -> cancelled and confirmed -> cancelled. Everything else,
/// including writing the current status again, is rejected. `Cancelled`
/// is terminal.
///
/// Seat availability is derived from this status: seats of pending and
/// confirmed bookings are taken, seats of cancelled bookings are free.
/// Cancelling a booking therefore releases its seats in the same write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown booking status {0:?}")]
pub struct ParseStatusError(pub String);

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled)
    }

    /// Whether a booking in this status keeps its seats out of the
    /// available pool.
    pub fn holds_seats(self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub showtime_id: i64,
    /// Server-computed total in cents. Client-supplied totals are never
    /// stored.
    pub total_amount: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub booking_reference: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSeat {
    pub id: i64,
    pub booking_id: i64,
    pub seat_number: String,
    pub ticket_type: String,
    pub price: i64,
}

impl BookingSeat {
    pub fn seat_id(&self) -> Option<SeatId> {
        self.seat_number.parse().ok()
    }
}
