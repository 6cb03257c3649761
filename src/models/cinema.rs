use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::SeatId;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cinema {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub city: String,
    pub image_url: String,
    pub rating: Option<f64>,
    pub review_count: i32,
}

/// Fixed seat grid of a screen. Stored as jsonb alongside the screen row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatLayout {
    pub rows: u32,
    pub seats_per_row: u32,
    pub row_labels: Vec<String>,
}

impl SeatLayout {
    /// Whether `seat` is one of the physical seats of this layout.
    pub fn contains(&self, seat: &SeatId) -> bool {
        if seat.number < 1 || seat.number > self.seats_per_row {
            return false;
        }
        self.row_labels
            .iter()
            .take(self.rows as usize)
            .any(|label| label.len() == 1 && label.chars().next() == Some(seat.row))
    }

    pub fn capacity(&self) -> u32 {
        self.rows * self.seats_per_row
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screen {
    pub id: i64,
    pub cinema_id: i64,
    pub name: String,
    pub total_seats: i32,
    #[sqlx(json)]
    pub seat_layout: SeatLayout,
}
