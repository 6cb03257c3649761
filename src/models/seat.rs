use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A seat position inside a screen, e.g. "A1" or "G12".
///
/// Row labels are single uppercase letters, seat numbers start at 1.
/// The derived ordering sorts by row first, then numerically by seat,
/// so `A2` comes before `A10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatId {
    pub row: char,
    pub number: u32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed seat identifier {0:?}")]
pub struct ParseSeatError(pub String);

impl SeatId {
    pub fn new(row: char, number: u32) -> Self {
        Self { row, number }
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.number)
    }
}

impl FromStr for SeatId {
    type Err = ParseSeatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseSeatError(s.to_string());
        if !s.is_ascii() || s.len() < 2 {
            return Err(malformed());
        }
        let row = s.chars().next().ok_or_else(malformed)?;
        if !row.is_ascii_alphabetic() {
            return Err(malformed());
        }
        let number: u32 = s[1..].parse().map_err(|_| malformed())?;
        if number == 0 {
            return Err(malformed());
        }
        Ok(Self {
            row: row.to_ascii_uppercase(),
            number,
        })
    }
}

impl TryFrom<String> for SeatId {
    type Error = ParseSeatError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SeatId> for String {
    fn from(seat: SeatId) -> String {
        seat.to_string()
    }
}
