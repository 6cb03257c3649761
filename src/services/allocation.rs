//! Ticket allocation calculator.
//!
//! A customer first chooses how many tickets of each type they want
//! (e.g. 2x Adult, 1x Child), then picks seats one by one. Each picked
//! seat is assigned a ticket type automatically: the most expensive
//! type that still has unassigned tickets wins, so pricier tickets are
//! consumed first and removing a seat hands its ticket back to the
//! pool. The assignment is a pure function of the current selection,
//! which keeps repeated toggles deterministic.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SeatId;

/// One line of the ticket order: "N tickets of this type at this price".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketLine {
    #[serde(rename = "type")]
    pub ticket_type: String,
    /// Unit price in cents.
    pub price: i64,
    pub count: u32,
}

impl TicketLine {
    pub fn new(ticket_type: impl Into<String>, price: i64, count: u32) -> Self {
        Self {
            ticket_type: ticket_type.into(),
            price,
            count,
        }
    }
}

/// A seat with the ticket type and unit price assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedSeat {
    pub seat_number: SeatId,
    pub ticket_type: String,
    /// Unit price in cents, frozen at assignment time.
    pub price: i64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error("seat {0} is not available")]
    SeatUnavailable(SeatId),
    #[error("selection already covers all {limit} purchased tickets")]
    TicketCountExceeded { limit: u32 },
}

#[derive(Debug, PartialEq, Eq)]
pub enum SeatToggle {
    Assigned(SelectedSeat),
    Removed(SelectedSeat),
}

/// The ticket type the next picked seat would receive, together with
/// its unit price.
///
/// Lines are ranked by price descending; a stable sort keeps equal
/// prices in the caller's order, so ties resolve the same way every
/// time. A line is eligible while fewer seats carry its type than its
/// purchased count. Returns `None` when every line is exhausted.
pub fn next_assignment<'a>(
    lines: &'a [TicketLine],
    selected: &[SelectedSeat],
) -> Option<(&'a str, i64)> {
    let mut ranked: Vec<&TicketLine> = lines.iter().collect();
    ranked.sort_by(|a, b| b.price.cmp(&a.price));
    ranked
        .into_iter()
        .find(|line| assigned_count(selected, &line.ticket_type) < line.count)
        .map(|line| (line.ticket_type.as_str(), line.price))
}

fn assigned_count(selected: &[SelectedSeat], ticket_type: &str) -> u32 {
    selected
        .iter()
        .filter(|s| s.ticket_type == ticket_type)
        .count() as u32
}

/// Working set of seats picked for one order, in pick order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct SeatSelection {
    seats: Vec<SelectedSeat>,
}

impl SeatSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seats(&self) -> &[SelectedSeat] {
        &self.seats
    }

    pub fn into_seats(self) -> Vec<SelectedSeat> {
        self.seats
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn contains(&self, seat: SeatId) -> bool {
        self.seats.iter().any(|s| s.seat_number == seat)
    }

    /// Order total in cents, the sum of the assigned unit prices.
    pub fn total(&self) -> i64 {
        self.seats.iter().map(|s| s.price).sum()
    }

    /// Picks or unpicks a seat.
    ///
    /// Picking an already selected seat removes it and frees its
    /// ticket. Picking a new seat assigns it [`next_assignment`], and
    /// fails if the seat is taken by someone else or the order is
    /// already full.
    pub fn toggle(
        &mut self,
        seat: SeatId,
        lines: &[TicketLine],
        taken: &HashSet<SeatId>,
    ) -> Result<SeatToggle, AllocationError> {
        if let Some(pos) = self.seats.iter().position(|s| s.seat_number == seat) {
            return Ok(SeatToggle::Removed(self.seats.remove(pos)));
        }
        if taken.contains(&seat) {
            return Err(AllocationError::SeatUnavailable(seat));
        }
        let limit: u32 = lines.iter().map(|l| l.count).sum();
        let Some((ticket_type, price)) = next_assignment(lines, &self.seats) else {
            return Err(AllocationError::TicketCountExceeded { limit });
        };
        let selected = SelectedSeat {
            seat_number: seat,
            ticket_type: ticket_type.to_string(),
            price,
        };
        self.seats.push(selected.clone());
        Ok(SeatToggle::Assigned(selected))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn seat(raw: &str) -> SeatId {
        raw.parse().unwrap()
    }

    fn adult_child_lines() -> Vec<TicketLine> {
        vec![
            TicketLine::new("Adult", 1499, 2),
            TicketLine::new("Child", 999, 1),
        ]
    }

    #[test]
    fn assigns_most_expensive_type_first() {
        let lines = adult_child_lines();
        let mut selection = SeatSelection::new();
        let taken = HashSet::new();

        for (raw, expected_type, expected_price) in
            [("A1", "Adult", 1499), ("A2", "Adult", 1499), ("A3", "Child", 999)]
        {
            let toggled = selection.toggle(seat(raw), &lines, &taken).unwrap();
            match toggled {
                SeatToggle::Assigned(s) => {
                    assert_eq!(s.ticket_type, expected_type);
                    assert_eq!(s.price, expected_price);
                }
                SeatToggle::Removed(_) => panic!("unexpected removal"),
            }
        }
        assert_eq!(selection.total(), 1499 + 1499 + 999);
    }

    #[test]
    fn removing_a_seat_frees_its_ticket() {
        let lines = adult_child_lines();
        let mut selection = SeatSelection::new();
        let taken = HashSet::new();

        for raw in ["A1", "A2", "A3"] {
            selection.toggle(seat(raw), &lines, &taken).unwrap();
        }
        // drop one Adult seat; the next pick gets the freed Adult ticket
        let removed = selection.toggle(seat("A1"), &lines, &taken).unwrap();
        assert_eq!(
            removed,
            SeatToggle::Removed(SelectedSeat {
                seat_number: seat("A1"),
                ticket_type: "Adult".into(),
                price: 1499,
            })
        );
        let assigned = selection.toggle(seat("B5"), &lines, &taken).unwrap();
        match assigned {
            SeatToggle::Assigned(s) => assert_eq!(s.ticket_type, "Adult"),
            SeatToggle::Removed(_) => panic!("unexpected removal"),
        }
    }

    #[test]
    fn rejects_taken_seats() {
        let lines = adult_child_lines();
        let mut selection = SeatSelection::new();
        let taken: HashSet<SeatId> = [seat("A1")].into_iter().collect();

        assert_eq!(
            selection.toggle(seat("A1"), &lines, &taken),
            Err(AllocationError::SeatUnavailable(seat("A1")))
        );
        assert!(selection.is_empty());
    }

    #[test]
    fn rejects_picks_beyond_the_ticket_count() {
        let lines = adult_child_lines();
        let mut selection = SeatSelection::new();
        let taken = HashSet::new();

        for raw in ["A1", "A2", "A3"] {
            selection.toggle(seat(raw), &lines, &taken).unwrap();
        }
        assert_eq!(
            selection.toggle(seat("A4"), &lines, &taken),
            Err(AllocationError::TicketCountExceeded { limit: 3 })
        );
        assert_eq!(selection.len(), 3);
    }

    #[test]
    fn unpicking_a_selected_seat_is_allowed_when_order_is_full() {
        let lines = vec![TicketLine::new("Adult", 1499, 1)];
        let mut selection = SeatSelection::new();
        let taken = HashSet::new();

        selection.toggle(seat("A1"), &lines, &taken).unwrap();
        // toggling the selected seat again must remove, not error
        let toggled = selection.toggle(seat("A1"), &lines, &taken).unwrap();
        assert!(matches!(toggled, SeatToggle::Removed(_)));
        assert!(selection.is_empty());
    }

    #[test]
    fn equal_prices_keep_line_order() {
        let lines = vec![
            TicketLine::new("Senior", 1099, 1),
            TicketLine::new("Student", 1099, 1),
        ];
        let mut selection = SeatSelection::new();
        let taken = HashSet::new();

        let first = selection.toggle(seat("A1"), &lines, &taken).unwrap();
        let second = selection.toggle(seat("A2"), &lines, &taken).unwrap();
        match (first, second) {
            (SeatToggle::Assigned(a), SeatToggle::Assigned(b)) => {
                assert_eq!(a.ticket_type, "Senior");
                assert_eq!(b.ticket_type, "Student");
            }
            _ => panic!("expected two assignments"),
        }
    }

    #[test]
    fn zero_count_lines_never_assign() {
        let lines = vec![
            TicketLine::new("Adult", 1499, 0),
            TicketLine::new("Child", 999, 1),
        ];
        assert_eq!(next_assignment(&lines, &[]), Some(("Child", 999)));
    }

    #[test]
    fn exhausted_lines_return_none() {
        let lines = vec![TicketLine::new("Adult", 1499, 1)];
        let selected = vec![SelectedSeat {
            seat_number: seat("A1"),
            ticket_type: "Adult".into(),
            price: 1499,
        }];
        assert_eq!(next_assignment(&lines, &selected), None);
    }

    fn lines_strategy() -> impl Strategy<Value = Vec<TicketLine>> {
        prop::collection::vec(
            ("[A-E]", 100i64..5000, 0u32..4u32)
                .prop_map(|(name, price, count)| TicketLine::new(name, price, count)),
            1..5,
        )
    }

    fn seats_strategy() -> impl Strategy<Value = Vec<SeatId>> {
        prop::collection::vec(
            (prop::char::range('A', 'H'), 1u32..=10u32).prop_map(|(row, n)| SeatId::new(row, n)),
            1..30,
        )
    }

    proptest! {
        // Replaying the same toggles yields the same selection, and the
        // selection never violates the per-line counts or the total.
        #[test]
        fn toggles_are_deterministic_and_bounded(
            lines in lines_strategy(),
            picks in seats_strategy(),
        ) {
            let taken = HashSet::new();
            let limit: u32 = lines.iter().map(|l| l.count).sum();

            let mut first = SeatSelection::new();
            let mut second = SeatSelection::new();
            for &seat in &picks {
                let a = first.toggle(seat, &lines, &taken);
                let b = second.toggle(seat, &lines, &taken);
                prop_assert_eq!(a, b);
            }
            prop_assert_eq!(first.seats(), second.seats());

            prop_assert!(first.len() as u32 <= limit);
            for line in &lines {
                let used = first
                    .seats()
                    .iter()
                    .filter(|s| s.ticket_type == line.ticket_type)
                    .count() as u32;
                let purchased: u32 = lines
                    .iter()
                    .filter(|l| l.ticket_type == line.ticket_type)
                    .map(|l| l.count)
                    .sum();
                prop_assert!(used <= purchased);
            }
            let total: i64 = first.seats().iter().map(|s| s.price).sum();
            prop_assert_eq!(first.total(), total);
        }

        // Whatever is selected, the next assignment is always the most
        // expensive line that still has room.
        #[test]
        fn next_assignment_prefers_highest_price(
            lines in lines_strategy(),
            picks in seats_strategy(),
        ) {
            let taken = HashSet::new();
            let mut selection = SeatSelection::new();
            for &seat in &picks {
                let _ = selection.toggle(seat, &lines, &taken);
            }
            if let Some((_, price)) = next_assignment(&lines, selection.seats()) {
                for line in &lines {
                    let used = selection
                        .seats()
                        .iter()
                        .filter(|s| s.ticket_type == line.ticket_type)
                        .count() as u32;
                    if used < line.count {
                        prop_assert!(price >= line.price);
                    }
                }
            }
        }
    }
}
