//! End-to-end tests of the booking engine against the in-memory store:
//! allocation, submission, conflicts, cancellation and the status state
//! machine.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;

use cineticket::models::{BookingStatus, SeatId, SeatLayout};
use cineticket::services::allocation::{SeatSelection, SelectedSeat, TicketLine};
use cineticket::services::booking::{BookingError, BookingService};
use cineticket::store::{
    MemStore, NewBooking, NewCinema, NewMovie, NewScreen, NewShowtime, NewUser, Store,
};

struct World {
    store: Arc<MemStore>,
    bookings: BookingService,
    showtime_id: i64,
    user_id: i64,
}

async fn setup() -> World {
    let store = Arc::new(MemStore::new());
    let bookings = BookingService::new(store.clone());

    let user = store
        .create_user(NewUser {
            username: "alice".into(),
            password_hash: "not-a-real-hash".into(),
            email: "alice@example.com".into(),
            full_name: "Alice Example".into(),
            role: "user".into(),
        })
        .await
        .unwrap();
    let movie = store
        .create_movie(NewMovie {
            title: "Dune: Part Two".into(),
            description: "Part two".into(),
            poster_url: "https://example.com/poster.jpg".into(),
            banner_url: "https://example.com/banner.jpg".into(),
            release_year: 2024,
            duration: 166,
            rating: "PG-13".into(),
            imdb_rating: Some(8.6),
            genres: vec!["Sci-Fi".into()],
            trailer: None,
            is_now_showing: true,
            is_coming_soon: false,
            release_date: None,
        })
        .await
        .unwrap();
    let cinema = store
        .create_cinema(NewCinema {
            name: "CineTicket Downtown".into(),
            address: "100 Main Street".into(),
            city: "Springfield".into(),
            image_url: "https://example.com/cinema.jpg".into(),
            rating: Some(4.6),
            review_count: 10,
        })
        .await
        .unwrap();
    let screen = store
        .create_screen(NewScreen {
            cinema_id: cinema.id,
            name: "Screen 1".into(),
            total_seats: 56,
            seat_layout: SeatLayout {
                rows: 7,
                seats_per_row: 8,
                row_labels: ('A'..='G').map(|c| c.to_string()).collect(),
            },
        })
        .await
        .unwrap();
    let showtime = store
        .create_showtime(NewShowtime {
            movie_id: movie.id,
            screen_id: screen.id,
            start_time: Utc::now() + Duration::hours(4),
            end_time: Utc::now() + Duration::hours(4) + Duration::minutes(166),
            price: 1499,
        })
        .await
        .unwrap();

    World {
        store,
        bookings,
        showtime_id: showtime.id,
        user_id: user.id,
    }
}

fn seat(raw: &str) -> SeatId {
    raw.parse().unwrap()
}

fn adult(raw: &str) -> SelectedSeat {
    SelectedSeat {
        seat_number: seat(raw),
        ticket_type: "Adult".into(),
        price: 1499,
    }
}

fn child(raw: &str) -> SelectedSeat {
    SelectedSeat {
        seat_number: seat(raw),
        ticket_type: "Child".into(),
        price: 999,
    }
}

fn seat_strings(seats: &[SeatId]) -> Vec<String> {
    seats.iter().map(ToString::to_string).collect()
}

// ---------------------------------------------------------------------------
// Happy path: select seats with the allocator, submit, observe them taken
// ---------------------------------------------------------------------------

#[tokio::test]
async fn selection_submission_and_availability_round_trip() {
    let world = setup().await;

    // 2x Adult + 1x Child; picks get Adult, Adult, Child in that order
    let lines = vec![
        TicketLine::new("Adult", 1499, 2),
        TicketLine::new("Child", 999, 1),
    ];
    let taken: HashSet<SeatId> = world
        .bookings
        .taken_seats(world.showtime_id)
        .await
        .unwrap()
        .into_iter()
        .collect();
    assert!(taken.is_empty());

    let mut selection = SeatSelection::new();
    for raw in ["A1", "A2", "A3"] {
        selection.toggle(seat(raw), &lines, &taken).unwrap();
    }
    let types: Vec<&str> = selection
        .seats()
        .iter()
        .map(|s| s.ticket_type.as_str())
        .collect();
    assert_eq!(types, vec!["Adult", "Adult", "Child"]);
    assert_eq!(selection.total(), 3997);

    let booking = world
        .bookings
        .submit_booking(
            world.user_id,
            world.showtime_id,
            selection.seats(),
            Some(selection.total()),
        )
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.total_amount, 3997);

    let taken = world.bookings.taken_seats(world.showtime_id).await.unwrap();
    assert_eq!(seat_strings(&taken), vec!["A1", "A2", "A3"]);
}

// ---------------------------------------------------------------------------
// Availability index: unknown showtime is an error, empty is an answer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn taken_seats_distinguishes_unknown_showtime_from_empty() {
    let world = setup().await;

    let err = world.bookings.taken_seats(9999).await.unwrap_err();
    assert!(matches!(err, BookingError::ShowtimeNotFound(9999)));

    let taken = world.bookings.taken_seats(world.showtime_id).await.unwrap();
    assert!(taken.is_empty());
}

#[tokio::test]
async fn pending_bookings_hold_their_seats() {
    let world = setup().await;

    world
        .store
        .commit_booking(
            NewBooking {
                user_id: world.user_id,
                showtime_id: world.showtime_id,
                total_amount: 1499,
                status: BookingStatus::Pending,
                booking_reference: "CTPENDING1".into(),
            },
            &[adult("C4")],
        )
        .await
        .unwrap();

    let taken = world.bookings.taken_seats(world.showtime_id).await.unwrap();
    assert_eq!(seat_strings(&taken), vec!["C4"]);
}

// ---------------------------------------------------------------------------
// Concurrency: overlapping submissions, exactly one winner
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_for_one_seat_have_one_winner() {
    let world = setup().await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let bookings = world.bookings.clone();
            let showtime_id = world.showtime_id;
            let user_id = world.user_id;
            tokio::spawn(async move {
                bookings
                    .submit_booking(user_id, showtime_id, &[adult("B1")], None)
                    .await
            })
        })
        .collect();
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one submission may win seat B1");
    for result in results {
        if let Err(err) = result {
            match err {
                BookingError::SeatConflict(seats) => {
                    assert_eq!(seat_strings(&seats), vec!["B1"]);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    assert_eq!(world.store.list_bookings().await.unwrap().len(), 1);
    let taken = world.bookings.taken_seats(world.showtime_id).await.unwrap();
    assert_eq!(seat_strings(&taken), vec!["B1"]);
}

#[tokio::test]
async fn conflict_reports_only_the_contested_seats() {
    let world = setup().await;

    world
        .bookings
        .submit_booking(world.user_id, world.showtime_id, &[adult("A1"), adult("A2")], None)
        .await
        .unwrap();

    let err = world
        .bookings
        .submit_booking(
            world.user_id,
            world.showtime_id,
            &[adult("A2"), adult("A3"), child("B5")],
            None,
        )
        .await
        .unwrap_err();
    match err {
        BookingError::SeatConflict(seats) => assert_eq!(seat_strings(&seats), vec!["A2"]),
        other => panic!("unexpected error: {other:?}"),
    }

    // the failed submission left nothing behind
    assert_eq!(world.store.list_bookings().await.unwrap().len(), 1);
    let taken = world.bookings.taken_seats(world.showtime_id).await.unwrap();
    assert_eq!(seat_strings(&taken), vec!["A1", "A2"]);
}

// ---------------------------------------------------------------------------
// Cancellation releases seats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancellation_releases_seats_for_rebooking() {
    let world = setup().await;

    let booking = world
        .bookings
        .submit_booking(world.user_id, world.showtime_id, &[adult("A1"), adult("A2")], None)
        .await
        .unwrap();

    let rejected = world
        .bookings
        .submit_booking(world.user_id, world.showtime_id, &[adult("A1")], None)
        .await;
    assert!(matches!(rejected, Err(BookingError::SeatConflict(_))));

    let cancelled = world
        .bookings
        .update_status(booking.id, BookingStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    let taken = world.bookings.taken_seats(world.showtime_id).await.unwrap();
    assert!(taken.is_empty(), "cancelled seats must be available again");

    // rebooking a released seat succeeds, history stays intact
    world
        .bookings
        .submit_booking(world.user_id, world.showtime_id, &[adult("A1")], None)
        .await
        .unwrap();
    let old_seats = world.store.seats_by_booking(booking.id).await.unwrap();
    assert_eq!(old_seats.len(), 2, "cancelled booking keeps its seat rows");
}

// ---------------------------------------------------------------------------
// Validation failures are distinct and leave no side effects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_selection_is_rejected_without_side_effects() {
    let world = setup().await;

    let err = world
        .bookings
        .submit_booking(world.user_id, world.showtime_id, &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::EmptySelection));
    assert!(world.store.list_bookings().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_seats_in_one_submission_are_rejected() {
    let world = setup().await;

    let err = world
        .bookings
        .submit_booking(world.user_id, world.showtime_id, &[adult("A1"), adult("A1")], None)
        .await
        .unwrap_err();
    match err {
        BookingError::DuplicateSeat(s) => assert_eq!(s, seat("A1")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(world.store.list_bookings().await.unwrap().is_empty());
}

#[tokio::test]
async fn seats_outside_the_layout_are_rejected() {
    let world = setup().await;

    // row H does not exist on a seven-row screen
    let err = world
        .bookings
        .submit_booking(world.user_id, world.showtime_id, &[adult("H1")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidSeat(s) if s == seat("H1")));

    // seat 9 does not exist in an eight-seat row
    let err = world
        .bookings
        .submit_booking(world.user_id, world.showtime_id, &[adult("A9")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidSeat(s) if s == seat("A9")));

    assert!(world.store.list_bookings().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_showtime_wins_over_empty_selection() {
    let world = setup().await;

    let err = world
        .bookings
        .submit_booking(world.user_id, 777, &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ShowtimeNotFound(777)));
}

// ---------------------------------------------------------------------------
// Money: the server's total always wins
// ---------------------------------------------------------------------------

#[tokio::test]
async fn client_total_is_advisory_only() {
    let world = setup().await;

    let booking = world
        .bookings
        .submit_booking(
            world.user_id,
            world.showtime_id,
            &[adult("A1"), adult("A2"), child("A3")],
            Some(1), // nonsense from the client
        )
        .await
        .unwrap();
    assert_eq!(booking.total_amount, 1499 + 1499 + 999);

    let stored = world
        .store
        .get_booking(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total_amount, booking.total_amount);
}

// ---------------------------------------------------------------------------
// Status state machine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_transitions_follow_the_state_machine() {
    let world = setup().await;

    let booking = world
        .bookings
        .submit_booking(world.user_id, world.showtime_id, &[adult("A1")], None)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    // confirmed -> confirmed is not a transition
    let err = world
        .bookings
        .update_status(booking.id, BookingStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::InvalidTransition {
            from: BookingStatus::Confirmed,
            to: BookingStatus::Confirmed,
        }
    ));

    // confirmed -> cancelled is, and cancelled is terminal
    world
        .bookings
        .update_status(booking.id, BookingStatus::Cancelled)
        .await
        .unwrap();
    let err = world
        .bookings
        .update_status(booking.id, BookingStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::InvalidTransition {
            from: BookingStatus::Cancelled,
            to: BookingStatus::Confirmed,
        }
    ));
    let err = world
        .bookings
        .update_status(booking.id, BookingStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::InvalidTransition {
            from: BookingStatus::Cancelled,
            to: BookingStatus::Pending,
        }
    ));
}

#[tokio::test]
async fn pending_bookings_can_be_confirmed() {
    let world = setup().await;

    let pending = world
        .store
        .commit_booking(
            NewBooking {
                user_id: world.user_id,
                showtime_id: world.showtime_id,
                total_amount: 1499,
                status: BookingStatus::Pending,
                booking_reference: "CTPENDING2".into(),
            },
            &[adult("D1")],
        )
        .await
        .unwrap();

    let confirmed = world
        .bookings
        .update_status(pending.id, BookingStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    // the seat was taken throughout
    let taken = world.bookings.taken_seats(world.showtime_id).await.unwrap();
    assert_eq!(seat_strings(&taken), vec!["D1"]);
}

#[tokio::test]
async fn updating_an_unknown_booking_is_not_found() {
    let world = setup().await;

    let err = world
        .bookings
        .update_status(4242, BookingStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::BookingNotFound(4242)));
}

// ---------------------------------------------------------------------------
// Booking references
// ---------------------------------------------------------------------------

#[tokio::test]
async fn booking_references_are_unique_and_well_formed() {
    let world = setup().await;

    let first = world
        .bookings
        .submit_booking(world.user_id, world.showtime_id, &[adult("A1")], None)
        .await
        .unwrap();
    let second = world
        .bookings
        .submit_booking(world.user_id, world.showtime_id, &[adult("A2")], None)
        .await
        .unwrap();

    for booking in [&first, &second] {
        assert!(booking.booking_reference.starts_with("CT"));
        assert_eq!(booking.booking_reference.len(), 10);
    }
    assert_ne!(first.booking_reference, second.booking_reference);
}
