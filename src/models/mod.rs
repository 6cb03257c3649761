pub mod booking;
pub mod cinema;
pub mod movie;
pub mod seat;
pub mod showtime;
pub mod user;

pub use booking::{Booking, BookingSeat, BookingStatus};
pub use cinema::{Cinema, Screen, SeatLayout};
pub use movie::Movie;
pub use seat::SeatId;
pub use showtime::Showtime;
pub use user::User;
