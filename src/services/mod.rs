pub mod allocation;
pub mod booking;
