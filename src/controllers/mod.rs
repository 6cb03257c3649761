pub mod auth;
pub mod bookings;
pub mod cinemas;
pub mod movies;
pub mod showtimes;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(movies::routes())
        .merge(cinemas::routes())
        .merge(showtimes::routes())
        .merge(bookings::routes())
}
