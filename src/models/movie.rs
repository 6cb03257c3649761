use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub poster_url: String,
    pub banner_url: String,
    pub release_year: i32,
    /// Runtime in minutes, used to derive showtime end times.
    pub duration: i32,
    pub rating: String,
    pub imdb_rating: Option<f64>,
    #[sqlx(json)]
    pub genres: Vec<String>,
    pub trailer: Option<String>,
    pub is_now_showing: bool,
    pub is_coming_soon: bool,
    pub release_date: Option<DateTime<Utc>>,
}
