//! Demo catalog for development mode: two accounts, a handful of
//! movies, two cinemas with two screens each and three days of
//! showtimes.

use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::models::SeatLayout;
use crate::store::{
    NewCinema, NewMovie, NewScreen, NewShowtime, NewUser, Store, StoreError, StoreResult,
};

async fn ensure_user(store: &dyn Store, user: NewUser) -> StoreResult<()> {
    match store.create_user(user).await {
        Ok(_) => Ok(()),
        Err(StoreError::Conflict(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

fn layout(rows: u32, seats_per_row: u32) -> SeatLayout {
    SeatLayout {
        rows,
        seats_per_row,
        row_labels: ('A'..='Z')
            .take(rows as usize)
            .map(|c| c.to_string())
            .collect(),
    }
}

pub async fn seed_demo_data(store: &dyn Store) -> StoreResult<()> {
    if !store.list_movies().await?.is_empty() {
        debug!("demo data already present, skipping seed");
        return Ok(());
    }

    let hash = |password: &str| {
        bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| StoreError::Internal(e.to_string()))
    };
    ensure_user(
        store,
        NewUser {
            username: "admin".into(),
            password_hash: hash("admin123")?,
            email: "admin@cineticket.com".into(),
            full_name: "Admin User".into(),
            role: "admin".into(),
        },
    )
    .await?;
    ensure_user(
        store,
        NewUser {
            username: "user".into(),
            password_hash: hash("user123")?,
            email: "user@example.com".into(),
            full_name: "John Doe".into(),
            role: "user".into(),
        },
    )
    .await?;

    let movies = vec![
        NewMovie {
            title: "Dune: Part Two".into(),
            description: "Paul Atreides unites with Chani and the Fremen while seeking revenge \
                          against the conspirators who destroyed his family."
                .into(),
            poster_url: "https://image.tmdb.org/t/p/w500/dune-part-two.jpg".into(),
            banner_url: "https://image.tmdb.org/t/p/original/dune-part-two-banner.jpg".into(),
            release_year: 2024,
            duration: 166,
            rating: "PG-13".into(),
            imdb_rating: Some(8.6),
            genres: vec!["Sci-Fi".into(), "Adventure".into()],
            trailer: Some("https://www.youtube.com/watch?v=Way9Dexny3w".into()),
            is_now_showing: true,
            is_coming_soon: false,
            release_date: None,
        },
        NewMovie {
            title: "Oppenheimer".into(),
            description: "The story of J. Robert Oppenheimer and the development of the atomic \
                          bomb during World War II."
                .into(),
            poster_url: "https://image.tmdb.org/t/p/w500/oppenheimer.jpg".into(),
            banner_url: "https://image.tmdb.org/t/p/original/oppenheimer-banner.jpg".into(),
            release_year: 2023,
            duration: 180,
            rating: "R".into(),
            imdb_rating: Some(8.3),
            genres: vec!["Drama".into(), "History".into()],
            trailer: Some("https://www.youtube.com/watch?v=uYPbbksJxIg".into()),
            is_now_showing: true,
            is_coming_soon: false,
            release_date: None,
        },
        NewMovie {
            title: "The Batman".into(),
            description: "Batman ventures into Gotham City's underworld when a sadistic killer \
                          leaves behind a trail of cryptic clues."
                .into(),
            poster_url: "https://image.tmdb.org/t/p/w500/the-batman.jpg".into(),
            banner_url: "https://image.tmdb.org/t/p/original/the-batman-banner.jpg".into(),
            release_year: 2022,
            duration: 176,
            rating: "PG-13".into(),
            imdb_rating: Some(7.8),
            genres: vec!["Action".into(), "Crime".into()],
            trailer: None,
            is_now_showing: true,
            is_coming_soon: false,
            release_date: None,
        },
        NewMovie {
            title: "Inside Out 2".into(),
            description: "Riley's mind headquarters undergoes a sudden demolition to make room \
                          for something entirely unexpected: new emotions."
                .into(),
            poster_url: "https://image.tmdb.org/t/p/w500/inside-out-2.jpg".into(),
            banner_url: "https://image.tmdb.org/t/p/original/inside-out-2-banner.jpg".into(),
            release_year: 2024,
            duration: 96,
            rating: "PG".into(),
            imdb_rating: None,
            genres: vec!["Animation".into(), "Family".into()],
            trailer: None,
            is_now_showing: false,
            is_coming_soon: true,
            release_date: Some(Utc::now() + Duration::days(30)),
        },
    ];
    let mut seeded_movies = Vec::with_capacity(movies.len());
    for movie in movies {
        seeded_movies.push(store.create_movie(movie).await?);
    }

    let cinemas = vec![
        NewCinema {
            name: "CineTicket Downtown".into(),
            address: "100 Main Street".into(),
            city: "Springfield".into(),
            image_url: "https://images.cineticket.com/cinemas/downtown.jpg".into(),
            rating: Some(4.6),
            review_count: 1284,
        },
        NewCinema {
            name: "CineTicket Riverside Mall".into(),
            address: "45 River Road".into(),
            city: "Springfield".into(),
            image_url: "https://images.cineticket.com/cinemas/riverside.jpg".into(),
            rating: Some(4.2),
            review_count: 857,
        },
    ];
    let mut screens = Vec::new();
    for cinema in cinemas {
        let cinema = store.create_cinema(cinema).await?;
        let small = layout(7, 8);
        let large = layout(8, 10);
        screens.push(
            store
                .create_screen(NewScreen {
                    cinema_id: cinema.id,
                    name: "Screen 1".into(),
                    total_seats: small.capacity() as i32,
                    seat_layout: small,
                })
                .await?,
        );
        screens.push(
            store
                .create_screen(NewScreen {
                    cinema_id: cinema.id,
                    name: "Screen 2".into(),
                    total_seats: large.capacity() as i32,
                    seat_layout: large,
                })
                .await?,
        );
    }

    // three days of showtimes for everything now showing
    let today = Utc::now().date_naive();
    let slots = [(10, 30), (16, 0), (19, 30)];
    let mut showtime_count = 0;
    for (index, movie) in seeded_movies.iter().filter(|m| m.is_now_showing).enumerate() {
        // spread movies over screens instead of packing them all into one
        let screen = &screens[index % screens.len()];
        for day in 0..3 {
            for (hour, minute) in slots {
                let start_time = (today + Duration::days(day))
                    .and_hms_opt(hour, minute, 0)
                    .unwrap()
                    .and_utc();
                store
                    .create_showtime(NewShowtime {
                        movie_id: movie.id,
                        screen_id: screen.id,
                        start_time,
                        end_time: start_time + Duration::minutes(movie.duration as i64),
                        price: 1499,
                    })
                    .await?;
                showtime_count += 1;
            }
        }
    }

    info!(
        movies = seeded_movies.len(),
        screens = screens.len(),
        showtimes = showtime_count,
        "demo data seeded"
    );
    Ok(())
}
