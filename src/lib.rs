pub mod config;
pub mod controllers;
pub mod error;
pub mod middleware;
pub mod models;
pub mod seed;
pub mod services;
pub mod store;

use std::sync::Arc;

use anyhow::Context;

use crate::services::booking::BookingService;
use crate::store::{MemStore, PgStore, Store};

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub bookings: BookingService,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn Store> = match &config.database.url {
            Some(url) => {
                let pg = PgStore::connect(url, config.database.pool_size)
                    .await
                    .context("failed to connect to database")?;
                pg.run_migrations()
                    .await
                    .context("failed to run migrations")?;
                tracing::info!("Using postgres store");
                Arc::new(pg)
            }
            None => {
                tracing::info!("DATABASE_URL not set, using in-memory store");
                Arc::new(MemStore::new())
            }
        };
        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: Arc<dyn Store>, config: config::Config) -> Arc<Self> {
        let bookings = BookingService::new(store.clone());
        Arc::new(Self {
            store,
            bookings,
            config,
        })
    }
}
