#![allow(async_fn_in_trait)]

#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate lazy_static;

use std::ops::Deref;

use mongodb::{Client, Database};
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::error::{BackendError, ConfigurationError};
use crate::route::mount_api;
use crate::security::Security;
use crate::storage::LocalBlobStore;

pub mod config;
pub mod data;
pub mod error;
pub mod middleware;
pub mod report;
pub mod resp;
pub mod role;
pub mod route;
pub mod security;
pub mod storage;
pub mod time;
pub mod util;

lazy_static! {
    pub static ref SECURITY: Security = Security::load();
}

pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
        if let Err(err) = tracing_log::LogTracer::init() {
            eprintln!("Unable to forward log records: {}", err);
        }
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            c
        }
        Err(ConfigurationError::NotFound(_)) => {
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            c
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            return Err(other.into());
        }
    };

    tracing::info!("Initializing security information...");
    let _ = SECURITY.deref();

    tracing::info!("Connecting to MongoDB: {}", c.mongodb_uri);
    let client = Client::with_uri_str(c.mongodb_uri.as_str()).await?;

    tracing::info!("Using MongoDB database: {}", c.mongodb_db);
    let db = client.database(c.mongodb_db.as_str());

    tracing::info!("Ensuring indexes...");
    data::ensure_indexes(&db).await?;

    build(c, db)
}

/// Assembles the server around an already selected database.
pub fn build(c: Config, db: Database) -> Result<Rocket<Build>, BackendError> {
    tracing::info!("Starting HTTP server...");
    let store = LocalBlobStore::from_config(&c);
    let r = rocket::build().manage(store).manage(c).manage(db);

    tracing::info!("Setting up CORS...");
    let cors = rocket_cors::CorsOptions {
        allowed_origins: AllowedOrigins::All,
        allowed_methods: vec![Method::Get, Method::Put, Method::Post, Method::Delete]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?;

    Ok(mount_api(r.attach(cors)))
}
