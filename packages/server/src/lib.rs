#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The Nightwatch read API — §6.
//!
//! A thin `actix-web` service over the ingestion pipeline's datastore:
//! `GET /incidents`, `GET /review-queue`, `POST /review-queue`,
//! `GET /rollup`, and `GET /health`. It never writes incidents itself —
//! only the two human-in-the-loop actions the review queue exposes
//! (`approve`/`reject`), delegated straight to `nightwatch_workflow`.

pub mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use switchy_database::Database;

/// Shared application state: one pooled connection to the `PostGIS`
/// datastore, handed to every handler via `web::Data`.
pub struct AppState {
    pub db: Arc<dyn Database>,
}

/// Registers the `/incidents`, `/review-queue`, `/rollup`, and `/health`
/// routes under `web::scope("/api")`, mirroring the reference
/// implementation's route-grouping convention.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/incidents", web::get().to(handlers::incidents))
            .route("/review-queue", web::get().to(handlers::review_queue_get))
            .route("/review-queue", web::post().to(handlers::review_queue_post))
            .route("/rollup", web::get().to(handlers::rollup)),
    );
}

/// Builds and runs the HTTP server on `bind_addr:port`.
///
/// # Errors
///
/// Returns an I/O error if the listener cannot bind.
pub async fn run(db: Arc<dyn Database>, bind_addr: &str, port: u16) -> std::io::Result<()> {
    let state = web::Data::new(AppState { db });

    log::info!("starting Nightwatch read API on {bind_addr}:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
