#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Binary entry point for the Nightwatch read API.

use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("connecting to database...");
    let db = nightwatch_database::db::connect_from_env().await.expect("failed to connect to database");

    log::info!("running migrations...");
    nightwatch_database::run_migrations(db.as_ref()).await.expect("failed to run migrations");

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);

    nightwatch_server::run(Arc::from(db), &bind_addr, port).await
}
