mod errors;
mod params;
mod services;

use std::io;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use clap::Parser;
use object_store::{run_periodic, ObjectStore};
use tracing_subscriber::EnvFilter;

use crate::params::Args;
use crate::services::object_service::{self, AppState};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    std::fs::create_dir_all(&args.data_dir)?;
    let store = ObjectStore::open(
        args.manifest_db_path(),
        &args.chunk_backend(),
        args.store_config(),
    )
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    // Reclaim chunks left behind by uploads that never committed.
    if let Some(period) = args.sweep_interval() {
        tracing::info!("sweeping orphaned chunks every {:?}", period);
        actix_web::rt::spawn(run_periodic(store.clone(), period));
    }

    let shared_state = web::Data::new(AppState { store });

    tracing::info!("listening on {}", args.http_addr);
    HttpServer::new(move || {
        App::new()
            .app_data(shared_state.clone())
            .wrap(Logger::default())
            .configure(object_service::configure)
    })
    .bind(args.http_addr.clone())?
    .run()
    .await
}
