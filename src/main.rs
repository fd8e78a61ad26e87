mod cli;
mod config;
mod db;
mod error;
mod filter;
mod models;
mod persist;
mod routes;
mod search;
mod sources;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::{Command, Config};
use crate::models::store::PgVacancyStore;
use crate::routes::AppState;
use crate::sources::SourceRegistry;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vacancyhub=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();
    init_tracing(config.log_json);

    match config.resolved_command() {
        Command::Serve { listen_addr } => serve(&config, &listen_addr).await,
        Command::Search(args) => cli::run(&config, args).await,
    }
}

async fn serve(config: &Config, listen_addr: &str) -> anyhow::Result<()> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required to serve")?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(database_url).await?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }

    let sources = SourceRegistry::from_config(config)?;
    tracing::info!("Registered {} vacancy sources", sources.len());

    let state = AppState {
        sources: Arc::new(sources),
        store: Arc::new(PgVacancyStore::new(pool.clone())),
    };

    let app = Router::new()
        .merge(routes::health_router(pool))
        .merge(routes::api::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("Listening on {listen_addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
