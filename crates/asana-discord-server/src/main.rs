mod action;
mod asana;
mod config;
mod db;
mod discord;
mod models;
mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::store::{ChannelMapStore, SqliteChannelMap};

const BODY_LIMIT: usize = 1024 * 1024;

const GREETING: &str = "Hello! This is the Asana to Discord integration server.";

type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
struct AppError(anyhow::Error);

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
    }
}

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    http: reqwest::Client,
    channels: Arc<dyn ChannelMapStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Arc::new(Config::parse());

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("create {}", config.data_dir.display()))?;
    let pool = db::init_sqlite(&config.db_path()).await?;

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .context("build reqwest client")?;

    let state = AppState {
        config: config.clone(),
        http,
        channels: Arc::new(SqliteChannelMap::new(pool)),
    };

    let app = app(state)?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, base_url = %config.base_url, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn app(state: AppState) -> anyhow::Result<Router> {
    let actions = action::routes(&state)?;

    Ok(Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .nest(action::MOUNT, actions)
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http()))
}

async fn root() -> &'static str {
    GREETING
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
