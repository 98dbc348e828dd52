//! DiaStat Server — diabetes-risk prediction API.
//!
//! Serves a JSON REST API over artifacts produced by the training pipeline:
//! the fitted transform and the published model are loaded once at startup
//! and treated as immutable for the life of the process.
//!
//! # Endpoints
//!
//! - `POST /register` — create a user (bcrypt-hashed password)
//! - `POST /login`    — check credentials
//! - `POST /predict`  — questionnaire JSON → risk assessment JSON
//! - `GET  /`         — redirect to the API documentation
//! - `GET  /v1/health` — server status and counters
//! - `GET  /v1/openapi.json` — OpenAPI 3.1 document

mod openapi;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ds_inference::predictor::RiskPredictor;
use ds_inference::registry::ModelRegistry;

use state::AppState;
use store::{JsonlAuditStore, JsonlUserStore};

/// DiaStat prediction server.
#[derive(Parser, Debug)]
#[command(name = "diastat-server", version = ds_core::VERSION, about)]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, default_value = "8017")]
    port: u16,

    /// Bind address.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Fitted transform artifact (JSON) from the training pipeline.
    #[arg(long)]
    transform: PathBuf,

    /// Published model artifact (JSON), or a saved-models registry
    /// directory whose latest version should be served.
    #[arg(long)]
    model: PathBuf,

    /// Registered-user store (JSONL), created if absent.
    #[arg(long)]
    users_db: PathBuf,

    /// Questionnaire audit log (JSONL), created if absent.
    #[arg(long)]
    audit_db: PathBuf,

    /// Maximum request body size in MiB.
    #[arg(long, default_value = "2")]
    max_body_mb: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();

    let model_path = if cli.model.is_dir() {
        ModelRegistry::new(cli.model.clone())
            .latest_model_path("model.json")
            .context("failed to resolve the latest published model")?
    } else {
        cli.model.clone()
    };
    let predictor = RiskPredictor::from_artifact_files(&cli.transform, &model_path)
        .context("failed to load serving artifacts")?;
    let users = JsonlUserStore::open(&cli.users_db).context("failed to open user store")?;
    let audit = JsonlAuditStore::open(&cli.audit_db).context("failed to open audit store")?;

    let state = Arc::new(AppState::new(predictor, Box::new(users), Box::new(audit)));

    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(cli.max_body_mb * 1024 * 1024))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", cli.host, cli.port))?;
    tracing::info!(%addr, version = ds_core::VERSION, "DiaStat server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
