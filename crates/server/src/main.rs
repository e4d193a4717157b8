//! Polyglot Server
//!
//! Axum server exposing the content pipeline over a small JSON API,
//! plus a CLI mode for one-off runs without a server.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use polyglot_core::config::{LanguageCode, PipelineConfig};
use polyglot_core::content::{PipelineReport, ToolRecord};
use polyglot_core::error::PipelineError;
use polyglot_core::gateway::client::{HttpModelClient, ModelClient};
use polyglot_core::gateway::ModelGateway;
use polyglot_core::runner::PipelineRunner;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Application state. The gateway is built once so the call-pacing
/// clock is shared by every request the process serves.
struct AppState {
    config: PipelineConfig,
    gateway: Arc<ModelGateway>,
}

type SharedState = Arc<AppState>;

// === API Types ===

#[derive(Deserialize)]
struct RunRequest {
    #[serde(default)]
    id: i64,
    name: String,
    url: String,
    #[serde(default)]
    category: String,
    /// Optional per-request override of the configured target languages
    languages: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ApiError {
    success: bool,
    message: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            success: false,
            message: message.into(),
        }),
    )
}

#[derive(Parser, Clone)]
#[command(author, version, about = "Polyglot - Multilingual AI Tool Content Pipeline")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the Polyglot API server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Run the pipeline for one tool and print the report (no server)
    Run {
        /// The tool's URL
        url: String,
        /// Tool name; defaults to the URL host
        #[arg(short, long)]
        name: Option<String>,
        /// Tool category
        #[arg(short, long, default_value = "")]
        category: String,
        /// Comma-separated target languages, e.g. "fr,de"
        #[arg(short, long)]
        languages: Option<String>,
    },
}

// === Configuration ===

const CONFIG_FILE: &str = "polyglot.config.json";

/// Loads pipeline configuration from `POLYGLOT_CONFIG` or the default
/// config file, falling back to built-in defaults.
fn load_config() -> PipelineConfig {
    let path = std::env::var("POLYGLOT_CONFIG").unwrap_or_else(|_| CONFIG_FILE.to_string());
    if !Path::new(&path).exists() {
        return PipelineConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(config) => {
                tracing::info!(path, "loaded pipeline configuration");
                config
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "config file unreadable, using defaults");
                PipelineConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(path, error = %e, "config file unreadable, using defaults");
            PipelineConfig::default()
        }
    }
}

const DEFAULT_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";

fn model_client(config: &PipelineConfig) -> anyhow::Result<Arc<dyn ModelClient>> {
    let api_url = std::env::var("MODEL_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let api_key = std::env::var("MODEL_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!("MODEL_API_KEY is not set, model calls will be rejected by the provider");
    }
    let client = HttpModelClient::new(api_url, api_key, config.gateway.call_timeout)?;
    Ok(Arc::new(client))
}

fn parse_languages(codes: &[String]) -> Result<Vec<LanguageCode>, PipelineError> {
    codes.iter().map(|c| LanguageCode::parse(c)).collect()
}

// === API Handlers ===

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_config(State(state): State<SharedState>) -> Json<PipelineConfig> {
    Json(state.config.clone())
}

async fn run_pipeline(
    State(state): State<SharedState>,
    Json(request): Json<RunRequest>,
) -> ApiResult<PipelineReport> {
    let mut config = state.config.clone();
    if let Some(languages) = &request.languages {
        config.target_languages = parse_languages(languages)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    }

    let tool = ToolRecord {
        id: request.id,
        name: request.name,
        url: request.url,
        category: request.category,
    };

    let runner = PipelineRunner::with_gateway(config, Arc::clone(&state.gateway))
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match runner.run(&tool).await {
        Ok(report) => Ok(Json(report)),
        Err(e @ PipelineError::InvalidInput(_)) => {
            Err(api_error(StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(e @ PipelineError::HierarchyExhausted { .. }) => {
            Err(api_error(StatusCode::BAD_GATEWAY, e.to_string()))
        }
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

// === Entrypoints ===

async fn serve(port: u16) -> anyhow::Result<()> {
    let config = load_config();
    let client = model_client(&config)?;
    let gateway = Arc::new(ModelGateway::new(&config.gateway, client));
    let state: SharedState = Arc::new(AppState { config, gateway });

    let pipeline_routes = Router::new().route("/run", post(run_pipeline));

    let app = Router::new()
        .nest("/api/v1/pipeline", pipeline_routes)
        .route("/api/v1/health", get(health))
        .route("/api/v1/config", get(get_config))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "polyglot server listening");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_once(
    url: String,
    name: Option<String>,
    category: String,
    languages: Option<String>,
) -> anyhow::Result<()> {
    let mut config = load_config();
    if let Some(raw) = languages {
        let codes: Vec<String> = raw.split(',').map(|c| c.trim().to_string()).collect();
        config.target_languages = parse_languages(&codes).map_err(|e| anyhow::anyhow!("{e}"))?;
    }
    let client = model_client(&config)?;

    let name = match name {
        Some(name) => name,
        None => polyglot_core::probe::SiteProbe::validate_url(&url)
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .host_str()
            .unwrap_or("unknown")
            .trim_start_matches("www.")
            .to_string(),
    };
    let tool = ToolRecord {
        id: 0,
        name,
        url,
        category,
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<polyglot_core::events::PipelineEvent>();
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            tracing::info!(kind = ?event.kind, stage = %event.stage, language = ?event.language, "pipeline event");
        }
    });

    let runner = PipelineRunner::new(config, client)?.with_event_channel(tx);
    let report = runner.run(&tool).await.map_err(|e| anyhow::anyhow!("{e}"))?;
    let _ = progress.await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("╔══════════════════════════════════════╗");
    println!("║          POLYGLOT SERVER             ║");
    println!("╚══════════════════════════════════════╝");

    let args = Args::parse();
    match args.command {
        Some(CliCommand::Run {
            url,
            name,
            category,
            languages,
        }) => run_once(url, name, category, languages).await,
        Some(CliCommand::Serve { port }) => serve(port).await,
        None => serve(8080).await,
    }
}
