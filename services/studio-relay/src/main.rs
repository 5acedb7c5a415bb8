//! Studio Relay
//!
//! Single-binary service that fronts a generative image provider for the
//! product-redesign studio UI:
//! 1. Holds tiered key pools and rotates through them on rate limits
//! 2. Runs the studio workflows (cleanup, analyze, redesign, remix, split, mockup)
//! 3. Persists pool updates submitted through the admin endpoint
//! 4. Exposes health and Prometheus metrics

mod config;
mod error;
mod metrics;
mod pools;
mod service;
mod workflow;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credential_pool::{Executor, KeyPool, Pacer};
use metrics_exporter_prometheus::PrometheusHandle;
use provider::{Credential, GenClient};

use crate::config::Config;
use crate::error::ApiError;
use crate::pools::PoolsFile;
use crate::service::{DRAIN_TIMEOUT, ServiceMetrics};
use crate::workflow::Studio;

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    studio: Arc<Studio>,
    pool: Arc<KeyPool>,
    pools_file: Option<PathBuf>,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/api/generate", post(generate_handler))
        .route("/api/keys", put(keys_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting studio-relay");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        base_url = %config.provider.base_url,
        primary_model = %config.provider.primary_model,
        fallback_model = %config.provider.fallback_model,
        fallback_key = config.api_key.is_some(),
        "configuration loaded"
    );

    let fallback = config
        .api_key
        .as_ref()
        .map(|key| Credential::new(key.expose().as_str()));
    let pool = Arc::new(KeyPool::new(fallback));

    if let Some(ref path) = config.pools_file {
        match pools::load_pools(path).await {
            Ok(loaded) => pool.set_pools(loaded.free, loaded.paid).await,
            Err(e) => warn!(error = %e, path = %path.display(), "could not load pool file"),
        }
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.provider.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;
    let client = GenClient::new(
        http,
        config.provider.base_url.clone(),
        config.provider.primary_model.clone(),
        config.provider.fallback_model.clone(),
    );

    let pacer = Pacer::new(
        Duration::from_millis(config.pacing.free_delay_ms),
        Duration::from_millis(config.pacing.paid_delay_ms),
    );
    let executor = Executor::new(pool.clone(), pacer);
    let studio = Arc::new(Studio::new(executor, client, config.on_cleanup_failure));

    let app_state = AppState {
        studio,
        pool,
        pools_file: config.pools_file.clone(),
        metrics: ServiceMetrics::new(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // Graceful shutdown with drain timeout enforcement:
    // 1. shutdown_signal() fires on SIGTERM/SIGINT
    // 2. axum stops accepting new connections and drains in-flight requests
    // 3. DRAIN_TIMEOUT bounds the drain so a slow batch cannot block exit
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Body of `POST /api/generate`. `action` selects the workflow; the other
/// fields are per-action inputs. `user_key` bypasses the pools entirely.
#[derive(Debug, Deserialize)]
struct GenerateBody {
    action: String,
    image: Option<String>,
    instruction: Option<String>,
    scene: Option<String>,
    style: Option<String>,
    user_key: Option<String>,
}

/// Body of `PUT /api/keys`: replaces both pools wholesale.
#[derive(Debug, Deserialize)]
struct KeysBody {
    #[serde(default)]
    free: Vec<String>,
    #[serde(default)]
    paid: Vec<String>,
}

async fn generate_handler(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<GenerateBody>,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let started = Instant::now();
    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

    let action = body.action.clone();
    let result = dispatch(&state.studio, body).await;

    let response = match result {
        Ok(value) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            value.to_string(),
        )
            .into_response(),
        Err(e) => {
            state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
            e.into_response()
        }
    };

    let status = response.status().as_u16();
    let elapsed = started.elapsed();
    metrics::record_request(&action, status, elapsed.as_secs_f64());
    info!(
        request_id,
        action,
        status,
        elapsed_ms = elapsed.as_millis() as u64,
        "generate request completed"
    );
    response
}

/// Route an action to its workflow and shape the success body.
async fn dispatch(studio: &Studio, body: GenerateBody) -> Result<serde_json::Value, ApiError> {
    let user_key = body.user_key.as_deref();
    match body.action.as_str() {
        "cleanup" => {
            let image = required(body.image.as_deref(), "image")?;
            let out = studio.cleanup(image, user_key).await?;
            Ok(serde_json::json!({ "ok": true, "image": out }))
        }
        "analyze" => {
            let image = required(body.image.as_deref(), "image")?;
            let text = studio.analyze(image, user_key).await?;
            Ok(serde_json::json!({ "ok": true, "text": text }))
        }
        "redesign" => {
            let image = required(body.image.as_deref(), "image")?;
            let images = studio
                .redesign(image, body.style.as_deref(), user_key)
                .await?;
            Ok(serde_json::json!({ "ok": true, "images": images }))
        }
        "remix" => {
            let image = required(body.image.as_deref(), "image")?;
            let instruction = required(body.instruction.as_deref(), "instruction")?;
            let out = studio.remix(image, instruction, user_key).await?;
            Ok(serde_json::json!({ "ok": true, "image": out }))
        }
        "split" => {
            let image = required(body.image.as_deref(), "image")?;
            let images = studio.split(image, user_key).await?;
            Ok(serde_json::json!({ "ok": true, "images": images }))
        }
        "mockup" => {
            let image = required(body.image.as_deref(), "image")?;
            let scene = required(body.scene.as_deref(), "scene")?;
            let out = studio.mockup(image, scene, user_key).await?;
            Ok(serde_json::json!({ "ok": true, "image": out }))
        }
        other => Err(ApiError::BadRequest(format!("unknown action: {other}"))),
    }
}

fn required<'a>(field: Option<&'a str>, name: &str) -> Result<&'a str, ApiError> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::BadRequest(format!("{name} is required"))),
    }
}

/// Replace both pools and persist them when a pool file is configured.
async fn keys_handler(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<KeysBody>,
) -> Result<Response, ApiError> {
    let free_count = body.free.len();
    let paid_count = body.paid.len();

    state
        .pool
        .set_pools(body.free.clone(), body.paid.clone())
        .await;

    if let Some(ref path) = state.pools_file {
        let file = PoolsFile {
            free: body.free,
            paid: body.paid,
        };
        pools::save_pools(path, &file).await?;
    }

    Ok((
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({ "ok": true, "free": free_count, "paid": paid_count }).to_string(),
    )
        .into_response())
}

/// Health endpoint: pool composition, uptime, request counters.
/// 200 when any credential (pooled or fallback) is available, 503 otherwise.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.metrics.started_at.elapsed().as_secs();
    let requests = state.metrics.requests_total.load(Ordering::Relaxed);
    let errors = state.metrics.errors_total.load(Ordering::Relaxed);

    let usable = state.pool.has_credentials().await || state.pool.fallback().is_some();
    let status_code = if usable {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    let body = serde_json::json!({
        "status": if usable { "healthy" } else { "no_credentials" },
        "pool": state.pool.health().await,
        "uptime_seconds": uptime,
        "requests_served": requests,
        "errors_total": errors,
    });

    (
        status_code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
