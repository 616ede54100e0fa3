#![forbid(unsafe_code)]

//! Axum backend in front of the submission handler.
//!
//! Submissions are processed one at a time: a request waits for the previous
//! classify, expand and dispatch cycle to finish before it starts its own.
//! An optional `WWW_ROOT` bundle is served for everything outside `/api`.

use std::{
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use clap::Parser;
use mime_guess::MimeGuess;
use musicapi_tools::config::{RuntimeOverrides, resolve_runtime_config};
use musicapi_tools::dispatcher::DownloadOptions;
use musicapi_tools::queue::AudioFormat;
use musicapi_tools::submission::{Submission, SubmissionHandler, SubmissionReport};
use musicapi_tools::warning::get_warning;
use musicapi_tools::{Error, logging};
use serde::{Deserialize, Serialize};
use tokio::{fs::File, signal, sync::Mutex};
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "backend", about = "HTTP API for music submissions")]
struct BackendArgs {
    /// Alternative `.env` file.
    #[arg(long)]
    env_file: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Static front-end bundle.
    #[arg(long)]
    www_root: Option<PathBuf>,
    /// Local catalog file; takes precedence over the remote DB_* settings.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

impl BackendArgs {
    fn into_overrides(self) -> RuntimeOverrides {
        RuntimeOverrides {
            env_path: self.env_file,
            db_path: self.db_path,
            listen_host: self.host,
            listen_port: self.port,
            www_root: self.www_root,
            ..RuntimeOverrides::default()
        }
    }
}

#[derive(Clone)]
struct AppState {
    handler: Arc<SubmissionHandler>,
    /// Serializes submissions.
    submissions: Arc<Mutex<()>>,
    defaults: Arc<DownloadOptions>,
    www_root: Option<Arc<PathBuf>>,
}

impl AppState {
    fn new(
        handler: SubmissionHandler,
        defaults: DownloadOptions,
        www_root: Option<PathBuf>,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            submissions: Arc::new(Mutex::new(())),
            defaults: Arc::new(defaults),
            www_root: www_root.map(Arc::new),
        }
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if err.is_upstream_error() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubmissionRequest {
    url: String,
    auto_download: bool,
    format: Option<String>,
    quality: Option<String>,
    add_without_download: bool,
    confirm_warning: bool,
}

#[derive(Debug, Serialize)]
struct SubmissionResponse {
    message: String,
    report: SubmissionReport,
}

#[derive(Debug, Serialize)]
struct WarningResponse {
    warning: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct UrlQuery {
    #[serde(default)]
    url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = BackendArgs::parse();
    let config = resolve_runtime_config(args.into_overrides()).context("loading configuration")?;

    let handler = SubmissionHandler::connect(&config)
        .await
        .context("initializing submission handler")?;
    let host: IpAddr = config
        .listen_host
        .parse()
        .with_context(|| format!("invalid listen host {}", config.listen_host))?;
    let state = AppState::new(handler, config.default_options(), config.www_root.clone());

    let addr = SocketAddr::new(host, config.listen_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!(%addr, "API server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/submissions", post(submit))
        .route("/api/warnings", get(warning))
        .route("/api/artists/auto-download", get(auto_download_artists))
        .route("/api/albums", delete(remove_album))
        .fallback(static_fallback)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(error = %err, "failed to install Ctrl+C handler");
    }
}

async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<SubmissionRequest>,
) -> ApiResult<Response> {
    let url = payload.url.trim().to_owned();
    if url.is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }

    if let Some(warning) = get_warning(&url)
        && !payload.confirm_warning
    {
        let body = serde_json::json!({
            "error": "confirmation required",
            "warning": warning,
        });
        return Ok((StatusCode::CONFLICT, Json(body)).into_response());
    }

    let format = match payload.format.as_deref() {
        Some(value) => value
            .parse::<AudioFormat>()
            .map_err(ApiError::bad_request)?,
        None => state.defaults.format,
    };
    let quality = payload
        .quality
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| state.defaults.quality.clone());
    let submission = Submission {
        url,
        auto_download: payload.auto_download,
        options: DownloadOptions {
            quality,
            format,
            add_without_download: payload.add_without_download,
        },
    };

    let _guard = state.submissions.lock().await;
    match state.handler.handle(&submission).await {
        Ok(report) => {
            info!(url = %submission.url, kind = report.kind.as_str(), "submission accepted");
            let response = SubmissionResponse {
                message: format!("Successfully added: {}", submission.url),
                report,
            };
            Ok(Json(response).into_response())
        }
        Err(err) => {
            warn!(url = %submission.url, error = %err, "submission failed");
            Err(err.into())
        }
    }
}

async fn warning(Query(query): Query<UrlQuery>) -> Json<WarningResponse> {
    Json(WarningResponse {
        warning: get_warning(&query.url),
    })
}

async fn auto_download_artists(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let artists = state
        .handler
        .dispatcher()
        .catalog()
        .get_auto_download_artists()
        .await?;
    Ok(Json(artists))
}

async fn remove_album(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<StatusCode> {
    let url = query.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }
    state.handler.dispatcher().catalog().remove_album(url).await?;
    info!(url, "album removed from catalog");
    Ok(StatusCode::NO_CONTENT)
}

async fn static_fallback(State(state): State<AppState>, req: Request<Body>) -> Response {
    let path = req.uri().path();
    if path == "/api" || path.starts_with("/api/") {
        return ApiError::not_found("endpoint not found").into_response();
    }
    let Some(root) = state.www_root.as_deref() else {
        return ApiError::not_found("no front-end bundle configured").into_response();
    };

    match serve_www_path(root, path).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn serve_www_path(root: &Path, request_path: &str) -> ApiResult<Response> {
    let target = resolve_www_path(root, request_path)?;
    match tokio::fs::metadata(&target).await {
        Ok(meta) if meta.is_dir() => stream_file(root.join("index.html")).await,
        Ok(_) => stream_file(target).await,
        Err(_) if should_fallback_to_index(request_path) => {
            stream_file(root.join("index.html")).await
        }
        Err(_) => Err(ApiError::not_found("file not found")),
    }
}

fn resolve_www_path(root: &Path, request_path: &str) -> ApiResult<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(root.join("index.html"));
    }
    let candidate = Path::new(trimmed);
    if candidate
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(ApiError::not_found("file not found"));
    }
    Ok(root.join(candidate))
}

/// Extensionless paths are front-end routes and get the index page.
fn should_fallback_to_index(request_path: &str) -> bool {
    Path::new(request_path.trim_start_matches('/'))
        .extension()
        .is_none()
}

async fn stream_file(path: PathBuf) -> ApiResult<Response> {
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    if let Some(mime) = MimeGuess::from_path(&path).first()
        && let Ok(value) = mime.to_string().parse()
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}
