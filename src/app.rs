use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::analysis::{self, AnalysisConfig, AnalysisStats};
use crate::classifier::ClassificationMode;
use crate::config::ServerConfig;
use crate::downloader::{self, ExportFormat};
use crate::error::{AnalysisError, ExportError, KeywordError, LoadError};
use crate::keywords::KeywordStore;
use crate::loader;
use crate::session::{Session, SessionStore};

pub struct AppState {
    pub sessions: SessionStore,
    pub keywords: KeywordStore,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig, keywords: KeywordStore) -> Self {
        AppState {
            sessions: SessionStore::new(config.session_ttl),
            keywords,
            config,
        }
    }
}

/// Request failures, rendered as `{"error": ...}`
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(msg) => {
                warn!("rejected request: {}", msg);
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal(msg) => {
                error!("request failed: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<LoadError> for ApiError {
    fn from(e: LoadError) -> Self {
        ApiError::BadRequest(format!("failed to process file: {}", e))
    }
}

impl From<KeywordError> for ApiError {
    fn from(e: KeywordError) -> Self {
        match e {
            KeywordError::Empty | KeywordError::Duplicate(_) => ApiError::BadRequest(e.to_string()),
            KeywordError::Io { .. } | KeywordError::Format { .. } => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::UnsupportedFormat(_) => ApiError::BadRequest(e.to_string()),
            ExportError::Xlsx(_) => ApiError::Internal(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    timestamp: String,
    modules: Vec<String>,
    statuses: Vec<String>,
    total_records: usize,
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    timestamp: Option<String>,
    #[serde(default)]
    modules: Vec<String>,
    #[serde(default)]
    statuses: Vec<String>,
    classification_mode: Option<String>,
    keywords: Option<Vec<String>>,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    success: bool,
    stats: AnalysisStats,
    selected_modules: Vec<String>,
    selected_statuses: Vec<String>,
    classification_mode: ClassificationMode,
    filtered_records: usize,
}

#[derive(Deserialize)]
struct KeywordRequest {
    keyword: String,
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(serve_index))
        .route("/upload", post(upload_file))
        .route("/analyze", post(analyze_data))
        .route("/export", post(export_stats))
        .route(
            "/keywords",
            get(list_keywords).post(add_keyword).delete(remove_keyword),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let keywords = KeywordStore::open(&config.keywords_file)?;

    let listener = config.bind()?;
    listener.set_nonblocking(true)?;
    let listener = TcpListener::from_std(listener)?;
    let addr = listener.local_addr()?;
    if addr.port() != config.port {
        warn!("port {} is taken, using {}", config.port, addr.port());
    }

    let state = Arc::new(AppState::new(config, keywords));
    if state.config.session_ttl.is_some() {
        tokio::spawn(evict_expired_sessions(state.clone()));
    }

    info!("Listening on http://{}", addr);
    info!("Keyword list: {}", state.keywords.path().display());

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn evict_expired_sessions(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let evicted = state.sessions.evict_expired();
        if evicted > 0 {
            info!("evicted {} expired sessions", evicted);
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            upload = Some((filename, bytes));
        }
    }

    let (filename, bytes) = match upload {
        Some((filename, _)) if filename.is_empty() => {
            return Err(ApiError::BadRequest("no file selected".to_string()));
        }
        Some(upload) => upload,
        None => return Err(ApiError::BadRequest("no file selected".to_string())),
    };

    let table = loader::load_bytes(&filename, &bytes)?;
    let columns: Vec<_> = table.columns().collect();

    let session = Session::new(&filename, table);
    let modules = session.modules.clone();
    let statuses = session.statuses.clone();
    let total_records = session.table.len();
    let token = state.sessions.create(session);
    info!(
        "upload {} as {}: {} records, columns {:?}",
        filename, token, total_records, columns
    );

    Ok(Json(UploadResponse {
        success: true,
        timestamp: token,
        modules,
        statuses,
        total_records,
    }))
}

/// Looks up the session and turns the request into a resolved config.
fn resolve(
    state: &AppState,
    request: AnalyzeRequest,
) -> Result<(Arc<Session>, AnalysisConfig), ApiError> {
    let token = request
        .timestamp
        .ok_or_else(|| ApiError::BadRequest("missing session timestamp".to_string()))?;
    let session = state.sessions.get(&token)?;

    let classification_mode = match request.classification_mode.as_deref() {
        Some(mode) => mode.parse::<ClassificationMode>()?,
        None => ClassificationMode::default(),
    };

    let keywords = match request.keywords {
        Some(keywords) if !keywords.is_empty() => keywords,
        _ if classification_mode == ClassificationMode::Keyword => state.keywords.list(),
        _ => Vec::new(),
    };

    let config = AnalysisConfig {
        selected_modules: request.modules,
        selected_statuses: request.statuses,
        classification_mode,
        keywords,
    }
    .resolve_defaults(&session.modules, &session.statuses);

    Ok((session, config))
}

async fn analyze_data(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let (session, config) = resolve(&state, request)?;
    let result = analysis::analyze(&session.table, &config);
    info!(
        "analyzed {}: {} of {} records ({} mode)",
        session.filename,
        result.filtered_records,
        session.table.len(),
        config.classification_mode
    );

    Ok(Json(AnalyzeResponse {
        success: true,
        stats: result.stats,
        selected_modules: config.selected_modules,
        selected_statuses: config.selected_statuses,
        classification_mode: config.classification_mode,
        filtered_records: result.filtered_records,
    }))
}

async fn export_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Response, ApiError> {
    let format = query.format.as_deref().unwrap_or("xlsx").parse::<ExportFormat>()?;
    let (session, config) = resolve(&state, request)?;
    let result = analysis::analyze(&session.table, &config);
    let body = downloader::export(&result.stats, format)?;

    let disposition = format!(
        "attachment; filename=\"defect_stats.{}\"",
        format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn list_keywords(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "keywords": state.keywords.list() }))
}

async fn add_keyword(
    State(state): State<Arc<AppState>>,
    Json(request): Json<KeywordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let keywords = state.keywords.add(&request.keyword)?;
    Ok(Json(serde_json::json!({ "success": true, "keywords": keywords })))
}

/// `DELETE /keywords?keyword=...`; a query value can carry any character,
/// `/` included.
async fn remove_keyword(
    State(state): State<Arc<AppState>>,
    Query(request): Query<KeywordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.keywords.remove(&request.keyword)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "removed": removed,
        "keywords": state.keywords.list(),
    })))
}
