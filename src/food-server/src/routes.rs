use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderName, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use food_serve::Classify;
use log::{error, info};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Multipart field carrying the uploaded image
const FILE_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<dyn Classify>,

    /// Root holding `static/` and `view/index.html`
    pub app_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub result: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("No '{}' field in upload", FILE_FIELD)]
    MissingFile,

    #[error("Classification failure: {0}")]
    Classification(#[from] food_serve::Error),

    #[error("Inference worker failed: {0}")]
    Worker(#[from] JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);

        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
        ]);

    Router::new()
        .route("/", get(homepage))
        .route("/analyze", post(analyze))
        .nest_service("/static", ServeDir::new(state.app_dir.join("static")))
        // uploads are taken whole, whatever their size
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .with_state(state)
}

/// Read from disk on every request so edits show up without a restart.
async fn homepage(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let html = tokio::fs::read_to_string(state.app_dir.join("view").join("index.html")).await?;

    Ok(Html(html))
}

async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let data = read_file_field(&mut multipart).await?;

    // the session run is CPU bound, keep it off the async workers
    let classifier = Arc::clone(&state.classifier);
    let classification =
        tokio::task::spawn_blocking(move || classifier.classify_from_raw(&data)).await??;

    info!(
        "Classified {} ({:.3}) in {} msec",
        classification.tag, classification.probability, classification.time_session_run
    );

    Ok(Json(AnalyzeResponse {
        result: classification.tag,
    }))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?.to_vec());
        }
    }

    Err(AppError::MissingFile)
}
