//! HTTP front end: `POST /predict` with a multipart `file` field.

use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde_json::json;

use crate::classifier::{Classifier, ClassifierError, ClassifierInfo, PredictionResult};

/// Name of the multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "file";
/// Default cap on request bodies.
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[derive(Clone)]
struct AppState {
    classifier: Arc<Classifier>,
}

/// Errors a request can end in, each mapped onto a status code and a JSON `error` body.
#[derive(Debug)]
pub enum ApiError {
    /// No `file` field, or a multipart body that could not be read
    InvalidRequest,
    /// The body exceeded the configured limit
    PayloadTooLarge,
    /// The classifier rejected the upload or failed on it
    Classification(ClassifierError),
    /// Temporary storage or the blocking pool failed
    Internal(String),
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        ApiError::Classification(err)
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        warn!("Rejected upload: {}", rejection.body_text());
        ApiError::InvalidRequest
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            warn!("Upload exceeds the body limit: {}", err);
            ApiError::PayloadTooLarge
        } else {
            warn!("Malformed multipart body: {}", err);
            ApiError::InvalidRequest
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidRequest => (StatusCode::BAD_REQUEST, "Invalid request".to_string()),
            ApiError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_string()),
            ApiError::Classification(err) => {
                if err.is_input_error() {
                    warn!("Classification rejected upload: {}", err);
                } else {
                    error!("Classification failed: {}", err);
                }
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Builds the application router around a shared classifier.
pub fn router(classifier: Arc<Classifier>, body_limit: usize) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .route("/info", get(info_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(AppState { classifier })
        .route("/health", get(health_check))
}

/// Binds the listener and serves until Ctrl-C.
pub async fn serve(classifier: Arc<Classifier>, config: ServerConfig) -> anyhow::Result<()> {
    let app = router(classifier, config.body_limit);
    let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn predict_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            upload = Some(field.bytes().await?);
            break;
        }
    }
    let bytes = upload.ok_or(ApiError::InvalidRequest)?;

    let classifier = Arc::clone(&state.classifier);
    let result = tokio::task::spawn_blocking(move || -> Result<PredictionResult, ApiError> {
        // Unique per request; removed when `file` is dropped.
        let mut file = tempfile::Builder::new()
            .prefix("florascope-upload-")
            .tempfile()
            .map_err(|e| ApiError::Internal(format!("Failed to create temporary file: {}", e)))?;
        file.write_all(&bytes)
            .and_then(|_| file.flush())
            .map_err(|e| ApiError::Internal(format!("Failed to store upload: {}", e)))?;
        Ok(classifier.classify_path(file.path())?)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Classification task failed: {}", e)))??;

    info!(
        "Predicted flower: {} ({:.2}% confidence)",
        result.class,
        result.confidence * 100.0
    );
    Ok(Json(result))
}

async fn info_handler(State(state): State<AppState>) -> Json<ClassifierInfo> {
    Json(state.classifier.info())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}
