use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Json, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use formfill::{form_fields, lopdf, sample, FillError, FillOptions, FormField, FormFiller};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

/// Upload limit used by [`app`]
pub const DEFAULT_MAX_UPLOAD: usize = 25 * 1024 * 1024;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Standard error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message describing what went wrong
    pub error: String,
    /// Required keys the submitted data lacked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<Vec<String>>,
}

/// Response for the field listing endpoint
#[derive(Debug, Serialize)]
pub struct FieldsResponse {
    pub fields: Vec<FormField>,
    pub count: usize,
}

/// Application-specific error types for the API
#[derive(Debug, Error)]
pub enum AppError {
    /// The request itself was unusable (missing parts, unreadable PDF)
    #[error("{0}")]
    BadRequest(String),
    /// Multipart decoding failed, including oversized uploads
    #[error("Failed to read multipart field: {0}")]
    Multipart(#[from] MultipartError),
    /// Validation or pipeline failure
    #[error(transparent)]
    Fill(#[from] FillError),
    /// A background task panicked or was cancelled
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Multipart(e) => e.status(),
            AppError::Fill(e) if e.is_input_error() => StatusCode::BAD_REQUEST,
            AppError::Fill(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        } else {
            debug!(error = %self, "request rejected");
        }

        let missing_fields = match &self {
            AppError::Fill(e) => e.missing_fields().map(<[String]>::to_vec),
            _ => None,
        };
        let error_response = ErrorResponse {
            error: self.to_string(),
            missing_fields,
        };

        (status, Json(error_response)).into_response()
    }
}

/// Shared, read-only state of the service
#[derive(Clone)]
pub struct AppState {
    filler: Arc<FormFiller>,
}

impl AppState {
    pub fn new(filler: FormFiller) -> Self {
        Self {
            filler: Arc::new(filler),
        }
    }
}

/// Build the application router with the default template and upload limit
pub fn app() -> Router {
    app_with(FormFiller::default(), DEFAULT_MAX_UPLOAD)
}

/// Build the application router around `filler`
pub fn app_with(filler: FormFiller, max_upload: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health_check))
        .route("/api/template", get(template))
        .route("/api/sample", get(sample_form))
        .route("/api/fields", post(list_fields))
        .route("/api/fill", post(fill_form))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState::new(filler))
}

/// Upload form
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint for monitoring and load balancing
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "formfill API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// The template the service fills with
pub async fn template(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.filler.template().clone())
}

/// A fillable form laid out for the active template
pub async fn sample_form(State(state): State<AppState>) -> Result<Response, AppError> {
    let filler = state.filler.clone();
    let bytes = tokio::task::spawn_blocking(move || sample::form_for_template(filler.template()))
        .await
        .map_err(|e| AppError::Internal(format!("Sample generation task failed: {e}")))??;

    Ok(pdf_response(bytes, "sample_form.pdf"))
}

/// List the form fields of an uploaded PDF
pub async fn list_fields(multipart: Multipart) -> Result<Response, AppError> {
    let upload = Upload::read(multipart).await?;
    let pdf = upload.require_file()?;

    let fields = tokio::task::spawn_blocking(move || -> Result<Vec<FormField>, AppError> {
        let doc = lopdf::Document::load_mem(&pdf)
            .map_err(|e| AppError::BadRequest(format!("Failed to parse PDF: {e}")))?;
        form_fields(&doc).map_err(|e| AppError::BadRequest(format!("Failed to read form: {e}")))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Field listing task failed: {e}")))??;

    let count = fields.len();
    Ok((StatusCode::OK, Json(FieldsResponse { fields, count })).into_response())
}

/// Fill the uploaded PDF with the uploaded JSON data and return it flattened
pub async fn fill_form(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = Upload::read(multipart).await?;
    let pdf = upload.require_file()?;
    let data = upload
        .data
        .ok_or_else(|| AppError::BadRequest("No form data provided in upload".to_string()))?;

    // validation errors never reach the pipeline
    let input = state.filler.prepare(&data)?;

    let filler = state.filler.clone();
    let filled = tokio::task::spawn_blocking(move || {
        filler.fill(&pdf, &input, FillOptions::default())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Fill task failed: {e}")))??;

    info!(
        written = filled.written.len(),
        ignored = filled.ignored.len(),
        size = filled.bytes.len(),
        "form filled"
    );

    let mut response = pdf_response(filled.bytes, &filled.file_name);
    response
        .headers_mut()
        .insert("x-fields-written", filled.written.len().into());
    Ok(response)
}

fn pdf_response(bytes: Vec<u8>, file_name: &str) -> Response {
    (
        StatusCode::OK,
        [
            ("Content-Type", "application/pdf".to_string()),
            (
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", file_name.replace('"', "")),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// The parts of a multipart upload the service understands
#[derive(Debug, Default)]
struct Upload {
    file: Option<Bytes>,
    data: Option<String>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut upload = Upload::default();

        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().unwrap_or("").to_string();

            match field_name.as_str() {
                "file" => upload.file = Some(field.bytes().await?),
                "data" => upload.data = Some(field.text().await?),
                _ => debug!(field = %field_name, "ignoring multipart field"),
            }
        }

        Ok(upload)
    }

    fn require_file(&self) -> Result<Bytes, AppError> {
        match &self.file {
            Some(file) if !file.is_empty() => Ok(file.clone()),
            _ => Err(AppError::BadRequest("No file provided in upload".to_string())),
        }
    }
}
