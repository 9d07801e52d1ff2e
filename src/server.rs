//! Local post server.
//!
//! Serves the post index over HTTP for the browser editor and search UI.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/api/posts` | All posts, newest first |
//! | `GET`    | `/api/search?q=<term>` | Posts matching title, tag or category |
//! | `POST`   | `/api/save-post` | Write `{filename, content}` to the posts directory |
//! | `DELETE` | `/api/posts/{filename}` | Remove a post file |
//! | `GET`    | `/posts/{filename}` | Raw post HTML |
//! | `GET`    | `/health` | Health check (returns version) |
//!
//! Anything else is served from `[server].static_dir` when configured.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid filename: ../x" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a UI served from
//! another origin can call the API.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::config::Config;
use crate::models::PostSummary;
use crate::posts::{IndexError, IndexResult, PostIndex};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    index: PostIndex,
}

/// Starts the post server on `[server].bind`.
///
/// Creates the posts directory if needed and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let index = PostIndex::new(&config.posts.dir);
    index.ensure_dir()?;

    let app = build_router(index, config.server.static_dir.as_deref());

    let bind_addr = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, posts = %config.posts.dir.display(), "post server listening");
    println!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(index: PostIndex, static_dir: Option<&std::path::Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/api/posts", get(handle_list_posts))
        .route("/api/posts/{filename}", delete(handle_delete_post))
        .route("/api/search", get(handle_search))
        .route("/api/save-post", post(handle_save_post))
        .route("/posts/{filename}", get(handle_raw_post))
        .route("/health", get(handle_health))
        .with_state(AppState { index });

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(cors)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        match &err {
            IndexError::InvalidFilename(_) => bad_request(err.to_string()),
            IndexError::NotFound(_) => not_found(err.to_string()),
            IndexError::Io { .. } => {
                error!(error = %err, "request failed");
                internal(err.to_string())
            }
        }
    }
}

/// Run filesystem work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> IndexResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| internal(e.to_string()))?
        .map_err(AppError::from)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/posts ============

async fn handle_list_posts(
    State(state): State<AppState>,
) -> Result<Json<Vec<PostSummary>>, AppError> {
    let posts = blocking(move || state.index.list()).await?;
    Ok(Json(posts))
}

// ============ GET /api/search ============

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

/// Returns an empty list when nothing matches; a missing `q` is a 400.
async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<PostSummary>>, AppError> {
    let term = params
        .q
        .ok_or_else(|| bad_request("query parameter q is required"))?;
    let posts = blocking(move || state.index.search(&term)).await?;
    Ok(Json(posts))
}

// ============ POST /api/save-post ============

#[derive(Deserialize)]
struct SavePostRequest {
    filename: String,
    content: String,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

async fn handle_save_post(
    State(state): State<AppState>,
    Json(req): Json<SavePostRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let filename = req.filename.clone();
    blocking(move || state.index.save(&req.filename, &req.content)).await?;
    info!(file = %filename, "saved post");
    Ok(Json(SuccessResponse { success: true }))
}

// ============ DELETE /api/posts/{filename} ============

async fn handle_delete_post(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let name = filename.clone();
    blocking(move || state.index.delete(&name)).await?;
    info!(file = %filename, "deleted post");
    Ok(Json(SuccessResponse { success: true }))
}

// ============ GET /posts/{filename} ============

async fn handle_raw_post(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let html = blocking(move || state.index.read(&filename)).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response())
}
