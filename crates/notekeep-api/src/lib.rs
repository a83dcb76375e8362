//! # notekeep-api
//!
//! HTTP gateway for notekeep: routes, shared state, error mapping and the
//! [`services::NoteService`] that owns the note lifecycle.

pub mod config;
pub mod handlers;
pub mod services;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use governor::{Quota, RateLimiter};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use uuid::Uuid;

use notekeep_core::defaults::{CORS_MAX_AGE_SECS, MAX_BODY_SIZE_BYTES};
use notekeep_core::{Error, ErrorKind, NoteView};

use config::ServerConfig;
use handlers::ErrorBody;
use services::NoteService;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Global rate limiter type (direct quota, single-user server).
type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub notes: NoteService,
    pub config: Arc<ServerConfig>,
    /// None when rate limiting is disabled.
    rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    pub fn new(notes: NoteService, config: ServerConfig) -> notekeep_core::Result<Self> {
        let rate_limiter = build_rate_limiter(&config)?;
        Ok(Self {
            notes,
            config: Arc::new(config),
            rate_limiter,
        })
    }
}

/// `RATE_LIMIT_REQUESTS` per `RATE_LIMIT_PERIOD_SECS`, all allowed as a burst.
fn build_rate_limiter(config: &ServerConfig) -> notekeep_core::Result<Option<Arc<GlobalRateLimiter>>> {
    if !config.rate_limit_enabled {
        return Ok(None);
    }
    let burst = NonZeroU32::new(config.rate_limit_requests)
        .ok_or_else(|| Error::Config("Rate limit must be non-zero".into()))?;
    let replenish = Duration::from_secs(config.rate_limit_period_secs) / burst.get();
    let quota = Quota::with_period(replenish)
        .ok_or_else(|| Error::Config("Rate limit period must be non-zero".into()))?
        .allow_burst(burst);
    Ok(Some(Arc::new(RateLimiter::direct(quota))))
}

// =============================================================================
// OPENAPI
// =============================================================================

#[derive(OpenApi)]
#[openapi(
    info(
        title = "notekeep API",
        description = "Notes with an optional file attachment each"
    ),
    paths(
        handlers::notes::list_notes,
        handlers::notes::get_note,
        handlers::notes::create_note,
        handlers::notes::update_note,
        handlers::notes::delete_note,
        handlers::notes::download_file,
    ),
    components(schemas(NoteView, ErrorBody)),
    tags(
        (name = "Notes", description = "Note CRUD and attachment download"),
        (name = "System", description = "Health checks and API description")
    )
)]
pub struct ApiDoc;

async fn openapi_yaml() -> Response {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => ([(header::CONTENT_TYPE, "application/yaml")], yaml).into_response(),
        Err(e) => ApiError::from(Error::Internal(format!("OpenAPI rendering failed: {}", e)))
            .into_response(),
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the application router with all middleware applied.
pub fn router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .route("/openapi.yaml", get(openapi_yaml))
        // The browser client calls /api/notes; /notes is the short form
        .merge(note_routes("/notes"))
        .merge(note_routes("/api/notes"))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

fn note_routes(prefix: &str) -> Router<AppState> {
    use handlers::notes::*;

    Router::new()
        .route(prefix, get(list_notes).post(create_note))
        .route(
            &format!("{}/:id", prefix),
            get(get_note).put(update_note).delete(delete_note),
        )
        .route(&format!("{}/:id/file", prefix), get(download_file))
}

// =============================================================================
// CORS
// =============================================================================

/// Parse configured origins, skipping ones that are not valid header values.
fn parse_allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect()
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let allow_origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(parse_allowed_origins(&config.allowed_origins))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_DISPOSITION])
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS))
}

// =============================================================================
// RATE LIMITING MIDDLEWARE
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<Response, (StatusCode, Json<ErrorBody>)> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!(subsystem = "api", "Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorBody {
                    error: "Too many requests. Please wait before retrying.".into(),
                    kind: "rate_limited".into(),
                    retryable: true,
                }),
            ));
        }
    }
    Ok(next.run(request).await)
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "storage": state.config.storage_backend.as_str(),
    }))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

/// Errors returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Service error, mapped by its [`ErrorKind`].
    Core(Error),
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Core(err)
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Core(err) => err.kind(),
            ApiError::BadRequest(_) => ErrorKind::InvalidArgument,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::PayloadTooLarge(_) => ErrorKind::PayloadTooLarge,
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match self {
            ApiError::Core(err) if kind == ErrorKind::StorageFailure => {
                // Details stay in the logs
                tracing::error!(subsystem = "api", error = %err, "Storage failure");
                "Storage failure, please try again".to_string()
            }
            ApiError::Core(err) => err.to_string(),
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::PayloadTooLarge(msg) => {
                msg
            }
        };

        let body = Json(ErrorBody {
            error: message,
            kind: kind.as_str().to_string(),
            retryable: kind == ErrorKind::StorageFailure,
        });

        (status_for(kind), body).into_response()
    }
}
