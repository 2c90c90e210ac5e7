use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::contracts::{AllocError, IdAllocator, IdRange};
use crate::metrics::MetricsRegistry;

/// Application state shared across handlers.
pub struct AppState<A: IdAllocator> {
    pub allocator: Arc<A>,
    pub metrics: Arc<MetricsRegistry>,
}

impl<A: IdAllocator> AppState<A> {
    pub fn new(allocator: Arc<A>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { allocator, metrics }
    }
}

/// Query parameters for `POST /v1/id`.
///
/// Extracted from the raw pairs rather than a typed `Query` so repeated or
/// malformed parameters still reach our own 400 body. When `count` appears
/// more than once the first value wins.
#[derive(Debug, Default)]
pub struct AllocateQuery {
    pub count: Option<String>,
}

impl AllocateQuery {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let count = pairs
            .into_iter()
            .find(|(key, _)| key == "count")
            .map(|(_, value)| value);
        Self { count }
    }
}

/// Response for a single-id allocation.
#[derive(Debug, Serialize)]
pub struct SingleIdResponse {
    pub id: u64,
}

/// Response for a block allocation; `ids` is `[first, last]`, inclusive.
#[derive(Debug, Serialize)]
pub struct BlockIdResponse {
    pub ids: IdRange,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    Alloc(AllocError),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Alloc(AllocError::EmptyBlock) => (StatusCode::BAD_REQUEST, "EMPTY_BLOCK"),
            ApiError::Alloc(AllocError::Overflow { .. }) => {
                (StatusCode::CONFLICT, "ID_SPACE_EXHAUSTED")
            }
            ApiError::Alloc(AllocError::Store(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR")
            }
            ApiError::Alloc(AllocError::LockPoisoned(_)) | ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        }
    }

    fn record(&self, metrics: &MetricsRegistry) {
        match self {
            ApiError::Alloc(AllocError::Store(_)) => metrics.allocations.record_persist_error(),
            ApiError::Alloc(AllocError::EmptyBlock | AllocError::Overflow { .. }) => {
                metrics.allocations.record_rejection()
            }
            _ => {}
        }

        if self.status_and_code().0.is_server_error() {
            metrics.http.record_server_error();
        } else {
            metrics.http.record_bad_request();
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Alloc(e) => write!(f, "{}", e),
            ApiError::BadRequest(msg) | ApiError::Internal(msg) => f.write_str(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "Allocation request failed");
        }

        let error_response = ErrorResponse {
            error: self.to_string(),
            code: code.into(),
        };
        (status, Json(error_response)).into_response()
    }
}

impl From<AllocError> for ApiError {
    fn from(e: AllocError) -> Self {
        ApiError::Alloc(e)
    }
}

/// Parses the `count` query parameter.
///
/// An absent or empty value means a single-id request. Only plain ASCII
/// digits are accepted; signs and whitespace are rejected.
fn parse_count(raw: Option<&str>) -> Result<Option<u64>, ApiError> {
    match raw {
        None | Some("") => Ok(None),
        Some(raw) if !raw.bytes().all(|b| b.is_ascii_digit()) => Err(ApiError::BadRequest(
            format!("invalid count: expected a decimal integer, found {:?}", raw),
        )),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ApiError::BadRequest(format!("invalid count: {}", e))),
    }
}

/// Runs an allocator call on the blocking pool.
///
/// The allocator holds a mutex across `fsync`; keeping that off the async
/// workers lets other requests make progress. Once spawned the call runs to
/// completion even if the client goes away.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, AllocError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("allocation task failed: {}", e)))?
        .map_err(ApiError::from)
}

fn elapsed_us(started: Instant) -> u64 {
    started.elapsed().as_micros() as u64
}

/// POST /v1/id
/// POST /v1/id?count=N
/// Allocates one id, or a contiguous block of `count` ids.
pub async fn allocate_ids<A: IdAllocator + 'static>(
    State(state): State<Arc<AppState<A>>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    state.metrics.http.record_request();

    let query = AllocateQuery::from_pairs(pairs);

    let result = allocate(&state, query.count.as_deref()).await;
    if let Err(ref e) = result {
        e.record(&state.metrics);
    }
    result
}

async fn allocate<A: IdAllocator + 'static>(
    state: &AppState<A>,
    raw_count: Option<&str>,
) -> Result<Response, ApiError> {
    let count = parse_count(raw_count)?;
    let allocator = Arc::clone(&state.allocator);
    let started = Instant::now();

    match count {
        None => {
            let id = run_blocking(move || allocator.allocate_one()).await?;
            state.metrics.allocations.record_single(elapsed_us(started));
            Ok(Json(SingleIdResponse { id }).into_response())
        }
        Some(count) => {
            let ids = run_blocking(move || allocator.allocate_block(count)).await?;
            state
                .metrics
                .allocations
                .record_block(ids, elapsed_us(started));
            Ok(Json(BlockIdResponse { ids }).into_response())
        }
    }
}

/// GET /health
/// Liveness check; answers as long as the server is responsive.
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy"
    }))
}

/// Response for readiness endpoint.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health/ready
/// Ready when the allocator lock can be taken and the counter read.
pub async fn health_ready<A: IdAllocator + 'static>(
    State(state): State<Arc<AppState<A>>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let allocator = Arc::clone(&state.allocator);
    match run_blocking(move || allocator.current()).await {
        Ok(current_id) => Ok(Json(ReadinessResponse {
            status: "ready".into(),
            current_id: Some(current_id),
            error: None,
        })),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready".into(),
                current_id: None,
                error: Some(e.to_string()),
            }),
        )),
    }
}

/// Response for stats endpoint.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_secs: f64,
    pub current_id: Option<u64>,
    pub allocations: AllocationStats,
    pub requests: RequestStats,
}

#[derive(Debug, Serialize)]
pub struct AllocationStats {
    pub single_total: u64,
    pub block_total: u64,
    pub ids_issued_total: u64,
    pub persist_errors_total: u64,
    pub rejected_total: u64,
    pub rate_per_sec: f64,
    pub avg_latency_us: f64,
}

#[derive(Debug, Serialize)]
pub struct RequestStats {
    pub total: u64,
    pub bad_requests_total: u64,
    pub server_errors_total: u64,
}

fn safe_rate(count: u64, duration_secs: f64) -> f64 {
    if duration_secs > 0.0 {
        count as f64 / duration_secs
    } else {
        0.0
    }
}

/// GET /stats
/// Server statistics.
pub async fn get_stats<A: IdAllocator + 'static>(
    State(state): State<Arc<AppState<A>>>,
) -> impl IntoResponse {
    let allocator = Arc::clone(&state.allocator);
    let current_id = run_blocking(move || allocator.current()).await.ok();

    let metrics = &state.metrics;
    let uptime_secs = metrics.uptime_secs();
    let allocations = &metrics.allocations;
    let single_total = allocations.single_total.load(Ordering::Relaxed);
    let block_total = allocations.block_total.load(Ordering::Relaxed);

    Json(StatsResponse {
        uptime_secs,
        current_id,
        allocations: AllocationStats {
            single_total,
            block_total,
            ids_issued_total: allocations.ids_issued_total.load(Ordering::Relaxed),
            persist_errors_total: allocations.persist_errors_total.load(Ordering::Relaxed),
            rejected_total: allocations.rejected_total.load(Ordering::Relaxed),
            rate_per_sec: safe_rate(single_total + block_total, uptime_secs),
            avg_latency_us: allocations.latency_us.snapshot().mean(),
        },
        requests: RequestStats {
            total: metrics.http.requests_total.load(Ordering::Relaxed),
            bad_requests_total: metrics.http.bad_requests_total.load(Ordering::Relaxed),
            server_errors_total: metrics.http.server_errors_total.load(Ordering::Relaxed),
        },
    })
}

/// GET /metrics
/// Prometheus text exposition.
pub async fn metrics<A: IdAllocator + 'static>(
    State(state): State<Arc<AppState<A>>>,
) -> impl IntoResponse {
    let allocator = Arc::clone(&state.allocator);
    let current_id = run_blocking(move || allocator.current()).await.ok();

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.format_prometheus(current_id),
    )
}
