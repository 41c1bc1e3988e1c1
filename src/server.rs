//! HTTP server answering chart queries.
//!
//! Every endpoint takes `start` and `end` (ms) and, for series, an optional
//! `points` limit. Queries run synchronously against the shared store; each
//! request works on the rows it read, so no locking is needed.
//!
//! # Endpoints
//!
//! ```text
//! GET /health       GET /wind         GET /temperature   GET /temp_hum
//! GET /adc          GET /signal       GET /lag           GET /door
//! GET /pilots       GET /network      GET /traffic
//! ```

use crate::config::Config;
use crate::core::{compute_wind_stats, RangePoint, SeriesPoint, Timestamp, WindStats};
use crate::readers::{self, TempHumSeries, Traffic};
use crate::store::{Store, StoreError};
use axum::{
    extract::{Query, State},
    http::{HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// A store that can be shared between request handlers.
pub type SharedStore = Arc<dyn Store + Send + Sync>;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Store answering the queries
    pub store: SharedStore,
    /// Service settings (series length limits)
    pub settings: Config,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, store: SharedStore, settings: Config) -> Self {
        Self {
            port,
            store,
            settings,
        }
    }
}

/// Shared server state
struct ServerState {
    store: SharedStore,
    settings: Config,
}

/// Query parameters shared by all endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RangeQuery {
    pub start: Timestamp,
    pub end: Timestamp,
    pub points: Option<usize>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn check_range(query: &RangeQuery) -> Result<(), ApiError> {
    let error = if query.start > query.end {
        format!("start {} is after end {}", query.start, query.end)
    } else if query.end.checked_sub(query.start).is_none() {
        format!("range {}..{} is too long", query.start, query.end)
    } else {
        return Ok(());
    };
    Err((
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error,
            code: "INVALID_RANGE".to_string(),
        }),
    ))
}

fn store_error(e: StoreError) -> ApiError {
    tracing::error!("Store query failed: {}", e);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: e.to_string(),
            code: "STORE_UNAVAILABLE".to_string(),
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /wind
///
/// Answers `null` when the interval holds no wind data.
async fn wind(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Option<WindStats>> {
    check_range(&query)?;
    let points = state.settings.output_points(query.points);
    compute_wind_stats(state.store.as_ref(), query.start, query.end, points)
        .map(Json)
        .map_err(store_error)
}

async fn temperature(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<SeriesPoint>> {
    check_range(&query)?;
    let points = state.settings.output_points(query.points);
    readers::read_temperature(state.store.as_ref(), query.start, query.end, points)
        .map(Json)
        .map_err(store_error)
}

async fn temp_hum(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<TempHumSeries> {
    check_range(&query)?;
    let points = state.settings.output_points(query.points);
    readers::read_temp_hum(state.store.as_ref(), query.start, query.end, points)
        .map(Json)
        .map_err(store_error)
}

async fn adc(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<(u32, Vec<SeriesPoint>)>> {
    check_range(&query)?;
    let points = state.settings.output_points(query.points);
    readers::read_adc(state.store.as_ref(), query.start, query.end, points)
        .map(Json)
        .map_err(store_error)
}

async fn signal(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<SeriesPoint>> {
    check_range(&query)?;
    let points = state.settings.output_points(query.points);
    readers::read_signal_strength(state.store.as_ref(), query.start, query.end, points)
        .map(Json)
        .map_err(store_error)
}

async fn lag(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<RangePoint>> {
    check_range(&query)?;
    let points = state.settings.output_points(query.points);
    readers::read_lag(state.store.as_ref(), query.start, query.end, points)
        .map(Json)
        .map_err(store_error)
}

async fn door(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<(Timestamp, bool)>> {
    check_range(&query)?;
    readers::read_door(state.store.as_ref(), query.start, query.end)
        .map(Json)
        .map_err(store_error)
}

async fn pilots(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<(Timestamp, u32)>> {
    check_range(&query)?;
    readers::read_pilots(state.store.as_ref(), query.start, query.end)
        .map(Json)
        .map_err(store_error)
}

async fn network(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<BTreeMap<String, u64>> {
    check_range(&query)?;
    readers::read_network_types(state.store.as_ref(), query.start, query.end)
        .map(Json)
        .map_err(store_error)
}

async fn traffic(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Traffic> {
    check_range(&query)?;
    readers::read_traffic(state.store.as_ref(), query.start, query.end)
        .map(Json)
        .map_err(store_error)
}

/// Build the router without binding a socket.
pub fn router(config: &ServerConfig) -> Router {
    let state = Arc::new(ServerState {
        store: Arc::clone(&config.store),
        settings: config.settings.clone(),
    });

    Router::new()
        .route("/health", get(health))
        .route("/wind", get(wind))
        .route("/temperature", get(temperature))
        .route("/temp_hum", get(temp_hum))
        .route("/adc", get(adc))
        .route("/signal", get(signal))
        .route("/lag", get(lag))
        .route("/door", get(door))
        .route("/pilots", get(pilots))
        .route("/network", get(network))
        .route("/traffic", get(traffic))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(&config);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Station stats server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
