use crate::candidates::LeadSource;
use crate::config::Config;
use crate::discovery::{DiscoveryEvent, DiscoveryOrchestrator, DiscoveryState, DiscoveryStatus};
use crate::errors::{AppError, ResultExt};
use crate::export::{build_export, ExportBundle};
use crate::fingerprint::ConfigFingerprint;
use crate::models::{AggregateStats, IcpConfig, RawLead, ScoredLead};
use crate::scoring::score_raw_leads;
use crate::views::{aggregate, query, SortKey, TierFilter};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

/// Builds a fresh lead source for each discovery run.
pub type LeadSourceFactory = Arc<dyn Fn() -> Box<dyn LeadSource> + Send + Sync>;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Active ICP. Runs snapshot it at start; edits never touch a run in flight.
    pub icp: RwLock<IcpConfig>,
    /// Owner of the single discovery run.
    pub orchestrator: DiscoveryOrchestrator,
    pub lead_source: LeadSourceFactory,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let factory_config = config.clone();
        Self::with_lead_source(config, Arc::new(move || factory_config.lead_source()))
    }

    pub fn with_lead_source(config: Config, lead_source: LeadSourceFactory) -> Self {
        let orchestrator =
            DiscoveryOrchestrator::new(config.step_delay(), config.event_channel_capacity);
        Self {
            config,
            icp: RwLock::new(IcpConfig::default()),
            orchestrator,
            lead_source,
        }
    }
}

/// API routes. Rate limiting and body limits are layered on in `main`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/icp", get(get_icp).put(update_icp))
        .route(
            "/api/v1/discovery",
            get(discovery_status).post(start_discovery),
        )
        .route("/api/v1/discovery/cancel", post(cancel_discovery))
        .route("/api/v1/discovery/events", get(discovery_events))
        .route("/api/v1/leads", get(list_leads))
        .route("/api/v1/leads/stats", get(lead_stats))
        .route("/api/v1/leads/export", get(export_leads))
        .route("/api/v1/leads/score", post(score_leads))
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-lead-qualifier",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/icp
pub async fn get_icp(State(state): State<Arc<AppState>>) -> Json<IcpConfig> {
    Json(state.icp.read().await.clone())
}

/// PUT /api/v1/icp
///
/// Replaces the active ICP. Inverted bands are rejected with 400; the previous
/// configuration stays in place. Leads already scored keep their old scores
/// until the next discovery run.
pub async fn update_icp(
    State(state): State<Arc<AppState>>,
    Json(icp): Json<IcpConfig>,
) -> Result<Json<IcpConfig>, AppError> {
    let icp = icp.validated()?;
    tracing::info!(
        "ICP updated: {} industries, {} regions, size {}..={}, revenue >= {}",
        icp.industries.len(),
        icp.geography.len(),
        icp.company_size.min,
        icp.company_size.max,
        icp.revenue.min
    );
    *state.icp.write().await = icp.clone();
    Ok(Json(icp))
}

/// POST /api/v1/discovery
///
/// Starts a run against the current ICP and returns immediately. Progress is
/// observable via the status and events endpoints.
pub async fn start_discovery(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let icp = state.icp.read().await.clone();
    let handle = state
        .orchestrator
        .start(icp, (state.lead_source)())
        .await
        .context("starting discovery")?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "runId": handle.run_id,
            "state": DiscoveryState::Running,
        })),
    ))
}

/// GET /api/v1/discovery
pub async fn discovery_status(State(state): State<Arc<AppState>>) -> Json<DiscoveryStatus> {
    let snapshot = state.orchestrator.snapshot().await;
    let icp = state.icp.read().await;
    Json(snapshot.status(&icp))
}

/// POST /api/v1/discovery/cancel
pub async fn cancel_discovery(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let run_id = state.orchestrator.cancel().await?;
    Ok(Json(json!({
        "runId": run_id,
        "cancelRequested": true,
    })))
}

/// GET /api/v1/discovery/events
///
/// Server-Sent Events, one per discovery event, named after the event type.
pub async fn discovery_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = BroadcastStream::new(state.orchestrator.subscribe()).filter_map(|message| {
        match message {
            Ok(event) => Some(sse_event(&event)),
            Err(lagged) => {
                tracing::warn!("Discovery event subscriber lagged: {}", lagged);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn sse_event(event: &DiscoveryEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.name()).json_data(event)
}

#[derive(Debug, Deserialize)]
pub struct LeadQueryParams {
    /// "all", "1", "2" or "3". Defaults to "all".
    pub tier: Option<String>,
    /// "score", "revenue" or "employees". Defaults to "score".
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadListResponse {
    pub run_id: Option<Uuid>,
    pub state: DiscoveryState,
    pub count: usize,
    pub leads: Vec<ScoredLead>,
}

/// GET /api/v1/leads?tier=&sort=
///
/// Filters then sorts the current collection. Unknown sort keys keep the
/// collection order.
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeadQueryParams>,
) -> Result<Json<LeadListResponse>, AppError> {
    let filter = params
        .tier
        .as_deref()
        .map(str::parse::<TierFilter>)
        .transpose()?
        .unwrap_or_default();
    let key = SortKey::parse(params.sort.as_deref().unwrap_or("score"));

    let snapshot = state.orchestrator.snapshot().await;
    let leads = query(&snapshot.leads, filter, key);

    Ok(Json(LeadListResponse {
        run_id: snapshot.run_id,
        state: snapshot.state,
        count: leads.len(),
        leads,
    }))
}

/// GET /api/v1/leads/stats
///
/// Statistics of the last completed run; all-zero until one completes.
pub async fn lead_stats(State(state): State<Arc<AppState>>) -> Json<AggregateStats> {
    Json(state.orchestrator.snapshot().await.stats.unwrap_or_default())
}

/// GET /api/v1/leads/export
pub async fn export_leads(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ExportBundle>, AppError> {
    let snapshot = state.orchestrator.snapshot().await;
    let stats = snapshot.stats.ok_or_else(|| {
        AppError::NotFound("no completed discovery run to export".to_string())
    })?;

    let bundle = build_export(&snapshot.leads, &stats, Utc::now().date_naive());
    tracing::info!(
        "Export bundle built: {} leads across {} tiers",
        stats.total,
        bundle.groups.len()
    );
    Ok(Json(bundle))
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub fingerprint: ConfigFingerprint,
    pub leads: Vec<ScoredLead>,
    pub stats: AggregateStats,
}

/// POST /api/v1/leads/score
///
/// Scores caller-supplied leads against the current ICP without touching the
/// discovery collection.
pub async fn score_leads(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<Vec<RawLead>>,
) -> Result<Json<ScoreResponse>, AppError> {
    let icp = state.icp.read().await.clone();
    let fingerprint = ConfigFingerprint::of(&icp).context("fingerprinting ICP")?;
    let leads = score_raw_leads(&icp, raw, Utc::now().date_naive());
    let stats = aggregate(&leads);

    tracing::info!(
        "Scored {} ad-hoc leads (avg score {})",
        leads.len(),
        stats.average_score
    );

    Ok(Json(ScoreResponse {
        fingerprint,
        leads,
        stats,
    }))
}
