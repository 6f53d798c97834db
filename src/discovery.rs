//! Staged discovery runs.
//!
//! A run walks progress from 0 to 100 in steps of 10, pausing before each step.
//! Scored batches go out at 40 (first 4 candidates), 70 (first 7) and 100 (all,
//! with aggregate statistics). Pauses race against a cancellation token; a
//! cancelled run keeps whatever collection it last emitted.
//!
//! ```text
//! idle ──start──► running ──► completed
//!                    │   └───► failed     (lead source error)
//!                    └──cancel──► cancelled
//! ```
//!
//! Any terminal state may start a new run. Starting while `running` is `Busy`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::candidates::LeadSource;
use crate::errors::AppError;
use crate::fingerprint::ConfigFingerprint;
use crate::models::{AggregateStats, IcpConfig, ScoredLead};
use crate::scoring::qualify_all;
use crate::views::aggregate;

pub const PROGRESS_STEP: u8 = 10;

/// (progress percent, number of leading candidates delivered).
/// The last entry delivers the whole pool, whatever its size.
const PARTIAL_BATCHES: [(u8, usize); 2] = [(40, 4), (70, 7)];
const FINAL_PERCENT: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiscoveryState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl DiscoveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DiscoveryState::Completed | DiscoveryState::Cancelled | DiscoveryState::Failed
        )
    }
}

/// Events emitted by one run, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiscoveryEvent {
    #[serde(rename_all = "camelCase")]
    Progress {
        run_id: Uuid,
        percent: u8,
    },
    #[serde(rename_all = "camelCase")]
    PartialResults {
        run_id: Uuid,
        percent: u8,
        leads: Vec<ScoredLead>,
    },
    #[serde(rename_all = "camelCase")]
    FinalResults {
        run_id: Uuid,
        leads: Vec<ScoredLead>,
        stats: AggregateStats,
    },
    #[serde(rename_all = "camelCase")]
    Cancelled {
        run_id: Uuid,
        /// Last progress value emitted before the cancel, if any.
        percent: Option<u8>,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        run_id: Uuid,
        reason: String,
    },
}

impl DiscoveryEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            DiscoveryEvent::Progress { run_id, .. }
            | DiscoveryEvent::PartialResults { run_id, .. }
            | DiscoveryEvent::FinalResults { run_id, .. }
            | DiscoveryEvent::Cancelled { run_id, .. }
            | DiscoveryEvent::Failed { run_id, .. } => *run_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DiscoveryEvent::Progress { .. } => "progress",
            DiscoveryEvent::PartialResults { .. } => "partialResults",
            DiscoveryEvent::FinalResults { .. } => "finalResults",
            DiscoveryEvent::Cancelled { .. } => "cancelled",
            DiscoveryEvent::Failed { .. } => "failed",
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        leads: Vec<ScoredLead>,
        stats: AggregateStats,
    },
    Cancelled {
        last_percent: Option<u8>,
    },
    Failed(AppError),
}

/// Waits out one pacing interval. Returns false if cancelled first.
async fn pace(pacing: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if pacing.is_zero() {
        tokio::task::yield_now().await;
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(pacing) => true,
    }
}

/// Runs the staged sequence for one discovery, handing every event to `emit`
/// in order. `emit` is awaited before the next step starts.
pub async fn execute_run<F, Fut>(
    run_id: Uuid,
    icp: &IcpConfig,
    source: &mut dyn LeadSource,
    run_date: NaiveDate,
    pacing: Duration,
    cancel: &CancellationToken,
    mut emit: F,
) -> RunOutcome
where
    F: FnMut(DiscoveryEvent) -> Fut,
    Fut: Future<Output = ()>,
{
    let candidates = match source.discover(run_date) {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::error!("Discovery run {} failed to generate candidates: {}", run_id, e);
            emit(DiscoveryEvent::Failed {
                run_id,
                reason: e.to_string(),
            })
            .await;
            return RunOutcome::Failed(AppError::DiscoveryFailed(e.to_string()));
        }
    };
    tracing::debug!(
        "Discovery run {} generated {} candidates",
        run_id,
        candidates.len()
    );

    let mut last_percent = None;
    for percent in (0..=FINAL_PERCENT).step_by(PROGRESS_STEP as usize) {
        if !pace(pacing, cancel).await {
            return cancelled(run_id, last_percent, &mut emit).await;
        }

        emit(DiscoveryEvent::Progress { run_id, percent }).await;
        last_percent = Some(percent);

        // Cancels landing while progress is delivered also stop this step's batch.
        if cancel.is_cancelled() {
            return cancelled(run_id, last_percent, &mut emit).await;
        }

        if let Some(&(_, count)) = PARTIAL_BATCHES.iter().find(|(at, _)| *at == percent) {
            let batch = qualify_all(icp, &candidates[..count.min(candidates.len())]);
            tracing::info!(
                "Discovery run {} delivered {} leads at {}%",
                run_id,
                batch.len(),
                percent
            );
            emit(DiscoveryEvent::PartialResults {
                run_id,
                percent,
                leads: batch,
            })
            .await;
        } else if percent == FINAL_PERCENT {
            let leads = qualify_all(icp, &candidates);
            let stats = aggregate(&leads);
            tracing::info!(
                "Discovery run {} completed: {} leads, tier1={}, tier2={}, tier3={}, avg={}",
                run_id,
                stats.total,
                stats.tier1_count,
                stats.tier2_count,
                stats.tier3_count,
                stats.average_score
            );
            emit(DiscoveryEvent::FinalResults {
                run_id,
                leads: leads.clone(),
                stats: stats.clone(),
            })
            .await;
            return RunOutcome::Completed { leads, stats };
        }
    }

    // The loop always reaches FINAL_PERCENT.
    RunOutcome::Failed(AppError::InternalError(
        "discovery loop ended without final results".to_string(),
    ))
}

async fn cancelled<F, Fut>(run_id: Uuid, last_percent: Option<u8>, emit: &mut F) -> RunOutcome
where
    F: FnMut(DiscoveryEvent) -> Fut,
    Fut: Future<Output = ()>,
{
    tracing::info!(
        "Discovery run {} cancelled after {:?}% progress",
        run_id,
        last_percent
    );
    emit(DiscoveryEvent::Cancelled {
        run_id,
        percent: last_percent,
    })
    .await;
    RunOutcome::Cancelled { last_percent }
}

/// Observable state of the current (or most recent) run.
#[derive(Debug, Clone, Default)]
pub struct RunSnapshot {
    pub run_id: Option<Uuid>,
    pub state: DiscoveryState,
    pub progress: u8,
    pub leads: Vec<ScoredLead>,
    /// Present only once a run completes.
    pub stats: Option<AggregateStats>,
    /// ICP snapshot the collection was scored against.
    pub icp: Option<IcpConfig>,
    pub fingerprint: Option<ConfigFingerprint>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl RunSnapshot {
    fn apply(&mut self, event: &DiscoveryEvent) {
        if self.run_id != Some(event.run_id()) {
            return;
        }
        match event {
            DiscoveryEvent::Progress { percent, .. } => self.progress = *percent,
            DiscoveryEvent::PartialResults { leads, .. } => self.leads = leads.clone(),
            DiscoveryEvent::FinalResults { leads, stats, .. } => {
                self.leads = leads.clone();
                self.stats = Some(stats.clone());
                self.state = DiscoveryState::Completed;
            }
            DiscoveryEvent::Cancelled { .. } => self.state = DiscoveryState::Cancelled,
            DiscoveryEvent::Failed { reason, .. } => {
                self.state = DiscoveryState::Failed;
                self.error = Some(reason.clone());
            }
        }
        if self.state.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }

    /// Status of the run, with `icp_current` telling whether `current_icp` is
    /// still the snapshot its leads were scored against.
    pub fn status(&self, current_icp: &IcpConfig) -> DiscoveryStatus {
        DiscoveryStatus {
            run_id: self.run_id,
            state: self.state,
            progress: self.progress,
            lead_count: self.leads.len(),
            icp: self.icp.clone(),
            icp_current: self
                .fingerprint
                .as_ref()
                .map(|fingerprint| fingerprint.matches(current_icp)),
            fingerprint: self.fingerprint.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            error: self.error.clone(),
        }
    }
}

/// Compact run status, without the lead collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryStatus {
    pub run_id: Option<Uuid>,
    pub state: DiscoveryState,
    pub progress: u8,
    pub lead_count: usize,
    /// ICP snapshot the run scored against.
    pub icp: Option<IcpConfig>,
    pub icp_current: Option<bool>,
    pub fingerprint: Option<ConfigFingerprint>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Default)]
struct Inner {
    snapshot: RunSnapshot,
    cancel: Option<CancellationToken>,
}

/// Handle to a spawned run.
pub struct RunHandle {
    pub run_id: Uuid,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Waits for the run to reach a terminal state.
    pub async fn wait(self) -> Result<RunOutcome, AppError> {
        self.task
            .await
            .map_err(|e| AppError::InternalError(format!("discovery task panicked: {}", e)))
    }
}

/// Owns the single in-flight run and fans its events out to subscribers.
#[derive(Clone)]
pub struct DiscoveryOrchestrator {
    inner: Arc<RwLock<Inner>>,
    events: broadcast::Sender<DiscoveryEvent>,
    pacing: Duration,
}

impl DiscoveryOrchestrator {
    pub fn new(pacing: Duration, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            events,
            pacing,
        }
    }

    /// Receives every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> RunSnapshot {
        self.inner.read().await.snapshot.clone()
    }

    pub async fn state(&self) -> DiscoveryState {
        self.inner.read().await.snapshot.state
    }

    /// Starts a run against a snapshot of `icp`. Rejected with `Busy` while
    /// another run is in flight.
    pub async fn start(
        &self,
        icp: IcpConfig,
        mut source: Box<dyn LeadSource>,
    ) -> Result<RunHandle, AppError> {
        icp.validate()?;
        let fingerprint = ConfigFingerprint::of(&icp)?;
        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();

        {
            let mut inner = self.inner.write().await;
            if inner.snapshot.state == DiscoveryState::Running {
                let current = inner
                    .snapshot
                    .run_id
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                tracing::warn!("Rejected discovery request: run {} in flight", current);
                return Err(AppError::Busy(format!(
                    "discovery run {} is already running",
                    current
                )));
            }
            inner.snapshot = RunSnapshot {
                run_id: Some(run_id),
                state: DiscoveryState::Running,
                icp: Some(icp.clone()),
                fingerprint: Some(fingerprint),
                started_at: Some(Utc::now()),
                ..RunSnapshot::default()
            };
            inner.cancel = Some(cancel.clone());
        }

        tracing::info!("Discovery run {} started", run_id);

        let inner = self.inner.clone();
        let events = self.events.clone();
        let pacing = self.pacing;
        let run_date = Utc::now().date_naive();

        let task = tokio::spawn(async move {
            let outcome = execute_run(
                run_id,
                &icp,
                source.as_mut(),
                run_date,
                pacing,
                &cancel,
                |event| {
                    let inner = inner.clone();
                    let events = events.clone();
                    async move {
                        inner.write().await.snapshot.apply(&event);
                        // No receivers is fine; the snapshot is the source of truth.
                        let _ = events.send(event);
                    }
                },
            )
            .await;

            let mut guard = inner.write().await;
            if guard.snapshot.run_id == Some(run_id) {
                guard.cancel = None;
            }
            outcome
        });

        Ok(RunHandle { run_id, task })
    }

    /// Cancels the in-flight run. `Conflict` if nothing is running.
    pub async fn cancel(&self) -> Result<Uuid, AppError> {
        let inner = self.inner.read().await;
        match (&inner.snapshot.state, &inner.cancel, inner.snapshot.run_id) {
            (DiscoveryState::Running, Some(token), Some(run_id)) => {
                tracing::info!("Cancellation requested for discovery run {}", run_id);
                token.cancel();
                Ok(run_id)
            }
            _ => Err(AppError::Conflict(
                "no discovery run is in progress".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::{FixedSignals, SyntheticLeadSource};

    fn source() -> SyntheticLeadSource<FixedSignals> {
        SyntheticLeadSource::new(FixedSignals::default(), "Web Search")
    }

    #[tokio::test]
    async fn test_execute_run_event_sequence() {
        let mut events = Vec::new();
        let cancel = CancellationToken::new();
        let run_id = Uuid::new_v4();
        let mut src = source();

        let outcome = execute_run(
            run_id,
            &IcpConfig::default(),
            &mut src,
            Utc::now().date_naive(),
            Duration::ZERO,
            &cancel,
            |event| {
                events.push(event);
                std::future::ready(())
            },
        )
        .await;

        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
        assert_eq!(names.iter().filter(|n| **n == "progress").count(), 11);
        assert_eq!(names.last(), Some(&"finalResults"));
        assert!(matches!(outcome, RunOutcome::Completed { ref leads, .. } if leads.len() == 10));
        assert!(events.iter().all(|e| e.run_id() == run_id));
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_emits_nothing_but_cancelled() {
        let mut events = Vec::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut src = source();

        let outcome = execute_run(
            Uuid::new_v4(),
            &IcpConfig::default(),
            &mut src,
            Utc::now().date_naive(),
            Duration::ZERO,
            &cancel,
            |event| {
                events.push(event);
                std::future::ready(())
            },
        )
        .await;

        assert_eq!(outcome, RunOutcome::Cancelled { last_percent: None });
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "cancelled");
    }

    async fn run_cancelling_at(at: u8) -> (Vec<&'static str>, RunOutcome) {
        let mut names = Vec::new();
        let cancel = CancellationToken::new();
        let mut src = source();

        let outcome = execute_run(
            Uuid::new_v4(),
            &IcpConfig::default(),
            &mut src,
            Utc::now().date_naive(),
            Duration::ZERO,
            &cancel,
            |event| {
                if matches!(event, DiscoveryEvent::Progress { percent, .. } if percent == at) {
                    cancel.cancel();
                }
                names.push(event.name());
                std::future::ready(())
            },
        )
        .await;
        (names, outcome)
    }

    #[tokio::test]
    async fn test_cancel_during_batch_step_suppresses_partial_batch() {
        let (names, outcome) = run_cancelling_at(40).await;

        assert_eq!(outcome, RunOutcome::Cancelled { last_percent: Some(40) });
        assert_eq!(names[names.len() - 2..], ["progress", "cancelled"]);
        assert!(!names.contains(&"partialResults"));
    }

    #[tokio::test]
    async fn test_cancel_during_final_step_does_not_complete() {
        let (names, outcome) = run_cancelling_at(100).await;

        assert_eq!(outcome, RunOutcome::Cancelled { last_percent: Some(100) });
        assert_eq!(names.last(), Some(&"cancelled"));
        assert!(!names.contains(&"finalResults"));
        assert_eq!(names.iter().filter(|n| **n == "partialResults").count(), 2);
    }

    #[test]
    fn test_event_json_is_camel_case() {
        let run_id = Uuid::new_v4();
        let value = serde_json::to_value(DiscoveryEvent::PartialResults {
            run_id,
            percent: 40,
            leads: Vec::new(),
        })
        .unwrap();

        assert_eq!(value["type"], "partialResults");
        assert_eq!(value["runId"], run_id.to_string());
        assert_eq!(value["percent"], 40);
    }

    #[test]
    fn test_status_reports_whether_icp_is_current() {
        let icp = IcpConfig::default();
        let snapshot = RunSnapshot {
            run_id: Some(Uuid::new_v4()),
            state: DiscoveryState::Completed,
            icp: Some(icp.clone()),
            fingerprint: Some(ConfigFingerprint::of(&icp).unwrap()),
            ..RunSnapshot::default()
        };
        assert_eq!(snapshot.status(&icp).icp_current, Some(true));

        let mut edited = icp.clone();
        edited.geography.insert("France".to_string());
        assert_eq!(snapshot.status(&edited).icp_current, Some(false));

        assert_eq!(RunSnapshot::default().status(&icp).icp_current, None);
    }

    #[test]
    fn test_terminal_event_stamps_finish_time() {
        let run_id = Uuid::new_v4();
        let mut snapshot = RunSnapshot {
            run_id: Some(run_id),
            state: DiscoveryState::Running,
            ..RunSnapshot::default()
        };
        snapshot.apply(&DiscoveryEvent::Progress { run_id, percent: 10 });
        assert!(snapshot.finished_at.is_none());

        snapshot.apply(&DiscoveryEvent::Cancelled {
            run_id,
            percent: Some(10),
        });
        assert_eq!(snapshot.state, DiscoveryState::Cancelled);
        assert!(snapshot.finished_at.is_some());
    }

    #[test]
    fn test_snapshot_ignores_foreign_run_events() {
        let mut snapshot = RunSnapshot {
            run_id: Some(Uuid::new_v4()),
            state: DiscoveryState::Running,
            ..RunSnapshot::default()
        };
        snapshot.apply(&DiscoveryEvent::Progress {
            run_id: Uuid::new_v4(),
            percent: 50,
        });
        assert_eq!(snapshot.progress, 0);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!DiscoveryState::Idle.is_terminal());
        assert!(!DiscoveryState::Running.is_terminal());
        assert!(DiscoveryState::Completed.is_terminal());
        assert!(DiscoveryState::Cancelled.is_terminal());
        assert!(DiscoveryState::Failed.is_terminal());
    }
}
