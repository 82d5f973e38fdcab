//! One collection run: collect → geocode → reconcile → report.
//!
//! The collector does no locking of its own. Callers guarantee that at most
//! one run targets a given store at a time.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pharmadir_core::Candidate;
use pharmadir_store::{DuckStore, StoreError};
use rand::Rng;
use serde::Serialize;
use tracing::{error, info};

use crate::geocode::Geocoder;
use crate::sources::{RecordSource, collect_from};

/// Where a run's candidates end up.
pub trait CandidateSink: Send + Sync {
    /// Persist the whole batch atomically; returns the number processed.
    fn persist(&self, candidates: &[Candidate]) -> Result<usize, StoreError>;
}

impl CandidateSink for Mutex<DuckStore> {
    fn persist(&self, candidates: &[Candidate]) -> Result<usize, StoreError> {
        let mut store = self.lock().map_err(|_| StoreError::LockPoisoned)?;
        store.reconcile(candidates)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Idle,
    Collecting,
    Geocoding,
    Reconciling,
    Done,
    Failed,
}

/// Summary of a finished run, success or not.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub phase: RunPhase,
    pub pharmacies_found: usize,
    pub pharmacies_saved: usize,
    pub duration_seconds: f64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Randomized pause between successive sources. Zero disables it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    pub const fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Pause for a uniformly random duration in `[min, max]`. Bounds given in
    /// the wrong order are swapped.
    pub fn between(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    fn pick(&self) -> Duration {
        if self.max.is_zero() {
            return Duration::ZERO;
        }
        let ms = rand::thread_rng().gen_range(self.min.as_millis()..=self.max.as_millis());
        Duration::from_millis(ms as u64)
    }

    async fn pause(&self) {
        let delay = self.pick();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

pub struct Collector {
    sources: Vec<Box<dyn RecordSource>>,
    geocoder: Geocoder,
    pacing: Pacing,
}

impl Collector {
    pub fn new(sources: Vec<Box<dyn RecordSource>>, geocoder: Geocoder) -> Self {
        Self {
            sources,
            geocoder,
            pacing: Pacing::none(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Run every phase once and report. Never panics on source, geocoder, or
    /// store failure; a store failure yields a failed report with nothing saved.
    ///
    /// The reconcile transaction runs on the blocking pool.
    pub async fn run(&self, sink: Arc<dyn CandidateSink>) -> RunReport {
        let start = Instant::now();
        let mut phase = RunPhase::Idle;
        info!(sources = self.sources.len(), "collection run starting");

        advance(&mut phase, RunPhase::Collecting);
        let mut candidates = self.collect().await;

        advance(&mut phase, RunPhase::Geocoding);
        let geocoded = self.geocode(&mut candidates).await;
        info!(geocoded, total = candidates.len(), "geocoding finished");

        advance(&mut phase, RunPhase::Reconciling);
        let found = candidates.len();
        let outcome = tokio::task::spawn_blocking(move || sink.persist(&candidates))
            .await
            .unwrap_or_else(|e| Err(StoreError::Other(format!("reconcile task failed: {e}"))));
        let duration_seconds = (start.elapsed().as_secs_f64() * 100.0).round() / 100.0;

        match outcome {
            Ok(saved) => {
                advance(&mut phase, RunPhase::Done);
                info!(found, saved, duration_seconds, "collection run finished");
                RunReport {
                    success: true,
                    phase,
                    pharmacies_found: found,
                    pharmacies_saved: saved,
                    duration_seconds,
                    message: format!("Collection finished: {saved} pharmacies saved."),
                    error: None,
                }
            }
            Err(e) => {
                advance(&mut phase, RunPhase::Failed);
                error!(found, error = %e, "collection run failed");
                RunReport {
                    success: false,
                    phase,
                    pharmacies_found: found,
                    pharmacies_saved: 0,
                    duration_seconds,
                    message: "Collection failed; no changes were saved.".to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn collect(&self) -> Vec<Candidate> {
        let mut all = Vec::new();
        for (i, source) in self.sources.iter().enumerate() {
            if i > 0 {
                self.pacing.pause().await;
            }
            all.extend(collect_from(source.as_ref()).await);
        }
        info!(count = all.len(), "candidates collected");
        all
    }

    /// Resolve coordinates for candidates that lack them. Returns how many resolved.
    async fn geocode(&self, candidates: &mut [Candidate]) -> usize {
        let mut resolved = 0;
        for candidate in candidates.iter_mut().filter(|c| !c.has_coordinates()) {
            if let Some(coords) = self.geocoder.resolve(&candidate.address).await {
                candidate.set_coordinates(coords);
                resolved += 1;
            }
        }
        resolved
    }
}

fn advance(phase: &mut RunPhase, next: RunPhase) {
    info!(from = ?*phase, to = ?next, "run phase");
    *phase = next;
}
