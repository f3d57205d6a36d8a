//! Completion time estimation.
//!
//! Owns the start/end lifecycle of a tracked job and turns noisy, sparsely
//! sampled progress ratios into a stable predicted completion instant. The
//! smoothing state is store-backed so the estimate survives across calls,
//! processes, and replicas.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use exprog_core::{JobIdentity, Time};
use exprog_storage::{Result, TtlStore};

/// Store key prefix for job start instants.
pub(crate) const STARTED_AT_PREFIX: &str = "export_started_at";

/// Store key prefix for smoothing state.
pub(crate) const ETA_STATE_PREFIX: &str = "export_eta_state";

/// Lifetime of timing and smoothing state. Abandoned jobs expire out of the
/// store after this long; it is the sole reclamation mechanism for failure
/// paths that never call `end`.
const STATE_TTL_SECS: u64 = 3600;

/// Weight given to the newest raw sample when blending.
const BLEND_ALPHA: f64 = 0.40;

/// Progress ratio from which smoothing is bypassed so the displayed ETA
/// cannot lag behind an almost-finished job.
const NEAR_END_RATIO: f64 = 0.98;

/// Raw remaining time below which the raw signal is trusted outright.
const SNAP_REMAINING_SECS: f64 = 8.0;

/// A decayed previous estimate under this bound, paired with a fresh raw
/// estimate over [`STALE_RAW_SECS`], contradicts the old trend; re-anchor
/// instead of blending toward a stale near-zero value.
const STALE_PREV_SECS: f64 = 1.0;
const STALE_RAW_SECS: f64 = 10.0;

/// Division guard for near-zero progress.
const PROGRESS_EPSILON: f64 = 1e-6;

/// Upper bound on any remaining estimate. Progress near zero would
/// otherwise project days out, which carries no information for state that
/// expires after an hour.
const MAX_REMAINING_SECS: f64 = 86_400.0;

/// ETA window returned when the store is unreachable.
const FALLBACK_SECS: i64 = 300;

/// Smoothing accumulator persisted between samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EtaState {
    /// Smoothed remaining time at `last_update`
    smoothed_remaining_secs: f64,
    /// When the state was last written
    last_update: Time,
    /// Whether a first sample has anchored this session
    seeded: bool,
}

/// Owns job timing and produces smoothed completion estimates.
#[derive(Clone)]
pub struct ProgressEstimator {
    store: Arc<dyn TtlStore>,
}

impl ProgressEstimator {
    /// Create an estimator over the given store.
    pub fn new(store: Arc<dyn TtlStore>) -> Self {
        Self { store }
    }

    /// Record the start of a job run.
    ///
    /// Clears any smoothing state left over from an earlier run with the
    /// same identity; calling twice just resets the clock.
    pub async fn start(&self, id: &JobIdentity) -> Result<()> {
        let now = Utc::now();
        self.store
            .put(
                &id.store_key(STARTED_AT_PREFIX),
                now.timestamp().to_string(),
                STATE_TTL_SECS,
            )
            .await?;
        self.store.forget(&id.store_key(ETA_STATE_PREFIX)).await?;
        debug!(job = %id, started_at = %now, "export started");
        Ok(())
    }

    /// When the job started.
    ///
    /// A missing or unreadable record is repaired by starting the clock
    /// now; missing timing state is a recovery case, not an error.
    pub async fn started_at(&self, id: &JobIdentity) -> Result<Time> {
        let raw = self.store.get(&id.store_key(STARTED_AT_PREFIX)).await?;
        let recorded = raw
            .and_then(|value| value.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        match recorded {
            Some(at) => Ok(at),
            None => {
                self.start(id).await?;
                Ok(Utc::now())
            }
        }
    }

    /// Drop timing and smoothing state for the job. Idempotent.
    pub async fn end(&self, id: &JobIdentity) -> Result<()> {
        self.store.forget(&id.store_key(STARTED_AT_PREFIX)).await?;
        self.store.forget(&id.store_key(ETA_STATE_PREFIX)).await?;
        debug!(job = %id, "export ended");
        Ok(())
    }

    /// Predicted completion instant for the given progress ratio.
    ///
    /// Accepts ratios in `[0, 1]` or percentage-style values above 1;
    /// out-of-range input is normalized, never rejected. The ETA is
    /// advisory: when the store is unreachable this degrades to a fixed
    /// five-minute window instead of failing the caller.
    pub async fn estimate(&self, id: &JobIdentity, progress: f64) -> Time {
        let now = Utc::now();
        match self.try_estimate(id, progress, now).await {
            Ok(eta) => eta,
            Err(err) => {
                warn!(job = %id, error = %err, "estimate degraded to fallback window");
                now + Duration::seconds(FALLBACK_SECS)
            }
        }
    }

    async fn try_estimate(&self, id: &JobIdentity, progress: f64, now: Time) -> Result<Time> {
        let progress = normalize_progress(progress);
        if progress >= 1.0 {
            return Ok(now);
        }

        let started_at = self.started_at(id).await?;
        let elapsed = seconds_between(started_at, now);
        let total = elapsed / progress.max(PROGRESS_EPSILON);
        let remaining_raw = (total - elapsed).clamp(0.0, MAX_REMAINING_SECS);

        let smoothed = match self.load_state(id).await? {
            None => remaining_raw,
            Some(state) => {
                // Age the previous estimate by the wall clock that passed
                // since the last sample.
                let dt = seconds_between(state.last_update, now);
                let prev = (state.smoothed_remaining_secs - dt).max(0.0);
                if should_reseed(progress, remaining_raw, prev) {
                    remaining_raw
                } else {
                    (1.0 - BLEND_ALPHA) * prev + BLEND_ALPHA * remaining_raw
                }
            }
        };

        self.save_state(
            id,
            EtaState {
                smoothed_remaining_secs: smoothed,
                last_update: now,
                seeded: true,
            },
        )
        .await?;

        debug!(
            job = %id,
            progress,
            elapsed,
            remaining_raw,
            smoothed,
            "estimate sample"
        );
        Ok(now + Duration::seconds(smoothed.round() as i64))
    }

    async fn load_state(&self, id: &JobIdentity) -> Result<Option<EtaState>> {
        let raw = self.store.get(&id.store_key(ETA_STATE_PREFIX)).await?;
        match raw {
            None => Ok(None),
            Some(json) => match serde_json::from_str(&json) {
                Ok(state) => Ok(Some(state)),
                Err(err) => {
                    // Undecodable state is discarded; the next sample
                    // reseeds from the raw estimate.
                    warn!(job = %id, error = %err, "dropping undecodable eta state");
                    Ok(None)
                }
            },
        }
    }

    async fn save_state(&self, id: &JobIdentity, state: EtaState) -> Result<()> {
        let json = serde_json::to_string(&state)?;
        self.store
            .put(&id.store_key(ETA_STATE_PREFIX), json, STATE_TTL_SECS)
            .await
    }
}

/// Map raw caller input onto a ratio in `[0, 1]`. Values above 1 are read
/// as percentages.
fn normalize_progress(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let ratio = if raw > 1.0 { raw / 100.0 } else { raw };
    ratio.clamp(0.0, 1.0)
}

/// Discard smoothing history and snap to the raw estimate?
fn should_reseed(progress: f64, remaining_raw: f64, decayed_prev: f64) -> bool {
    progress >= NEAR_END_RATIO
        || remaining_raw <= SNAP_REMAINING_SECS
        || (decayed_prev < STALE_PREV_SECS && remaining_raw > STALE_RAW_SECS)
}

fn seconds_between(earlier: Time, later: Time) -> f64 {
    (later - earlier).num_milliseconds().max(0) as f64 / 1000.0
}
