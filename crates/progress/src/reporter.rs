//! Report seam between the export engine and the notification transport.
//!
//! The reporter samples the counter against a caller-supplied total, asks
//! the estimator for an ETA, and pushes a notification through the injected
//! sink whenever progress has advanced past the report threshold since the
//! last emission.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use exprog_core::{JobIdentity, Notification, Time};
use exprog_storage::{Result, TtlStore};

use crate::{ProgressCounter, ProgressEstimator};

/// Minimum ratio advance before another notification goes out. Bounds
/// notification volume to at most one per percent of progress.
const REPORT_STEP: f64 = 0.01;

/// Delivery seam for notifications.
///
/// Implementations broadcast, queue, or otherwise ship the value; the
/// reporter treats delivery as best-effort and never fails a job over it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    async fn send(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Sink that forwards notifications onto a tokio channel.
pub struct ChannelSink {
    tx: mpsc::Sender<Notification>,
}

impl ChannelSink {
    /// Wrap a channel sender.
    pub fn new(tx: mpsc::Sender<Notification>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn send(&self, notification: Notification) -> anyhow::Result<()> {
        self.tx
            .send(notification)
            .await
            .map_err(|_| anyhow::anyhow!("notification channel closed"))
    }
}

/// One progress sample: the computed ratio and its predicted completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    /// Fraction of work completed, in `[0, 1]`
    pub ratio: f64,

    /// Predicted completion instant
    pub eta: Time,
}

/// Engine-facing progress API.
///
/// One reporter serves any number of concurrent job identities; the only
/// in-process state is the last-reported ratio per identity, which backs
/// the emission threshold.
pub struct ProgressReporter {
    counter: ProgressCounter,
    estimator: ProgressEstimator,
    sink: Arc<dyn NotificationSink>,
    last_reported: Mutex<HashMap<JobIdentity, f64>>,
}

impl ProgressReporter {
    /// Wire a reporter over a store and a notification sink.
    pub fn new(store: Arc<dyn TtlStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            counter: ProgressCounter::new(store.clone()),
            estimator: ProgressEstimator::new(store),
            sink,
            last_reported: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying counter.
    pub fn counter(&self) -> &ProgressCounter {
        &self.counter
    }

    /// The underlying estimator.
    pub fn estimator(&self) -> &ProgressEstimator {
        &self.estimator
    }

    /// A job run began: start its clock.
    pub async fn on_job_start(&self, id: &JobIdentity) -> Result<()> {
        self.estimator.start(id).await
    }

    /// One unit of work finished.
    pub async fn on_unit_completed(&self, id: &JobIdentity) -> Result<()> {
        self.counter.increment(id).await
    }

    /// The job ended: drop counter, timing, and smoothing state. Idempotent.
    pub async fn on_job_end(&self, id: &JobIdentity) -> Result<()> {
        self.counter.clear(id).await?;
        self.estimator.end(id).await?;
        self.last_reported.lock().await.remove(id);
        Ok(())
    }

    /// The job finished successfully and produced an artifact at `url`.
    pub async fn on_job_completed(&self, id: &JobIdentity, url: &str) -> Result<()> {
        self.on_job_end(id).await?;
        self.emit(Notification::completed(id, url)).await;
        Ok(())
    }

    /// The job hit an unrecoverable error: clear state, then notify.
    ///
    /// The reason is passed through opaquely; classifying job-domain errors
    /// is the engine's business.
    pub async fn on_job_failed(&self, id: &JobIdentity, reason: &str) -> Result<()> {
        self.on_job_end(id).await?;
        self.emit(Notification::failed(id, reason)).await;
        Ok(())
    }

    /// Sample progress against `total` and notify if the report threshold
    /// was crossed since the last emission.
    ///
    /// A non-positive total reads as zero progress. Counter failures
    /// surface to the caller; the ETA itself degrades internally and never
    /// fails the sample.
    pub async fn report_progress(&self, id: &JobIdentity, total: i64) -> Result<ProgressReport> {
        let count = self.counter.get(id).await?;
        let ratio = if total > 0 {
            count as f64 / total as f64
        } else {
            0.0
        };
        let eta = self.estimator.estimate(id, ratio).await;

        let crossed = {
            let mut last = self.last_reported.lock().await;
            let prev = last.get(id).copied().unwrap_or(0.0);
            let crossed = ratio - prev >= REPORT_STEP;
            if crossed {
                last.insert(id.clone(), ratio);
            }
            crossed
        };
        if crossed {
            self.emit(Notification::progressed(id, ratio, eta)).await;
        } else {
            debug!(job = %id, ratio, "progress below report threshold");
        }

        Ok(ProgressReport { ratio, eta })
    }

    async fn emit(&self, notification: Notification) {
        if let Err(err) = self.sink.send(notification).await {
            warn!(error = %err, "notification dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exprog_core::SubjectId;
    use exprog_storage::MemoryStore;

    /// Sink that records everything it is handed.
    #[derive(Default)]
    struct CollectingSink {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationSink for CollectingSink {
        async fn send(&self, notification: Notification) -> anyhow::Result<()> {
            self.sent.lock().await.push(notification);
            Ok(())
        }
    }

    fn fixture() -> (Arc<CollectingSink>, ProgressReporter, JobIdentity) {
        let sink = Arc::new(CollectingSink::default());
        let reporter = ProgressReporter::new(Arc::new(MemoryStore::new()), sink.clone());
        (sink, reporter, JobIdentity::with_subject("job-1", 7))
    }

    async fn complete_units(reporter: &ProgressReporter, id: &JobIdentity, units: usize) {
        for _ in 0..units {
            reporter.on_unit_completed(id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn ratio_is_count_over_total() {
        let (_sink, reporter, id) = fixture();
        reporter.on_job_start(&id).await.unwrap();
        complete_units(&reporter, &id, 25).await;

        let report = reporter.report_progress(&id, 100).await.unwrap();
        assert_eq!(report.ratio, 0.25);
    }

    #[tokio::test]
    async fn non_positive_total_reads_as_zero() {
        let (sink, reporter, id) = fixture();
        reporter.on_job_start(&id).await.unwrap();
        complete_units(&reporter, &id, 5).await;

        let report = reporter.report_progress(&id, 0).await.unwrap();
        assert_eq!(report.ratio, 0.0);
        assert!(sink.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn threshold_gates_notifications() {
        let (sink, reporter, id) = fixture();
        reporter.on_job_start(&id).await.unwrap();

        // 0.5% done: below the 1% step, nothing goes out.
        complete_units(&reporter, &id, 5).await;
        reporter.report_progress(&id, 1000).await.unwrap();
        assert!(sink.sent.lock().await.is_empty());

        // 1% done: the step is crossed exactly once.
        complete_units(&reporter, &id, 5).await;
        reporter.report_progress(&id, 1000).await.unwrap();
        reporter.report_progress(&id, 1000).await.unwrap();
        let sent = sink.sent.lock().await;
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Notification::Progressed(n) => {
                assert_eq!(n.uuid, "job-1");
                assert_eq!(n.subject, Some(SubjectId::Id(7)));
                assert_eq!(n.ratio, 0.01);
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn each_crossed_step_emits_once() {
        let (sink, reporter, id) = fixture();
        reporter.on_job_start(&id).await.unwrap();

        for _ in 0..4 {
            complete_units(&reporter, &id, 10).await;
            reporter.report_progress(&id, 100).await.unwrap();
        }
        assert_eq!(sink.sent.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn completion_clears_state_and_notifies() {
        let (sink, reporter, id) = fixture();
        reporter.on_job_start(&id).await.unwrap();
        complete_units(&reporter, &id, 10).await;

        reporter
            .on_job_completed(&id, "https://example.test/export.xlsx")
            .await
            .unwrap();

        assert_eq!(reporter.counter().get(&id).await.unwrap(), 0);
        let sent = sink.sent.lock().await;
        match sent.last() {
            Some(Notification::Completed(n)) => {
                assert_eq!(n.url, "https://example.test/export.xlsx");
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn failure_clears_state_and_notifies() {
        let (sink, reporter, id) = fixture();
        reporter.on_job_start(&id).await.unwrap();
        complete_units(&reporter, &id, 10).await;
        reporter.report_progress(&id, 20).await.unwrap();

        reporter.on_job_failed(&id, "disk full").await.unwrap();

        assert_eq!(reporter.counter().get(&id).await.unwrap(), 0);
        let sent = sink.sent.lock().await;
        match sent.last() {
            Some(Notification::Failed(n)) => {
                assert_eq!(n.uuid, "job-1");
                assert_eq!(n.reason, "disk full");
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn job_end_resets_the_report_threshold() {
        let (sink, reporter, id) = fixture();
        reporter.on_job_start(&id).await.unwrap();
        complete_units(&reporter, &id, 50).await;
        reporter.report_progress(&id, 100).await.unwrap();
        assert_eq!(sink.sent.lock().await.len(), 1);

        reporter.on_job_end(&id).await.unwrap();

        // A fresh run with the same identity reports from zero again.
        reporter.on_job_start(&id).await.unwrap();
        complete_units(&reporter, &id, 2).await;
        reporter.report_progress(&id, 100).await.unwrap();
        let sent = sink.sent.lock().await;
        assert_eq!(sent.len(), 2);
        match sent.last() {
            Some(Notification::Progressed(n)) => assert_eq!(n.ratio, 0.02),
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn sink_failure_never_fails_the_sample() {
        struct ClosedSink;

        #[async_trait]
        impl NotificationSink for ClosedSink {
            async fn send(&self, _notification: Notification) -> anyhow::Result<()> {
                Err(anyhow::anyhow!("transport down"))
            }
        }

        let reporter = ProgressReporter::new(Arc::new(MemoryStore::new()), Arc::new(ClosedSink));
        let id = JobIdentity::new("job-1");
        reporter.on_job_start(&id).await.unwrap();
        complete_units(&reporter, &id, 50).await;

        let report = reporter.report_progress(&id, 100).await.unwrap();
        assert_eq!(report.ratio, 0.5);
    }

    #[tokio::test]
    async fn channel_sink_forwards_notifications() {
        let (tx, mut rx) = mpsc::channel(8);
        let reporter = ProgressReporter::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ChannelSink::new(tx)),
        );
        let id = JobIdentity::new("job-1");
        reporter.on_job_start(&id).await.unwrap();
        complete_units(&reporter, &id, 10).await;
        reporter.report_progress(&id, 10).await.unwrap();

        match rx.recv().await {
            Some(Notification::Progressed(n)) => assert_eq!(n.ratio, 1.0),
            other => panic!("unexpected notification: {:?}", other),
        }
    }
}
