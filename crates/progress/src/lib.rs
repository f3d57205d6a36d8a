//! Progress tracking and completion-time estimation for batch export jobs.
//!
//! Three cooperating services, all stateless aside from what they read and
//! write through an injected [`exprog_storage::TtlStore`]:
//!
//! - [`ProgressCounter`] counts units of work completed per job.
//! - [`ProgressEstimator`] owns the job clock and smooths noisy progress
//!   samples into a stable predicted completion instant.
//! - [`ProgressReporter`] is the seam to the job engine: it samples the
//!   counter, asks the estimator for an ETA, and pushes notifications
//!   through an injected [`NotificationSink`] when progress crosses a
//!   report threshold.

#![warn(missing_docs)]

pub mod counter;
pub mod estimator;
pub mod reporter;

pub use counter::ProgressCounter;
pub use estimator::ProgressEstimator;
pub use reporter::{ChannelSink, NotificationSink, ProgressReport, ProgressReporter};
