//! Notification payloads emitted to the delivery transport.

use crate::{JobIdentity, SubjectId, Time};
use serde::{Deserialize, Serialize};

/// Progress advanced past a report threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressNotification {
    /// Job run uuid
    pub uuid: String,

    /// Subject the job is scoped to, if any
    pub subject: Option<SubjectId>,

    /// Progress ratio in `[0, 1]`, rounded to two decimals
    pub ratio: f64,

    /// Predicted completion instant
    pub estimated_finished_at: Time,
}

/// The job finished and its artifact is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionNotification {
    /// Job run uuid
    pub uuid: String,

    /// Subject the job is scoped to, if any
    pub subject: Option<SubjectId>,

    /// Where the produced artifact can be fetched
    pub url: String,
}

/// The job hit an unrecoverable error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureNotification {
    /// Job run uuid
    pub uuid: String,

    /// Opaque description of what went wrong
    pub reason: String,
}

/// A notification bound for the observer-facing transport.
///
/// Serializes with an `event` discriminator so consumers can route on the
/// event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Notification {
    /// Progress crossed a report threshold
    #[serde(rename = "export.progressed")]
    Progressed(ProgressNotification),

    /// Job completed, artifact available
    #[serde(rename = "export.completed")]
    Completed(CompletionNotification),

    /// Job failed
    #[serde(rename = "export.failed")]
    Failed(FailureNotification),
}

impl Notification {
    /// Build a progress notification, rounding the ratio to two decimals.
    pub fn progressed(id: &JobIdentity, ratio: f64, estimated_finished_at: Time) -> Self {
        Notification::Progressed(ProgressNotification {
            uuid: id.uuid.clone(),
            subject: id.subject.clone(),
            ratio: (ratio * 100.0).round() / 100.0,
            estimated_finished_at,
        })
    }

    /// Build a completion notification.
    pub fn completed(id: &JobIdentity, url: impl Into<String>) -> Self {
        Notification::Completed(CompletionNotification {
            uuid: id.uuid.clone(),
            subject: id.subject.clone(),
            url: url.into(),
        })
    }

    /// Build a failure notification.
    pub fn failed(id: &JobIdentity, reason: impl Into<String>) -> Self {
        Notification::Failed(FailureNotification {
            uuid: id.uuid.clone(),
            reason: reason.into(),
        })
    }

    /// Uuid of the job this notification concerns.
    pub fn uuid(&self) -> &str {
        match self {
            Notification::Progressed(n) => &n.uuid,
            Notification::Completed(n) => &n.uuid,
            Notification::Failed(n) => &n.uuid,
        }
    }
}
