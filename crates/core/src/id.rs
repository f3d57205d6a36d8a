//! Identity of a tracked export job.

use serde::{Deserialize, Serialize};

/// Sentinel written into store keys when a job has no subject.
///
/// Deployed key layouts depend on this literal; do not change it.
pub const NO_SUBJECT: &str = "no_model";

/// Disambiguates multiple trackable jobs sharing one uuid, e.g. per-model
/// sub-exports of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectId {
    /// Numeric subject key (typically a record primary key)
    Id(i64),
    /// Named subject key
    Name(String),
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubjectId::Id(id) => write!(f, "{}", id),
            SubjectId::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for SubjectId {
    fn from(id: i64) -> Self {
        SubjectId::Id(id)
    }
}

impl From<&str> for SubjectId {
    fn from(name: &str) -> Self {
        SubjectId::Name(name.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(name: String) -> Self {
        SubjectId::Name(name)
    }
}

/// Composite key identifying one trackable job run.
///
/// The uuid is caller-supplied and assumed globally unique per run; the
/// identity is immutable once a job starts and never reused across
/// unrelated jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobIdentity {
    /// Caller-supplied uuid of the job run
    pub uuid: String,

    /// Optional subject disambiguator
    pub subject: Option<SubjectId>,
}

impl JobIdentity {
    /// Create an identity with no subject.
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            subject: None,
        }
    }

    /// Create an identity scoped to a subject.
    pub fn with_subject(uuid: impl Into<String>, subject: impl Into<SubjectId>) -> Self {
        Self {
            uuid: uuid.into(),
            subject: Some(subject.into()),
        }
    }

    /// String form of the subject, or the [`NO_SUBJECT`] sentinel.
    pub fn subject_key(&self) -> String {
        match &self.subject {
            Some(subject) => subject.to_string(),
            None => NO_SUBJECT.to_string(),
        }
    }

    /// Store key for this identity: `{prefix}_{uuid}_{subject}`.
    ///
    /// Must stay bit-for-bit compatible with keys already present in
    /// deployed stores.
    pub fn store_key(&self, prefix: &str) -> String {
        format!("{}_{}_{}", prefix, self.uuid, self.subject_key())
    }
}

impl std::fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.uuid, self.subject_key())
    }
}
