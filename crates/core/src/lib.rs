//! Core data model for export progress tracking.
//!
//! This crate defines the identity of a tracked job and the notification
//! payloads handed to the delivery transport. It performs no I/O.

#![warn(missing_docs)]

mod id;
mod notification;

pub use id::{JobIdentity, SubjectId, NO_SUBJECT};
pub use notification::{
    CompletionNotification, FailureNotification, Notification, ProgressNotification,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
