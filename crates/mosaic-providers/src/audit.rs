//! Audit records attached to structured completion results.

use std::ops::Deref;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::cache::{CapturedRequest, CapturedResponse};

/// Wire-level exchange plus timing for one completion.
///
/// `http_request`/`http_response` are `None` when the exchange was no longer
/// in the transport cache (evicted or expired) at lookup time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuditData {
    pub correlation_id: String,
    #[serde(rename = "request_duration_secs", serialize_with = "duration_secs")]
    pub request_duration: Duration,
    pub http_request: Option<CapturedRequest>,
    pub http_response: Option<CapturedResponse>,
}

fn duration_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// A structured completion result together with its audit record.
#[derive(Clone, Debug, PartialEq)]
pub struct Completion<T> {
    value: T,
    audit: Option<AuditData>,
}

impl<T> Completion<T> {
    /// A result without audit data.
    pub fn new(value: T) -> Self {
        Completion { value, audit: None }
    }

    pub fn with_audit(value: T, audit: AuditData) -> Self {
        Completion {
            value,
            audit: Some(audit),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn audit(&self) -> Option<&AuditData> {
        self.audit.as_ref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.audit.as_ref().map(|a| a.correlation_id.as_str())
    }
}

impl<T> Deref for Completion<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// The attached audit record, if any.
pub fn get_audit<T>(completion: &Completion<T>) -> Option<&AuditData> {
    completion.audit()
}

/// The correlation id of the attached audit record, if any.
pub fn get_correlation_id<T>(completion: &Completion<T>) -> Option<&str> {
    completion.correlation_id()
}
