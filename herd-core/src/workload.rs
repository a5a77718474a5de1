use std::fmt;
use std::sync::Arc;

use herd_metrics::CheckSample;

/// Identity handed to the workload on every invocation.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadCall {
    pub vu_id: u64,
    /// Bumped each time the VU's id is reused for a fresh worker.
    pub generation: u64,
    pub iteration: u64,
}

/// What one workload invocation yields for check evaluation.
#[derive(Debug, Clone, Default)]
pub struct WorkloadResult {
    pub status: Option<u16>,
    pub body: String,
}

impl WorkloadResult {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TransportFailureKind {
    Connect,
    Timeout,
    Io,
    Protocol,
}

/// Failure signal raised by a workload before it produced a result.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: TransportFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportFailureKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportFailureKind::Timeout, message)
    }
}

/// A named boolean assertion evaluated against a workload result.
#[derive(Clone)]
pub struct Check {
    name: Arc<str>,
    predicate: Arc<dyn Fn(&WorkloadResult) -> bool + Send + Sync>,
}

impl Check {
    pub fn new(
        name: &str,
        predicate: impl Fn(&WorkloadResult) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Arc::from(name),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, result: &WorkloadResult) -> bool {
        (self.predicate)(result)
    }

    pub(crate) fn sample(&self, result: &WorkloadResult) -> CheckSample {
        CheckSample {
            name: self.name.clone(),
            passed: self.evaluate(result),
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Check").field(&self.name).finish()
    }
}

/// Immutable per-call-site request context: headers, tags and an optional
/// bearer token, built once instead of per-request ad hoc maps.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    headers: Arc<[(String, String)]>,
    tags: Arc<[(String, String)]>,
    bearer: Option<Arc<str>>,
}

impl RequestContext {
    pub fn new(headers: Vec<(String, String)>, tags: Vec<(String, String)>) -> Self {
        Self {
            headers: Arc::from(headers.into_boxed_slice()),
            tags: Arc::from(tags.into_boxed_slice()),
            bearer: None,
        }
    }

    /// A copy of this context carrying the given bearer token; the original
    /// is untouched.
    pub fn with_bearer(&self, token: &str) -> Self {
        Self {
            headers: self.headers.clone(),
            tags: self.tags.clone(),
            bearer: Some(Arc::from(token)),
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }
}
