//! Correlation and trace identifiers for launches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation ID tying together every log line of one launch session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Trace and span ids for one operation within a session
///
/// A session owns the root context; each Minting attempt or confirmation
/// check runs in a child span sharing the trace and correlation ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub correlation_id: CorrelationId,
    pub parent_span_id: Option<String>,
    pub operation: String,
    pub started_at: DateTime<Utc>,
}

impl TraceContext {
    pub fn new(operation: &str) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            span_id: Uuid::new_v4().to_string(),
            correlation_id: CorrelationId::new(),
            parent_span_id: None,
            operation: operation.to_string(),
            started_at: Utc::now(),
        }
    }

    pub fn child_span(&self, operation: &str) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            correlation_id: self.correlation_id.clone(),
            parent_span_id: Some(self.span_id.clone()),
            operation: operation.to_string(),
            started_at: Utc::now(),
        }
    }

    /// `tracing` span carrying these ids
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "launch",
            operation = %self.operation,
            trace_id = %self.trace_id,
            span_id = %self.span_id,
            correlation_id = %self.correlation_id,
        )
    }

    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new("launch_session")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_span_shares_trace() {
        let root = TraceContext::new("session");
        let child = root.child_span("mint");

        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.correlation_id, root.correlation_id);
        assert_eq!(child.parent_span_id.as_deref(), Some(root.span_id.as_str()));
        assert_ne!(child.span_id, root.span_id);
        assert!(child.elapsed_ms() >= 0);
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        assert_ne!(CorrelationId::new(), CorrelationId::new());
        assert_eq!(CorrelationId::from("abc").as_str(), "abc");
    }
}
