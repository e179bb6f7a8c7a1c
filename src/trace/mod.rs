//! Task-local trace context.
//!
//! # Responsibilities
//! - Assign one trace identifier per logical request
//! - Make the identifier visible to any code running inside that request
//! - Keep concurrently in-flight requests fully isolated
//!
//! # Design Decisions
//! - `tokio::task_local!` storage: the binding lives in the task's
//!   execution context, survives every await point inside the scope, and
//!   is invisible to other tasks. There is no global mutable cell.
//! - No teardown API; the binding is discarded when the scope future
//!   completes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

tokio::task_local! {
    static CURRENT_TRACE: TraceId;
}

/// Opaque correlation identifier for one logical request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceId(Arc<str>);

impl TraceId {
    /// Generate a fresh, globally unique identifier (UUID v4).
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// Reuse `candidate` when it is present and non-empty, otherwise
    /// generate a fresh identifier.
    pub fn assign(candidate: Option<&str>) -> Self {
        match candidate {
            Some(value) if !value.is_empty() => Self(Arc::from(value)),
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The trace identifier bound to the current task scope, if any.
pub fn current() -> Option<TraceId> {
    CURRENT_TRACE.try_with(TraceId::clone).ok()
}

/// Run `future` with `id` bound as the current trace identifier.
///
/// The binding is scoped to the returned future: it holds across every
/// await point inside it and is gone once it resolves, no matter how the
/// future exits.
pub async fn scope<F>(id: TraceId, future: F) -> F::Output
where
    F: Future,
{
    CURRENT_TRACE.scope(id, future).await
}
