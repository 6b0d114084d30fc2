//! Request-scoped trace context.
//!
//! A [`TraceContext`] is created when a runtime first sees a request and
//! dropped when the response is finalized. It carries the trace id and a
//! LIFO stack of open spans. Each request gets its own context; it is made
//! ambient for the request's task with [`TraceContext::scope`], so concurrent
//! requests never observe each other's state.
//!
//! Each context also owns a `tracing` span named `request` carrying the
//! trace id, so diagnostic log lines written while the request runs are
//! attributed to it.
//!
//! ```text
//!  enter_span("dispatch")          span_start_dispatch   depth=0
//!    enter_span("get_recipe")      span_start_get_recipe depth=1
//!    exit (guard drop)             span_end_get_recipe   duration_ms=1.82
//!  exit (guard drop)               span_end_dispatch     duration_ms=2.40
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::Instrument;
use uuid::Uuid;

use crate::event::{SharedSink, StructuredEvent};

/// Header carrying the trace id between processes and back to callers.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Prefix of ids synthesized by a backend that was called directly.
pub const LOCAL_TRACE_PREFIX: &str = "LOCAL-";

tokio::task_local! {
    static CURRENT: TraceContext;
}

/// Which runtime started a trace that arrived without an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOrigin {
    /// The edge gateway. Synthesized ids are bare UUIDs.
    Gateway,
    /// A backend service reached without going through the gateway.
    /// Synthesized ids carry [`LOCAL_TRACE_PREFIX`].
    Local,
}

impl TraceOrigin {
    fn synthesize(self) -> String {
        let id = Uuid::now_v7();
        match self {
            Self::Gateway => id.to_string(),
            Self::Local => format!("{LOCAL_TRACE_PREFIX}{id}"),
        }
    }
}

/// Returns true if `trace_id` was synthesized by a backend.
#[must_use]
pub fn is_local_trace(trace_id: &str) -> bool {
    trace_id.starts_with(LOCAL_TRACE_PREFIX)
}

#[derive(Debug)]
struct ActiveSpan {
    name: String,
    started: Instant,
}

struct Inner {
    trace_id: String,
    started: Instant,
    sink: SharedSink,
    spans: Mutex<Vec<ActiveSpan>>,
    log_span: tracing::Span,
}

/// Trace id plus span stack for one request.
///
/// Cloning is cheap and clones share the same stack.
#[derive(Clone)]
pub struct TraceContext {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceContext")
            .field("trace_id", &self.inner.trace_id)
            .field("spans", &self.span_stack())
            .finish()
    }
}

impl TraceContext {
    /// Starts a trace, adopting `inbound` when it is present and non-blank.
    #[must_use]
    pub fn start(inbound: Option<&str>, origin: TraceOrigin, sink: SharedSink) -> Self {
        let trace_id = inbound
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(|| origin.synthesize(), ToString::to_string);
        let log_span = tracing::info_span!(parent: None, "request", trace_id = %trace_id);

        Self {
            inner: Arc::new(Inner {
                trace_id,
                started: Instant::now(),
                sink,
                spans: Mutex::new(Vec::new()),
                log_span,
            }),
        }
    }

    /// The trace id. Stable for the lifetime of the context.
    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.inner.trace_id
    }

    /// The `request` log span; log lines inside it carry `trace_id`.
    #[must_use]
    pub fn log_span(&self) -> &tracing::Span {
        &self.inner.log_span
    }

    /// The sink events are written to.
    #[must_use]
    pub fn sink(&self) -> &SharedSink {
        &self.inner.sink
    }

    /// Names of the open spans, outermost first.
    #[must_use]
    pub fn span_stack(&self) -> Vec<String> {
        self.inner
            .spans
            .lock()
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Opens a span and returns a guard that closes it when dropped.
    ///
    /// The guard closes the span on every exit path, including early
    /// returns, `?` and a dropped future.
    pub fn enter_span(&self, name: impl Into<String>) -> SpanGuard {
        let name = name.into();
        let depth = {
            let mut spans = self.inner.spans.lock();
            spans.push(ActiveSpan {
                name: name.clone(),
                started: Instant::now(),
            });
            spans.len() - 1
        };

        self.emit(
            &format!("span_start_{name}"),
            json!({
                "name": name,
                "depth": depth,
                "offset_ms": round_ms(self.inner.started.elapsed()),
            }),
        );

        SpanGuard {
            context: self.clone(),
            depth,
        }
    }

    /// Closes the innermost open span and returns its duration.
    ///
    /// Returns `None` when no span is open.
    pub fn exit_span(&self) -> Option<Duration> {
        let span = self.inner.spans.lock().pop()?;
        let elapsed = span.started.elapsed();
        self.emit(
            &format!("span_end_{}", span.name),
            json!({
                "name": span.name,
                "duration_ms": round_ms(elapsed),
            }),
        );
        Some(elapsed)
    }

    /// Emits an event stamped with this trace id.
    pub fn emit(&self, event: &str, fields: Value) {
        let record = StructuredEvent::new(Some(&self.inner.trace_id), event, fields);
        self.inner.sink.record(&record);
    }

    /// Runs `fut` with this context as the ambient context of the task,
    /// inside the context's log span.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        let span = self.inner.log_span.clone();
        CURRENT.scope(self, fut.instrument(span)).await
    }

    /// The ambient context of the current task, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        CURRENT.try_with(Clone::clone).ok()
    }
}

/// Closes its span on drop.
///
/// Spans opened after this one and still open are closed first, so the
/// stack stays LIFO even if an inner guard was leaked.
#[must_use = "the span closes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SpanGuard {
    context: TraceContext,
    depth: usize,
}

impl SpanGuard {
    /// The context the span belongs to.
    #[must_use]
    pub fn context(&self) -> &TraceContext {
        &self.context
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        loop {
            let open = self.context.inner.spans.lock().len();
            if open <= self.depth || self.context.exit_span().is_none() {
                break;
            }
        }
    }
}

/// Runs `fut` inside a span of the ambient request context.
///
/// Outside a request this simply awaits `fut`.
pub async fn in_span<F: Future>(name: &str, fut: F) -> F::Output {
    match TraceContext::current() {
        Some(context) => {
            let _guard = context.enter_span(name);
            fut.await
        }
        None => fut.await,
    }
}

/// Emits an event on the ambient request context. Returns false outside a request.
pub fn emit_current(event: &str, fields: Value) -> bool {
    match TraceContext::current() {
        Some(context) => {
            context.emit(event, fields);
            true
        }
        None => false,
    }
}

fn round_ms(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 100_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MemorySink;

    fn context(inbound: Option<&str>, origin: TraceOrigin) -> (TraceContext, Arc<MemorySink>) {
        let sink = MemorySink::new();
        let ctx = TraceContext::start(inbound, origin, sink.clone());
        (ctx, sink)
    }

    #[test]
    fn test_adopts_inbound_id() {
        let (ctx, _) = context(Some("abc-123"), TraceOrigin::Local);
        assert_eq!(ctx.trace_id(), "abc-123");
    }

    #[test]
    fn test_synthesized_ids_by_origin() {
        let (local, _) = context(None, TraceOrigin::Local);
        assert!(is_local_trace(local.trace_id()));
        assert!(Uuid::parse_str(&local.trace_id()[LOCAL_TRACE_PREFIX.len()..]).is_ok());

        let (gateway, _) = context(Some("   "), TraceOrigin::Gateway);
        assert!(!is_local_trace(gateway.trace_id()));
        assert!(Uuid::parse_str(gateway.trace_id()).is_ok());
    }

    #[test]
    fn test_spans_close_lifo() {
        let (ctx, sink) = context(Some("t"), TraceOrigin::Local);
        let _x = ctx.enter_span("x");
        let _y = ctx.enter_span("y");
        assert_eq!(ctx.span_stack(), vec!["x", "y"]);

        assert!(ctx.exit_span().is_some());
        assert!(ctx.exit_span().is_some());
        assert!(ctx.exit_span().is_none());

        assert_eq!(
            sink.names(),
            vec!["span_start_x", "span_start_y", "span_end_y", "span_end_x"]
        );
        for end in sink.events().iter().filter(|e| e.event.starts_with("span_end_")) {
            assert!(end.field("duration_ms").unwrap().as_f64().unwrap() >= 0.0);
            assert_eq!(end.trace_id.as_deref(), Some("t"));
        }
    }

    #[test]
    fn test_guard_closes_nested_spans() {
        let (ctx, sink) = context(Some("t"), TraceOrigin::Local);
        {
            let _outer = ctx.enter_span("outer");
            std::mem::forget(ctx.enter_span("leaked"));
        }
        assert!(ctx.span_stack().is_empty());
        assert_eq!(
            sink.names(),
            vec![
                "span_start_outer",
                "span_start_leaked",
                "span_end_leaked",
                "span_end_outer"
            ]
        );
    }

    #[test]
    fn test_span_closes_on_error_path() {
        fn failing(ctx: &TraceContext) -> Result<(), &'static str> {
            let _span = ctx.enter_span("work");
            let step: Result<(), &'static str> = Err("boom");
            step?;
            Ok(())
        }

        let (ctx, sink) = context(Some("t"), TraceOrigin::Local);
        assert!(failing(&ctx).is_err());
        assert_eq!(sink.named("span_end_work").len(), 1);
    }

    #[test]
    fn test_start_event_fields() {
        let (ctx, sink) = context(Some("t"), TraceOrigin::Local);
        let _a = ctx.enter_span("a");
        let _b = ctx.enter_span("b");

        let start = &sink.named("span_start_b")[0];
        assert_eq!(start.field("depth"), Some(&json!(1)));
        assert_eq!(start.field("name"), Some(&json!("b")));
    }

    #[tokio::test]
    async fn test_scope_is_per_task() {
        let (a, _) = context(Some("trace-a"), TraceOrigin::Local);
        let (b, _) = context(Some("trace-b"), TraceOrigin::Local);

        let task_a = tokio::spawn(a.scope(async {
            tokio::task::yield_now().await;
            TraceContext::current().map(|c| c.trace_id().to_string())
        }));
        let task_b = tokio::spawn(b.scope(async {
            TraceContext::current().map(|c| c.trace_id().to_string())
        }));

        assert_eq!(task_a.await.unwrap().as_deref(), Some("trace-a"));
        assert_eq!(task_b.await.unwrap().as_deref(), Some("trace-b"));
        assert!(TraceContext::current().is_none());
    }

    #[tokio::test]
    async fn test_in_span_uses_ambient_context() {
        let (ctx, sink) = context(Some("t"), TraceOrigin::Local);
        let value = ctx
            .clone()
            .scope(in_span("db_query", async { 7 }))
            .await;

        assert_eq!(value, 7);
        assert_eq!(sink.names(), vec!["span_start_db_query", "span_end_db_query"]);
    }

    #[test]
    fn test_in_span_without_context() {
        assert_eq!(tokio_test::block_on(in_span("orphan", async { 1 })), 1);
        assert!(!emit_current("orphan", Value::Null));
    }

    #[test]
    fn test_round_ms() {
        assert!((round_ms(Duration::from_micros(1234)) - 1.23).abs() < f64::EPSILON);
    }
}
