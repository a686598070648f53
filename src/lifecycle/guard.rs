//! Panic containment for units of work run by the orchestrator
//!
//! Every constructor, every `serve` and every `close` goes through
//! [`supervise`]. The unit runs on its own tokio task; if it panics the
//! payload is recovered from the [`JoinError`] and turned into a
//! [`PanicError`] instead of unwinding into the orchestrator.
//!
//! Stack traces have to be taken while the panicking frame is still on the
//! stack, so a process-wide panic hook records one into a task-local slot
//! that [`supervise`] sets up around the unit.

use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::sync::{Arc, Mutex, Once};
use thiserror::Error;
use tokio::task::JoinError;

type TraceSlot = Arc<Mutex<Option<String>>>;

tokio::task_local! {
    /// Where the panic hook leaves the stack trace of the supervised unit
    /// that is currently being polled.
    static PANIC_TRACE: TraceSlot;
}

static HOOK: Once = Once::new();

/// Chain a hook that captures the panicking stack into [`PANIC_TRACE`].
///
/// Panics outside a supervised unit only reach the previous hook.
fn install_trace_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = PANIC_TRACE.try_with(|slot| {
                if let Ok(mut trace) = slot.lock() {
                    *trace = Some(Backtrace::force_capture().to_string());
                }
            });
            previous(info);
        }));
    });
}

/// A panic recovered from a supervised unit of work
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PanicError {
    message: String,
    backtrace: Option<String>,
}

impl PanicError {
    /// Create a panic error from a message, without a backtrace
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            backtrace: None,
        }
    }

    /// The panic message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Stack trace of the panicking unit, if one was requested
    pub fn backtrace(&self) -> Option<&str> {
        self.backtrace.as_deref()
    }

    fn from_payload(payload: Box<dyn Any + Send + 'static>, backtrace: Option<String>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "panic with non-string payload".to_string()
        };

        Self { message, backtrace }
    }

    fn from_join_error(err: JoinError, trace: Option<&TraceSlot>) -> Self {
        if err.is_panic() {
            let backtrace = trace.and_then(|slot| slot.lock().ok().and_then(|mut t| t.take()));
            Self::from_payload(err.into_panic(), backtrace)
        } else {
            // Only reachable if the runtime is shutting down underneath us
            Self::new(format!("task cancelled: {}", err))
        }
    }
}

/// Run `unit` on its own task and convert a panic into a [`PanicError`].
///
/// With `capture_backtrace` the error carries the stack of the frame that
/// panicked. Dropping the returned future stops waiting but does not cancel
/// the unit; it keeps running detached.
pub async fn supervise<F, T>(unit: F, capture_backtrace: bool) -> Result<T, PanicError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    if !capture_backtrace {
        return tokio::spawn(unit)
            .await
            .map_err(|err| PanicError::from_join_error(err, None));
    }

    install_trace_hook();
    let slot = TraceSlot::default();
    tokio::spawn(PANIC_TRACE.scope(Arc::clone(&slot), unit))
        .await
        .map_err(|err| PanicError::from_join_error(err, Some(&slot)))
}
