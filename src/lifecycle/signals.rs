//! OS termination signals
//!
//! Installed by `init`, turned into [`Outcome::Terminate`] messages on the
//! application's outcome channel, and removed at shutdown.

use super::runner::Outcome;
use super::{LifecycleError, Result};
use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A host termination notification the application listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationSignal {
    /// SIGHUP
    Hangup,
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// SIGQUIT
    Quit,
    /// Any other signal by number (unix only)
    Raw(i32),
}

impl TerminationSignal {
    /// Signals listened for when `init` is given an empty list
    pub const DEFAULT: [TerminationSignal; 4] = [
        TerminationSignal::Hangup,
        TerminationSignal::Interrupt,
        TerminationSignal::Terminate,
        TerminationSignal::Quit,
    ];
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Hangup => write!(f, "SIGHUP"),
            TerminationSignal::Interrupt => write!(f, "SIGINT"),
            TerminationSignal::Terminate => write!(f, "SIGTERM"),
            TerminationSignal::Quit => write!(f, "SIGQUIT"),
            TerminationSignal::Raw(signum) => write!(f, "signal {}", signum),
        }
    }
}

/// Why a running application was asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    /// The host delivered a termination signal
    Signal(TerminationSignal),
    /// [`LifecycleHandle::terminate`](super::LifecycleHandle::terminate) was called
    Requested,
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationCause::Signal(signal) => write!(f, "received {}", signal),
            TerminationCause::Requested => write!(f, "termination requested"),
        }
    }
}

/// Install one listener task per signal. Each delivery is forwarded to
/// `outcomes` until the task is aborted.
pub(crate) fn install(
    signals: &[TerminationSignal],
    outcomes: &mpsc::UnboundedSender<Outcome>,
) -> Result<Vec<JoinHandle<()>>> {
    let defaults = TerminationSignal::DEFAULT;
    let signals = if signals.is_empty() {
        &defaults[..]
    } else {
        signals
    };

    let mut listeners = Vec::with_capacity(signals.len());
    for &signal in signals {
        match listen(signal, outcomes.clone()) {
            Ok(Some(listener)) => listeners.push(listener),
            Ok(None) => {}
            Err(err) => {
                for listener in &listeners {
                    listener.abort();
                }
                return Err(err);
            }
        }
    }
    Ok(listeners)
}

#[cfg(unix)]
fn listen(
    signal: TerminationSignal,
    outcomes: mpsc::UnboundedSender<Outcome>,
) -> Result<Option<JoinHandle<()>>> {
    use tokio::signal::unix::{SignalKind, signal as unix_signal};

    let kind = match signal {
        TerminationSignal::Hangup => SignalKind::hangup(),
        TerminationSignal::Interrupt => SignalKind::interrupt(),
        TerminationSignal::Terminate => SignalKind::terminate(),
        TerminationSignal::Quit => SignalKind::quit(),
        TerminationSignal::Raw(signum) => SignalKind::from_raw(signum),
    };
    let mut stream = unix_signal(kind).map_err(LifecycleError::SignalInstall)?;

    Ok(Some(tokio::spawn(async move {
        while stream.recv().await.is_some() {
            let cause = TerminationCause::Signal(signal);
            if outcomes.send(Outcome::Terminate(cause)).is_err() {
                break;
            }
        }
    })))
}

#[cfg(not(unix))]
fn listen(
    signal: TerminationSignal,
    outcomes: mpsc::UnboundedSender<Outcome>,
) -> Result<Option<JoinHandle<()>>> {
    // Only Ctrl+C has a portable equivalent
    if signal != TerminationSignal::Interrupt {
        return Ok(None);
    }

    Ok(Some(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            let cause = TerminationCause::Signal(signal);
            if outcomes.send(Outcome::Terminate(cause)).is_err() {
                break;
            }
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TerminationSignal::Terminate.to_string(), "SIGTERM");
        assert_eq!(TerminationSignal::Raw(10).to_string(), "signal 10");
        assert_eq!(
            TerminationCause::Signal(TerminationSignal::Interrupt).to_string(),
            "received SIGINT"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_defaults() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let listeners = install(&[], &tx).unwrap();
        assert_eq!(listeners.len(), TerminationSignal::DEFAULT.len());
        for listener in listeners {
            listener.abort();
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_forbidden_signal_fails_to_install() {
        let (tx, _rx) = mpsc::unbounded_channel();
        // SIGKILL cannot be handled
        let err = install(&[TerminationSignal::Raw(9)], &tx).unwrap_err();
        assert!(matches!(err, LifecycleError::SignalInstall(_)));
    }
}
