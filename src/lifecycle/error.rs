//! Lifecycle-specific error types

use super::{PanicError, State};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during lifecycle operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The operation is not valid in the current state; nothing was changed
    #[error("{operation} is not allowed in state {state}")]
    WrongState {
        /// The rejected operation
        operation: &'static str,
        /// The state the application was in
        state: State,
    },

    /// A constructor returned an error
    #[error("Initialization failed in constructor #{index}: {source}")]
    InitFailure {
        /// Registration index of the failing constructor
        index: usize,
        /// Error returned by the constructor
        #[source]
        source: anyhow::Error,
    },

    /// Constructors did not finish within the configured timeout
    #[error("Initialization timeout after {0:?}")]
    InitTimeout(Duration),

    /// The caller's token was cancelled during initialization
    #[error("Initialization stopped: context cancelled")]
    InitContextDeadline,

    /// A constructor panicked
    #[error("Panic in constructor #{index}: {panic}")]
    InitConstructorPanic {
        /// Registration index of the panicking constructor
        index: usize,
        /// Recovered panic
        panic: PanicError,
    },

    /// A termination signal handler could not be installed
    #[error("Failed to install termination signal handler: {0}")]
    SignalInstall(#[source] std::io::Error),

    /// The caller's token was cancelled while running
    #[error("Running application stopped: context cancelled")]
    RunContextDeadline,

    /// A running service panicked
    #[error("Running application stopped due to panic: {0}")]
    RunPanic(PanicError),

    /// A running service returned an error, reported as-is
    #[error(transparent)]
    RunService(anyhow::Error),

    /// Services and resources were not closed within the termination timeout
    #[error("Terminate attempt failed due to timeout after {0:?}")]
    TerminateTimeout(Duration),
}

impl LifecycleError {
    /// Create a wrong-state error
    pub fn wrong_state(operation: &'static str, state: State) -> Self {
        Self::WrongState { operation, state }
    }

    /// Create an initialization failure error
    pub fn init_failed(index: usize, source: anyhow::Error) -> Self {
        Self::InitFailure { index, source }
    }

    /// Whether this error was produced by a recovered panic
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::InitConstructorPanic { .. } | Self::RunPanic(_))
    }

    /// Whether this error was produced by a timeout or a cancelled token
    pub fn is_deadline(&self) -> bool {
        matches!(
            self,
            Self::InitTimeout(_)
                | Self::InitContextDeadline
                | Self::RunContextDeadline
                | Self::TerminateTimeout(_)
        )
    }
}

/// A specialized Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_is_transparent() {
        let err = LifecycleError::RunService(anyhow::anyhow!("listener closed"));
        assert_eq!(err.to_string(), "listener closed");
        assert!(!err.is_panic());
    }

    #[test]
    fn test_classification() {
        assert!(LifecycleError::InitTimeout(Duration::from_secs(1)).is_deadline());
        assert!(LifecycleError::RunContextDeadline.is_deadline());
        assert!(LifecycleError::RunPanic(PanicError::new("boom")).is_panic());
        assert!(!LifecycleError::init_failed(0, anyhow::anyhow!("x")).is_deadline());
    }
}
