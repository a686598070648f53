//! Running services until the first terminal outcome

use super::guard::{PanicError, supervise};
use super::{Application, LifecycleError, Result, State, TerminationCause};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A message on the application's outcome channel
#[derive(Debug)]
pub(crate) enum Outcome {
    /// A service's `serve` returned `Ok(())`
    Stopped { service: String },
    /// A service's `serve` returned an error
    Failure {
        service: String,
        error: anyhow::Error,
    },
    /// A service's `serve` panicked
    Panic { service: String, panic: PanicError },
    /// A signal arrived or termination was requested
    Terminate(TerminationCause),
}

enum Wake {
    Outcome(Option<Outcome>),
    Cancelled,
}

impl Application {
    /// Start every service and block until the first terminal outcome
    ///
    /// Returns:
    /// - `Ok(())` on a termination signal or [`terminate`](super::LifecycleHandle::terminate)
    /// - the service's own error, as `RunService`, if `serve` fails
    /// - `RunPanic` if `serve` panics
    /// - `RunContextDeadline` if `token` is cancelled
    ///
    /// Shutdown always runs before this returns. Its own failure is logged,
    /// the outcome above is what the caller receives.
    pub async fn run(&mut self, token: &CancellationToken) -> Result<()> {
        self.state.require("run", State::Ready)?;
        self.state.advance("run", State::Running)?;

        self.serve_token = token.child_token();
        self.launch_services();

        let result = self.wait_for_outcome(token).await;

        if let Err(err) = self.terminate().await {
            self.logger.error(&format!("Shutdown after run: {}", err));
        }
        result
    }

    fn launch_services(&self) {
        let capture_backtrace = self.config.enable_debug_stack;
        self.logger.info(&format!("Starting {} services...", self.registry.services().len()));

        for service in self.registry.services() {
            let service = Arc::clone(service);
            let token = self.serve_token.clone();
            let outcomes = self.outcome_tx.clone();

            tokio::spawn(async move {
                let name = service.name().to_string();
                let serving = {
                    let service = Arc::clone(&service);
                    async move { service.serve(token).await }
                };

                let outcome = match supervise(serving, capture_backtrace).await {
                    Ok(Ok(())) => Outcome::Stopped { service: name },
                    Ok(Err(error)) => Outcome::Failure {
                        service: name,
                        error,
                    },
                    Err(panic) => Outcome::Panic {
                        service: name,
                        panic,
                    },
                };
                // Nobody listens once the first outcome has won
                let _ = outcomes.send(outcome);
            });
        }
    }

    async fn wait_for_outcome(&mut self, token: &CancellationToken) -> Result<()> {
        loop {
            let wake = tokio::select! {
                biased;
                outcome = self.outcomes.recv() => Wake::Outcome(outcome),
                _ = token.cancelled() => Wake::Cancelled,
            };

            match wake {
                Wake::Outcome(Some(Outcome::Stopped { service })) => {
                    self.logger.info(&format!("Service stopped: {}", service));
                }
                Wake::Outcome(Some(Outcome::Failure { service, error })) => {
                    self.logger.error(&format!("Service failed: {}: {:#}", service, error));
                    return Err(LifecycleError::RunService(error));
                }
                Wake::Outcome(Some(Outcome::Panic { service, panic })) => {
                    self.log_panic(&service, &panic);
                    return Err(LifecycleError::RunPanic(panic));
                }
                Wake::Outcome(Some(Outcome::Terminate(cause))) => {
                    self.logger.info(&format!("Stopping application: {}", cause));
                    return Ok(());
                }
                // The application keeps a sender, so the channel cannot close
                Wake::Outcome(None) => return Ok(()),
                Wake::Cancelled => {
                    self.logger.warn("Stopping application: context cancelled");
                    return Err(LifecycleError::RunContextDeadline);
                }
            }
        }
    }

    fn log_panic(&self, service: &str, panic: &PanicError) {
        match panic.backtrace() {
            Some(backtrace) if self.config.enable_debug_stack => {
                self.logger.error(&format!(
                    "Service panicked: {}: {}\n{}",
                    service,
                    panic.message(),
                    backtrace
                ));
            }
            _ => {
                self.logger.error(&format!("Service panicked: {}: {}", service, panic.message()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{NoopLogger, Resource, Service};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Stopping;

    #[async_trait]
    impl Resource for Stopping {
        async fn close(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Service for Stopping {
        async fn serve(&self, _token: CancellationToken) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Waiting;

    #[async_trait]
    impl Resource for Waiting {
        async fn close(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Service for Waiting {
        async fn serve(&self, token: CancellationToken) -> anyhow::Result<()> {
            token.cancelled().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_requires_ready() {
        let mut app = Application::builder().logger(NoopLogger).build();
        let err = app.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::WrongState {
                state: State::Init,
                ..
            }
        ));
        assert_eq!(app.state(), State::Init);
    }

    #[tokio::test]
    async fn test_stopped_service_is_not_terminal() {
        let mut app = Application::builder().logger(NoopLogger).build();
        app.register_service(|_token, _handle| async { Ok(Stopping) }).unwrap();
        app.register_service(|_token, _handle| async { Ok(Waiting) }).unwrap();

        let token = CancellationToken::new();
        app.init(&token, &[]).await.unwrap();

        let handle = app.handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            handle.terminate().unwrap();
        });

        app.run(&token).await.unwrap();
        assert_eq!(app.state(), State::Off);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_run() {
        let mut app = Application::builder().logger(NoopLogger).build();
        app.register_service(|_token, _handle| async { Ok(Waiting) }).unwrap();

        let token = CancellationToken::new();
        app.init(&token, &[]).await.unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = app.run(&token).await.unwrap_err();
        assert!(matches!(err, LifecycleError::RunContextDeadline));
        assert_eq!(app.state(), State::Off);
    }
}
