//! Graceful shutdown
//!
//! Closes every live service, then every registered resource, in
//! registration order. Close failures are logged and skipped over; the
//! only error reported to the caller is running out of time.

use super::guard::supervise;
use super::{Application, LifecycleError, Logger, Resource, Result, Service, State};
use std::future::Future;
use std::sync::Arc;

/// Tally of a completed drain
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct DrainReport {
    closed: usize,
    failed: usize,
}

impl Application {
    /// Shut down an application that is ready but was never run
    ///
    /// `run` and a failed `init` shut down on their own; calling this in any
    /// state other than `Ready` returns `WrongState`.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.state.require("shutdown", State::Ready)?;
        self.terminate().await
    }

    /// Close everything and move to `Off`, bounded by the termination timeout.
    ///
    /// On timeout the closes keep running in the background.
    pub(super) async fn terminate(&mut self) -> Result<()> {
        self.state.advance("shutdown", State::Shutdown)?;
        self.logger.info("Shutting down application...");

        self.collect_registered();
        self.serve_token.cancel();
        for listener in self.signal_listeners.drain(..) {
            listener.abort();
        }

        let (services, resources) = self.registry.drain();
        let logger = Arc::clone(&self.logger);
        let mut draining = tokio::spawn(drain(services, resources, logger));

        let timeout = self.config.termination_timeout;
        let result = if timeout.is_zero() {
            // No deadline configured: wait as long as closing takes
            draining.await
        } else {
            match tokio::time::timeout(timeout, &mut draining).await {
                Ok(joined) => joined,
                Err(_) => {
                    self.state.advance("shutdown", State::Off)?;
                    self.logger.error(&format!(
                        "Shutdown timed out after {:?}; closes continue in background",
                        timeout
                    ));
                    return Err(LifecycleError::TerminateTimeout(timeout));
                }
            }
        };

        match result {
            Ok(report) => self.logger.info(&format!(
                "Application shutdown complete ({} closed, {} failed)",
                report.closed, report.failed
            )),
            Err(err) => self.logger.error(&format!("Shutdown task failed: {}", err)),
        }

        self.state.advance("shutdown", State::Off)?;
        Ok(())
    }
}

async fn drain(
    services: Vec<Arc<dyn Service>>,
    resources: Vec<Arc<dyn Resource>>,
    logger: Arc<dyn Logger>,
) -> DrainReport {
    let mut report = DrainReport::default();

    for service in services {
        let name = service.name().to_string();
        close_one(&name, async move { service.close().await }, &*logger, &mut report).await;
    }
    for resource in resources {
        let name = resource.name().to_string();
        close_one(&name, async move { resource.close().await }, &*logger, &mut report).await;
    }

    report
}

async fn close_one<F>(name: &str, closing: F, logger: &dyn Logger, report: &mut DrainReport)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    logger.debug(&format!("Closing: {}", name));
    match supervise(closing, false).await {
        Ok(Ok(())) => {
            report.closed += 1;
            logger.debug(&format!("Closed: {}", name));
        }
        Ok(Err(err)) => {
            report.failed += 1;
            logger.error(&format!("Close failed for {}: {:#}", name, err));
        }
        Err(panic) => {
            report.failed += 1;
            logger.error(&format!("Close panicked for {}: {}", name, panic));
        }
    }
}
