//! Initialization: running registered constructors

use super::guard::supervise;
use super::{Application, LifecycleError, Result, State, TerminationSignal, signals};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

impl Application {
    /// Run every registered constructor, then start listening for `signals`
    ///
    /// Constructors run one at a time in registration order. The first of
    /// these ends initialization:
    /// - every constructor succeeded: state becomes `Ready`
    /// - a constructor failed: `InitFailure`
    /// - a constructor panicked: `InitConstructorPanic`
    /// - `token` was cancelled: `InitContextDeadline`
    /// - the configured init timeout expired: `InitTimeout`
    ///
    /// On failure the services constructed so far and every registered
    /// resource are closed right away and the application ends in `Off`.
    /// An empty `signals` slice listens for [`TerminationSignal::DEFAULT`].
    pub async fn init(
        &mut self,
        token: &CancellationToken,
        signals: &[TerminationSignal],
    ) -> Result<()> {
        self.state.require("init", State::Init)?;

        let init_token = token.child_token();
        let mut result = self.construct_services(token, &init_token).await;
        self.collect_registered();

        if result.is_ok() {
            match signals::install(signals, &self.outcome_tx) {
                Ok(listeners) => self.signal_listeners = listeners,
                Err(err) => result = Err(err),
            }
        }

        if let Err(err) = result {
            self.logger.error(&format!("Initialization failed: {}", err));
            init_token.cancel();
            if let Err(shutdown_err) = self.terminate().await {
                self.logger
                    .error(&format!("Cleanup after failed initialization: {}", shutdown_err));
            }
            return Err(err);
        }

        self.state.advance("init", State::Ready)?;
        self.logger.info(&format!(
            "Initialization complete ({} services, {} resources)",
            self.live_services(),
            self.registered_resources()
        ));
        Ok(())
    }

    async fn construct_services(
        &mut self,
        token: &CancellationToken,
        init_token: &CancellationToken,
    ) -> Result<()> {
        let constructors = self.registry.take_constructors();
        let timeout = self.config.init_timeout;
        let capture_backtrace = self.config.enable_debug_stack;
        self.logger.info(&format!("Running {} constructors...", constructors.len()));

        if token.is_cancelled() {
            return Err(LifecycleError::InitContextDeadline);
        }

        let expiry = deadline(timeout);
        tokio::pin!(expiry);

        for (index, constructor) in constructors.into_iter().enumerate() {
            self.logger.debug(&format!("Constructing service #{}", index));

            let pending = constructor.construct(init_token.clone(), self.handle());
            let constructed = tokio::select! {
                biased;
                outcome = supervise(pending, capture_backtrace) => outcome,
                _ = token.cancelled() => return Err(LifecycleError::InitContextDeadline),
                _ = &mut expiry => return Err(LifecycleError::InitTimeout(timeout)),
            };
            self.collect_registered();

            match constructed {
                Ok(Ok(service)) => {
                    self.logger.debug(&format!(
                        "Constructed service #{}: {}",
                        index,
                        service.name()
                    ));
                    self.registry.push_service(service);
                }
                Ok(Err(source)) => return Err(LifecycleError::init_failed(index, source)),
                Err(panic) => return Err(LifecycleError::InitConstructorPanic { index, panic }),
            }
        }

        Ok(())
    }
}

/// Completes after `timeout`, or never for a zero timeout.
async fn deadline(timeout: Duration) {
    if timeout.is_zero() {
        std::future::pending::<()>().await;
    } else {
        tokio::time::sleep(timeout).await;
    }
}
