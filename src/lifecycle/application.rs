//! Application root object
//!
//! Owns registration and state. Initialization, running and shutdown are
//! implemented in their own modules as further `impl Application` blocks.

use super::registry::Registry;
use super::runner::Outcome;
use super::state::StateMachine;
use super::{
    Constructor, LifecycleHandle, Logger, Resource, Result, Service, State, TracingLogger,
};
use crate::config::Config;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Starts registered services and shuts them down
///
/// # Example
///
/// ```rust,ignore
/// use orchestrion::lifecycle::Application;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut app = Application::builder()
///         .init_timeout(Duration::from_secs(30))
///         .termination_timeout(Duration::from_secs(10))
///         .build();
///
///     app.register_service(|_token, _handle| async { Ok(HttpServer::new()) })?;
///     app.register_resource(Arc::clone(&pool))?;
///
///     let token = CancellationToken::new();
///     app.init(&token, &[]).await?;
///     app.run(&token).await?;
///     Ok(())
/// }
/// ```
pub struct Application {
    pub(super) config: Config,
    pub(super) logger: Arc<dyn Logger>,
    pub(super) state: StateMachine,
    pub(super) registry: Registry,
    pub(super) handle: LifecycleHandle,
    /// Resources registered by constructors through their handle
    pub(super) registered: mpsc::UnboundedReceiver<Arc<dyn Resource>>,
    pub(super) outcomes: mpsc::UnboundedReceiver<Outcome>,
    pub(super) outcome_tx: mpsc::UnboundedSender<Outcome>,
    /// Handed to every `serve`; cancelled when shutdown starts
    pub(super) serve_token: CancellationToken,
    pub(super) signal_listeners: Vec<JoinHandle<()>>,
}

impl Application {
    /// Create an application with the given configuration and the tracing logger
    pub fn new(config: Config) -> Self {
        Self::with_logger(config, Arc::new(TracingLogger))
    }

    fn with_logger(config: Config, logger: Arc<dyn Logger>) -> Self {
        let state = StateMachine::new();
        let (resource_tx, registered) = mpsc::unbounded_channel();
        let (outcome_tx, outcomes) = mpsc::unbounded_channel();
        let handle = LifecycleHandle::new(state.subscribe(), resource_tx, outcome_tx.clone());

        Self {
            config,
            logger,
            state,
            registry: Registry::default(),
            handle,
            registered,
            outcomes,
            outcome_tx,
            serve_token: CancellationToken::new(),
            signal_listeners: Vec::new(),
        }
    }

    /// Create a new application builder
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Replace the logging sink
    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = logger;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> State {
        self.state.current()
    }

    /// Watch every state transition
    pub fn subscribe_state(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// A handle for registering resources or requesting termination
    pub fn handle(&self) -> LifecycleHandle {
        self.handle.clone()
    }

    /// Register one service constructor
    ///
    /// Constructors run in registration order during [`init`](Self::init).
    pub fn register_service<F, Fut, S>(&mut self, constructor: F) -> Result<()>
    where
        F: FnOnce(CancellationToken, LifecycleHandle) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<S>> + Send + 'static,
        S: Service + 'static,
    {
        self.state.require("register_service", State::Init)?;
        self.registry.push_constructor(Box::new(constructor));
        Ok(())
    }

    /// Register several service constructors at once
    pub fn register_services<I>(&mut self, constructors: I) -> Result<()>
    where
        I: IntoIterator<Item = Box<dyn Constructor>>,
    {
        self.state.require("register_services", State::Init)?;
        for constructor in constructors {
            self.registry.push_constructor(constructor);
        }
        Ok(())
    }

    /// Register a resource to be closed after every service
    ///
    /// Registering the same `Arc` twice is a no-op the second time.
    pub fn register_resource<R>(&mut self, resource: Arc<R>) -> Result<()>
    where
        R: Resource + 'static,
    {
        self.state.require("register_resource", State::Init)?;
        self.add_resource(resource);
        Ok(())
    }

    /// Register several resources at once, skipping duplicates
    pub fn register_resources<I>(&mut self, resources: I) -> Result<()>
    where
        I: IntoIterator<Item = Arc<dyn Resource>>,
    {
        self.state.require("register_resources", State::Init)?;
        for resource in resources {
            self.add_resource(resource);
        }
        Ok(())
    }

    /// Number of constructors still waiting for `init`
    pub fn pending_constructors(&self) -> usize {
        self.registry.constructor_count()
    }

    /// Number of services produced by constructors and not yet closed
    pub fn live_services(&self) -> usize {
        self.registry.services().len()
    }

    /// Number of registered resources not yet closed
    pub fn registered_resources(&self) -> usize {
        self.registry.resource_count()
    }

    fn add_resource(&mut self, resource: Arc<dyn Resource>) {
        let name = resource.name().to_string();
        if self.registry.push_resource(resource) {
            self.logger.debug(&format!("Registered resource: {}", name));
        } else {
            self.logger.debug(&format!("Resource already registered, skipping: {}", name));
        }
    }

    /// Move resources sent through a [`LifecycleHandle`] into the registry.
    pub(super) fn collect_registered(&mut self) {
        while let Ok(resource) = self.registered.try_recv() {
            self.add_resource(resource);
        }
    }
}

/// Builder for Application
pub struct ApplicationBuilder {
    config: Config,
    logger: Arc<dyn Logger>,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationBuilder {
    /// Create a new application builder
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            logger: Arc::new(TracingLogger),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set a timeout for running every constructor
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.config.init_timeout = timeout;
        self
    }

    /// Set a timeout for closing every service and resource
    pub fn termination_timeout(mut self, timeout: Duration) -> Self {
        self.config.termination_timeout = timeout;
        self
    }

    /// Log stack traces of recovered service panics
    pub fn debug_stack(mut self, enabled: bool) -> Self {
        self.config.enable_debug_stack = enabled;
        self
    }

    /// Set the logging sink
    pub fn logger<L>(mut self, logger: L) -> Self
    where
        L: Logger + 'static,
    {
        self.logger = Arc::new(logger);
        self
    }

    /// Build the application in the `Init` state
    pub fn build(self) -> Application {
        Application::with_logger(self.config, self.logger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{LifecycleError, NoopLogger};
    use async_trait::async_trait;

    struct Idle;

    #[async_trait]
    impl Resource for Idle {
        async fn close(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Service for Idle {
        async fn serve(&self, token: CancellationToken) -> anyhow::Result<()> {
            token.cancelled().await;
            Ok(())
        }
    }

    #[test]
    fn test_builder_applies_configuration() {
        let app = Application::builder()
            .init_timeout(Duration::from_millis(100))
            .termination_timeout(Duration::from_millis(200))
            .debug_stack(true)
            .logger(NoopLogger)
            .build();

        assert_eq!(app.state(), State::Init);
        assert_eq!(app.config().init_timeout, Duration::from_millis(100));
        assert_eq!(app.config().termination_timeout, Duration::from_millis(200));
        assert!(app.config().enable_debug_stack);
    }

    #[test]
    fn test_registration_in_init() {
        let mut app = Application::builder().logger(NoopLogger).build();
        let pool = Arc::new(Idle);

        app.register_service(|_token, _handle| async { Ok(Idle) }).unwrap();
        app.register_resource(Arc::clone(&pool)).unwrap();
        app.register_resource(Arc::clone(&pool)).unwrap();
        app.register_resources(vec![pool as Arc<dyn Resource>, Arc::new(Idle)]).unwrap();

        assert_eq!(app.pending_constructors(), 1);
        assert_eq!(app.registered_resources(), 2);
    }

    #[tokio::test]
    async fn test_registration_rejected_after_init() {
        let mut app = Application::builder().logger(NoopLogger).build();
        let token = CancellationToken::new();
        app.init(&token, &[]).await.unwrap();

        let err = app.register_service(|_token, _handle| async { Ok(Idle) }).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::WrongState {
                state: State::Ready,
                ..
            }
        ));
        assert!(app.register_resource(Arc::new(Idle)).is_err());
        assert_eq!(app.pending_constructors(), 0);
        assert_eq!(app.registered_resources(), 0);

        app.shutdown().await.unwrap();
    }
}
