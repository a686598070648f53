//! Service constructors, live services and registered resources

use super::{LifecycleHandle, Resource, Service};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Future returned by a type-erased constructor
pub type ServiceFuture = Pin<Box<dyn Future<Output = anyhow::Result<Arc<dyn Service>>> + Send>>;

/// Produces a live [`Service`] during initialization
///
/// Implemented for every `FnOnce(CancellationToken, LifecycleHandle) -> impl Future`
/// resolving to `anyhow::Result<S>` where `S: Service`, so plain async
/// closures can be registered directly.
///
/// # Example
///
/// ```rust,ignore
/// app.register_service(|token, handle: LifecycleHandle| async move {
///     let pool = Arc::new(DatabasePool::connect(&url).await?);
///     handle.register_resource(Arc::clone(&pool))?;
///     Ok(ApiServer::new(pool))
/// })?;
/// ```
pub trait Constructor: Send + 'static {
    /// Build the service
    fn construct(
        self: Box<Self>,
        token: CancellationToken,
        handle: LifecycleHandle,
    ) -> ServiceFuture;
}

impl<F, Fut, S> Constructor for F
where
    F: FnOnce(CancellationToken, LifecycleHandle) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<S>> + Send + 'static,
    S: Service + 'static,
{
    fn construct(
        self: Box<Self>,
        token: CancellationToken,
        handle: LifecycleHandle,
    ) -> ServiceFuture {
        Box::pin(async move {
            let service = (*self)(token, handle).await?;
            Ok(Arc::new(service) as Arc<dyn Service>)
        })
    }
}

/// Everything the application has been asked to start or tear down.
///
/// Only the application's own control flow touches this.
#[derive(Default)]
pub(crate) struct Registry {
    constructors: Vec<Box<dyn Constructor>>,
    services: Vec<Arc<dyn Service>>,
    resources: Vec<Arc<dyn Resource>>,
}

impl Registry {
    pub(crate) fn push_constructor(&mut self, constructor: Box<dyn Constructor>) {
        self.constructors.push(constructor);
    }

    /// Returns `false` if this exact resource was already registered.
    pub(crate) fn push_resource(&mut self, resource: Arc<dyn Resource>) -> bool {
        let incoming = Arc::as_ptr(&resource).cast::<()>();
        if self
            .resources
            .iter()
            .any(|known| Arc::as_ptr(known).cast::<()>() == incoming)
        {
            return false;
        }
        self.resources.push(resource);
        true
    }

    pub(crate) fn push_service(&mut self, service: Arc<dyn Service>) {
        self.services.push(service);
    }

    pub(crate) fn take_constructors(&mut self) -> Vec<Box<dyn Constructor>> {
        std::mem::take(&mut self.constructors)
    }

    pub(crate) fn services(&self) -> &[Arc<dyn Service>] {
        &self.services
    }

    pub(crate) fn constructor_count(&self) -> usize {
        self.constructors.len()
    }

    pub(crate) fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Hand over services and resources for closing, leaving the registry empty.
    pub(crate) fn drain(&mut self) -> (Vec<Arc<dyn Service>>, Vec<Arc<dyn Resource>>) {
        (
            std::mem::take(&mut self.services),
            std::mem::take(&mut self.resources),
        )
    }
}
