//! Service and resource traits
//!
//! These traits define the contract for everything the application starts
//! and tears down.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Anything that must be released when the application shuts down
///
/// Use this for handles that do not run on their own:
/// - Database pools
/// - Open files
/// - Bound listeners that a service has already taken over
///
/// # Example
///
/// ```rust,ignore
/// use orchestrion::lifecycle::Resource;
/// use async_trait::async_trait;
///
/// #[async_trait]
/// impl Resource for DatabasePool {
///     async fn close(&self) -> anyhow::Result<()> {
///         self.pool.close().await;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Resource: Send + Sync {
    /// Release the resource
    ///
    /// Called once, during shutdown, in registration order.
    async fn close(&self) -> anyhow::Result<()>;

    /// Name used in log lines
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A long-running component started by the application
///
/// `serve` is started on its own task once every constructor has succeeded,
/// concurrently with every other service. Returning an error stops the whole
/// application; returning `Ok(())` only stops this service.
///
/// # Example
///
/// ```rust,ignore
/// use orchestrion::lifecycle::{Resource, Service};
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
///
/// #[async_trait]
/// impl Service for Consumer {
///     async fn serve(&self, token: CancellationToken) -> anyhow::Result<()> {
///         loop {
///             tokio::select! {
///                 _ = token.cancelled() => return Ok(()),
///                 msg = self.queue.recv() => self.handle(msg?).await?,
///             }
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Resource {
    /// Run until failure or intentional stop
    ///
    /// `token` is cancelled when the application starts shutting down.
    async fn serve(&self, token: CancellationToken) -> anyhow::Result<()>;
}
