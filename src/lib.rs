//! # Orchestrion
//!
//! Ordered startup, concurrent execution and graceful shutdown of the
//! long-running components inside one process.
//!
//! ## Features
//!
//! - **Ordered initialization**: constructors run one at a time, bounded by a
//!   timeout and a cancellation token
//! - **Concurrent services**: every service runs on its own task; the first
//!   failure, panic or termination signal stops the application
//! - **Panic containment**: panics in constructors, services and closes are
//!   turned into errors instead of crashing the process
//! - **Best-effort shutdown**: services, then resources, are closed in
//!   registration order, bounded by a termination timeout
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orchestrion::prelude::*;
//! use std::time::Duration;
//!
//! struct Heartbeat;
//!
//! #[async_trait]
//! impl Resource for Heartbeat {
//!     async fn close(&self) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl Service for Heartbeat {
//!     async fn serve(&self, token: CancellationToken) -> anyhow::Result<()> {
//!         let mut ticks = tokio::time::interval(Duration::from_secs(1));
//!         loop {
//!             tokio::select! {
//!                 _ = token.cancelled() => return Ok(()),
//!                 _ = ticks.tick() => tracing::info!("alive"),
//!             }
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut app = Application::builder()
//!         .init_timeout(Duration::from_secs(5))
//!         .termination_timeout(Duration::from_secs(5))
//!         .build();
//!
//!     app.register_service(|_token, _handle| async { Ok(Heartbeat) })?;
//!
//!     let token = CancellationToken::new();
//!     app.init(&token, &[]).await?;
//!     app.run(&token).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;

// Re-export core types
pub use config::Config;
pub use error::{Error, Result};
pub use lifecycle::{Application, ApplicationBuilder, LifecycleError, State};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
///
/// ```
/// use orchestrion::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::lifecycle::{
        Application, ApplicationBuilder, Constructor, LifecycleError, LifecycleHandle, Logger,
        NoopLogger, PanicError, Resource, Service, State, TerminationCause, TerminationSignal,
        TracingLogger,
    };
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}
