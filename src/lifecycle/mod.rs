//! Lifecycle Module
//!
//! This module drives the ordered startup, concurrent execution and
//! graceful shutdown of the services that make up an application.
//!
//! # Lifecycle Phases
//!
//! ```text
//! 1. Registration: register_service / register_resource      [Init]
//!    ↓
//! 2. init: constructors run one by one, signal hooks installed
//!    ↓                                                        [Ready]
//! 3. run: every service's serve() on its own task
//!    ↓                                                        [Running]
//! [first of: service error, panic, signal, cancelled token]
//!    ↓                                                        [Shutdown]
//! 4. close services, then resources, in registration order
//!    ↓                                                        [Off]
//! ```
//!
//! A failing `init` jumps straight to step 4 with whatever was constructed.
//!
//! # Example
//!
//! ```rust,ignore
//! use orchestrion::lifecycle::{Application, Resource, Service};
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Worker;
//!
//! #[async_trait]
//! impl Resource for Worker {
//!     async fn close(&self) -> anyhow::Result<()> {
//!         tracing::info!("Worker closed");
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl Service for Worker {
//!     async fn serve(&self, token: CancellationToken) -> anyhow::Result<()> {
//!         token.cancelled().await;
//!         Ok(())
//!     }
//! }
//!
//! let mut app = Application::builder().build();
//! app.register_service(|_token, _handle| async { Ok(Worker) })?;
//!
//! let token = CancellationToken::new();
//! app.init(&token, &[]).await?;
//! app.run(&token).await?;
//! ```

mod application;
mod error;
mod guard;
mod handle;
mod init;
mod logger;
mod registry;
mod runner;
mod shutdown;
mod signals;
mod state;
mod traits;

pub use application::{Application, ApplicationBuilder};
pub use error::{LifecycleError, Result};
pub use guard::{PanicError, supervise};
pub use handle::LifecycleHandle;
pub use logger::{Logger, NoopLogger, TracingLogger};
pub use registry::{Constructor, ServiceFuture};
pub use signals::{TerminationCause, TerminationSignal};
pub use state::State;
pub use traits::{Resource, Service};
