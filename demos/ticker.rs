//! A ticker service and a resource it writes to, stopped with Ctrl+C.
//!
//! ```text
//! ORCHESTRION_TERMINATION_TIMEOUT_MS=2000 cargo run --example ticker
//! ```

use orchestrion::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counts ticks and reports the total when closed
#[derive(Default)]
struct TickStore {
    ticks: AtomicU64,
}

#[async_trait]
impl Resource for TickStore {
    async fn close(&self) -> anyhow::Result<()> {
        tracing::info!(
            "TickStore closed after {} ticks",
            self.ticks.load(Ordering::SeqCst)
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "TickStore"
    }
}

struct Ticker {
    every: Duration,
    store: Arc<TickStore>,
}

#[async_trait]
impl Resource for Ticker {
    async fn close(&self) -> anyhow::Result<()> {
        tracing::info!("Ticker closed");
        Ok(())
    }

    fn name(&self) -> &str {
        "Ticker"
    }
}

#[async_trait]
impl Service for Ticker {
    async fn serve(&self, token: CancellationToken) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(self.every);
        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = interval.tick() => {
                    let total = self.store.ticks.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::info!("tick #{}", total);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting ticker demo...");

    let mut config = Config::from_env()?;
    if config.init_timeout.is_zero() {
        config = config.with_init_timeout(Duration::from_secs(5));
    }
    let mut app = Application::new(config);

    app.register_service(|_token, handle: LifecycleHandle| async move {
        let store = Arc::new(TickStore::default());
        handle.register_resource(Arc::clone(&store))?;
        Ok(Ticker {
            every: Duration::from_millis(500),
            store,
        })
    })?;

    let token = CancellationToken::new();
    app.init(&token, &[]).await?;

    tracing::info!("Ticker running, press Ctrl+C to stop");
    app.run(&token).await?;

    tracing::info!("Bye");
    Ok(())
}
