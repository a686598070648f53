//! Test doubles shared by the lifecycle integration tests.

#![allow(dead_code)]

use orchestrion::lifecycle::{Logger, Resource, Service};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Ordered record of every close, shared between doubles.
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

/// Error type used to check that service errors come back unchanged.
#[derive(Debug, thiserror::Error)]
#[error("listener on port {port} closed unexpectedly")]
pub struct ListenerClosed {
    pub port: u16,
}

/// What a [`ScriptedService`] does inside `serve`.
#[derive(Clone)]
pub enum Script {
    /// Serve until the application shuts down
    UntilCancelled,
    /// Fail with [`ListenerClosed`] after the delay
    FailAfter(Duration, u16),
    /// Panic with the message after the delay
    PanicAfter(Duration, &'static str),
}

pub struct ScriptedService {
    name: String,
    script: Script,
    journal: Journal,
    closes: Arc<AtomicUsize>,
}

impl ScriptedService {
    pub fn new(name: &str, script: Script, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            script,
            journal: journal.clone(),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter incremented by every `close` call
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

#[async_trait::async_trait]
impl Resource for ScriptedService {
    async fn close(&self) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.journal.record(format!("close {}", self.name));
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait::async_trait]
impl Service for ScriptedService {
    async fn serve(&self, token: CancellationToken) -> anyhow::Result<()> {
        match self.script.clone() {
            Script::UntilCancelled => {
                token.cancelled().await;
                Ok(())
            }
            Script::FailAfter(delay, port) => {
                tokio::time::sleep(delay).await;
                Err(ListenerClosed { port }.into())
            }
            Script::PanicAfter(delay, message) => {
                tokio::time::sleep(delay).await;
                abort_serving(message)
            }
        }
    }
}

/// Panicking frame that recovered stack traces are expected to name.
#[inline(never)]
pub fn abort_serving(message: &'static str) -> anyhow::Result<()> {
    std::panic::panic_any(message)
}

/// A resource that records its close and can be told to fail it.
pub struct TrackedResource {
    name: String,
    journal: Journal,
    fail: bool,
}

impl TrackedResource {
    pub fn new(name: &str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            journal: journal.clone(),
            fail: false,
        })
    }

    pub fn failing(name: &str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            journal: journal.clone(),
            fail: true,
        })
    }
}

#[async_trait::async_trait]
impl Resource for TrackedResource {
    async fn close(&self) -> anyhow::Result<()> {
        self.journal.record(format!("close {}", self.name));
        if self.fail {
            anyhow::bail!("{} refused to close", self.name);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Logger that keeps every line for inspection.
#[derive(Clone, Default)]
pub struct CapturingLogger {
    lines: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CapturingLogger {
    pub fn lines_at(&self, level: Level) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line.clone())
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(_, line)| line.contains(needle))
    }
}

impl Logger for CapturingLogger {
    fn log(&self, level: Level, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}
