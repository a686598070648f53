//! Handle given to constructors and embedding code

use super::runner::Outcome;
use super::{LifecycleError, Resource, Result, State, TerminationCause};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Cloneable handle onto one [`Application`](super::Application)
///
/// Constructors receive one so they can register the resources they open.
/// Embedding code can use one to stop a running application from inside
/// the process.
#[derive(Clone)]
pub struct LifecycleHandle {
    state: watch::Receiver<State>,
    resources: mpsc::UnboundedSender<Arc<dyn Resource>>,
    outcomes: mpsc::UnboundedSender<Outcome>,
}

impl LifecycleHandle {
    pub(crate) fn new(
        state: watch::Receiver<State>,
        resources: mpsc::UnboundedSender<Arc<dyn Resource>>,
        outcomes: mpsc::UnboundedSender<Outcome>,
    ) -> Self {
        Self {
            state,
            resources,
            outcomes,
        }
    }

    /// Current state of the application
    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// Register a resource to be closed at shutdown
    ///
    /// Only valid while the application is still in `Init`, which includes
    /// the time constructors are running.
    pub fn register_resource<R>(&self, resource: Arc<R>) -> Result<()>
    where
        R: Resource + 'static,
    {
        let state = self.state();
        if state != State::Init {
            return Err(LifecycleError::wrong_state("register_resource", state));
        }
        // The application owns the receiver for its whole lifetime
        let _ = self.resources.send(resource);
        Ok(())
    }

    /// Ask a running application to stop cleanly
    ///
    /// Behaves like a termination signal: `run` returns `Ok(())` and
    /// shutdown follows. Allowed in `Ready` and `Running`; a request made
    /// in `Ready` is honoured as soon as `run` starts. Any other state
    /// returns `WrongState` and queues nothing.
    pub fn terminate(&self) -> Result<()> {
        let state = self.state();
        if !matches!(state, State::Ready | State::Running) {
            return Err(LifecycleError::wrong_state("terminate", state));
        }
        let _ = self.outcomes.send(Outcome::Terminate(TerminationCause::Requested));
        Ok(())
    }
}
