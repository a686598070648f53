//! Application lifecycle states
//!
//! ```text
//! Init ──► Ready ──► Running ──► Shutdown ──► Off
//!   │                               ▲
//!   └──────── (failed init) ────────┘
//! ```

use super::{LifecycleError, Result};
use strum_macros::{Display, EnumIter};
use tokio::sync::watch;

/// The phase an [`Application`](super::Application) is in.
///
/// States are ordered: an application only ever moves to a greater state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum State {
    /// Accepting registrations, constructors not yet run
    #[default]
    Init,
    /// Every constructor succeeded, services are not running yet
    Ready,
    /// Services are serving
    Running,
    /// Services and resources are being closed
    Shutdown,
    /// Terminal
    Off,
}

impl State {
    /// Whether no operation can succeed any more.
    pub fn is_terminal(self) -> bool {
        self == State::Off
    }
}

/// Holds the current state and publishes every transition.
pub(crate) struct StateMachine {
    tx: watch::Sender<State>,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(State::Init);
        Self { tx }
    }

    pub(crate) fn current(&self) -> State {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<State> {
        self.tx.subscribe()
    }

    /// Fail with `WrongState` unless the machine is in `expected`.
    pub(crate) fn require(&self, operation: &'static str, expected: State) -> Result<()> {
        let state = self.current();
        if state != expected {
            return Err(LifecycleError::wrong_state(operation, state));
        }
        Ok(())
    }

    /// Move forward to `next`. Re-entering or going back is rejected.
    pub(crate) fn advance(&self, operation: &'static str, next: State) -> Result<()> {
        let state = self.current();
        if next <= state {
            return Err(LifecycleError::wrong_state(operation, state));
        }
        self.tx.send_replace(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_states_are_ordered() {
        let states: Vec<State> = State::iter().collect();
        assert_eq!(
            states,
            vec![
                State::Init,
                State::Ready,
                State::Running,
                State::Shutdown,
                State::Off
            ]
        );
        assert!(states.windows(2).all(|w| w[0] < w[1]));
        assert!(State::Off.is_terminal());
        assert_eq!(State::Running.to_string(), "running");
    }

    #[test]
    fn test_advance_is_forward_only() {
        let machine = StateMachine::new();
        machine.advance("init", State::Ready).unwrap();
        assert_eq!(machine.current(), State::Ready);

        let err = machine.advance("init", State::Ready).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::WrongState {
                state: State::Ready,
                ..
            }
        ));
        assert!(machine.advance("reset", State::Init).is_err());
        assert_eq!(machine.current(), State::Ready);
    }

    #[test]
    fn test_require_reports_current_state() {
        let machine = StateMachine::new();
        let mut rx = machine.subscribe();

        assert!(machine.require("init", State::Init).is_ok());
        machine.advance("init", State::Ready).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), State::Ready);

        let err = machine.require("register_service", State::Init).unwrap_err();
        assert_eq!(
            err.to_string(),
            "register_service is not allowed in state ready"
        );
    }
}
