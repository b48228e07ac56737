//! Per-invocation confirmation state machine.
//!
//! `Requested` moves to `Executing` when no confirmation is needed or the
//! caller asserted `confirmed=true`; otherwise it stops at
//! `AwaitingConfirmation`. Nothing is remembered between calls, so a
//! confirmed re-invocation is validated and checked from scratch.

use crate::confirmation::ConfirmationLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Requested,
    AwaitingConfirmation,
    Executing,
}

impl InvocationState {
    pub fn advance(self, level: ConfirmationLevel, confirmed: bool) -> InvocationState {
        match self {
            InvocationState::Requested => match (level, confirmed) {
                (ConfirmationLevel::None, _) => InvocationState::Executing,
                (ConfirmationLevel::Manual, true) => InvocationState::Executing,
                (ConfirmationLevel::Manual, false) => InvocationState::AwaitingConfirmation,
            },
            terminal => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvocationState::AwaitingConfirmation)
    }

    pub fn may_execute(&self) -> bool {
        matches!(self, InvocationState::Executing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_confirmation_executes() {
        let state = InvocationState::Requested.advance(ConfirmationLevel::None, false);
        assert!(state.may_execute());
    }

    #[test]
    fn test_manual_unconfirmed_waits() {
        let state = InvocationState::Requested.advance(ConfirmationLevel::Manual, false);
        assert_eq!(state, InvocationState::AwaitingConfirmation);
        assert!(state.is_terminal());
        assert!(!state.may_execute());
    }

    #[test]
    fn test_manual_confirmed_executes() {
        let state = InvocationState::Requested.advance(ConfirmationLevel::Manual, true);
        assert_eq!(state, InvocationState::Executing);
    }

    #[test]
    fn test_awaiting_is_sticky_within_a_call() {
        let state = InvocationState::AwaitingConfirmation.advance(ConfirmationLevel::Manual, true);
        assert_eq!(state, InvocationState::AwaitingConfirmation);
    }
}
