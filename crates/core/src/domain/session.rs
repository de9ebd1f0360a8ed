use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Lifecycle of one conversation. `Cleared` is terminal: a reset creates a
/// fresh session instead of reviving the old one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Primed,
    Active,
    Cleared,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Primed => "primed",
            Self::Active => "active",
            Self::Cleared => "cleared",
        }
    }

    pub fn accepts_turns(&self) -> bool {
        matches!(self, Self::Primed | Self::Active)
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Uninitialized, Self::Primed)
                | (Self::Primed, Self::Active)
                | (Self::Uninitialized | Self::Primed | Self::Active, Self::Cleared)
        )
    }

    pub fn transition_to(&mut self, next: SessionState) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            *self = next;
            return Ok(());
        }

        Err(DomainError::InvalidSessionTransition { from: *self, to: next })
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState;
    use crate::errors::DomainError;

    #[test]
    fn follows_the_conversation_lifecycle() {
        let mut state = SessionState::Uninitialized;
        state.transition_to(SessionState::Primed).expect("uninitialized -> primed");
        state.transition_to(SessionState::Active).expect("primed -> active");
        state.transition_to(SessionState::Cleared).expect("active -> cleared");
        assert_eq!(state, SessionState::Cleared);
    }

    #[test]
    fn cleared_is_terminal() {
        let mut state = SessionState::Cleared;
        for next in [SessionState::Uninitialized, SessionState::Primed, SessionState::Active] {
            let error = state.transition_to(next).expect_err("cleared sessions never revive");
            assert!(matches!(error, DomainError::InvalidSessionTransition { .. }));
        }
    }

    #[test]
    fn turns_require_priming() {
        let mut state = SessionState::Uninitialized;
        assert!(!state.accepts_turns());
        assert!(state.transition_to(SessionState::Active).is_err());
        state.transition_to(SessionState::Primed).expect("prime");
        assert!(state.accepts_turns());
    }
}
