use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use procura_core::{DomainError, SessionState};
use tokio::sync::{Mutex, RwLock};

use crate::conversation::Conversation;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub owner_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(owner_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self { owner_id: owner_id.into(), session_id: session_id.into() }
    }

    /// Key with a fresh random session id.
    pub fn generate(owner_id: impl Into<String>) -> Self {
        Self::new(owner_id, uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.session_id)
    }
}

#[derive(Debug)]
pub struct Session {
    key: SessionKey,
    state: SessionState,
    conversation: Conversation,
    turns: u32,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            state: SessionState::Uninitialized,
            conversation: Conversation::default(),
            turns: 0,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn turns(&self) -> u32 {
        self.turns
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub fn prime(&mut self, system_instruction: String) -> Result<(), DomainError> {
        self.state.transition_to(SessionState::Primed)?;
        self.conversation = Conversation::new(system_instruction);
        Ok(())
    }

    /// Move a primed session to active and count the turn.
    pub fn begin_turn(&mut self) -> Result<(), DomainError> {
        match self.state {
            SessionState::Active => {}
            SessionState::Primed => self.state.transition_to(SessionState::Active)?,
            other => {
                return Err(DomainError::InvalidSessionTransition {
                    from: other,
                    to: SessionState::Active,
                })
            }
        }
        self.turns += 1;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), DomainError> {
        self.state.transition_to(SessionState::Cleared)?;
        self.conversation = Conversation::default();
        Ok(())
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetOutcome {
    pub removed: bool,
    /// False when a turn still held the session; that turn finishes on the
    /// detached handle.
    pub cleared: bool,
}

/// Live sessions by key. Each session sits behind its own mutex so turns of
/// one session run one at a time while distinct sessions stay independent.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionKey, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, key: &SessionKey) -> SessionHandle {
        if let Some(existing) = self.sessions.read().await.get(key) {
            return existing.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(key.clone()))))
            .clone()
    }

    pub async fn get(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.read().await.get(key).cloned()
    }

    pub async fn remove(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.write().await.remove(key)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn reset(&self, key: &SessionKey) -> ResetOutcome {
        let Some(handle) = self.remove(key).await else {
            return ResetOutcome { removed: false, cleared: false };
        };

        let cleared = match handle.try_lock() {
            Ok(mut session) => session.clear().is_ok(),
            Err(_) => false,
        };
        tracing::info!(event_name = "session.reset", session = %key, cleared, "session reset");
        ResetOutcome { removed: true, cleared }
    }
}
