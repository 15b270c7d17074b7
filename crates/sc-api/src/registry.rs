use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sc_core::{ErrorKind, ScribeError};
use sc_runtime::Session;

use crate::save::SaveStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Result<Self, ScribeError> {
        Uuid::parse_str(raw).map(Self).map_err(|error| {
            ScribeError::new(
                ErrorKind::Access,
                "SESSION_ID_INVALID",
                format!("Invalid session id \"{}\": {}", raw, error),
            )
        })
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type SharedSession = Arc<Mutex<Session>>;

/// Independent sessions, one per player or live preview. The map lock is only
/// held to look a session up; each session has its own lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, session: Session) -> SessionId {
        let id = SessionId::new();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(Mutex::new(session)));
        log::info!("registered session {}", id);
        id
    }

    pub fn remove(&self, id: SessionId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            log::info!("removed session {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    fn get(&self, id: SessionId) -> Result<SharedSession, ScribeError> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| {
                ScribeError::new(
                    ErrorKind::Access,
                    "SESSION_NOT_FOUND",
                    format!("No session with id {}", id),
                )
            })
    }

    /// Runs `f` with exclusive access to one session.
    pub fn with_session<R>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, ScribeError> {
        let shared = self.get(id)?;
        let mut session = shared.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut session))
    }

    /// Copies the state under the session lock and writes it after release.
    pub fn save_session(
        &self,
        id: SessionId,
        store: &dyn SaveStore,
        slot: &str,
    ) -> Result<(), ScribeError> {
        let snapshot = self.with_session(id, |session| session.snapshot())?;
        store.save(slot, &snapshot)
    }

    /// Returns `false` when the slot is empty; the session is left untouched
    /// unless a complete state was decoded.
    pub fn load_session(
        &self,
        id: SessionId,
        store: &dyn SaveStore,
        slot: &str,
    ) -> Result<bool, ScribeError> {
        let shared = self.get(id)?;
        let Some(state) = store.load(slot)? else {
            return Ok(false);
        };
        shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .restore(state);
        Ok(true)
    }
}
