// Session repository abstraction with in-memory and fallback implementations.
//
// `SessionStore` is the seam between the controller and persistence. The
// SQLite implementation lives in `db.rs`; this module holds the trait, the
// in-process `MemoryStore`, and `FallbackStore`, which keeps serving from
// memory when its primary store cannot be written.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::model::InterviewSession;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    /// Wrap a backend failure, keeping the full context chain in the message.
    pub fn unavailable(err: anyhow::Error) -> Self {
        StoreError::Unavailable {
            message: format!("{err:#}"),
        }
    }
}

/// In-place edit applied atomically by [`SessionStore::update`]. Returns
/// `true` if it changed the session; `false` means "leave it as is" and
/// nothing is written.
///
/// Owned so a store can hand it to a blocking worker; cloning is cheap and
/// a wrapper store may apply the same edit to more than one backend.
pub type Mutation = Arc<dyn Fn(&mut InterviewSession) -> bool + Send + Sync>;

/// Outcome of an [`SessionStore::update`] on an existing session.
#[derive(Debug, Clone, PartialEq)]
pub struct Updated {
    /// The session as stored after the call.
    pub session: InterviewSession,
    /// Whether the mutation reported a change.
    pub changed: bool,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Short backend label for logs.
    fn name(&self) -> &'static str;

    async fn insert(&self, session: &InterviewSession) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<InterviewSession>, StoreError>;

    /// All sessions for `user_id`, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<InterviewSession>, StoreError>;

    /// Load, mutate, and save one session as a single step. Returns `None`
    /// if no session has that id.
    async fn update(&self, id: &str, mutate: Mutation) -> Result<Option<Updated>, StoreError>;
}

fn newest_first(sessions: &mut [InterviewSession]) {
    sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Process-local session map. No eviction; contents die with the process.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, InterviewSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, InterviewSession>> {
        self.sessions.lock().expect("memory store mutex poisoned")
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions().contains_key(id)
    }

    /// Apply `mutate` to the stored copy of `session`, inserting it first
    /// only if no copy is held yet. One lock covers both steps, so a copy
    /// another caller already adopted (and maybe edited) is kept.
    fn adopt_and_update(&self, session: InterviewSession, mutate: &Mutation) -> Updated {
        let mut sessions = self.sessions();
        let stored = sessions.entry(session.id.clone()).or_insert(session);
        let changed = mutate(stored);
        Updated {
            session: stored.clone(),
            changed,
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, session: &InterviewSession) -> Result<(), StoreError> {
        self.sessions().insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<InterviewSession>, StoreError> {
        Ok(self.sessions().get(id).cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<InterviewSession>, StoreError> {
        let mut found: Vec<InterviewSession> = self
            .sessions()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut found);
        Ok(found)
    }

    async fn update(&self, id: &str, mutate: Mutation) -> Result<Option<Updated>, StoreError> {
        let mut sessions = self.sessions();
        let Some(session) = sessions.get_mut(id) else {
            return Ok(None);
        };
        let changed = mutate(session);
        Ok(Some(Updated {
            session: session.clone(),
            changed,
        }))
    }
}

// ---------------------------------------------------------------------------
// FallbackStore
// ---------------------------------------------------------------------------

/// Wraps a primary store and diverts to an in-process map when the primary
/// fails. Reads check memory first, then the primary. A failed primary read
/// of a session not held in memory is an error, the same as a failed update;
/// only history listings degrade to the in-memory subset.
///
/// Sessions that land in memory are not copied back to the primary and
/// are not shared between processes.
pub struct FallbackStore {
    primary: Arc<dyn SessionStore>,
    memory: MemoryStore,
}

impl FallbackStore {
    pub fn new(primary: Arc<dyn SessionStore>) -> Self {
        FallbackStore {
            primary,
            memory: MemoryStore::new(),
        }
    }

    /// Number of sessions currently held only in memory.
    pub fn diverted(&self) -> usize {
        self.memory.len()
    }
}

#[async_trait]
impl SessionStore for FallbackStore {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn insert(&self, session: &InterviewSession) -> Result<(), StoreError> {
        if let Err(e) = self.primary.insert(session).await {
            warn!(
                "[store] {} write failed, keeping session {} in memory: {e}",
                self.primary.name(),
                session.id
            );
            self.memory.insert(session).await?;
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<InterviewSession>, StoreError> {
        if let Some(session) = self.memory.get(id).await? {
            return Ok(Some(session));
        }
        self.primary.get(id).await.inspect_err(|e| {
            warn!("[store] {} read failed for session {id}: {e}", self.primary.name())
        })
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<InterviewSession>, StoreError> {
        let mut merged = self.memory.list_for_user(user_id).await?;
        match self.primary.list_for_user(user_id).await {
            Ok(persisted) => {
                for session in persisted {
                    if !merged.iter().any(|s| s.id == session.id) {
                        merged.push(session);
                    }
                }
            }
            Err(e) => {
                warn!(
                    "[store] {} history read failed for user {user_id}, returning in-memory sessions only: {e}",
                    self.primary.name()
                );
            }
        }
        newest_first(&mut merged);
        Ok(merged)
    }

    async fn update(&self, id: &str, mutate: Mutation) -> Result<Option<Updated>, StoreError> {
        if self.memory.contains(id) {
            return self.memory.update(id, mutate).await;
        }

        let err = match self.primary.update(id, mutate.clone()).await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        warn!(
            "[store] {} update failed for session {id}, continuing in memory: {err}",
            self.primary.name()
        );
        // Take the record over into memory so this and later calls can proceed.
        match self.primary.get(id).await {
            Ok(Some(session)) => Ok(Some(self.memory.adopt_and_update(session, &mutate))),
            Ok(None) => Ok(None),
            Err(_) => Err(err),
        }
    }
}
