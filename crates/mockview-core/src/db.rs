// SQLite persistence layer for interview sessions.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::InterviewSession;
use crate::store::{Mutation, SessionStore, StoreError, Updated};

/// SQLite-backed session documents.
///
/// Each session is stored whole as a JSON document, with the columns used
/// for lookups (`user_id`, `status`, `started_at`) duplicated alongside it.
///
/// The methods here block. Through [`SessionStore`] they run on tokio's
/// blocking pool, so async callers never hold the connection lock on a
/// runtime worker. Clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                status     TEXT NOT NULL,
                started_at TEXT NOT NULL,
                document   TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_user_started
                ON sessions(user_id, started_at);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Insert a new session. Fails if the id already exists.
    pub fn insert_session(&self, session: &InterviewSession) -> Result<()> {
        let conn = self.conn();
        let document =
            serde_json::to_string(session).context("failed to serialize session")?;
        conn.execute(
            "INSERT INTO sessions (id, user_id, status, started_at, document)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.id,
                session.user_id,
                session.status.as_str(),
                timestamp(session),
                document,
            ],
        )
        .with_context(|| format!("failed to insert session {}", session.id))?;
        Ok(())
    }

    /// Load a session by id. Returns `None` if it does not exist.
    pub fn load_session(&self, id: &str) -> Result<Option<InterviewSession>> {
        let conn = self.conn();
        load_document(&conn, id)
    }

    /// All sessions belonging to `user_id`, newest first.
    pub fn list_sessions(&self, user_id: &str) -> Result<Vec<InterviewSession>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT document FROM sessions WHERE user_id = ?1
                 ORDER BY started_at DESC, id",
            )
            .context("failed to prepare list_sessions query")?;

        let documents = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))
            .context("failed to query sessions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map session rows")?;

        documents
            .iter()
            .map(|doc| serde_json::from_str(doc).context("failed to deserialize session"))
            .collect()
    }

    /// Load, mutate and write back a session inside one transaction.
    /// Nothing is written when `mutate` reports no change.
    pub fn update_session(
        &self,
        id: &str,
        mutate: &dyn Fn(&mut InterviewSession) -> bool,
    ) -> Result<Option<Updated>> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let Some(mut session) = load_document(&tx, id)? else {
            return Ok(None);
        };

        let changed = mutate(&mut session);
        if changed {
            let document =
                serde_json::to_string(&session).context("failed to serialize session")?;
            tx.execute(
                "UPDATE sessions SET status = ?2, document = ?3 WHERE id = ?1",
                params![session.id, session.status.as_str(), document],
            )
            .with_context(|| format!("failed to update session {id}"))?;
        }

        tx.commit().context("failed to commit session update")?;
        Ok(Some(Updated { session, changed }))
    }

    /// Number of stored sessions.
    pub fn session_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .context("failed to count sessions")?;
        Ok(count as usize)
    }

    /// Run `work` against a clone of this handle on the blocking pool.
    async fn run_blocking<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || work(&db))
            .await
            .map_err(|e| {
                StoreError::unavailable(anyhow::Error::new(e).context("database task failed"))
            })?
            .map_err(StoreError::unavailable)
    }
}

fn timestamp(session: &InterviewSession) -> String {
    session
        .started_at
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn load_document(conn: &Connection, id: &str) -> Result<Option<InterviewSession>> {
    let document: Option<String> = conn
        .query_row(
            "SELECT document FROM sessions WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .context("failed to query session")?;

    document
        .map(|doc| serde_json::from_str(&doc).context("failed to deserialize session"))
        .transpose()
}

#[async_trait]
impl SessionStore for Database {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, session: &InterviewSession) -> Result<(), StoreError> {
        let session = session.clone();
        self.run_blocking(move |db| db.insert_session(&session)).await
    }

    async fn get(&self, id: &str) -> Result<Option<InterviewSession>, StoreError> {
        let id = id.to_string();
        self.run_blocking(move |db| db.load_session(&id)).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<InterviewSession>, StoreError> {
        let user_id = user_id.to_string();
        self.run_blocking(move |db| db.list_sessions(&user_id)).await
    }

    async fn update(&self, id: &str, mutate: Mutation) -> Result<Option<Updated>, StoreError> {
        let id = id.to_string();
        self.run_blocking(move |db| db.update_session(&id, &*mutate)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Question, QuestionTest, SessionResult, SessionStatus};
    use chrono::{Duration, Utc};

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn sample_session(user: &str) -> InterviewSession {
        let question = Question {
            title: "Valid Parentheses".into(),
            prompt: "Brackets.".into(),
            difficulty: Difficulty::Easy,
            topic: "DSA".into(),
            kind: "coding".into(),
            function_name: "isValid".into(),
            starter_code: "function isValid(s) {}".into(),
            tests: vec![QuestionTest {
                input: serde_json::json!(["()"]),
                expected: serde_json::json!(true),
            }],
        };
        InterviewSession::new(user, question, 1800, Utc::now())
    }

    #[test]
    fn open_creates_sessions_table() {
        let db = test_db();
        let conn = db.conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"sessions".to_string()));
    }

    #[test]
    fn insert_and_load_round_trip() {
        let db = test_db();
        let session = sample_session("u1");
        db.insert_session(&session).unwrap();

        let loaded = db.load_session(&session.id).unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(db.session_count().unwrap(), 1);
    }

    #[test]
    fn load_missing_returns_none() {
        let db = test_db();
        assert!(db.load_session("does-not-exist").unwrap().is_none());
    }

    #[test]
    fn duplicate_insert_fails() {
        let db = test_db();
        let session = sample_session("u1");
        db.insert_session(&session).unwrap();
        assert!(db.insert_session(&session).is_err());
    }

    #[test]
    fn list_is_scoped_to_user_and_newest_first() {
        let db = test_db();
        let mut first = sample_session("u1");
        first.started_at = Utc::now() - Duration::hours(2);
        let mut second = sample_session("u1");
        second.started_at = Utc::now() - Duration::hours(1);
        let other = sample_session("u2");

        db.insert_session(&first).unwrap();
        db.insert_session(&second).unwrap();
        db.insert_session(&other).unwrap();

        let listed = db.list_sessions("u1").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert!(db.list_sessions("nobody").unwrap().is_empty());
    }

    #[test]
    fn update_persists_changes_and_status_column() {
        let db = test_db();
        let session = sample_session("u1");
        db.insert_session(&session).unwrap();

        let result = SessionResult {
            passed_count: 1,
            total_tests: 1,
            passed: true,
            feedback: "All tests passed".into(),
            complexity: "O(n)".into(),
        };
        let updated = db
            .update_session(&session.id, &|s: &mut InterviewSession| {
                s.submit("code".into(), result.clone(), Utc::now())
            })
            .unwrap()
            .unwrap();
        assert!(updated.changed);
        assert_eq!(updated.session.status, SessionStatus::Submitted);

        let reloaded = db.load_session(&session.id).unwrap().unwrap();
        assert_eq!(reloaded.status, SessionStatus::Submitted);
        assert_eq!(reloaded.result.unwrap().passed_count, 1);

        let status: String = db
            .conn()
            .query_row(
                "SELECT status FROM sessions WHERE id = ?1",
                params![session.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(status, "submitted");
    }

    #[test]
    fn update_without_change_writes_nothing() {
        let db = test_db();
        let session = sample_session("u1");
        db.insert_session(&session).unwrap();

        let updated = db
            .update_session(&session.id, &|_s: &mut InterviewSession| false)
            .unwrap()
            .unwrap();
        assert!(!updated.changed);
        assert_eq!(db.load_session(&session.id).unwrap().unwrap(), session);
    }

    #[test]
    fn update_missing_returns_none() {
        let db = test_db();
        let result = db
            .update_session("missing", &|s: &mut InterviewSession| s.record_hint())
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn store_trait_delegates_to_database() {
        let db = test_db();
        let session = sample_session("u1");
        SessionStore::insert(&db, &session).await.unwrap();

        let updated = SessionStore::update(
            &db,
            &session.id,
            Arc::new(|s: &mut InterviewSession| s.record_hint()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.session.hints_used, 1);
        assert_eq!(db.list_for_user("u1").await.unwrap().len(), 1);
        assert_eq!(SessionStore::get(&db, &session.id).await.unwrap().unwrap().hints_used, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_store_updates_run_off_the_runtime_and_all_land() {
        let db = test_db();
        let session = sample_session("u1");
        db.insert_session(&session).unwrap();
        let store: Arc<dyn SessionStore> = Arc::new(db.clone());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let id = session.id.clone();
                tokio::spawn(async move {
                    store
                        .update(&id, Arc::new(|s: &mut InterviewSession| s.record_hint()))
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap().unwrap().changed);
        }

        assert_eq!(db.load_session(&session.id).unwrap().unwrap().hints_used, 8);
    }
}
