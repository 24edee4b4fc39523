pub mod auth;
pub mod error;
pub mod http;
pub mod ws_server;

use std::sync::Arc;

use mockview_app::controller::SessionController;
use mockview_app::hub::EventHub;
use mockview_core::config::{InterviewConfig, StoreBackend, StoreConfig};
use mockview_core::db::Database;
use mockview_core::questions::QuestionBank;
use mockview_core::store::{FallbackStore, MemoryStore, SessionStore};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::auth::TokenVerifier;
use crate::http::AppState;

/// Open the session store selected by `[store]`.
///
/// With `fallback_to_memory`, a database that cannot be opened is replaced
/// by the in-memory store instead of failing startup.
pub fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory session store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let db = match Database::open(&config.db_path) {
                Ok(db) => db,
                Err(e) if config.fallback_to_memory => {
                    warn!("[store] {e:#}; serving sessions from memory");
                    return Ok(Arc::new(MemoryStore::new()));
                }
                Err(e) => return Err(e.context("failed to open session database")),
            };
            match db.session_count() {
                Ok(count) => info!("Database opened at {} ({count} sessions)", config.db_path),
                Err(e) => warn!("[store] could not count sessions in {}: {e:#}", config.db_path),
            }

            let db: Arc<dyn SessionStore> = Arc::new(db);
            if config.fallback_to_memory {
                info!("In-memory fallback enabled for failed database writes");
                Ok(Arc::new(FallbackStore::new(db)))
            } else {
                Ok(db)
            }
        }
    }
}

/// Wire the controller and shared state. The returned receiver must be
/// driven by [`mockview_app::controller::run_expiry_loop`].
pub fn build_state(
    settings: InterviewConfig,
    store: Arc<dyn SessionStore>,
    verifier: Arc<dyn TokenVerifier>,
) -> (AppState, mpsc::Receiver<String>) {
    let bank = QuestionBank::builtin();
    info!("Question bank loaded with {} questions", bank.len());

    let (controller, expired_rx) =
        SessionController::new(store, bank, Arc::new(EventHub::default()), settings);
    let state = AppState {
        controller: Arc::new(controller),
        verifier,
    };
    (state, expired_rx)
}
