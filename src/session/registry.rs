//! Per-session state and the registry that owns it.
//!
//! Each interview session gets an id, a cancellation flag shared with any
//! in-flight generation, a rolling Q/A history, and a question counter.
//! Sessions are created and destroyed explicitly; nothing is reaped in the
//! background.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use super::history::QaHistory;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session '{0}' already exists")]
    AlreadyExists(String),

    #[error("session '{0}' not found")]
    NotFound(String),
}

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

/// State owned by one live session.
#[derive(Debug)]
pub struct SessionContext {
    id: String,
    cancel: Arc<AtomicBool>,
    questions_answered: AtomicU64,
    pub history: Mutex<QaHistory>,
}

impl SessionContext {
    fn new(id: String, history_window: usize) -> Self {
        Self {
            id,
            cancel: Arc::new(AtomicBool::new(false)),
            questions_answered: AtomicU64::new(0),
            history: Mutex::new(QaHistory::new(history_window)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Flag checked per token by the streaming client. Cloned into every
    /// generation started for this session.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Request that the current generation stop at the next token boundary.
    pub fn cancel_generation(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Re-arm the flag before starting a new generation.
    pub fn reset_cancel(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }

    pub fn record_answer(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn questions_answered(&self) -> u64 {
        self.questions_answered.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Explicit create/lookup/destroy map of live sessions.
pub struct SessionRegistry {
    history_window: usize,
    sessions: Mutex<HashMap<String, Arc<SessionContext>>>,
}

impl SessionRegistry {
    pub fn new(history_window: usize) -> Self {
        Self {
            history_window,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Create a session under `id`. Ids are caller-chosen and must be unique.
    pub fn create(&self, id: &str) -> Result<Arc<SessionContext>, SessionError> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        if sessions.contains_key(id) {
            return Err(SessionError::AlreadyExists(id.to_string()));
        }
        let context = Arc::new(SessionContext::new(id.to_string(), self.history_window));
        sessions.insert(id.to_string(), Arc::clone(&context));
        log::info!("session created: {id}");
        Ok(context)
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<SessionContext>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .get(id)
            .cloned()
    }

    /// Remove a session, cancelling any in-flight generation first.
    pub fn destroy(&self, id: &str) -> Result<(), SessionError> {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .remove(id);
        match removed {
            Some(context) => {
                context.cancel_generation();
                log::info!(
                    "session destroyed: {id} ({} questions answered)",
                    context.questions_answered()
                );
                Ok(())
            }
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_lookup_destroy_round_trip() {
        let registry = SessionRegistry::new(3);

        let created = registry.create("abc").expect("create");
        assert_eq!(created.id(), "abc");
        assert_eq!(registry.len(), 1);

        let found = registry.lookup("abc").expect("lookup");
        assert_eq!(found.id(), "abc");

        registry.destroy("abc").expect("destroy");
        assert!(registry.lookup("abc").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let registry = SessionRegistry::new(3);
        registry.create("abc").expect("first create");

        let err = registry.create("abc").unwrap_err();
        assert!(matches!(err, SessionError::AlreadyExists(id) if id == "abc"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn destroy_of_unknown_session_fails() {
        let registry = SessionRegistry::new(3);
        let err = registry.destroy("missing").unwrap_err();
        assert!(matches!(err, SessionError::NotFound(id) if id == "missing"));
    }

    #[test]
    fn destroy_cancels_in_flight_generation() {
        let registry = SessionRegistry::new(3);
        let session = registry.create("abc").expect("create");
        let cancel = session.cancel_flag();
        assert!(!cancel.load(Ordering::SeqCst));

        registry.destroy("abc").expect("destroy");
        assert!(cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn cancel_flag_resets_between_generations() {
        let registry = SessionRegistry::new(3);
        let session = registry.create("abc").expect("create");

        session.cancel_generation();
        assert!(session.cancel_flag().load(Ordering::SeqCst));

        session.reset_cancel();
        assert!(!session.cancel_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn question_counter_increments() {
        let registry = SessionRegistry::new(3);
        let session = registry.create("abc").expect("create");
        session.record_answer();
        session.record_answer();
        assert_eq!(session.questions_answered(), 2);
    }

    #[test]
    fn history_window_comes_from_registry() {
        let registry = SessionRegistry::new(2);
        let session = registry.create("abc").expect("create");

        let mut history = session.history.lock().unwrap();
        history.push("q1", "a1");
        history.push("q2", "a2");
        history.push("q3", "a3");
        assert_eq!(history.len(), 2);
        assert_eq!(history.pairs()[0].question, "q2");
    }
}
