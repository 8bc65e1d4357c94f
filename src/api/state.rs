use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::classify::{Classifier, DEFAULT_BATCH_SIZE};
use crate::gemini::GeminiClassifier;
use crate::models::{AnalysisSession, SessionSummary};

/// Per-request classifier steering.
#[derive(Debug, Clone, Default)]
pub struct ClassifyOptions {
    pub system_instruction: Option<String>,
    pub suggested_labels: Vec<String>,
}

/// Builds the classifier used for one session request.
pub type ClassifierProvider = Arc<dyn Fn(&ClassifyOptions) -> Arc<dyn Classifier> + Send + Sync>;

/// Sessions kept by [`SessionStore::new`] before the oldest is evicted.
pub const DEFAULT_MAX_SESSIONS: usize = 32;

/// In-memory sessions, keyed by id. Nothing survives a restart.
///
/// At most `limit` sessions are held; inserting past it evicts the oldest by
/// `created_at`. The lock is only held for synchronous reads and edits,
/// never across an `.await`.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, AnalysisSession>>>,
    limit: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding at most `limit` sessions (at least one).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn insert(&self, session: AnalysisSession) -> Uuid {
        let id = session.id;
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        while sessions.len() >= self.limit {
            let Some(oldest) = sessions
                .values()
                .min_by_key(|s| s.created_at)
                .map(|s| s.id)
            else {
                break;
            };
            sessions.remove(&oldest);
            tracing::info!("Evicted session {} (limit {})", oldest, self.limit);
        }
        sessions.insert(id, session);
        id
    }

    /// All sessions, oldest first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.lock().expect("session store lock poisoned");
        let mut list: Vec<SessionSummary> = sessions.values().map(SessionSummary::from).collect();
        list.sort_by_key(|s| s.created_at);
        list
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions.remove(&id).is_some()
    }

    /// Run `f` against the session, if it exists.
    pub fn with_session<R>(&self, id: Uuid, f: impl FnOnce(&mut AnalysisSession) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions.get_mut(&id).map(f)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared state for the review/edit API.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    provider: ClassifierProvider,
    pub batch_size: usize,
}

impl AppState {
    pub fn new(provider: ClassifierProvider, batch_size: usize) -> Self {
        Self {
            sessions: SessionStore::new(),
            provider,
            batch_size,
        }
    }

    /// Replace the session store with one holding at most `limit` sessions.
    pub fn with_session_limit(mut self, limit: usize) -> Self {
        self.sessions = SessionStore::with_limit(limit);
        self
    }

    /// Use the same classifier for every request, ignoring per-request options.
    pub fn with_classifier(classifier: Arc<dyn Classifier>) -> Self {
        Self::new(
            Arc::new(move |_: &ClassifyOptions| classifier.clone()),
            DEFAULT_BATCH_SIZE,
        )
    }

    /// Gemini-backed state. Per-request options replace the configured ones.
    pub fn gemini(base: GeminiClassifier, batch_size: usize) -> Self {
        let provider: ClassifierProvider = Arc::new(move |options: &ClassifyOptions| {
            let mut classifier = base.clone();
            if options.system_instruction.is_some() {
                classifier = classifier.with_system_instruction(options.system_instruction.clone());
            }
            if !options.suggested_labels.is_empty() {
                classifier = classifier.with_suggested_labels(options.suggested_labels.clone());
            }
            Arc::new(classifier) as Arc<dyn Classifier>
        });
        Self::new(provider, batch_size)
    }

    pub fn classifier(&self, options: &ClassifyOptions) -> Arc<dyn Classifier> {
        (self.provider)(options)
    }
}
