use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::types::{FieldKey, StagedUpload};

/// The staged files of one field. Holding the lock gives exclusive access
/// to the list for the whole validate-then-append sequence.
pub type StagedList = Arc<Mutex<Vec<StagedUpload>>>;

/// Staged files of one session, keyed by field identifier.
#[derive(Debug)]
pub struct SessionStagingArea {
    fields: DashMap<String, StagedList>,
    last_access_ms: AtomicI64,
}

impl SessionStagingArea {
    fn new() -> Self {
        Self {
            fields: DashMap::new(),
            last_access_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    /// Returns the list of a field, creating an empty one on first use.
    pub fn field(&self, field_name: &str) -> StagedList {
        self.touch();
        self.fields
            .entry(field_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .value()
            .clone()
    }

    pub fn existing_field(&self, field_name: &str) -> Option<StagedList> {
        self.touch();
        self.fields.get(field_name).map(|f| f.value().clone())
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.key().clone()).collect()
    }

    pub fn touch(&self) {
        self.last_access_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn idle_for(&self, now_ms: i64) -> Duration {
        let last = self.last_access_ms.load(Ordering::Relaxed);
        Duration::from_millis(now_ms.saturating_sub(last).max(0) as u64)
    }
}

/// Process-wide map from session id to its staging area.
///
/// Creation goes through the map's entry API so concurrent first accesses for
/// the same session agree on a single area. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct StagingRegistry {
    sessions: Arc<DashMap<String, Arc<SessionStagingArea>>>,
}

impl StagingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guarantees the session area and the field list exist, without
    /// clearing anything already staged, and returns the field list.
    pub fn ensure_session(&self, key: &FieldKey) -> StagedList {
        let area = self
            .sessions
            .entry(key.session_id.clone())
            .or_insert_with(|| {
                tracing::debug!("Creating staging area for session {}", key.session_id);
                Arc::new(SessionStagingArea::new())
            })
            .value()
            .clone();
        area.field(&key.field_name)
    }

    pub fn session(&self, session_id: &str) -> Option<Arc<SessionStagingArea>> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    /// Looks up a field list without creating anything.
    pub fn field(&self, key: &FieldKey) -> Option<StagedList> {
        self.session(&key.session_id)
            .and_then(|area| area.existing_field(&key.field_name))
    }

    /// Drops the whole area of a session. Returns whether one existed.
    pub fn discard(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Evicts every session untouched for longer than `max_idle`.
    pub fn purge_idle(&self, max_idle: Duration) -> usize {
        let now = Utc::now().timestamp_millis();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, area| area.idle_for(now) <= max_idle);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
