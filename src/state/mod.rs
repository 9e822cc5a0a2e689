pub mod cleanup;

pub use cleanup::{SessionSweeper, SweepReport};

use crate::translation::{ProgressSink, TranslationProgress};
use crate::utils::{Result, TranslatorError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub progress: TranslationProgress,
    pub cancel: CancellationToken,
    pub created_at: Instant,
    pub updated_at: Instant,
}

/// In-memory registry of job progress, keyed by session id.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SessionRecord>> {
        self.sessions.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SessionRecord>> {
        self.sessions.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn create(&self) -> String {
        self.create_with_token(CancellationToken::new())
    }

    pub fn create_with_token(&self, cancel: CancellationToken) -> String {
        let session_id = Uuid::new_v4().to_string();
        let now = Instant::now();
        self.write().insert(
            session_id.clone(),
            SessionRecord {
                progress: TranslationProgress::preparing(),
                cancel,
                created_at: now,
                updated_at: now,
            },
        );
        tracing::debug!(session_id = %session_id, "Session created");
        session_id
    }

    /// Replaces the stored snapshot. Unknown ids are ignored.
    pub fn update(&self, session_id: &str, progress: TranslationProgress) -> bool {
        match self.write().get_mut(session_id) {
            Some(record) => {
                record.progress = progress;
                record.updated_at = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, session_id: &str) -> Result<TranslationProgress> {
        self.read()
            .get(session_id)
            .map(|r| r.progress.clone())
            .ok_or_else(|| TranslatorError::SessionNotFound(session_id.to_string()))
    }

    /// Removes the session and cancels its job if still running.
    pub fn delete(&self, session_id: &str) -> Result<()> {
        let record = self
            .write()
            .remove(session_id)
            .ok_or_else(|| TranslatorError::SessionNotFound(session_id.to_string()))?;
        record.cancel.cancel();
        tracing::info!(session_id = %session_id, status = %record.progress.status, "Session deleted");
        Ok(())
    }

    pub fn cancellation_token(&self, session_id: &str) -> Option<CancellationToken> {
        self.read().get(session_id).map(|r| r.cancel.clone())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn sink(&self, session_id: impl Into<String>) -> SessionProgressSink {
        SessionProgressSink {
            store: self.clone(),
            session_id: session_id.into(),
        }
    }

    /// Removes every session matching `predicate`, returning the removed ids.
    pub(crate) fn remove_where<F>(&self, mut predicate: F) -> Vec<String>
    where
        F: FnMut(&SessionRecord) -> bool,
    {
        let mut sessions = self.write();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, record)| predicate(record))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(record) = sessions.remove(id) {
                record.cancel.cancel();
            }
        }
        expired
    }
}

/// Forwards a job's progress into its session record.
pub struct SessionProgressSink {
    store: SessionStore,
    session_id: String,
}

impl ProgressSink for SessionProgressSink {
    fn report(&self, progress: &TranslationProgress) {
        self.store.update(&self.session_id, progress.clone());
    }
}
