use crate::state::SessionStore;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::info;

/// Reaps sessions that nobody deleted.
pub struct SessionSweeper {
    store: SessionStore,
    ttl: Duration,
}

impl SessionSweeper {
    pub fn new(store: SessionStore, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn run_sweep(&self) -> SweepReport {
        let now = Instant::now();
        let ttl = self.ttl;
        let mut report = SweepReport::default();

        let removed = self.store.remove_where(|record| {
            let idle = now.saturating_duration_since(record.updated_at);
            if record.progress.status.is_terminal() {
                idle > ttl
            } else {
                idle > ttl * 2
            }
        });

        report.sessions_removed = removed.len();
        report.sessions_remaining = self.store.len();

        if report.sessions_removed > 0 {
            info!(
                sessions_removed = report.sessions_removed,
                sessions_remaining = report.sessions_remaining,
                "Session sweep completed"
            );
        }
        report
    }

    pub fn start_background_sweep(self, sweep_interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = interval(sweep_interval);

            loop {
                timer.tick().await;
                let report = self.run_sweep();
                tracing::debug!(?report, "Background session sweep");
            }
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_removed: usize,
    pub sessions_remaining: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::{JobStatus, TranslationProgress};

    fn progress(status: JobStatus) -> TranslationProgress {
        TranslationProgress {
            status,
            ..TranslationProgress::preparing()
        }
    }

    #[test]
    fn sweep_removes_only_expired_terminal_sessions() {
        let store = SessionStore::new();
        let done = store.create();
        let running = store.create();
        store.update(&done, progress(JobStatus::Completed));
        store.update(&running, progress(JobStatus::Translating));

        std::thread::sleep(Duration::from_millis(30));

        let sweeper = SessionSweeper::new(store.clone(), Duration::from_millis(20));
        let report = sweeper.run_sweep();

        assert_eq!(report.sessions_removed, 1);
        assert!(store.get(&done).is_err());
        assert!(store.get(&running).is_ok());
    }

    #[test]
    fn abandoned_sessions_expire_after_twice_the_ttl() {
        let store = SessionStore::new();
        let token = tokio_util::sync::CancellationToken::new();
        let id = store.create_with_token(token.clone());
        store.update(&id, progress(JobStatus::Translating));

        std::thread::sleep(Duration::from_millis(50));

        let report = SessionSweeper::new(store.clone(), Duration::from_millis(20)).run_sweep();
        assert_eq!(report.sessions_removed, 1);
        assert_eq!(report.sessions_remaining, 0);
        assert!(token.is_cancelled());
    }

    #[test]
    fn fresh_sessions_survive() {
        let store = SessionStore::new();
        store.create();
        let report = SessionSweeper::new(store.clone(), Duration::from_secs(3600)).run_sweep();
        assert_eq!(report, SweepReport { sessions_removed: 0, sessions_remaining: 1 });
    }
}
