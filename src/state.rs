use crate::models::Snapshot;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::{Mutex, MutexGuard, RwLock};

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
    refresh_gate: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(data_path: PathBuf, snapshot: Snapshot) -> Self {
        Self {
            data_path,
            snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
            refresh_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Current snapshot. The read lock is released before the caller aggregates.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    pub async fn replace_snapshot(&self, snapshot: Snapshot) {
        *self.snapshot.write().await = Arc::new(snapshot);
    }

    /// Claim the single refresh slot; `None` while another refresh holds it.
    pub fn try_begin_refresh(&self) -> Option<MutexGuard<'_, ()>> {
        self.refresh_gate.try_lock().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientRecord;

    #[tokio::test]
    async fn only_one_refresh_at_a_time() {
        let state = AppState::new(PathBuf::from("unused.json"), Snapshot::default());
        let first = state.try_begin_refresh();
        assert!(first.is_some());
        assert!(state.try_begin_refresh().is_none());
        drop(first);
        assert!(state.try_begin_refresh().is_some());
    }

    #[tokio::test]
    async fn replacing_snapshot_leaves_old_handles_untouched() {
        let state = AppState::new(PathBuf::from("unused.json"), Snapshot::default());
        let before = state.snapshot().await;

        let replacement = Snapshot {
            clients: vec![ClientRecord { status: Some("Activo".into()) }],
            ..Snapshot::default()
        };
        state.replace_snapshot(replacement).await;

        assert!(before.clients.is_empty());
        assert_eq!(state.snapshot().await.clients.len(), 1);
    }
}
