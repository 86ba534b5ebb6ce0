use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::engine::refresh::Refresh;
use crate::models::dashboard::DashboardStats;

pub struct DashboardView {
    backend: Arc<dyn Backend>,
    issued: AtomicU64,
    applied: Mutex<u64>,
    stats_tx: watch::Sender<Option<DashboardStats>>,
}

impl DashboardView {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (stats_tx, _unused_rx) = watch::channel(None);

        Self {
            backend,
            issued: AtomicU64::new(0),
            applied: Mutex::new(0),
            stats_tx,
        }
    }

    pub fn snapshot(&self) -> Option<DashboardStats> {
        self.stats_tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<DashboardStats>> {
        self.stats_tx.subscribe()
    }

    /// Fetches a fresh aggregate and applies it unless a newer fetch already landed.
    /// Returns whether this fetch was applied.
    pub async fn reload(&self) -> bool {
        let ticket = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        let stats = match self.backend.dashboard_stats().await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(error = %err, "dashboard refetch failed; keeping previous snapshot");
                return false;
            }
        };

        self.apply(ticket, stats)
    }

    fn apply(&self, ticket: u64, stats: DashboardStats) -> bool {
        let mut applied = match self.applied.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if ticket <= *applied {
            debug!(ticket, applied = *applied, "dropping stale dashboard snapshot");
            return false;
        }

        *applied = ticket;
        self.stats_tx.send_replace(Some(stats));
        true
    }
}

#[async_trait]
impl Refresh for DashboardView {
    async fn refresh(&self) {
        self.reload().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::DashboardView;
    use crate::backend::MemoryBackend;
    use crate::models::dashboard::DashboardStats;

    fn stats(total: usize) -> DashboardStats {
        DashboardStats {
            total_deliveries: total,
            active_deliveries: 0,
            pending_deliveries: 0,
            completed_deliveries: 0,
            cancelled_deliveries: 0,
            drivers_online: 0,
            open_incidents: 0,
            unread_notifications: 0,
            revenue: 0.0,
            generated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn slow_older_response_does_not_overwrite_newer_one() {
        let view = DashboardView::new(Arc::new(MemoryBackend::new(16)));

        assert!(view.apply(2, stats(20)));
        assert!(!view.apply(1, stats(10)));

        assert_eq!(view.snapshot().unwrap().total_deliveries, 20);
    }

    #[tokio::test]
    async fn failed_refetch_keeps_previous_snapshot() {
        let backend = Arc::new(MemoryBackend::new(16));
        let view = DashboardView::new(backend.clone());

        assert!(view.reload().await);
        let before = view.snapshot().unwrap();

        backend.set_unavailable(true);
        assert!(!view.reload().await);

        assert_eq!(view.snapshot(), Some(before));
    }
}
