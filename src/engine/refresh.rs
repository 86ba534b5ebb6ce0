use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::backend::{ChangeEvent, Table};
use crate::observability::metrics::Metrics;

#[async_trait]
pub trait Refresh: Send + Sync {
    async fn refresh(&self);
}

struct Registration {
    name: String,
    tables: Vec<Table>,
    view: Arc<dyn Refresh>,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    entries: DashMap<u64, Registration>,
}

#[derive(Clone)]
pub struct RefreshDispatcher {
    registry: Arc<Registry>,
    debounce: Duration,
    metrics: Metrics,
}

/// Keeps a view registered; dropping it unregisters the view.
pub struct Subscription {
    id: u64,
    registry: Arc<Registry>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some((_, registration)) = self.registry.entries.remove(&self.id) {
            debug!(view = %registration.name, "view unsubscribed");
        }
    }
}

impl RefreshDispatcher {
    pub fn new(debounce: Duration, metrics: Metrics) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            debounce,
            metrics,
        }
    }

    pub fn subscribe(
        &self,
        name: impl Into<String>,
        tables: &[Table],
        view: Arc<dyn Refresh>,
    ) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let name = name.into();
        debug!(view = %name, ?tables, "view subscribed");

        self.registry.entries.insert(
            id,
            Registration {
                name,
                tables: tables.to_vec(),
                view,
            },
        );

        Subscription {
            id,
            registry: self.registry.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.entries.len()
    }

    pub fn spawn(&self, changes: broadcast::Receiver<ChangeEvent>) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.run(changes).await })
    }

    async fn run(self, mut changes: broadcast::Receiver<ChangeEvent>) {
        info!(debounce_ms = self.debounce.as_millis() as u64, "refresh dispatcher started");

        loop {
            let mut touched = HashSet::new();

            match changes.recv().await {
                Ok(event) => {
                    touched.insert(event.table);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change feed lagged; refreshing every view");
                    touched.extend(Table::ALL);
                }
                Err(RecvError::Closed) => break,
            }

            let mut closed = false;
            if !self.debounce.is_zero() {
                let deadline = Instant::now() + self.debounce;
                loop {
                    match timeout_at(deadline, changes.recv()).await {
                        Ok(Ok(event)) => {
                            touched.insert(event.table);
                        }
                        Ok(Err(RecvError::Lagged(skipped))) => {
                            warn!(skipped, "change feed lagged; refreshing every view");
                            touched.extend(Table::ALL);
                        }
                        Ok(Err(RecvError::Closed)) => {
                            closed = true;
                            break;
                        }
                        Err(_elapsed) => break,
                    }
                }
            }

            self.fan_out(&touched);

            if closed {
                break;
            }
        }

        warn!("refresh dispatcher stopped: change feed closed");
    }

    /// Returns how many refetches were started.
    pub fn fan_out(&self, touched: &HashSet<Table>) -> usize {
        let mut started = 0;

        for entry in self.registry.entries.iter() {
            let registration = entry.value();
            if !registration.tables.iter().any(|table| touched.contains(table)) {
                continue;
            }

            self.metrics
                .view_refreshes_total
                .with_label_values(&[&registration.name])
                .inc();

            let view = registration.view.clone();
            tokio::spawn(async move { view.refresh().await });
            started += 1;
        }

        debug!(?touched, views = started, "refresh fanned out");
        started
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::{broadcast, mpsc};
    use tokio::time::{Duration, sleep, timeout};
    use uuid::Uuid;

    use super::{Refresh, RefreshDispatcher};
    use crate::backend::{ChangeEvent, ChangeKind, Table};
    use crate::observability::metrics::Metrics;

    struct CountingView {
        count: AtomicUsize,
        done_tx: mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl Refresh for CountingView {
        async fn refresh(&self) {
            self.count.fetch_add(1, Ordering::SeqCst);
            let _ = self.done_tx.send(());
        }
    }

    fn counting_view() -> (Arc<CountingView>, mpsc::UnboundedReceiver<()>) {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        (
            Arc::new(CountingView {
                count: AtomicUsize::new(0),
                done_tx,
            }),
            done_rx,
        )
    }

    fn event(table: Table) -> ChangeEvent {
        ChangeEvent {
            table,
            kind: ChangeKind::Update,
            record_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn one_event_triggers_exactly_one_refetch() {
        let (tx, rx) = broadcast::channel(16);
        let dispatcher = RefreshDispatcher::new(Duration::ZERO, Metrics::new());
        let (view, mut done_rx) = counting_view();

        let _subscription = dispatcher.subscribe(
            "dashboard",
            &[Table::Deliveries, Table::Drivers],
            view.clone(),
        );
        dispatcher.spawn(rx);

        tx.send(event(Table::Deliveries)).unwrap();

        timeout(Duration::from_secs(1), done_rx.recv())
            .await
            .expect("refresh should run")
            .unwrap();
        assert!(
            timeout(Duration::from_millis(100), done_rx.recv())
                .await
                .is_err(),
            "a single event must not refetch twice"
        );
        assert_eq!(view.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn untracked_tables_do_not_refetch() {
        let (tx, rx) = broadcast::channel(16);
        let dispatcher = RefreshDispatcher::new(Duration::ZERO, Metrics::new());
        let (view, _done_rx) = counting_view();

        let _subscription = dispatcher.subscribe("drivers", &[Table::Drivers], view.clone());
        dispatcher.spawn(rx);

        tx.send(event(Table::Notifications)).unwrap();
        sleep(Duration::from_millis(50)).await;

        assert_eq!(view.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropping_the_subscription_stops_refetches() {
        let (tx, rx) = broadcast::channel(16);
        let dispatcher = RefreshDispatcher::new(Duration::ZERO, Metrics::new());
        let (view, mut done_rx) = counting_view();

        let subscription = dispatcher.subscribe("dashboard", &[Table::Deliveries], view.clone());
        dispatcher.spawn(rx);

        tx.send(event(Table::Deliveries)).unwrap();
        timeout(Duration::from_secs(1), done_rx.recv())
            .await
            .expect("refresh should run")
            .unwrap();

        drop(subscription);
        assert_eq!(dispatcher.subscriber_count(), 0);

        tx.send(event(Table::Deliveries)).unwrap();
        tx.send(event(Table::Deliveries)).unwrap();
        sleep(Duration::from_millis(50)).await;

        assert_eq!(view.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn debounce_window_coalesces_a_burst() {
        let (tx, rx) = broadcast::channel(16);
        let dispatcher = RefreshDispatcher::new(Duration::from_millis(50), Metrics::new());
        let (view, mut done_rx) = counting_view();

        let _subscription = dispatcher.subscribe(
            "dashboard",
            &[Table::Deliveries, Table::Notifications],
            view.clone(),
        );
        dispatcher.spawn(rx);

        tx.send(event(Table::Deliveries)).unwrap();
        tx.send(event(Table::Notifications)).unwrap();
        tx.send(event(Table::Deliveries)).unwrap();

        timeout(Duration::from_secs(1), done_rx.recv())
            .await
            .expect("refresh should run")
            .unwrap();
        sleep(Duration::from_millis(150)).await;

        assert_eq!(view.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn each_interested_view_refetches_once() {
        let dispatcher = RefreshDispatcher::new(Duration::ZERO, Metrics::new());
        let (dashboard, _a) = counting_view();
        let (inbox, _b) = counting_view();
        let (drivers, _c) = counting_view();

        let _s1 = dispatcher.subscribe("dashboard", &Table::ALL, dashboard.clone());
        let _s2 = dispatcher.subscribe("inbox", &[Table::Notifications], inbox.clone());
        let _s3 = dispatcher.subscribe("drivers", &[Table::Drivers], drivers.clone());

        let touched = [Table::Notifications, Table::Deliveries].into_iter().collect();
        assert_eq!(dispatcher.fan_out(&touched), 2);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(dashboard.count.load(Ordering::SeqCst), 1);
        assert_eq!(inbox.count.load(Ordering::SeqCst), 1);
        assert_eq!(drivers.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lagged_feed_refreshes_views_on_untouched_tables() {
        let (tx, rx) = broadcast::channel(1);
        let dispatcher = RefreshDispatcher::new(Duration::ZERO, Metrics::new());
        let (incidents, mut done_rx) = counting_view();

        let _subscription =
            dispatcher.subscribe("incidents", &[Table::Incidents], incidents.clone());

        for _ in 0..3 {
            tx.send(event(Table::Deliveries)).unwrap();
        }
        dispatcher.spawn(rx);

        timeout(Duration::from_secs(1), done_rx.recv())
            .await
            .expect("lagged feed should refresh every view")
            .unwrap();
        sleep(Duration::from_millis(50)).await;

        assert_eq!(incidents.count.load(Ordering::SeqCst), 1);
    }
}
