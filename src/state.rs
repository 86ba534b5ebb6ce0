use std::sync::Arc;

use tokio::sync::broadcast;

use crate::backend::{Backend, ChangeEvent, Table};
use crate::config::Config;
use crate::engine::autosave::Autosave;
use crate::engine::dashboard::DashboardView;
use crate::engine::refresh::{RefreshDispatcher, Subscription};
use crate::models::typing::TypingSignal;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub dispatcher: RefreshDispatcher,
    pub dashboard: Arc<DashboardView>,
    pub autosave: Autosave,
    pub typing_tx: broadcast::Sender<TypingSignal>,
    pub metrics: Metrics,
    _dashboard_subscription: Subscription,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn Backend>,
        config: &Config,
    ) -> (Self, broadcast::Receiver<ChangeEvent>) {
        let metrics = Metrics::new();
        let changes_rx = backend.changes();
        let (typing_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        let dispatcher = RefreshDispatcher::new(config.refresh_debounce, metrics.clone());
        let dashboard = Arc::new(DashboardView::new(backend.clone()));
        let dashboard_subscription = dispatcher.subscribe(
            "dashboard",
            &Table::ALL,
            dashboard.clone(),
        );

        let autosave = Autosave::new(config.draft_debounce, config.draft_ttl, metrics.clone());

        (
            Self {
                backend,
                dispatcher,
                dashboard,
                autosave,
                typing_tx,
                metrics,
                _dashboard_subscription: dashboard_subscription,
            },
            changes_rx,
        )
    }
}
