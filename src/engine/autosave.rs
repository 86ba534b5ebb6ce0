use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use serde_json::Value;
use tokio::time::{Duration, sleep};
use tracing::debug;

use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey {
    pub owner: String,
    pub form: String,
}

impl DraftKey {
    pub fn new(owner: impl Into<String>, form: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            form: form.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Draft {
    pub form: String,
    pub data: Value,
    pub saved_at: DateTime<Utc>,
}

struct Inner {
    drafts: DashMap<DraftKey, Draft>,
    generations: DashMap<DraftKey, u64>,
    next_generation: AtomicU64,
    debounce: Duration,
    ttl: chrono::Duration,
    metrics: Metrics,
}

#[derive(Clone)]
pub struct Autosave {
    inner: Arc<Inner>,
}

impl Inner {
    fn expired(&self, draft: &Draft, now: DateTime<Utc>) -> bool {
        now - draft.saved_at > self.ttl
    }

    fn evict_expired(&self) {
        let now = Utc::now();
        let before = self.drafts.len();
        self.drafts.retain(|_, draft| !self.expired(draft, now));

        let evicted = before.saturating_sub(self.drafts.len());
        if evicted > 0 {
            debug!(evicted, "expired drafts evicted");
        }
    }
}

impl Autosave {
    pub fn new(debounce: Duration, ttl: Duration, metrics: Metrics) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));

        Self {
            inner: Arc::new(Inner {
                drafts: DashMap::new(),
                generations: DashMap::new(),
                next_generation: AtomicU64::new(1),
                debounce,
                ttl,
                metrics,
            }),
        }
    }

    /// Records the latest form state. Only the last call inside the debounce
    /// window is written; a closed form cancels any pending write.
    pub fn record(&self, key: DraftKey, data: Value, open: bool) {
        self.inner.evict_expired();

        if !open {
            self.inner.generations.remove(&key);
            debug!(form = %key.form, "form closed; pending draft write cancelled");
            return;
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        self.inner.generations.insert(key.clone(), generation);

        let inner = self.inner.clone();
        tokio::spawn(async move {
            sleep(inner.debounce).await;

            // the generation entry stays locked until the draft is in place,
            // so a concurrent discard either cancels this write or removes it
            let Entry::Occupied(pending) = inner.generations.entry(key.clone()) else {
                return;
            };
            if *pending.get() != generation {
                return;
            }

            let draft = Draft {
                form: key.form.clone(),
                data,
                saved_at: Utc::now(),
            };
            debug!(owner = %key.owner, form = %key.form, "draft saved");
            inner.drafts.insert(key, draft);
            pending.remove();
            inner.metrics.drafts_saved_total.inc();
        });
    }

    fn live(&self, key: &DraftKey) -> Option<Draft> {
        let now = Utc::now();
        let expired = self
            .inner
            .drafts
            .remove_if(key, |_, draft| self.inner.expired(draft, now));
        if expired.is_some() {
            debug!(form = %key.form, "draft expired with the session");
            return None;
        }

        self.inner.drafts.get(key).map(|entry| entry.value().clone())
    }

    pub fn has_draft(&self, key: &DraftKey) -> bool {
        self.live(key).is_some()
    }

    pub fn saved_at(&self, key: &DraftKey) -> Option<DateTime<Utc>> {
        self.live(key).map(|draft| draft.saved_at)
    }

    pub fn restore(&self, key: &DraftKey) -> Option<Draft> {
        self.live(key)
    }

    /// Removes the draft and cancels any write still waiting on the debounce.
    pub fn discard(&self, key: &DraftKey) -> bool {
        self.inner.generations.remove(key);
        self.inner.drafts.remove(key).is_some()
    }

    pub fn stored(&self) -> usize {
        self.inner.drafts.len()
    }

    pub fn pending(&self) -> usize {
        self.inner.generations.len()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::time::{Duration, sleep};

    use super::{Autosave, DraftKey};
    use crate::observability::metrics::Metrics;

    fn autosave() -> Autosave {
        Autosave::new(
            Duration::from_millis(500),
            Duration::from_secs(3600),
            Metrics::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn draft_is_saved_after_quiet_period() {
        let autosave = autosave();
        let key = DraftKey::new("admin-1", "delivery_form");

        autosave.record(key.clone(), json!({ "customer_name": "Ann" }), true);
        sleep(Duration::from_millis(200)).await;
        assert!(!autosave.has_draft(&key));

        sleep(Duration::from_millis(400)).await;
        assert!(autosave.has_draft(&key));
        assert!(autosave.saved_at(&key).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn typing_keeps_postponing_the_write() {
        let autosave = autosave();
        let key = DraftKey::new("admin-1", "delivery_form");

        for text in ["A", "An", "Ann"] {
            autosave.record(key.clone(), json!({ "customer_name": text }), true);
            sleep(Duration::from_millis(300)).await;
        }
        assert!(!autosave.has_draft(&key));

        sleep(Duration::from_millis(300)).await;
        let draft = autosave.restore(&key).unwrap();
        assert_eq!(draft.data["customer_name"], "Ann");
    }

    #[tokio::test(start_paused = true)]
    async fn discard_removes_the_draft() {
        let autosave = autosave();
        let key = DraftKey::new("admin-1", "pricing");

        autosave.record(key.clone(), json!({ "base_fare": 100 }), true);
        sleep(Duration::from_millis(600)).await;
        assert!(autosave.has_draft(&key));

        assert!(autosave.discard(&key));
        assert!(!autosave.has_draft(&key));
        assert!(autosave.restore(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn closing_the_form_cancels_the_pending_write() {
        let autosave = autosave();
        let key = DraftKey::new("admin-1", "pricing");

        autosave.record(key.clone(), json!({ "base_fare": 100 }), true);
        autosave.record(key.clone(), json!({ "base_fare": 100 }), false);
        sleep(Duration::from_millis(600)).await;

        assert!(!autosave.has_draft(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn drafts_are_scoped_per_owner() {
        let autosave = autosave();
        let mine = DraftKey::new("admin-1", "delivery_form");
        let theirs = DraftKey::new("admin-2", "delivery_form");

        autosave.record(mine.clone(), json!({}), true);
        sleep(Duration::from_millis(600)).await;

        assert!(autosave.has_draft(&mine));
        assert!(!autosave.has_draft(&theirs));
    }

    #[tokio::test]
    async fn drafts_expire_with_the_session() {
        let autosave = Autosave::new(Duration::ZERO, Duration::ZERO, Metrics::new());
        let key = DraftKey::new("admin-1", "delivery_form");

        autosave.record(key.clone(), json!({}), true);
        sleep(Duration::from_millis(20)).await;

        assert!(!autosave.has_draft(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_forms_leave_nothing_behind() {
        let autosave = autosave();

        for i in 0..100 {
            let key = DraftKey::new("admin-1", format!("form-{i}"));
            autosave.record(key.clone(), json!({}), true);
            autosave.record(key, json!({}), false);
        }
        sleep(Duration::from_millis(600)).await;

        assert_eq!(autosave.pending(), 0);
        assert_eq!(autosave.stored(), 0);
    }

    #[tokio::test]
    async fn expired_drafts_are_evicted_on_the_next_write() {
        let autosave = Autosave::new(Duration::ZERO, Duration::ZERO, Metrics::new());

        for i in 0..50 {
            autosave.record(DraftKey::new("admin-1", format!("form-{i}")), json!({}), true);
        }
        sleep(Duration::from_millis(20)).await;
        assert_eq!(autosave.stored(), 50);

        autosave.record(DraftKey::new("admin-2", "pricing"), json!({}), true);
        assert_eq!(autosave.stored(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn discard_before_the_debounce_fires_wins() {
        let autosave = autosave();
        let key = DraftKey::new("admin-1", "delivery_form");

        autosave.record(key.clone(), json!({ "customer_name": "Ann" }), true);
        sleep(Duration::from_millis(499)).await;
        autosave.discard(&key);
        sleep(Duration::from_millis(100)).await;

        assert!(!autosave.has_draft(&key));
        assert_eq!(autosave.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reading_a_live_draft_keeps_it() {
        let autosave = autosave();
        let key = DraftKey::new("admin-1", "delivery_form");

        autosave.record(key.clone(), json!({}), true);
        sleep(Duration::from_millis(600)).await;

        assert!(autosave.has_draft(&key));
        assert!(autosave.restore(&key).is_some());
        assert_eq!(autosave.stored(), 1);
    }
}
