use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub status_transitions_total: IntCounterVec,
    pub view_refreshes_total: IntCounterVec,
    pub drafts_saved_total: IntCounter,
    pub csv_exports_total: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Admin status changes by outcome",
            ),
            &["outcome"],
        )
        .expect("valid status_transitions_total metric");

        let view_refreshes_total = IntCounterVec::new(
            Opts::new("view_refreshes_total", "Full view refetches started by the dispatcher"),
            &["view"],
        )
        .expect("valid view_refreshes_total metric");

        let drafts_saved_total = IntCounter::new("drafts_saved_total", "Form drafts written")
            .expect("valid drafts_saved_total metric");

        let csv_exports_total = IntCounterVec::new(
            Opts::new("csv_exports_total", "CSV exports by kind"),
            &["kind"],
        )
        .expect("valid csv_exports_total metric");

        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(view_refreshes_total.clone()))
            .expect("register view_refreshes_total");
        registry
            .register(Box::new(drafts_saved_total.clone()))
            .expect("register drafts_saved_total");
        registry
            .register(Box::new(csv_exports_total.clone()))
            .expect("register csv_exports_total");

        Self {
            registry,
            status_transitions_total,
            view_refreshes_total,
            drafts_saved_total,
            csv_exports_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
