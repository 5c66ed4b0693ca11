use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all kara catalog metrics
const PREFIX: &str = "kara";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Export sweep
    pub static ref SWEEPS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_sweeps_total"), "Export sweeps by outcome"),
        &["outcome"]
    ).expect("Failed to create sweeps_total metric");

    pub static ref SWEEP_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_sweep_duration_seconds"),
            "Export sweep duration in seconds"
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 900.0])
    ).expect("Failed to create sweep_duration_seconds metric");

    pub static ref DAKARA_WRITES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_dakara_writes_total"), "Write calls issued to the downstream catalog"),
        &["entity", "op"]
    ).expect("Failed to create dakara_writes_total metric");

    // Import
    pub static ref IMPORTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_imports_total"), "Upstream imports by outcome"),
        &["outcome"]
    ).expect("Failed to create imports_total metric");

    pub static ref REFRESHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_refreshes_total"), "Upstream refreshes of imported karas by outcome"),
        &["outcome"]
    ).expect("Failed to create refreshes_total metric");

    // Assets
    pub static ref ASSET_DOWNLOADS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_asset_downloads_total"), "Asset sync results by kind"),
        &["kind", "outcome"]
    ).expect("Failed to create asset_downloads_total metric");

    pub static ref PUBLISHABLE_KARAS: Gauge = Gauge::new(
        format!("{PREFIX}_publishable_karas"),
        "Publishable karas seen by the last sweep"
    ).expect("Failed to create publishable_karas metric");

    // Background jobs
    pub static ref BACKGROUND_JOB_EXECUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_background_job_executions_total"), "Background job runs by status"),
        &["job_id", "status"]
    ).expect("Failed to create background_job_executions_total metric");

    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_background_job_duration_seconds"),
            "Background job duration in seconds"
        )
        .buckets(vec![0.1, 1.0, 10.0, 60.0, 300.0, 900.0, 3600.0]),
        &["job_id"]
    ).expect("Failed to create background_job_duration_seconds metric");

    pub static ref BACKGROUND_JOB_RUNNING: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_background_job_running"), "1 while the job is running"),
        &["job_id"]
    ).expect("Failed to create background_job_running metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (tests call this repeatedly)
    let _ = REGISTRY.register(Box::new(SWEEPS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SWEEP_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(DAKARA_WRITES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(IMPORTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(REFRESHES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ASSET_DOWNLOADS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PUBLISHABLE_KARAS.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_EXECUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_RUNNING.clone()));

    tracing::debug!("Metrics registered");
}

pub fn record_sweep(outcome: &str, duration: Duration) {
    SWEEPS_TOTAL.with_label_values(&[outcome]).inc();
    SWEEP_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record one create/update/delete call against the downstream catalog
pub fn record_dakara_write(entity: &str, op: &str) {
    DAKARA_WRITES_TOTAL.with_label_values(&[entity, op]).inc();
}

pub fn record_import(outcome: &str) {
    IMPORTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_refresh(outcome: &str) {
    REFRESHES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_asset_download(kind: &str, outcome: &str) {
    ASSET_DOWNLOADS_TOTAL.with_label_values(&[kind, outcome]).inc();
}

pub fn set_publishable_karas(count: usize) {
    PUBLISHABLE_KARAS.set(count as f64);
}

pub fn record_background_job_execution(job_id: &str, status: &str, duration: Duration) {
    BACKGROUND_JOB_EXECUTIONS_TOTAL
        .with_label_values(&[job_id, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_id])
        .observe(duration.as_secs_f64());
}

pub fn set_background_job_running(job_id: &str, running: bool) {
    BACKGROUND_JOB_RUNNING
        .with_label_values(&[job_id])
        .set(if running { 1.0 } else { 0.0 });
}

/// Text exposition of every registered metric.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        init_metrics();
        init_metrics();

        let metric_families = REGISTRY.gather();
        assert!(!metric_families.is_empty(), "Metrics should be registered");
    }

    #[test]
    fn test_record_dakara_write() {
        init_metrics();

        let before = DAKARA_WRITES_TOTAL
            .with_label_values(&["work", "create"])
            .get();
        record_dakara_write("work", "create");
        let after = DAKARA_WRITES_TOTAL
            .with_label_values(&["work", "create"])
            .get();
        assert_eq!(after, before + 1.0);

        let text = render();
        assert!(text.contains("kara_dakara_writes_total"));
    }
}
