use anyhow::{Context, Result};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::Path;

/// One-time metric descriptions so series show up with help text.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("dataset_entries_total", "Catalog entries processed.");
        describe_counter!(
            "dataset_entry_failures_total",
            "Catalog entries that produced no file, by error kind."
        );
        describe_counter!(
            "dataset_samples_written_total",
            "Normalized rows written across all files."
        );
        describe_counter!(
            "retrieval_http_retries_total",
            "HTTP light curve fetches retried after a transient failure."
        );
        describe_histogram!("dataset_fetch_ms", "Light curve retrieval time in milliseconds.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Call at most once per process.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Dump the exposition text, e.g. for a node_exporter textfile collector.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render())
            .with_context(|| format!("writing metrics to {}", path.display()))
    }
}
