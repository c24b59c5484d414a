//! Dataset builder binary.
//! Loads the run configuration, fetches every catalog entry and writes one
//! labeled `{prefix}{index}.txt` file per system.
//!
//! Exit status: 0 when every entry was written, 1 when at least one entry
//! failed, 2 when the configuration could not be loaded.

use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lightcurve_dataset::metrics::Metrics;
use lightcurve_dataset::{run_catalog, verify_outputs, DatasetConfig};

/// Compact human-readable logs by default; `LIGHTCURVE_LOG_JSON=1` switches
/// to one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lightcurve_dataset=info,warn"));

    let json = std::env::var("LIGHTCURVE_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(fmt::layer().compact().with_target(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match DatasetConfig::load_default() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("configuration error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let metrics = match &cfg.metrics_path {
        Some(_) => match Metrics::install() {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(error = %e, "metrics disabled");
                None
            }
        },
        None => None,
    };

    let provider = match cfg.provider.build() {
        Ok(p) => p,
        Err(e) => {
            error!("provider setup failed: {e:#}");
            return ExitCode::from(2);
        }
    };

    let report = run_catalog(&cfg, provider).await;

    let mut verify_failed = 0;
    if cfg.verify {
        verify_failed = verify_outputs(&report).len();
    }

    if let Some(path) = &cfg.report_path {
        if let Err(e) = report.write_json(path) {
            warn!(path = %path.display(), "could not write run report: {e:#}");
        }
    }
    if let (Some(m), Some(path)) = (&metrics, &cfg.metrics_path) {
        if let Err(e) = m.write_to(path) {
            warn!("{e:#}");
        }
    }

    let total = report.entries.len();
    let failed = report.failed().count();
    if failed == 0 && verify_failed == 0 {
        info!("All {total} {}N.txt files created successfully", cfg.output_prefix);
        return ExitCode::SUCCESS;
    }

    for outcome in report.failed() {
        if let lightcurve_dataset::EntryStatus::Failed { kind, .. } = &outcome.status {
            warn!(index = outcome.index, "skipped {} ({kind})", outcome.target_name);
        }
    }
    error!(
        failed,
        verify_failed,
        "{} of {total} entries did not produce a valid file",
        failed + verify_failed
    );
    ExitCode::FAILURE
}
