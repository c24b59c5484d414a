// src/pipeline.rs
//! Driving loop: one retrieval, one build and one file per catalog entry.
//!
//! Entries never share state. A failing entry is logged, counted and
//! skipped; its output path is cleared so no stale file survives. The run
//! report carries one outcome per entry in catalog order.

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::{CatalogEntry, DatasetConfig};
use crate::error::EntryError;
use crate::metrics::ensure_metrics_described;
use crate::retrieval::{LightCurveProvider, RawSample};
use crate::sample::writer::remove_stale;
use crate::sample::{build, read_labeled_sample, write_labeled_file, LabeledSample};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    Written {
        path: PathBuf,
        samples: usize,
        median_flux: f64,
    },
    Failed {
        kind: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryOutcome {
    /// 1-based catalog position, also the output file index.
    pub index: usize,
    pub target_name: String,
    pub planet_count: u32,
    #[serde(flatten)]
    pub status: EntryStatus,
}

impl EntryOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self.status, EntryStatus::Written { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub mission: String,
    pub cap: usize,
    pub entries: Vec<EntryOutcome>,
}

impl RunReport {
    pub fn written(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.entries.iter().filter(|e| e.is_written())
    }

    pub fn failed(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.entries.iter().filter(|e| !e.is_written())
    }

    /// True when every catalog entry produced its file.
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }
}

/// What a successful entry left on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenSample {
    pub path: PathBuf,
    pub samples: usize,
    pub median_flux: f64,
}

/// Build one labeled file from an already retrieved series.
pub fn write_entry(
    path: &Path,
    raw: &[RawSample],
    cap: usize,
    planet_count: u32,
) -> Result<WrittenSample, EntryError> {
    let series = build(raw, cap)?;
    let median_flux = series.median_flux;
    let sample = LabeledSample::new(series, planet_count);
    write_labeled_file(path, &sample).map_err(|source| EntryError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(WrittenSample {
        path: path.to_path_buf(),
        samples: sample.points.len(),
        median_flux,
    })
}

async fn process_entry(
    cfg: &DatasetConfig,
    provider: &dyn LightCurveProvider,
    index: usize,
    entry: &CatalogEntry,
    gate: Option<&Semaphore>,
) -> EntryOutcome {
    let path = cfg.output_path(index);
    counter!("dataset_entries_total").increment(1);

    let fetched = {
        // Only retrieval is bounded; build and write run outside the permit.
        let _permit = match gate {
            Some(g) => g.acquire().await.ok(),
            None => None,
        };
        info!(index, system = %entry.target_name, "processing {}", entry.target_name);
        let t0 = Instant::now();
        let res = provider.fetch(&entry.target_name, &cfg.mission).await;
        histogram!("dataset_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        res
    };

    let result = fetched
        .map_err(EntryError::from)
        .and_then(|raw| write_entry(&path, &raw, cfg.cap, entry.planet_count));

    let status = match result {
        Ok(w) => {
            counter!("dataset_samples_written_total").increment(w.samples as u64);
            info!(
                index,
                system = %entry.target_name,
                samples = w.samples,
                "{} created",
                w.path.display()
            );
            EntryStatus::Written {
                path: w.path,
                samples: w.samples,
                median_flux: w.median_flux,
            }
        }
        Err(e) => {
            let kind = e.kind();
            counter!("dataset_entry_failures_total", "kind" => kind).increment(1);
            error!(
                index,
                system = %entry.target_name,
                kind,
                "{}: {}: {}",
                entry.target_name,
                kind,
                e
            );
            if let Err(rm) = remove_stale(&path) {
                warn!(path = %path.display(), error = %rm, "could not remove stale output");
            }
            EntryStatus::Failed {
                kind,
                message: e.to_string(),
            }
        }
    };

    EntryOutcome {
        index,
        target_name: entry.target_name.clone(),
        planet_count: entry.planet_count,
        status,
    }
}

/// Process the whole catalog. Never fails as a whole; inspect the report.
///
/// With `concurrency == 1` entries run strictly in catalog order. Higher
/// values overlap retrievals; the report is still ordered by index.
pub async fn run_catalog(
    cfg: &DatasetConfig,
    provider: Arc<dyn LightCurveProvider>,
) -> RunReport {
    ensure_metrics_described();
    info!(
        entries = cfg.catalog.len(),
        mission = %cfg.mission,
        cap = cfg.cap,
        provider = provider.name(),
        "starting dataset build"
    );

    let mut entries = Vec::with_capacity(cfg.catalog.len());

    if cfg.concurrency <= 1 {
        for (i, entry) in cfg.catalog.iter().enumerate() {
            entries.push(process_entry(cfg, provider.as_ref(), i + 1, entry, None).await);
        }
    } else {
        let shared = Arc::new(cfg.clone());
        let gate = Arc::new(Semaphore::new(cfg.concurrency));
        let mut set = JoinSet::new();
        for (i, entry) in cfg.catalog.iter().cloned().enumerate() {
            let cfg = Arc::clone(&shared);
            let provider = Arc::clone(&provider);
            let gate = Arc::clone(&gate);
            set.spawn(async move {
                process_entry(&cfg, provider.as_ref(), i + 1, &entry, Some(gate.as_ref())).await
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => entries.push(outcome),
                Err(e) => error!(error = %e, "entry task aborted"),
            }
        }
        fill_aborted(cfg, &mut entries);
        entries.sort_by_key(|e| e.index);
    }

    RunReport {
        generated_at: Utc::now(),
        mission: cfg.mission.clone(),
        cap: cfg.cap,
        entries,
    }
}

/// Entries whose task panicked still get a failed outcome.
fn fill_aborted(cfg: &DatasetConfig, entries: &mut Vec<EntryOutcome>) {
    for (i, entry) in cfg.catalog.iter().enumerate() {
        let index = i + 1;
        if entries.iter().any(|e| e.index == index) {
            continue;
        }
        let path = cfg.output_path(index);
        if let Err(rm) = remove_stale(&path) {
            warn!(path = %path.display(), error = %rm, "could not remove stale output");
        }
        entries.push(EntryOutcome {
            index,
            target_name: entry.target_name.clone(),
            planet_count: entry.planet_count,
            status: EntryStatus::Failed {
                kind: "Aborted",
                message: "entry task did not complete".to_string(),
            },
        });
    }
}

#[derive(Debug, Clone)]
pub struct VerifyFailure {
    pub index: usize,
    pub path: PathBuf,
    pub message: String,
    /// Where the rejected file was moved; `None` if it could not be kept aside.
    pub quarantined: Option<PathBuf>,
}

/// Re-read every written file and check row count and label.
///
/// A file that fails is renamed to `*.invalid` (or deleted if that fails)
/// so nothing listing `{prefix}*.txt` picks it up.
pub fn verify_outputs(report: &RunReport) -> Vec<VerifyFailure> {
    let mut failures = Vec::new();
    for outcome in report.written() {
        let EntryStatus::Written { path, samples, .. } = &outcome.status else {
            continue;
        };
        let problem = match read_labeled_sample(path) {
            Ok(s) if s.points.len() != *samples => Some(format!(
                "expected {samples} rows, found {}",
                s.points.len()
            )),
            Ok(s) if s.planet_count != outcome.planet_count => Some(format!(
                "expected label {}, found {}",
                outcome.planet_count, s.planet_count
            )),
            Ok(_) => None,
            Err(e) => Some(format!("{e:#}")),
        };
        if let Some(message) = problem {
            warn!(index = outcome.index, path = %path.display(), %message, "verification failed");
            let quarantined = quarantine(path);
            failures.push(VerifyFailure {
                index: outcome.index,
                path: path.clone(),
                message,
                quarantined,
            });
        }
    }
    failures
}

fn quarantine(path: &Path) -> Option<PathBuf> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".invalid");
    let target = path.with_file_name(name);
    match std::fs::rename(path, &target) {
        Ok(()) => Some(target),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not set invalid output aside");
            if let Err(rm) = remove_stale(path) {
                error!(path = %path.display(), error = %rm, "invalid output left in place");
            }
            None
        }
    }
}
