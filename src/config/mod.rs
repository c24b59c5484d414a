// src/config/mod.rs
//! Run configuration, built once at startup and passed into the driving loop.
//!
//! Resolution order:
//! 1) `$LIGHTCURVE_CONFIG_PATH` (must exist)
//! 2) `config/dataset.toml`
//! 3) `config/dataset.json`
//! 4) built-in defaults (Kepler catalog, cap 500, prefix `learn`)
//!
//! Individual options can then be overridden from the environment.

pub mod catalog;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::retrieval::decode::DecodeOptions;
use crate::retrieval::providers::{DirectoryProvider, HttpProvider};
use crate::retrieval::LightCurveProvider;
use crate::sample::DEFAULT_CAP;

pub use catalog::{default_catalog, CatalogEntry};

pub const DEFAULT_CONFIG_TOML: &str = "config/dataset.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/dataset.json";

pub const ENV_CONFIG_PATH: &str = "LIGHTCURVE_CONFIG_PATH";
pub const ENV_MISSION: &str = "LIGHTCURVE_MISSION";
pub const ENV_CAP: &str = "LIGHTCURVE_CAP";
pub const ENV_OUTPUT_PREFIX: &str = "LIGHTCURVE_OUTPUT_PREFIX";
pub const ENV_OUTPUT_DIR: &str = "LIGHTCURVE_OUTPUT_DIR";
pub const ENV_CONCURRENCY: &str = "LIGHTCURVE_CONCURRENCY";

const MAX_CONCURRENCY: usize = 16;

fn default_mission() -> String {
    "Kepler".to_string()
}
fn default_cap() -> usize {
    DEFAULT_CAP
}
fn default_output_prefix() -> String {
    "learn".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_concurrency() -> usize {
    1
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Ordered systems; position `i` (0-based) writes `{prefix}{i + 1}.txt`.
    #[serde(default = "default_catalog")]
    pub catalog: Vec<CatalogEntry>,
    /// Data source identifier handed to the provider, e.g. "Kepler", "K2", "TESS".
    #[serde(default = "default_mission")]
    pub mission: String,
    /// Max samples per output file.
    #[serde(default = "default_cap")]
    pub cap: usize,
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Concurrent retrievals. 1 keeps the catalog strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Re-read every written file and check it parses back.
    #[serde(default)]
    pub verify: bool,
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    /// Prometheus text dump written at the end of a run.
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderConfig {
    Http {
        /// `{target}` and `{mission}` are substituted (percent-encoded).
        url_template: String,
        #[serde(default = "default_connect_timeout_secs")]
        connect_timeout_secs: u64,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        #[serde(default = "default_max_retries")]
        max_retries: u8,
        #[serde(default = "default_true")]
        respect_quality: bool,
    },
    Directory {
        root: PathBuf,
        #[serde(default = "default_true")]
        respect_quality: bool,
    },
}

fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u8 {
    3
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Directory {
            root: PathBuf::from("lightcurves"),
            respect_quality: true,
        }
    }
}

impl ProviderConfig {
    pub fn build(&self) -> Result<Arc<dyn LightCurveProvider>> {
        match self {
            ProviderConfig::Http {
                url_template,
                connect_timeout_secs,
                timeout_secs,
                max_retries,
                respect_quality,
            } => {
                let provider = HttpProvider::with_timeouts(
                    url_template,
                    Duration::from_secs(*connect_timeout_secs),
                    Duration::from_secs(*timeout_secs),
                )?
                .with_retries(*max_retries)
                .with_decode_options(DecodeOptions {
                    respect_quality: *respect_quality,
                });
                Ok(Arc::new(provider))
            }
            ProviderConfig::Directory {
                root,
                respect_quality,
            } => Ok(Arc::new(DirectoryProvider::new(root.clone()).with_decode_options(
                DecodeOptions {
                    respect_quality: *respect_quality,
                },
            ))),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            mission: default_mission(),
            cap: default_cap(),
            output_prefix: default_output_prefix(),
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            verify: false,
            report_path: None,
            metrics_path: None,
            provider: ProviderConfig::default(),
        }
    }
}

impl DatasetConfig {
    /// Load from an explicit TOML or JSON file, then validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validated()
    }

    /// Resolve the config file (env, then fallbacks, then defaults) and apply
    /// environment overrides.
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_CONFIG_TOML).exists() {
            Self::load_from(Path::new(DEFAULT_CONFIG_TOML))?
        } else if Path::new(DEFAULT_CONFIG_JSON).exists() {
            Self::load_from(Path::new(DEFAULT_CONFIG_JSON))?
        } else {
            Self::default()
        };
        base.with_env_overrides()?.validated()
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(m) = env_string(ENV_MISSION) {
            self.mission = m;
        }
        if let Some(cap) = env_parse::<usize>(ENV_CAP)? {
            self.cap = cap;
        }
        if let Some(prefix) = env_string(ENV_OUTPUT_PREFIX) {
            self.output_prefix = prefix;
        }
        if let Some(dir) = env_string(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(n) = env_parse::<usize>(ENV_CONCURRENCY)? {
            self.concurrency = n;
        }
        Ok(self)
    }

    /// Reject unusable settings; clamp concurrency into 1..=16.
    pub fn validated(mut self) -> Result<Self> {
        if self.cap == 0 {
            bail!("cap must be at least 1");
        }
        let prefix = self.output_prefix.trim();
        if prefix.is_empty() {
            bail!("output_prefix must not be empty");
        }
        if prefix.contains(['/', '\\']) {
            bail!("output_prefix must be a file stem, got '{prefix}'");
        }
        self.output_prefix = prefix.to_string();
        self.mission = self.mission.trim().to_string();
        if self.mission.is_empty() {
            bail!("mission must not be empty");
        }
        for (i, entry) in self.catalog.iter_mut().enumerate() {
            entry.target_name = entry.target_name.trim().to_string();
            if entry.target_name.is_empty() {
                bail!("catalog entry {} has an empty target name", i + 1);
            }
        }
        self.concurrency = self.concurrency.clamp(1, MAX_CONCURRENCY);
        Ok(self)
    }

    /// `{output_dir}/{output_prefix}{index}.txt`, `index` being 1-based.
    pub fn output_path(&self, index: usize) -> PathBuf {
        self.output_dir
            .join(format!("{}{}.txt", self.output_prefix, index))
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<DatasetConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            // No usable extension: try JSON, then TOML.
            if let Ok(cfg) = serde_json::from_str(s) {
                return Ok(cfg);
            }
            toml::from_str(s).map_err(|e| anyhow!("unsupported config format: {e}"))
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("{name}='{raw}' is not a valid value")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_run() {
        let cfg = DatasetConfig::default().validated().unwrap();
        assert_eq!(cfg.catalog.len(), 15);
        assert_eq!(cfg.catalog[0], CatalogEntry::new("Kepler-8", 1));
        assert_eq!(cfg.catalog[9], CatalogEntry::new("Kepler-90", 8));
        assert_eq!(cfg.mission, "Kepler");
        assert_eq!(cfg.cap, 500);
        assert_eq!(cfg.output_path(3), PathBuf::from("./learn3.txt"));
    }

    #[test]
    fn toml_with_aliases_and_http_provider() {
        let toml = r#"
mission = "K2"
cap = 100
output_prefix = "train"

[[catalog]]
target = "Kepler-90"
planets = 8

[[catalog]]
target_name = "Kepler-11"
planet_count = 6

[provider]
kind = "http"
url_template = "https://lc.example/{mission}/{target}.json"
timeout_secs = 5
"#;
        let cfg = parse_config(toml, "toml").unwrap().validated().unwrap();
        assert_eq!(cfg.mission, "K2");
        assert_eq!(cfg.cap, 100);
        assert_eq!(cfg.catalog.len(), 2);
        assert_eq!(cfg.catalog[1].planet_count, 6);
        match &cfg.provider {
            ProviderConfig::Http {
                timeout_secs,
                max_retries,
                respect_quality,
                ..
            } => {
                assert_eq!(*timeout_secs, 5);
                assert_eq!(*max_retries, 3);
                assert!(*respect_quality);
            }
            other => panic!("unexpected provider {other:?}"),
        }
        assert!(cfg.provider.build().is_ok());
    }

    #[test]
    fn json_without_extension_hint() {
        let json = r#"{"catalog":[{"target":"Kepler-8","planets":1}],"provider":{"kind":"directory","root":"data"}}"#;
        let cfg = parse_config(json, "").unwrap();
        assert_eq!(cfg.catalog.len(), 1);
        assert_eq!(cfg.cap, 500);
        assert_eq!(
            cfg.provider,
            ProviderConfig::Directory {
                root: PathBuf::from("data"),
                respect_quality: true
            }
        );
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = DatasetConfig::default();
        cfg.cap = 0;
        assert!(cfg.validated().is_err());

        let mut cfg = DatasetConfig::default();
        cfg.output_prefix = "../learn".into();
        assert!(cfg.validated().is_err());

        let mut cfg = DatasetConfig::default();
        cfg.catalog.push(CatalogEntry::new("  ", 1));
        assert!(cfg.validated().is_err());

        let mut cfg = DatasetConfig::default();
        cfg.concurrency = 500;
        assert_eq!(cfg.validated().unwrap().concurrency, 16);
    }
}
