// src/retrieval/providers/directory.rs
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::RetrievalError;
use crate::retrieval::decode::{decode_payload, DecodeOptions, PayloadFormat};
use crate::retrieval::types::{LightCurveProvider, RawSeries};

/// Reads light curves exported to disk.
///
/// Lookup order for a `(target, mission)` pair:
/// 1) `{root}/{mission}/{target}.json`
/// 2) `{root}/{mission}/{target}.csv`
/// 3) `{root}/{target}.json`
/// 4) `{root}/{target}.csv`
pub struct DirectoryProvider {
    root: PathBuf,
    decode: DecodeOptions,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            decode: DecodeOptions::default(),
        }
    }

    pub fn with_decode_options(mut self, decode: DecodeOptions) -> Self {
        self.decode = decode;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, target: &str, mission: &str) -> Vec<PathBuf> {
        let mission_dir = self.root.join(mission);
        vec![
            mission_dir.join(format!("{target}.json")),
            mission_dir.join(format!("{target}.csv")),
            self.root.join(format!("{target}.json")),
            self.root.join(format!("{target}.csv")),
        ]
    }
}

#[async_trait]
impl LightCurveProvider for DirectoryProvider {
    async fn fetch(&self, target: &str, mission: &str) -> Result<RawSeries, RetrievalError> {
        let path_like = |s: &str| s.is_empty() || s.contains(['/', '\\']) || s.starts_with('.');
        if path_like(target) || path_like(mission) {
            return Err(RetrievalError::UnknownTarget {
                target: target.to_string(),
                mission: mission.to_string(),
            });
        }

        let Some(path) = self.candidates(target, mission).into_iter().find(|p| p.is_file())
        else {
            return Err(RetrievalError::UnknownTarget {
                target: target.to_string(),
                mission: mission.to_string(),
            });
        };

        let body = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| RetrievalError::Transport(format!("reading {}: {e}", path.display())))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(PayloadFormat::from_extension)
            .unwrap_or_else(|| PayloadFormat::sniff(&body));

        tracing::debug!(path = %path.display(), "reading light curve from disk");
        decode_payload(&body, format, self.decode)?.ok_or_else(|| RetrievalError::NoData {
            target: target.to_string(),
            mission: mission.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn mission_subdirectory_wins_over_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Kepler")).unwrap();
        fs::write(
            dir.path().join("Kepler/Kepler-8.csv"),
            "time,flux\n1.0,2.0\n",
        )
        .unwrap();
        fs::write(dir.path().join("Kepler-8.csv"), "time,flux\n9.0,9.0\n").unwrap();

        let p = DirectoryProvider::new(dir.path());
        let s = p.fetch("Kepler-8", "Kepler").await.unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].timestamp, 1.0);

        // Other missions fall back to the root file.
        let s = p.fetch("Kepler-8", "TESS").await.unwrap();
        assert_eq!(s[0].timestamp, 9.0);
    }

    #[tokio::test]
    async fn missing_file_is_unknown_target() {
        let dir = tempfile::tempdir().unwrap();
        let p = DirectoryProvider::new(dir.path());
        let err = p.fetch("Kepler-404", "Kepler").await.unwrap_err();
        assert!(matches!(err, RetrievalError::UnknownTarget { .. }));
    }

    #[tokio::test]
    async fn header_only_csv_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Kepler-10.csv"), "time,flux\n").unwrap();
        let p = DirectoryProvider::new(dir.path());
        let err = p.fetch("Kepler-10", "Kepler").await.unwrap_err();
        assert!(matches!(err, RetrievalError::NoData { .. }));
    }

    #[tokio::test]
    async fn path_like_targets_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = DirectoryProvider::new(dir.path());
        let err = p.fetch("../etc/passwd", "Kepler").await.unwrap_err();
        assert!(matches!(err, RetrievalError::UnknownTarget { .. }));
    }
}
