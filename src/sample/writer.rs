// src/sample/writer.rs
use std::fs;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use super::format::{write_rows, LabeledSample};

/// Write `sample` to `path`, replacing any previous file.
///
/// Rows go to a sibling `*.tmp` file which is flushed, synced and renamed
/// over `path`; on any failure the temporary file is removed, so `path`
/// either holds a complete sample or is left as it was.
pub fn write_labeled_file(path: &Path, sample: &LabeledSample) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);

    let res = write_tmp(&tmp, sample).and_then(|()| fs::rename(&tmp, path));
    if res.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    res
}

fn write_tmp(tmp: &Path, sample: &LabeledSample) -> io::Result<()> {
    let file = fs::File::create(tmp)?;
    let mut w = BufWriter::new(file);
    write_rows(&sample.points, sample.planet_count, &mut w)?;
    let file = w.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Remove a leftover file from an earlier run so a failed entry never leaves
/// something that looks like a fresh artifact. Missing files are fine.
pub fn remove_stale(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::NormalizedPoint;

    fn sample(rows: &[(f64, f64)], label: u32) -> LabeledSample {
        LabeledSample {
            points: rows
                .iter()
                .map(|&(flux, timestamp)| NormalizedPoint { flux, timestamp })
                .collect(),
            planet_count: label,
        }
    }

    #[test]
    fn overwrites_existing_file_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learn1.txt");
        fs::write(&path, "stale content that is much longer than the new one\n").unwrap();

        write_labeled_file(&path, &sample(&[(1.0, 2.0)], 4)).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "1.000000 2.000000\nresult 4\n");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn failed_write_keeps_previous_file_and_cleans_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learn2.txt");
        fs::write(&path, "old\n").unwrap();

        let err = write_labeled_file(&path, &sample(&[(f64::INFINITY, 2.0)], 1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/learn3.txt");
        write_labeled_file(&path, &sample(&[], 2)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "result 2\n");
    }

    #[test]
    fn remove_stale_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learn9.txt");
        fs::write(&path, "x").unwrap();
        assert!(remove_stale(&path).unwrap());
        assert!(!remove_stale(&path).unwrap());
    }
}
