use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::sink::Sink;

use super::stats::WalkDelta;
use super::task::DirTask;

#[derive(Default)]
pub struct WalkOutcome {
    pub new_dirs: Vec<DirTask>,
    pub delta: WalkDelta,
}

/// Scans the immediate children of `path`. `path` itself always counts as
/// processed, even if it can't be opened; per-entry and scan failures are
/// logged and skipped, never fail the worker. Sink errors do propagate.
pub fn walk(path: &Path, sink: &mut dyn Sink) -> Result<WalkOutcome> {
    let mut outcome = WalkOutcome::default();
    outcome.delta.dirs = 1;
    sink.record_dir(path)
        .with_context(|| format!("sink failed on directory {}", path.display()))?;

    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("cannot scan {}: {}", path.display(), err);
            return Ok(outcome);
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                outcome.delta.scan_errors += 1;
                log::warn!("cannot read entry under {}: {}", path.display(), err);
                continue;
            }
        };

        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(err) => {
                outcome.delta.scan_errors += 1;
                log::warn!("cannot stat {}: {}", entry.path().display(), err);
                continue;
            }
        };

        if file_type.is_dir() {
            outcome.new_dirs.push(DirTask::new(entry.path()));
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => {
                outcome.delta.files += 1;
                outcome.delta.bytes += metadata.len();
                *outcome
                    .delta
                    .modes
                    .entry(mode_bits(&metadata))
                    .or_insert(0) += 1;
                sink.record_file(&entry.path(), &metadata)
                    .with_context(|| format!("sink failed on file {}", entry.path().display()))?;
            }
            Err(err) => {
                outcome.delta.scan_errors += 1;
                log::warn!("cannot stat {}: {}", entry.path().display(), err);
            }
        }
    }

    Ok(outcome)
}

#[cfg(unix)]
fn mode_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    metadata.mode()
}

#[cfg(not(unix))]
fn mode_bits(_metadata: &fs::Metadata) -> u32 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;
    use std::fs as stdfs;

    #[test]
    fn walks_immediate_children_only() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("a.txt"), b"hi").unwrap();
        stdfs::write(dir.path().join("b.txt"), b"bye").unwrap();
        stdfs::create_dir(dir.path().join("sub")).unwrap();
        stdfs::write(dir.path().join("sub").join("nested.txt"), b"deep").unwrap();

        let mut sink = NullSink;
        let outcome = walk(dir.path(), &mut sink).unwrap();

        assert_eq!(outcome.delta.dirs, 1);
        assert_eq!(outcome.delta.files, 2);
        assert_eq!(outcome.delta.bytes, 5);
        assert_eq!(outcome.new_dirs.len(), 1);
        assert_eq!(
            outcome.new_dirs[0].path(),
            dir.path().join("sub").as_path()
        );
    }

    #[test]
    fn unreadable_directory_still_counts_as_processed() {
        let mut sink = NullSink;
        let outcome = walk(Path::new("/definitely/does/not/exist"), &mut sink).unwrap();
        assert_eq!(outcome.delta.dirs, 1);
        assert_eq!(outcome.delta.files, 0);
        assert!(outcome.new_dirs.is_empty());
    }

    #[test]
    fn empty_directory_yields_one_dir_zero_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = NullSink;
        let outcome = walk(dir.path(), &mut sink).unwrap();
        assert_eq!(outcome.delta.dirs, 1);
        assert_eq!(outcome.delta.files, 0);
        assert!(outcome.new_dirs.is_empty());
    }
}
