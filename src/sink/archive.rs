//! A size-bounded, rotating output container per worker. Containers are
//! named deterministically by `(worker_rank, sequence)` and rotated once
//! the cumulative size written exceeds the configured cap (default 2 TiB).
//! A sibling manifest file records each traversed directory non-recursively.

use std::fs::{File, Metadata, OpenOptions};
use std::io::{BufWriter, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::Sink;

pub const DEFAULT_CONTAINER_CAP_BYTES: u64 = 2 * 1024 * 1024 * 1024 * 1024; // 2 TiB

pub struct RotatingArchiveSink {
    dir: PathBuf,
    rank: usize,
    cap_bytes: u64,
    sequence: u64,
    container: BufWriter<File>,
    manifest: BufWriter<File>,
    container_bytes_written: u64,
}

impl RotatingArchiveSink {
    pub fn new(dir: impl Into<PathBuf>, rank: usize, cap_bytes: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating archive directory {}", dir.display()))?;
        let manifest = open_append(&dir.join(format!("rank-{rank}.manifest")))?;
        let container = open_append(&container_path(&dir, rank, 0))?;
        Ok(Self {
            dir,
            rank,
            cap_bytes: cap_bytes.max(1),
            sequence: 0,
            container,
            manifest,
            container_bytes_written: 0,
        })
    }

    fn rotate_if_needed(&mut self, incoming: u64) -> Result<()> {
        if self.container_bytes_written > 0 && self.container_bytes_written + incoming > self.cap_bytes
        {
            self.container
                .flush()
                .context("flushing archive container before rotation")?;
            self.sequence += 1;
            self.container_bytes_written = 0;
            self.container = open_append(&container_path(&self.dir, self.rank, self.sequence))?;
        }
        Ok(())
    }
}

fn container_path(dir: &Path, rank: usize, sequence: u64) -> PathBuf {
    dir.join(format!("rank-{rank}-{sequence:06}.container"))
}

fn open_append(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(BufWriter::new(file))
}

impl Sink for RotatingArchiveSink {
    fn record_file(&mut self, path: &Path, metadata: &Metadata) -> Result<()> {
        let line = format!("{}\t{}\t{:o}\n", path.display(), metadata.size(), metadata.mode());
        let bytes = line.as_bytes();
        self.rotate_if_needed(bytes.len() as u64)?;
        self.container
            .write_all(bytes)
            .with_context(|| format!("writing container entry for {}", path.display()))?;
        self.container_bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn record_dir(&mut self, path: &Path) -> Result<()> {
        writeln!(self.manifest, "{}", path.display())
            .with_context(|| format!("writing manifest entry for {}", path.display()))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.container
            .flush()
            .context("flushing final archive container")?;
        self.manifest.flush().context("flushing directory manifest")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn records_files_and_dirs_and_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RotatingArchiveSink::new(dir.path(), 0, 64).unwrap();

        let scratch = tempfile::NamedTempFile::new().unwrap();
        fs::write(scratch.path(), b"hello world").unwrap();
        let metadata = fs::metadata(scratch.path()).unwrap();

        for _ in 0..4 {
            sink.record_file(scratch.path(), &metadata).unwrap();
        }
        sink.record_dir(Path::new("/some/dir")).unwrap();
        sink.finish().unwrap();

        assert!(sink.sequence >= 1, "expected at least one rotation");
        let manifest = fs::read_to_string(dir.path().join("rank-0.manifest")).unwrap();
        assert!(manifest.contains("/some/dir"));
    }
}
