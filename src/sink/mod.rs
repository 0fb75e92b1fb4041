//! Downstream consumer of walker output. The core only depends on this
//! trait, never on a concrete container format.

pub mod archive;

use std::fs::Metadata;
use std::path::Path;

use anyhow::Result;

/// Consumes traversed entries. Errors here are never swallowed — a sink
/// failure escalates to a worker-level abort.
pub trait Sink {
    fn record_file(&mut self, path: &Path, metadata: &Metadata) -> Result<()>;

    fn record_dir(&mut self, path: &Path) -> Result<()>;

    /// Flush and close any open container. Called once at worker shutdown.
    fn finish(&mut self) -> Result<()>;
}

/// A sink that discards everything. Used for `--no-archive` walk-only
/// runs and in tests that only care about traversal counters.
#[derive(Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn record_file(&mut self, _path: &Path, _metadata: &Metadata) -> Result<()> {
        Ok(())
    }

    fn record_dir(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
