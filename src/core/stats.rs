//! Per-worker counters, accumulated locally and reduced once at shutdown
//! for reporting only — they never influence scheduling correctness.

use std::collections::HashMap;

/// Delta produced by a single walker invocation.
#[derive(Default, Debug, Clone)]
pub struct WalkDelta {
    pub dirs: u64,
    pub files: u64,
    pub bytes: u64,
    pub modes: HashMap<u32, u64>,
    pub scan_errors: u64,
}

#[derive(Default, Debug, Clone)]
pub struct WorkerStats {
    pub dirs_processed: u64,
    pub files_processed: u64,
    pub bytes_seen: u64,
    pub modes: HashMap<u32, u64>,
    pub scan_errors: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub loop_iterations: u64,
    pub rounds: u64,
}

impl WorkerStats {
    pub fn apply_delta(&mut self, delta: &WalkDelta) {
        self.dirs_processed += delta.dirs;
        self.files_processed += delta.files;
        self.bytes_seen += delta.bytes;
        self.scan_errors += delta.scan_errors;
        for (mode, count) in &delta.modes {
            *self.modes.entry(*mode).or_insert(0) += count;
        }
    }

    pub fn summary_line(&self, rank: usize) -> String {
        format!(
            "rank {rank}: {} dirs, {} files, {} ({} bytes), {} rounds",
            self.dirs_processed,
            self.files_processed,
            humansize::format_size(self.bytes_seen, humansize::DECIMAL),
            self.bytes_seen,
            self.rounds,
        )
    }
}
