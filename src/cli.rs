use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "fswarm")]
#[command(about = "Distributed work-stealing filesystem traversal with archival", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Root paths to traverse; the seed worker's queue starts with these.
    #[arg(value_name = "PATH", default_values = ["."])]
    pub paths: Vec<PathBuf>,

    /// Number of simulated peers. 0 means one per available core.
    #[arg(short = 'j', long = "workers", default_value_t = 0)]
    pub workers: usize,

    /// Queue length above which a worker considers itself to have excess
    /// work worth donating.
    #[arg(long = "excess-threshold", default_value_t = 1)]
    pub excess_threshold: usize,

    /// Queue length at or below which a worker considers itself starving.
    #[arg(long = "starve-threshold", default_value_t = 0)]
    pub starve_threshold: usize,

    /// Outstanding steal requests allowed against any single peer per
    /// termination round.
    #[arg(long = "max-requests-per-peer", default_value_t = 10)]
    pub max_requests_per_peer: u32,

    /// Size at which a worker's archive container rotates, e.g. "2TB".
    #[arg(long = "container-cap", default_value = "2TB")]
    pub container_cap: String,

    /// Directory the reference sink writes containers and manifests into.
    #[arg(long = "archive-dir", default_value = "fswarm-archive")]
    pub archive_dir: PathBuf,

    /// Skip the archival sink entirely; only traversal counters are
    /// reported. Useful for benchmarking the scheduler alone.
    #[arg(long = "no-archive")]
    pub no_archive: bool,

    /// Emit fastrace span events for the scheduler loop.
    #[arg(long = "trace", default_value_t = false)]
    pub trace: bool,
}
