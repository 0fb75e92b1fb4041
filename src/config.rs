use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cli::Cli;
use crate::core::scheduler::SchedulerConfig;
use crate::utils;

#[derive(Debug, Clone)]
pub struct Config {
    pub paths: Vec<PathBuf>,
    pub workers: usize,
    pub scheduler: SchedulerConfig,
    pub archive: Option<ArchiveConfig>,
    pub trace: bool,
}

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub dir: PathBuf,
    pub container_cap_bytes: u64,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let paths: Vec<PathBuf> = cli
            .paths
            .clone()
            .into_iter()
            .filter(|path| path.exists())
            .collect();
        anyhow::ensure!(!paths.is_empty(), "no given path exists: {:?}", cli.paths);

        let workers = if cli.workers == 0 {
            num_cpus::get()
        } else {
            cli.workers
        };
        anyhow::ensure!(workers > 0, "worker count must be at least 1");

        let archive = if cli.no_archive {
            None
        } else {
            let container_cap_bytes =
                utils::parse_size(&cli.container_cap).context("invalid --container-cap size")?;
            Some(ArchiveConfig {
                dir: cli.archive_dir.clone(),
                container_cap_bytes,
            })
        };

        Ok(Config {
            paths,
            workers,
            scheduler: SchedulerConfig {
                excess_threshold: cli.excess_threshold,
                starve_threshold: cli.starve_threshold,
                max_requests_per_peer: cli.max_requests_per_peer,
            },
            archive,
            trace: cli.trace,
        })
    }
}
