use anyhow::{Context, Result};
use clap::Parser;
use fswarm::cli;
use fswarm::config::Config;
use fswarm::core::scheduler::{Scheduler, SchedulerConfig};
use fswarm::core::stats::WorkerStats;
use fswarm::sink::archive::RotatingArchiveSink;
use fswarm::sink::{NullSink, Sink};
use fswarm::transport::channel::ChannelTransport;
use logforth::{
    append,
    colored::Colorize,
    filter::{EnvFilter, env_filter::EnvFilterBuilder},
};

#[derive(Debug)]
pub struct CustomTextLayout {}
impl CustomTextLayout {
    fn new() -> Self {
        CustomTextLayout {}
    }
}

impl logforth::layout::Layout for CustomTextLayout {
    fn format(
        &self,
        record: &log::Record,
        _diagnostics: &[Box<dyn logforth::Diagnostic>],
    ) -> anyhow::Result<Vec<u8>> {
        let level_str = match record.level() {
            log::Level::Error => "ERROR".red().bold(),
            log::Level::Warn => "WARN".yellow().bold(),
            log::Level::Info => "INFO".green().bold(),
            log::Level::Debug => "DEBUG".blue().bold(),
            log::Level::Trace => "TRACE".purple().bold(),
        };

        let formatted = format!("[{}] {}", level_str, record.args());
        Ok(formatted.into_bytes())
    }
}

fn init_logging(trace: bool) {
    let filter_builder = EnvFilterBuilder::try_from_env("FSWARM_LOG").unwrap_or_else(|| {
        let default_level = if cfg!(debug_assertions) {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        EnvFilterBuilder::new().filter_level(default_level)
    });

    logforth::builder()
        .dispatch(|d| {
            let mut dispatch = d
                .filter(EnvFilter::new(filter_builder))
                .append(append::Stderr::default().with_layout(CustomTextLayout::new()));
            if trace {
                dispatch = dispatch.append(append::FastraceEvent::default());
            }
            dispatch
        })
        .apply();
}

/// Spawn one scheduler per simulated rank and run the group to completion,
/// seeding only rank 0's queue with the CLI-provided roots.
fn run_group<S, F>(
    transports: Vec<ChannelTransport>,
    roots: Vec<std::path::PathBuf>,
    scheduler_config: SchedulerConfig,
    sink_factory: F,
) -> Result<Vec<WorkerStats>>
where
    S: Sink + Send,
    F: Fn(usize) -> Result<S> + Sync,
{
    crossbeam_utils::thread::scope(|scope| {
        let sink_factory = &sink_factory;
        let handles: Vec<_> = transports
            .into_iter()
            .map(|transport| {
                let rank = transport.rank();
                let roots = if rank == 0 { roots.clone() } else { Vec::new() };
                scope.spawn(move |_| -> Result<WorkerStats> {
                    let sink = sink_factory(rank)?;
                    let mut scheduler = Scheduler::new(transport, sink, scheduler_config);
                    scheduler.seed_roots(roots);
                    let (stats, _sink) = scheduler.run()?;
                    Ok(stats)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|panic| {
                    Err(anyhow::anyhow!("worker thread panicked: {:?}", panic))
                })
            })
            .collect::<Result<Vec<WorkerStats>>>()
    })
    .map_err(|panic| anyhow::anyhow!("worker scope panicked: {:?}", panic))?
}

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logging(cli.trace);

    let config = Config::from_cli(&cli)?;
    log::info!(
        "Starting fswarm v{}, workers: {}",
        env!("CARGO_PKG_VERSION"),
        config.workers
    );

    let group = ChannelTransport::build_group(config.workers);
    let archive = config.archive.clone();

    let stats = if let Some(archive) = archive {
        run_group(group, config.paths, config.scheduler, move |rank| {
            RotatingArchiveSink::new(
                archive.dir.join(format!("rank-{rank}")),
                rank,
                archive.container_cap_bytes,
            )
            .with_context(|| format!("opening archive sink for rank {rank}"))
        })?
    } else {
        run_group(group, config.paths, config.scheduler, |_rank| {
            Ok(NullSink)
        })?
    };

    let mut total_dirs = 0u64;
    let mut total_files = 0u64;
    let mut total_bytes = 0u64;
    for (rank, worker_stats) in stats.iter().enumerate() {
        log::info!("{}", worker_stats.summary_line(rank));
        total_dirs += worker_stats.dirs_processed;
        total_files += worker_stats.files_processed;
        total_bytes += worker_stats.bytes_seen;
    }
    log::info!(
        "group totals: {} dirs, {} files, {}",
        total_dirs,
        total_files,
        humansize::format_size(total_bytes, humansize::DECIMAL)
    );

    fastrace::flush();
    Ok(())
}
