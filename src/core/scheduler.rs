use std::path::PathBuf;

use anyhow::Result;
use fastrace::prelude::*;

use crate::sink::Sink;
use crate::transport::{AllreduceHandle, BarrierHandle, Transport};

use super::donor;
use super::queue::WorkQueue;
use super::steal::StealClient;
use super::task::DirTask;
use super::termination::{BarrierArming, RequestRegister};
use super::stats::WorkerStats;
use super::walker;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub excess_threshold: usize,
    pub starve_threshold: usize,
    pub max_requests_per_peer: u32,
}

pub struct Scheduler<T: Transport, S: Sink> {
    transport: T,
    sink: S,
    queue: WorkQueue,
    steal: StealClient,
    arming: BarrierArming,
    register: RequestRegister<T::Send>,
    config: SchedulerConfig,
    stats: WorkerStats,
    pending_allreduce: Option<T::Allreduce>,
}

impl<T: Transport, S: Sink> Scheduler<T, S> {
    pub fn new(transport: T, sink: S, config: SchedulerConfig) -> Self {
        let rank = transport.rank();
        let size = transport.size();
        Self {
            steal: StealClient::new(rank, size, config.max_requests_per_peer),
            register: RequestRegister::new(size),
            transport,
            sink,
            queue: WorkQueue::new(),
            arming: BarrierArming::default(),
            config,
            stats: WorkerStats::default(),
            pending_allreduce: None,
        }
    }

    /// Push the given root paths directly onto this worker's queue, unwalked.
    pub fn seed_roots(&mut self, roots: impl IntoIterator<Item = PathBuf>) {
        for root in roots {
            self.queue.push(DirTask::new(root));
        }
    }

    pub fn run(mut self) -> Result<(WorkerStats, S)> {
        let size = self.transport.size();

        if size == 1 {
            while let Some(task) = self.queue.pop_one() {
                self.walk_one(task)?;
            }
            self.stats.rounds = 1;
            self.sink.finish()?;
            return Ok((self.stats, self.sink));
        }

        loop {
            #[cfg(debug_assertions)]
            let (_round_span, _guard) = {
                let span = Span::root("scheduler_round", SpanContext::random());
                let guard = span.set_local_parent();
                span.add_property(|| ("rank", self.transport.rank().to_string()));
                span.add_property(|| ("round", self.stats.rounds.to_string()));
                (span, guard)
            };

            self.steal.start_round();
            self.arming.reset();
            self.stats.rounds += 1;

            let barrier = loop {
                self.tick()?;
                self.arming.note_tick(self.queue.is_empty());
                if self.register.current_all_flushed() && self.arming.is_armed() {
                    break self.transport.barrier_nonblocking();
                }
            };

            while !barrier.test() {
                self.tick()?;
            }

            self.register.swap_round();

            // Decide on the previous round's reduce, then post a fresh one for
            // next round: a donation sent just before our own barrier vote may
            // still be undrained at the instant we'd otherwise snapshot our
            // queue length, so the decision always lags the snapshot by one round.
            let done = if let Some(prev) = self.pending_allreduce.take() {
                let total = loop {
                    self.tick()?;
                    if let Some(total) = prev.test() {
                        break total;
                    }
                };
                total == 0
            } else {
                false
            };

            self.pending_allreduce = Some(self.transport.allreduce_nonblocking(self.queue.len() as i64));

            if done {
                break;
            }
        }

        // SUM(local_rounds) == size * local_rounds iff every rank agrees.
        let consistency = self
            .transport
            .allreduce_nonblocking(self.stats.rounds as i64)
            .wait();
        debug_assert_eq!(
            consistency,
            self.stats.rounds as i64 * size as i64,
            "rank {} observed a different round count than its peers",
            self.transport.rank()
        );

        self.sink.finish()?;
        Ok((self.stats, self.sink))
    }

    fn tick(&mut self) -> Result<()> {
        self.stats.loop_iterations += 1;

        if donor::drain_reply(&mut self.transport, &mut self.queue) {
            self.stats.messages_received += 1;
        }

        let tick = donor::service_requests(
            &mut self.transport,
            &mut self.queue,
            self.config.excess_threshold,
            &self.register,
        );
        if tick.request_observed {
            self.arming.note_request_observed();
            self.stats.messages_received += 1;
        }
        if let Some((requester, handle)) = tick.sent {
            self.register.set_next_donor(requester, handle);
            self.stats.messages_sent += 1;
        }

        if self.queue.starving(self.config.starve_threshold) {
            if let Some((victim, handle)) = self.steal.try_steal(&mut self.transport, &self.register)
            {
                self.register.set_next_steal(victim, handle);
                self.stats.messages_sent += 1;
            }
        } else if let Some(task) = self.queue.pop_one() {
            self.walk_one(task)?;
        }

        Ok(())
    }

    fn walk_one(&mut self, task: DirTask) -> Result<()> {
        let outcome = walker::walk(task.path(), &mut self.sink)?;
        self.stats.apply_delta(&outcome.delta);
        for dir in outcome.new_dirs {
            self.queue.push(dir);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;
    use crate::transport::channel::ChannelTransport;
    use std::fs;

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            excess_threshold: 1,
            starve_threshold: 0,
            max_requests_per_peer: 10,
        }
    }

    #[test]
    fn single_rank_walks_whole_tree() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("b.txt"), b"bye").unwrap();

        let mut group = ChannelTransport::build_group(1);
        let transport = group.remove(0);
        let mut scheduler = Scheduler::new(transport, NullSink, config());
        scheduler.seed_roots(vec![dir.path().to_path_buf()]);
        let (stats, _sink) = scheduler.run().unwrap();

        assert_eq!(stats.dirs_processed, 2);
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.rounds, 1);
    }

    #[test]
    fn two_ranks_converge_and_agree_on_round_count() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..6 {
            let sub = dir.path().join(format!("d{i}"));
            fs::create_dir(&sub).unwrap();
            fs::write(sub.join("f.txt"), b"x").unwrap();
        }

        let mut group = ChannelTransport::build_group(2);
        let t1 = group.remove(1);
        let t0 = group.remove(0);

        let root = dir.path().to_path_buf();
        let handle = std::thread::spawn(move || {
            let mut scheduler = Scheduler::new(t1, NullSink, config());
            scheduler.seed_roots(Vec::new());
            scheduler.run().unwrap()
        });

        let mut scheduler0 = Scheduler::new(t0, NullSink, config());
        scheduler0.seed_roots(vec![root]);
        let (stats0, _) = scheduler0.run().unwrap();
        let (stats1, _) = handle.join().unwrap();

        assert_eq!(stats0.dirs_processed + stats1.dirs_processed, 7);
        assert_eq!(stats0.files_processed + stats1.files_processed, 6);
    }
}
