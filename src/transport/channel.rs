//! In-process `Transport` backend: simulates a fixed peer group as scoped
//! threads connected by `crossbeam_channel`s.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{AllreduceHandle as AllreduceHandleTrait, BarrierHandle as BarrierHandleTrait, Message, SendHandle as SendHandleTrait, Tag, Transport};

struct Envelope {
    from: usize,
    message: Message,
}

// Sense-reversing generation counters: the arriving rank that completes
// the group bumps `completed_generation`, which every `test()` compares
// its own target generation against. All-reduce is the same plus a
// running sum the last arriver publishes.
struct GroupState {
    n: usize,
    barrier_arrived: AtomicUsize,
    barrier_completed_generation: AtomicUsize,
    reduce_arrived: AtomicUsize,
    reduce_sum: AtomicI64,
    reduce_completed_generation: AtomicUsize,
    reduce_last_result: AtomicI64,
}

impl GroupState {
    fn new(n: usize) -> Self {
        Self {
            n,
            barrier_arrived: AtomicUsize::new(0),
            barrier_completed_generation: AtomicUsize::new(0),
            reduce_arrived: AtomicUsize::new(0),
            reduce_sum: AtomicI64::new(0),
            reduce_completed_generation: AtomicUsize::new(0),
            reduce_last_result: AtomicI64::new(0),
        }
    }
}

pub struct ChannelSendHandle {
    done: bool,
}

impl SendHandleTrait for ChannelSendHandle {
    fn test(&self) -> bool {
        self.done
    }
}

pub struct ChannelBarrierHandle {
    group: Arc<GroupState>,
    target_generation: usize,
}

impl BarrierHandleTrait for ChannelBarrierHandle {
    fn test(&self) -> bool {
        self.group.barrier_completed_generation.load(Ordering::Acquire) >= self.target_generation
    }
}

pub struct ChannelAllreduceHandle {
    group: Arc<GroupState>,
    target_generation: usize,
}

impl AllreduceHandleTrait for ChannelAllreduceHandle {
    fn test(&self) -> Option<i64> {
        if self.group.reduce_completed_generation.load(Ordering::Acquire) >= self.target_generation
        {
            Some(self.group.reduce_last_result.load(Ordering::Acquire))
        } else {
            None
        }
    }
}

pub struct ChannelTransport {
    rank: usize,
    size: usize,
    senders: Vec<Sender<Envelope>>,
    receiver: Receiver<Envelope>,
    inbox: [VecDeque<(usize, Message)>; 2],
    group: Arc<GroupState>,
}

fn tag_index(tag: Tag) -> usize {
    match tag {
        Tag::WorkRequest => 0,
        Tag::WorkReply => 1,
    }
}

impl ChannelTransport {
    pub fn build_group(n: usize) -> Vec<ChannelTransport> {
        assert!(n > 0, "a peer group must have at least one rank");
        let mut senders = Vec::with_capacity(n);
        let mut receivers = Vec::with_capacity(n);
        for _ in 0..n {
            let (tx, rx) = unbounded();
            senders.push(tx);
            receivers.push(rx);
        }
        let group = Arc::new(GroupState::new(n));
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, receiver)| ChannelTransport {
                rank,
                size: n,
                senders: senders.clone(),
                receiver,
                inbox: [VecDeque::new(), VecDeque::new()],
                group: group.clone(),
            })
            .collect()
    }

    fn drain_channel(&mut self) {
        while let Ok(envelope) = self.receiver.try_recv() {
            let idx = tag_index(envelope.message.tag());
            self.inbox[idx].push_back((envelope.from, envelope.message));
        }
    }
}

impl Transport for ChannelTransport {
    type Send = ChannelSendHandle;
    type Barrier = ChannelBarrierHandle;
    type Allreduce = ChannelAllreduceHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_nonblocking(&mut self, dest: usize, message: Message) -> Self::Send {
        debug_assert!(dest != self.rank, "a rank must never send to itself");
        let envelope = Envelope {
            from: self.rank,
            message,
        };
        // `unbounded` senders only fail if every receiver was dropped,
        // which would mean a peer crashed.
        self.senders[dest]
            .send(envelope)
            .expect("peer inbox closed: worker group member is gone");
        ChannelSendHandle { done: true }
    }

    fn probe(&mut self, tag: Tag) -> Option<usize> {
        self.drain_channel();
        self.inbox[tag_index(tag)].front().map(|(from, _)| *from)
    }

    fn recv(&mut self, source: usize, tag: Tag) -> Message {
        self.drain_channel();
        let bucket = &mut self.inbox[tag_index(tag)];
        let pos = bucket
            .iter()
            .position(|(from, _)| *from == source)
            .expect("recv called without a matching probed message");
        bucket.remove(pos).expect("position came from iter").1
    }

    fn barrier_nonblocking(&self) -> Self::Barrier {
        let target_generation = self
            .group
            .barrier_completed_generation
            .load(Ordering::Acquire)
            + 1;
        let arrived = self.group.barrier_arrived.fetch_add(1, Ordering::AcqRel) + 1;
        if arrived == self.group.n {
            self.group.barrier_arrived.store(0, Ordering::Release);
            self.group
                .barrier_completed_generation
                .fetch_add(1, Ordering::AcqRel);
        }
        ChannelBarrierHandle {
            group: self.group.clone(),
            target_generation,
        }
    }

    fn allreduce_nonblocking(&self, local: i64) -> Self::Allreduce {
        let target_generation = self
            .group
            .reduce_completed_generation
            .load(Ordering::Acquire)
            + 1;
        self.group.reduce_sum.fetch_add(local, Ordering::AcqRel);
        let arrived = self.group.reduce_arrived.fetch_add(1, Ordering::AcqRel) + 1;
        if arrived == self.group.n {
            let total = self.group.reduce_sum.swap(0, Ordering::AcqRel);
            self.group.reduce_arrived.store(0, Ordering::Release);
            self.group.reduce_last_result.store(total, Ordering::Release);
            self.group
                .reduce_completed_generation
                .fetch_add(1, Ordering::AcqRel);
        }
        ChannelAllreduceHandle {
            group: self.group.clone(),
            target_generation,
        }
    }
}
