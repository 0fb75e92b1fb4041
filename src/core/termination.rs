use crate::transport::SendHandle;

/// `next` receives sends posted this round; `current` (last round's `next`)
/// is what the barrier-readiness check tests. Swapped at each round
/// boundary so a send posted mid-round can't retroactively fail that
/// round's "all prior sends completed" check.
pub struct RequestRegister<S> {
    current_steal: Vec<Option<S>>,
    next_steal: Vec<Option<S>>,
    current_donor: Vec<Option<S>>,
    next_donor: Vec<Option<S>>,
}

impl<S: SendHandle> RequestRegister<S> {
    pub fn new(size: usize) -> Self {
        Self {
            current_steal: (0..size).map(|_| None).collect(),
            next_steal: (0..size).map(|_| None).collect(),
            current_donor: (0..size).map(|_| None).collect(),
            next_donor: (0..size).map(|_| None).collect(),
        }
    }

    pub fn next_steal_complete(&self, victim: usize) -> bool {
        self.next_steal[victim].as_ref().is_none_or(|h| h.test())
    }

    pub fn set_next_steal(&mut self, victim: usize, handle: S) {
        self.next_steal[victim] = Some(handle);
    }

    pub fn wait_next_donor(&self, requester: usize) {
        if let Some(handle) = &self.next_donor[requester] {
            handle.wait();
        }
    }

    pub fn set_next_donor(&mut self, requester: usize, handle: S) {
        self.next_donor[requester] = Some(handle);
    }

    /// All of last round's posted sends — both steal requests and
    /// donations — have completed. Gates posting the barrier.
    pub fn current_all_flushed(&self) -> bool {
        self.current_steal.iter().all(|h| h.as_ref().is_none_or(|h| h.test()))
            && self.current_donor.iter().all(|h| h.as_ref().is_none_or(|h| h.test()))
    }

    pub fn swap_round(&mut self) {
        std::mem::swap(&mut self.current_steal, &mut self.next_steal);
        std::mem::swap(&mut self.current_donor, &mut self.next_donor);
    }
}

/// Arms on the first observed `WORK_REQUEST`, or after two consecutive
/// ticks with an empty local queue — so a worker that never gets probed
/// (e.g. rank 0 on a tiny tree with large `N`) can't starve the barrier.
#[derive(Default)]
pub struct BarrierArming {
    armed: bool,
    saw_empty_tick: bool,
}

impl BarrierArming {
    pub fn reset(&mut self) {
        self.armed = false;
        self.saw_empty_tick = false;
    }

    pub fn note_request_observed(&mut self) {
        self.armed = true;
    }

    pub fn note_tick(&mut self, queue_was_empty: bool) {
        if queue_was_empty {
            if self.saw_empty_tick {
                self.armed = true;
            }
            self.saw_empty_tick = true;
        } else {
            self.saw_empty_tick = false;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::channel::{ChannelSendHandle, ChannelTransport};
    use crate::transport::Transport;

    fn handle(t: &mut ChannelTransport, dest: usize) -> ChannelSendHandle {
        t.send_nonblocking(dest, crate::transport::Message::WorkRequest)
    }

    #[test]
    fn fresh_register_reports_all_flushed() {
        let reg: RequestRegister<ChannelSendHandle> = RequestRegister::new(3);
        assert!(reg.current_all_flushed());
    }

    #[test]
    fn swap_moves_next_into_current() {
        let mut group = ChannelTransport::build_group(2);
        let mut rank0 = group.remove(0);
        let mut reg: RequestRegister<ChannelSendHandle> = RequestRegister::new(2);
        assert!(reg.next_steal_complete(1));
        reg.set_next_steal(1, handle(&mut rank0, 1));
        reg.swap_round();
        // the handle we posted is now in `current`, already complete
        // (channel sends finish immediately), so flushed is still true.
        assert!(reg.current_all_flushed());
    }

    #[test]
    fn barrier_arming_via_request_observed() {
        let mut arming = BarrierArming::default();
        assert!(!arming.is_armed());
        arming.note_request_observed();
        assert!(arming.is_armed());
    }

    #[test]
    fn barrier_arming_via_two_consecutive_empty_ticks() {
        let mut arming = BarrierArming::default();
        arming.reset();
        arming.note_tick(true);
        assert!(!arming.is_armed(), "first empty tick only arms the watch");
        arming.note_tick(true);
        assert!(arming.is_armed(), "second consecutive empty tick arms it");
    }

    #[test]
    fn nonempty_tick_resets_the_empty_streak() {
        let mut arming = BarrierArming::default();
        arming.note_tick(true);
        arming.note_tick(false);
        arming.note_tick(true);
        assert!(!arming.is_armed());
    }
}
