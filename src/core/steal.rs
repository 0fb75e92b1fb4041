use crate::transport::{Message, Transport};

use super::termination::RequestRegister;

/// Round-robin victim cursor plus per-victim request counters, both
/// strictly per-worker and single-threaded — no locking needed.
pub struct StealClient {
    size: usize,
    rank: usize,
    cursor: i64,
    stole_from: Vec<u32>,
    max_requests_per_peer: u32,
}

impl StealClient {
    pub fn new(rank: usize, size: usize, max_requests_per_peer: u32) -> Self {
        Self {
            size,
            rank,
            cursor: -1,
            stole_from: vec![0; size],
            max_requests_per_peer,
        }
    }

    /// Reset at the start of every round: all counters to zero, self
    /// preset to 1 so this worker never targets itself.
    pub fn start_round(&mut self) {
        self.stole_from.iter_mut().for_each(|c| *c = 0);
        self.stole_from[self.rank] = 1;
    }

    fn next_victim(&mut self) -> usize {
        self.cursor = (self.cursor + 1) % self.size as i64;
        if self.cursor as usize == self.rank {
            self.cursor = (self.cursor + 1) % self.size as i64;
        }
        debug_assert_ne!(self.cursor as usize, self.rank, "never steal from self");
        self.cursor as usize
    }

    // Caller decides whether the local queue is actually starving.
    pub fn try_steal<T: Transport>(
        &mut self,
        transport: &mut T,
        register: &RequestRegister<T::Send>,
    ) -> Option<(usize, T::Send)> {
        let victim = self.next_victim();
        if self.stole_from[victim] >= self.max_requests_per_peer
            || !register.next_steal_complete(victim)
        {
            return None;
        }
        self.stole_from[victim] += 1;
        let handle = transport.send_nonblocking(victim, Message::WorkRequest);
        Some((victim, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_never_selects_self() {
        let mut client = StealClient::new(0, 4, 10);
        for _ in 0..20 {
            let v = client.next_victim();
            assert_ne!(v, 0);
        }
    }

    #[test]
    fn cursor_round_robins_among_peers() {
        let mut client = StealClient::new(1, 3, 10);
        let seq: Vec<usize> = (0..6).map(|_| client.next_victim()).collect();
        assert_eq!(seq, vec![0, 2, 0, 2, 0, 2]);
    }

    #[test]
    fn start_round_resets_counts_and_presets_self() {
        let mut client = StealClient::new(2, 3, 10);
        client.stole_from = vec![5, 5, 5];
        client.start_round();
        assert_eq!(client.stole_from, vec![0, 0, 1]);
    }
}
