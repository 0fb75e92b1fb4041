use crate::transport::{Message, Tag, Transport, WorkReplyPayload};

use super::queue::WorkQueue;
use super::termination::RequestRegister;

pub struct DonorTick<S> {
    pub request_observed: bool,
    pub sent: Option<(usize, S)>,
}

// Declined requests (no excess, or the slice came back empty) are
// silently dropped — the requester will re-target via its own
// round-robin cursor.
pub fn service_requests<T: Transport>(
    transport: &mut T,
    queue: &mut WorkQueue,
    excess_threshold: usize,
    register: &RequestRegister<T::Send>,
) -> DonorTick<T::Send> {
    let Some(source) = transport.probe(Tag::WorkRequest) else {
        return DonorTick {
            request_observed: false,
            sent: None,
        };
    };

    // Consume the request regardless of whether we end up donating.
    match transport.recv(source, Tag::WorkRequest) {
        Message::WorkRequest => {}
        other => {
            // Protocol invariant violation: a WORK_REQUEST tag must only
            // ever carry an empty request payload.
            panic!(
                "expected WORK_REQUEST payload from {source}, got {:?}",
                other.tag()
            );
        }
    }

    let mut sent = None;
    if queue.excess(excess_threshold) {
        if let Some(slice) = queue.split_front() {
            debug_assert!(!slice.is_empty(), "split_front never returns an empty Some");
            register.wait_next_donor(source);
            let payload = WorkReplyPayload(
                slice
                    .into_iter()
                    .map(|task| task.path().to_string_lossy().into_owned())
                    .collect(),
            );
            let handle = transport.send_nonblocking(source, Message::WorkReply(payload));
            sent = Some((source, handle));
        }
    }

    DonorTick {
        request_observed: true,
        sent,
    }
}

pub fn drain_reply<T: Transport>(transport: &mut T, queue: &mut WorkQueue) -> bool {
    let Some(source) = transport.probe(Tag::WorkReply) else {
        return false;
    };
    match transport.recv(source, Tag::WorkReply) {
        Message::WorkReply(payload) => {
            assert!(
                !payload.is_empty(),
                "protocol invariant violated: empty WORK_REPLY from {source}"
            );
            for path in payload.0 {
                queue.push(super::task::DirTask::new(path));
            }
        }
        other => panic!(
            "expected WORK_REPLY payload from {source}, got {:?}",
            other.tag()
        ),
    }
    true
}
