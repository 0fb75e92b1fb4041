//! Group-messaging abstraction consumed by the scheduler. `crate::core`
//! never talks to threads or channels directly, only to `Transport` and
//! the handle traits below.

pub mod channel;

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    WorkRequest,
    WorkReply,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkReplyPayload(pub Vec<String>);

impl WorkReplyPayload {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    // u32 little-endian length + UTF-8 bytes, repeated per entry.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for entry in &self.0 {
            let bytes = entry.as_bytes();
            buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Self {
        let mut entries = Vec::new();
        let mut cursor = 0usize;
        while cursor + 4 <= bytes.len() {
            let len =
                u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap()) as usize;
            cursor += 4;
            if cursor + len > bytes.len() {
                break;
            }
            entries.push(String::from_utf8_lossy(&bytes[cursor..cursor + len]).into_owned());
            cursor += len;
        }
        Self(entries)
    }
}

#[derive(Clone, Debug)]
pub enum Message {
    WorkRequest,
    WorkReply(WorkReplyPayload),
}

impl Message {
    pub fn tag(&self) -> Tag {
        match self {
            Message::WorkRequest => Tag::WorkRequest,
            Message::WorkReply(_) => Tag::WorkReply,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::WorkRequest => write!(f, "WORK_REQUEST"),
            Tag::WorkReply => write!(f, "WORK_REPLY"),
        }
    }
}

pub trait SendHandle {
    fn test(&self) -> bool;

    fn wait(&self) {
        while !self.test() {
            std::thread::yield_now();
        }
    }
}

pub trait BarrierHandle {
    fn test(&self) -> bool;
}

pub trait AllreduceHandle {
    // Some(sum) once every peer's contribution has been folded in.
    fn test(&self) -> Option<i64>;

    fn wait(&self) -> i64 {
        loop {
            if let Some(v) = self.test() {
                return v;
            }
            std::thread::yield_now();
        }
    }
}

pub trait Transport {
    type Send: SendHandle;
    type Barrier: BarrierHandle;
    type Allreduce: AllreduceHandle;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn send_nonblocking(&mut self, dest: usize, message: Message) -> Self::Send;

    // Returns the source rank without consuming the message.
    fn probe(&mut self, tag: Tag) -> Option<usize>;

    fn recv(&mut self, source: usize, tag: Tag) -> Message;

    fn barrier_nonblocking(&self) -> Self::Barrier;

    fn allreduce_nonblocking(&self, local: i64) -> Self::Allreduce;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_reply_payload_round_trips() {
        let payload = WorkReplyPayload(vec![
            "/a/b".to_string(),
            "/a/b/c".to_string(),
            String::new(),
        ]);
        let encoded = payload.encode();
        let decoded = WorkReplyPayload::decode(&encoded);
        assert_eq!(payload, decoded);
    }

    #[test]
    fn empty_payload_round_trips() {
        let payload = WorkReplyPayload::default();
        assert!(payload.is_empty());
        assert_eq!(WorkReplyPayload::decode(&payload.encode()), payload);
    }
}
