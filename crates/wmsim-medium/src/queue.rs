//! Frames and per-access-category transmit queues.
//!
//! A queue owns its frames outright: a frame enters at the tail when
//! the transmit simulator has computed its expiry and leaves through
//! `pop_front` when the delivery engine consumes it. Ordering is by
//! insertion, not by expiry; the delivery engine only examines queue
//! heads and never scans past a head that has not expired, so frames
//! leave strictly in submission order.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use wmsim_common::{MacAddr, MonoTime, RateSchedule};

/// The two access categories a station schedules independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCategory {
    /// Management frames.
    Mgmt,
    /// Everything else.
    Data,
}

/// Contention-window bounds for one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueParams {
    /// Initial contention window.
    pub cw_min: u32,
    /// Ceiling the window doubles up to.
    pub cw_max: u32,
}

impl QueueParams {
    /// Default data-queue contention bounds.
    pub const DATA_DEFAULT: QueueParams = QueueParams { cw_min: 15, cw_max: 1023 };
    /// Default management-queue contention bounds.
    pub const MGMT_DEFAULT: QueueParams = QueueParams { cw_min: 3, cw_max: 7 };
}

/// A frame waiting on the medium, owned by exactly one queue.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw frame bytes as submitted.
    pub payload: Vec<u8>,
    /// Address of the submitting station.
    pub sender: MacAddr,
    /// Destination extracted from the header at submission.
    pub dest: MacAddr,
    /// Driver correlation token.
    pub cookie: u64,
    /// Flags word; the ack bit is set by the transmit simulator.
    pub flags: u32,
    /// Whether the simulated attempt sequence ended in an ack.
    pub acked: bool,
    /// The schedule, truncated to what was used when acked.
    pub rates: RateSchedule,
    /// Absolute delivery instant on the monotonic clock.
    pub expires: MonoTime,
}

/// FIFO of pending frames plus the contention parameters that shaped
/// their backoff.
#[derive(Debug)]
pub struct TxQueue {
    frames: VecDeque<Frame>,
    params: QueueParams,
}

impl TxQueue {
    /// Create an empty queue with the given contention bounds.
    pub fn new(params: QueueParams) -> Self {
        TxQueue { frames: VecDeque::new(), params }
    }

    /// The queue's contention bounds.
    pub fn params(&self) -> QueueParams {
        self.params
    }

    /// Append a frame at the tail.
    pub fn push_back(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    /// The head frame, if any.
    pub fn front(&self) -> Option<&Frame> {
        self.frames.front()
    }

    /// Remove and return the head frame.
    pub fn pop_front(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    /// Number of pending frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the queue holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_at(us: u64) -> Frame {
        Frame {
            payload: vec![0; 10],
            sender: MacAddr::from_octets([2, 0, 0, 0, 0, 0]),
            dest: MacAddr::BROADCAST,
            cookie: 0,
            flags: 0,
            acked: false,
            rates: RateSchedule::default(),
            expires: MonoTime::from_micros(us),
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TxQueue::new(QueueParams::DATA_DEFAULT);
        queue.push_back(frame_at(100));
        queue.push_back(frame_at(200));
        queue.push_back(frame_at(200));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop_front().unwrap().expires.as_micros(), 100);
        assert_eq!(queue.front().unwrap().expires.as_micros(), 200);
    }

    #[test]
    fn test_defaults_match_contract() {
        assert_eq!(QueueParams::DATA_DEFAULT.cw_min, 15);
        assert_eq!(QueueParams::DATA_DEFAULT.cw_max, 1023);
        assert_eq!(QueueParams::MGMT_DEFAULT.cw_min, 3);
        assert_eq!(QueueParams::MGMT_DEFAULT.cw_max, 7);
    }
}
