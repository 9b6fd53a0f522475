//! Simulation events and the time-ordered queue that runs them.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use bytes::Bytes;
use dvhop_protocol::{NodeTimer, TimerHandle, Timestamp};

/// Index of a node in the simulation.
pub type NodeIndex = usize;

/// Something that happens to one node at one point in simulated time.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// A timer the node scheduled came due.
    Timer {
        node: NodeIndex,
        handle: TimerHandle,
        timer: NodeTimer,
    },
    /// A broadcast reaches a node in range.
    Deliver {
        node: NodeIndex,
        payload: Bytes,
    },
    /// The node fails and is moved out of everyone's range.
    Disable { node: NodeIndex },
}

#[derive(Debug)]
struct Scheduled {
    at: Timestamp,
    seq: u64,
    event: SimEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed so the max-heap pops the earliest event first; ties go to
    // whichever was scheduled first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Time-ordered event queue with timer cancellation.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
    next_handle: u64,
    /// Timers queued and neither fired nor cancelled.
    live_timers: HashSet<TimerHandle>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event.
    pub fn push(&mut self, at: Timestamp, event: SimEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled { at, seq, event });
    }

    /// Queue a node timer and return its handle.
    pub fn push_timer(&mut self, at: Timestamp, node: NodeIndex, timer: NodeTimer) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.live_timers.insert(handle);
        self.push(at, SimEvent::Timer { node, handle, timer });
        handle
    }

    /// Cancel a timer. It is skipped when it comes due; fired or unknown
    /// handles are ignored.
    pub fn cancel(&mut self, handle: TimerHandle) {
        self.live_timers.remove(&handle);
    }

    /// Time of the next live event.
    pub fn peek_time(&mut self) -> Option<Timestamp> {
        self.skip_cancelled();
        self.heap.peek().map(|s| s.at)
    }

    /// Remove and return the next live event.
    pub fn pop(&mut self) -> Option<(Timestamp, SimEvent)> {
        self.skip_cancelled();
        let scheduled = self.heap.pop()?;
        if let SimEvent::Timer { handle, .. } = &scheduled.event {
            self.live_timers.remove(handle);
        }
        Some((scheduled.at, scheduled.event))
    }

    /// Number of queued events, cancelled timers included.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn skip_cancelled(&mut self) {
        while let Some(top) = self.heap.peek() {
            let SimEvent::Timer { handle, .. } = &top.event else {
                return;
            };
            if self.live_timers.contains(handle) {
                return;
            }
            self.heap.pop();
        }
    }
}
