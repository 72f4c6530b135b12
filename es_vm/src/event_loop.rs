// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The macrotask queue (C10 elaboration): `setTimeout`/`setInterval` and
//! (eventually) module-load completions. A host calls
//! [`crate::engine::Engine::run_pending_tasks`] in a loop to drive it;
//! this crate does not spin its own OS-level reactor.

use crate::value::Value;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// The numeric handle `setTimeout`/`setInterval` hand back to script.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(v: u64) -> Self {
        TimerId(v)
    }
}

struct Timer {
    id: TimerId,
    due: Instant,
    /// `Some(interval)` re-enqueues itself with the same delay each time
    /// it fires; `None` is a one-shot `setTimeout`.
    repeat: Option<Duration>,
    callback: Value,
    args: Vec<Value>,
    cancelled: bool,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due
    }
}
impl Eq for Timer {}
impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed: `BinaryHeap` is a max-heap, we want the soonest timer first.
        other.due.cmp(&self.due)
    }
}

#[derive(Default)]
pub struct EventLoop {
    timers: BinaryHeap<Timer>,
    next_id: u64,
}

/// A timer that came due: the host-visible effect the caller should run.
pub struct DueTimer {
    pub callback: Value,
    pub args: Vec<Value>,
}

impl EventLoop {
    pub fn new() -> Self {
        EventLoop::default()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.iter().all(|t| t.cancelled)
    }

    pub fn set_timeout(&mut self, callback: Value, args: Vec<Value>, delay_ms: f64) -> TimerId {
        self.schedule(callback, args, delay_ms, None)
    }

    pub fn set_interval(&mut self, callback: Value, args: Vec<Value>, delay_ms: f64) -> TimerId {
        let delay = Duration::from_millis(delay_ms.max(0.0) as u64);
        self.schedule(callback, args, delay_ms, Some(delay))
    }

    fn schedule(&mut self, callback: Value, args: Vec<Value>, delay_ms: f64, repeat: Option<Duration>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let due = Instant::now() + Duration::from_millis(delay_ms.max(0.0) as u64);
        self.timers.push(Timer { id, due, repeat, callback, args, cancelled: false });
        id
    }

    pub fn clear(&mut self, id: TimerId) {
        for timer in self.timers.iter_mut() {
            if timer.id == id {
                timer.cancelled = true;
            }
        }
    }

    /// Pops every timer already due, re-enqueuing the repeating ones for
    /// their next firing. Callers drain the microtask queue between each
    /// returned callback, matching how a real event loop interleaves them.
    pub fn pop_due(&mut self) -> Vec<DueTimer> {
        let now = Instant::now();
        let mut due = Vec::new();
        while let Some(timer) = self.timers.peek() {
            if timer.due > now {
                break;
            }
            let timer = self.timers.pop().unwrap();
            if timer.cancelled {
                continue;
            }
            if let Some(interval) = timer.repeat {
                due.push(DueTimer { callback: timer.callback.clone(), args: timer.args.clone() });
                self.timers.push(Timer {
                    id: timer.id,
                    due: now + interval,
                    repeat: Some(interval),
                    callback: timer.callback,
                    args: timer.args,
                    cancelled: false,
                });
            } else {
                due.push(DueTimer { callback: timer.callback, args: timer.args });
            }
        }
        due
    }

    /// How long until the next timer fires, for a host that wants to
    /// sleep rather than busy-poll `run_pending_tasks`.
    pub fn next_due_in(&self) -> Option<Duration> {
        self.timers.peek().map(|t| t.due.saturating_duration_since(Instant::now()))
    }
}
