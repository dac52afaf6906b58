//! Per-path debounce state machine.
//!
//! Each path is either absent (idle) or pending with a deadline. Every raw
//! event for a pending path pushes the deadline out by the quiet period, so a
//! burst of saves collapses into one event fired once the path has been quiet
//! for the whole window. The machine is clock-agnostic: callers pass `now`.

use super::{RawEvent, RawEventKind};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Pending {
    deadline: Instant,
    first: RawEventKind,
    last: RawEventKind,
}

impl Pending {
    /// Net effect of the burst.
    fn merged(&self) -> RawEventKind {
        match (self.first, self.last) {
            (_, RawEventKind::Removed) => RawEventKind::Removed,
            (RawEventKind::Created, _) => RawEventKind::Created,
            // Removed then re-created: the file is back with new content.
            _ => RawEventKind::Modified,
        }
    }
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Records a raw event, (re)starting the path's quiet period.
    pub fn push(&mut self, event: RawEvent, now: Instant) {
        let deadline = now + self.window;
        self.pending
            .entry(event.path)
            .and_modify(|p| {
                p.deadline = deadline;
                p.last = event.kind;
            })
            .or_insert(Pending {
                deadline,
                first: event.kind,
                last: event.kind,
            });
    }

    /// Earliest deadline among pending paths.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Removes and returns every path whose quiet period has elapsed.
    pub fn drain_due(&mut self, now: Instant) -> Vec<RawEvent> {
        let due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();

        let mut fired: Vec<RawEvent> = due
            .into_iter()
            .filter_map(|path| {
                let pending = self.pending.remove(&path)?;
                Some(RawEvent {
                    path,
                    kind: pending.merged(),
                })
            })
            .collect();
        fired.sort_by(|a, b| a.path.cmp(&b.path));
        fired
    }

    /// Fires everything regardless of deadlines.
    pub fn flush(&mut self) -> Vec<RawEvent> {
        let mut fired: Vec<RawEvent> = self
            .pending
            .drain()
            .map(|(path, p)| RawEvent {
                path,
                kind: p.merged(),
            })
            .collect();
        fired.sort_by(|a, b| a.path.cmp(&b.path));
        fired
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}
