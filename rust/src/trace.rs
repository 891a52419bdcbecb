//! Per-tick execution trace.

use std::fmt;

use crate::models::{Pid, Tick};

/// What the processor did during one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TraceSlot {
    Idle,
    Busy(Pid),
}

impl TraceSlot {
    pub fn pid(self) -> Option<Pid> {
        match self {
            TraceSlot::Idle => None,
            TraceSlot::Busy(pid) => Some(pid),
        }
    }
}

impl fmt::Display for TraceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceSlot::Idle => f.write_str("idle"),
            TraceSlot::Busy(pid) => write!(f, "P{}", pid),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    pub tick: Tick,
    pub slot: TraceSlot,
}

/// A maximal run of identical slots, `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceSegment {
    pub slot: TraceSlot,
    pub start: Tick,
    pub end: Tick,
}

impl TraceSegment {
    pub fn len(&self) -> Tick {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Ordered record of processor occupancy, one entry per tick starting at 0.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionTrace {
    entries: Vec<TraceEntry>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the slot for the next tick.
    pub(crate) fn push(&mut self, slot: TraceSlot) {
        let tick = self.entries.len() as Tick;
        self.entries.push(TraceEntry { tick, slot });
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn slots(&self) -> impl Iterator<Item = TraceSlot> + '_ {
        self.entries.iter().map(|e| e.slot)
    }

    pub fn busy_ticks(&self) -> usize {
        self.slots().filter(|s| *s != TraceSlot::Idle).count()
    }

    pub fn idle_ticks(&self) -> usize {
        self.len() - self.busy_ticks()
    }

    pub fn ticks_for(&self, pid: Pid) -> usize {
        self.slots().filter(|s| *s == TraceSlot::Busy(pid)).count()
    }

    /// Busy share of the trace as a percentage, `None` for an empty trace.
    pub fn utilization(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.busy_ticks() as f64 / self.len() as f64 * 100.0)
    }

    /// Collapses the trace into contiguous runs for Gantt rendering.
    pub fn segments(&self) -> Vec<TraceSegment> {
        let mut segments: Vec<TraceSegment> = Vec::new();
        for entry in &self.entries {
            match segments.last_mut() {
                Some(last) if last.slot == entry.slot && last.end == entry.tick => {
                    last.end += 1;
                }
                _ => segments.push(TraceSegment {
                    slot: entry.slot,
                    start: entry.tick,
                    end: entry.tick + 1,
                }),
            }
        }
        segments
    }
}
