//! Scheduling policies.
//!
//! Implements five classical strategies behind one selection contract:
//! - `fifo`: First-In-First-Out by arrival, non-preemptive
//! - `sjf`: Shortest Job First by total work, non-preemptive
//! - `srt`: Shortest Remaining Time, re-evaluated every tick
//! - `rr`: Round Robin over the ready queue with a per-process quantum
//! - `hrrn`: Highest Response Ratio Next, non-preemptive
//!
//! Policies only read process records. All state changes go through the
//! engine, so every policy can be exercised on a hand-built ready set.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::models::{Pid, ProcessRecord, Tick};

/// How long a dispatched process may hold the processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preemption {
    /// Runs until its work is exhausted.
    Never,
    /// Selection is repeated after every tick.
    EveryTick,
    /// Runs for at most its own quantum, then rejoins the back of the queue.
    Quantum,
}

/// View of the schedulable processes handed to a policy.
pub struct SchedulingContext<'a> {
    /// Current logical time.
    pub now: Tick,
    /// Arrived, unblocked, unterminated processes in ready-queue order.
    /// A process kept on the CPU between ticks comes first.
    pub ready: Vec<&'a ProcessRecord>,
    /// Processes waiting on the resource.
    pub blocked: Vec<&'a ProcessRecord>,
}

/// Error parsing a policy name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyParseError(pub String);

impl fmt::Display for PolicyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown scheduling policy: {} (expected fifo, sjf, srt, rr or hrrn)",
            self.0
        )
    }
}

impl std::error::Error for PolicyParseError {}

/// The closed set of scheduling policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Policy {
    Fifo,
    Sjf,
    Srt,
    RoundRobin,
    Hrrn,
}

impl Policy {
    pub const ALL: [Policy; 5] = [
        Policy::Fifo,
        Policy::Sjf,
        Policy::Srt,
        Policy::RoundRobin,
        Policy::Hrrn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Policy::Fifo => "fifo",
            Policy::Sjf => "sjf",
            Policy::Srt => "srt",
            Policy::RoundRobin => "rr",
            Policy::Hrrn => "hrrn",
        }
    }

    pub fn preemption(self) -> Preemption {
        match self {
            Policy::Fifo | Policy::Sjf | Policy::Hrrn => Preemption::Never,
            Policy::Srt => Preemption::EveryTick,
            Policy::RoundRobin => Preemption::Quantum,
        }
    }

    pub fn is_preemptive(self) -> bool {
        self.preemption() != Preemption::Never
    }

    /// Whether this policy needs a quantum for every process.
    pub fn uses_quantum(self) -> bool {
        self.preemption() == Preemption::Quantum
    }

    /// Pick the next process to run from `ctx.ready`.
    ///
    /// Returns `None` only when the ready set is empty.
    pub fn select_next(self, ctx: &SchedulingContext<'_>) -> Option<Pid> {
        ctx.ready
            .iter()
            .enumerate()
            .map(|(position, p)| SelectionKey::for_process(self, p, position, ctx.now))
            .min()
            .map(|key| key.pid())
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" | "fcfs" => Ok(Policy::Fifo),
            "sjf" => Ok(Policy::Sjf),
            "srt" | "srtf" => Ok(Policy::Srt),
            "rr" | "round_robin" | "round-robin" => Ok(Policy::RoundRobin),
            "hrrn" => Ok(Policy::Hrrn),
            other => Err(PolicyParseError(other.to_string())),
        }
    }
}

/// Response ratio `(waiting + service) / service`, kept as an exact fraction.
#[derive(Clone, Copy, Debug)]
pub struct ResponseRatio {
    numerator: u128,
    denominator: u128,
}

impl ResponseRatio {
    /// Ratio for a process with `total_work > 0` that arrived at or before `now`.
    pub fn new(now: Tick, arrival: Tick, total_work: Tick) -> Self {
        let waiting = now.saturating_sub(arrival) as u128;
        let service = total_work.max(1) as u128;
        Self {
            numerator: waiting + service,
            denominator: service,
        }
    }

    pub fn as_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl PartialEq for ResponseRatio {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ResponseRatio {}

impl Ord for ResponseRatio {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.numerator * other.denominator).cmp(&(other.numerator * self.denominator))
    }
}

impl PartialOrd for ResponseRatio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Selection key: the minimum key wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionKey {
    /// (arrival, input order)
    Fifo {
        arrival: Tick,
        order: usize,
        pid: Pid,
    },
    /// (total work, arrival, input order)
    Sjf {
        total_work: Tick,
        arrival: Tick,
        order: usize,
        pid: Pid,
    },
    /// (remaining work, arrival, pid)
    Srt {
        remaining: Tick,
        arrival: Tick,
        pid: Pid,
    },
    /// (position in ready queue)
    RoundRobin { position: usize, pid: Pid },
    /// (-ratio, arrival, input order)
    Hrrn {
        ratio: ResponseRatio,
        arrival: Tick,
        order: usize,
        pid: Pid,
    },
}

impl SelectionKey {
    /// Key of `p`, found at `position` in the ready queue at time `now`.
    pub fn for_process(policy: Policy, p: &ProcessRecord, position: usize, now: Tick) -> Self {
        match policy {
            Policy::Fifo => Self::Fifo {
                arrival: p.arrival_time(),
                order: p.input_order(),
                pid: p.pid(),
            },
            Policy::Sjf => Self::Sjf {
                total_work: p.total_work(),
                arrival: p.arrival_time(),
                order: p.input_order(),
                pid: p.pid(),
            },
            Policy::Srt => Self::Srt {
                remaining: p.remaining_work(),
                arrival: p.arrival_time(),
                pid: p.pid(),
            },
            Policy::RoundRobin => Self::RoundRobin {
                position,
                pid: p.pid(),
            },
            Policy::Hrrn => Self::Hrrn {
                ratio: ResponseRatio::new(now, p.arrival_time(), p.total_work()),
                arrival: p.arrival_time(),
                order: p.input_order(),
                pid: p.pid(),
            },
        }
    }

    pub fn pid(&self) -> Pid {
        match self {
            Self::Fifo { pid, .. }
            | Self::Sjf { pid, .. }
            | Self::Srt { pid, .. }
            | Self::RoundRobin { pid, .. }
            | Self::Hrrn { pid, .. } => *pid,
        }
    }
}

impl Ord for SelectionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Self::Fifo {
                    arrival: a1,
                    order: o1,
                    ..
                },
                Self::Fifo {
                    arrival: a2,
                    order: o2,
                    ..
                },
            ) => a1.cmp(a2).then(o1.cmp(o2)),

            (
                Self::Sjf {
                    total_work: w1,
                    arrival: a1,
                    order: o1,
                    ..
                },
                Self::Sjf {
                    total_work: w2,
                    arrival: a2,
                    order: o2,
                    ..
                },
            ) => w1.cmp(w2).then(a1.cmp(a2)).then(o1.cmp(o2)),

            (
                Self::Srt {
                    remaining: r1,
                    arrival: a1,
                    pid: p1,
                },
                Self::Srt {
                    remaining: r2,
                    arrival: a2,
                    pid: p2,
                },
            ) => r1.cmp(r2).then(a1.cmp(a2)).then(p1.cmp(p2)),

            (Self::RoundRobin { position: p1, .. }, Self::RoundRobin { position: p2, .. }) => {
                p1.cmp(p2)
            }

            // Higher ratio sorts first
            (
                Self::Hrrn {
                    ratio: r1,
                    arrival: a1,
                    order: o1,
                    ..
                },
                Self::Hrrn {
                    ratio: r2,
                    arrival: a2,
                    order: o2,
                    ..
                },
            ) => r2.cmp(r1).then(a1.cmp(a2)).then(o1.cmp(o2)),

            // Keys of different policies are never mixed in one selection
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for SelectionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
