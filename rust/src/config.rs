//! Configuration types for the simulator.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::models::{Pid, ProcessSpec, Tick};

/// Rejections raised before any simulation state is built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No processes to simulate")]
    NoProcesses,
    #[error("Too many processes: {count} (max {max})")]
    TooManyProcesses { count: usize, max: usize },
    #[error("Duplicate process id: P{0}")]
    DuplicatePid(Pid),
    #[error("Process P{0} has zero burst time")]
    ZeroBurst(Pid),
    #[error("Process P{pid} burst time {burst} outside [{min}, {max}]")]
    BurstOutOfRange {
        pid: Pid,
        burst: Tick,
        min: Tick,
        max: Tick,
    },
    #[error("Process P{0} has no Round-Robin quantum and no default is configured")]
    MissingQuantum(Pid),
    #[error("Process P{pid} quantum {quantum} outside [1, {max}]")]
    QuantumOutOfRange { pid: Pid, quantum: Tick, max: Tick },
    #[error("Arrival times plus total work do not fit in a tick counter")]
    HorizonOverflow,
}

/// Accepted ranges for process parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputBounds {
    /// Maximum number of processes (None = unlimited)
    pub max_processes: Option<usize>,
    /// Minimum burst length (always at least 1)
    pub min_burst: Tick,
    /// Maximum burst length (None = unlimited)
    pub max_burst: Option<Tick>,
    /// Maximum Round-Robin quantum (None = unlimited)
    pub max_quantum: Option<Tick>,
}

impl Default for InputBounds {
    fn default() -> Self {
        Self {
            max_processes: None,
            min_burst: 1,
            max_burst: None,
            max_quantum: None,
        }
    }
}

impl InputBounds {
    /// Bounds of the classroom PCB exercise: up to 5 processes, bursts of
    /// 10 to 12 instructions, quanta of 1 to 3.
    pub fn lab() -> Self {
        Self {
            max_processes: Some(5),
            min_burst: 10,
            max_burst: Some(12),
            max_quantum: Some(3),
        }
    }

    /// Validate process count, ids and bursts.
    pub fn validate(&self, specs: &[ProcessSpec]) -> Result<(), ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::NoProcesses);
        }
        if let Some(max) = self.max_processes {
            if specs.len() > max {
                return Err(ConfigError::TooManyProcesses {
                    count: specs.len(),
                    max,
                });
            }
        }

        let mut seen: FxHashSet<Pid> = FxHashSet::default();
        for spec in specs {
            if !seen.insert(spec.pid) {
                return Err(ConfigError::DuplicatePid(spec.pid));
            }
            if spec.burst_time == 0 {
                return Err(ConfigError::ZeroBurst(spec.pid));
            }
            let max = self.max_burst.unwrap_or(Tick::MAX);
            if spec.burst_time < self.min_burst || spec.burst_time > max {
                return Err(ConfigError::BurstOutOfRange {
                    pid: spec.pid,
                    burst: spec.burst_time,
                    min: self.min_burst,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Resolve and validate the quantum of every process, in input order.
    pub fn resolve_quanta(
        &self,
        specs: &[ProcessSpec],
        default_quantum: Option<Tick>,
    ) -> Result<Vec<Tick>, ConfigError> {
        let max = self.max_quantum.unwrap_or(Tick::MAX);
        specs
            .iter()
            .map(|spec| {
                let quantum = spec
                    .quantum
                    .or(default_quantum)
                    .ok_or(ConfigError::MissingQuantum(spec.pid))?;
                if quantum == 0 || quantum > max {
                    return Err(ConfigError::QuantumOutOfRange {
                        pid: spec.pid,
                        quantum,
                        max,
                    });
                }
                Ok(quantum)
            })
            .collect()
    }
}

/// Configuration for one simulation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
    /// Accepted input ranges
    pub bounds: InputBounds,
    /// Quantum for Round-Robin processes that do not carry their own
    pub default_quantum: Option<Tick>,
    /// Record a PCB snapshot after every executed instruction
    pub capture_pcb_snapshots: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            bounds: InputBounds::default(),
            default_quantum: None,
            capture_pcb_snapshots: false,
        }
    }
}

impl SimulationConfig {
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_bounds(mut self, bounds: InputBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_default_quantum(mut self, quantum: Tick) -> Self {
        self.default_quantum = Some(quantum);
        self
    }

    pub fn with_pcb_snapshots(mut self) -> Self {
        self.capture_pcb_snapshots = true;
        self
    }
}
