//! Discrete-time CPU scheduling simulator.
//!
//! Given a set of processes (arrival, burst, optional resource demand and
//! Round-Robin quantum), the engine decides for every logical tick which
//! process holds the processor, records a per-tick trace, and derives waiting,
//! turnaround and response times plus CPU utilization.
//!
//! ```
//! use schedsim_rust::{simulate, Policy, ProcessSpec, SimulationConfig};
//!
//! let specs = vec![ProcessSpec::new(1, 0, 5), ProcessSpec::new(2, 1, 3)];
//! let outcome = simulate(&specs, Policy::Fifo, &SimulationConfig::default()).unwrap();
//! let report = outcome.metrics().unwrap();
//! assert_eq!(report.processes[1].waiting_time, 4);
//! assert_eq!(report.cpu_utilization, 100.0);
//! ```

mod config;
pub mod engine;
pub mod logging;
pub mod metrics;
mod models;
pub mod policy;
pub mod trace;

#[cfg(feature = "python")]
mod python;

pub use config::{ConfigError, InputBounds, SimulationConfig};
pub use engine::{simulate, PcbLogEntry, SimulationError, SimulationOutcome, Simulator};
pub use metrics::{compute_metrics, MetricsError, MetricsReport, ProcessMetrics};
pub use models::{
    InvariantError, PcbSnapshot, Pid, ProcessRecord, ProcessSpec, ProcessState, ResumeInfo,
    Tick,
};
pub use policy::{Policy, PolicyParseError, Preemption, SchedulingContext};
pub use trace::{ExecutionTrace, TraceEntry, TraceSegment, TraceSlot};
