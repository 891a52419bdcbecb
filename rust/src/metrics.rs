//! Per-process and system-wide performance metrics.
//!
//! Metrics are all-or-nothing: they are only computed once every process has
//! terminated, and any inconsistency fails the whole report.

use thiserror::Error;

use crate::models::{Pid, ProcessRecord, ProcessState, Tick};
use crate::trace::ExecutionTrace;

/// Errors raised when metrics cannot be derived.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("No processes to report on")]
    NoProcesses,
    #[error("Process P{pid} has not terminated (state {state})")]
    Incomplete { pid: Pid, state: ProcessState },
    #[error("Process P{0} has zero total work")]
    ZeroWork(Pid),
    #[error("Execution trace is empty")]
    EmptyTrace,
}

/// Summary row for one terminated process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessMetrics {
    pub pid: Pid,
    pub arrival_time: Tick,
    pub burst_time: Tick,
    pub start_time: Tick,
    pub completion_time: Tick,
    pub turnaround_time: Tick,
    pub waiting_time: Tick,
    pub response_time: Tick,
}

impl ProcessMetrics {
    /// Derive the summary row of a terminated record.
    pub fn from_record(record: &ProcessRecord) -> Result<Self, MetricsError> {
        let incomplete = || MetricsError::Incomplete {
            pid: record.pid(),
            state: record.state(),
        };
        if record.total_work() == 0 {
            return Err(MetricsError::ZeroWork(record.pid()));
        }
        if !record.is_terminated() {
            return Err(incomplete());
        }

        let start_time = record.start_time().ok_or_else(incomplete)?;
        let completion_time = record.finish_time().ok_or_else(incomplete)?;
        let turnaround_time = record.turnaround_time().ok_or_else(incomplete)?;
        let waiting_time = record.waiting_time().ok_or_else(incomplete)?;
        let response_time = record.response_time().ok_or_else(incomplete)?;

        Ok(Self {
            pid: record.pid(),
            arrival_time: record.arrival_time(),
            burst_time: record.total_work(),
            start_time,
            completion_time,
            turnaround_time,
            waiting_time,
            response_time,
        })
    }
}

/// Metrics of a whole run.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsReport {
    /// Per-process rows, in input order
    pub processes: Vec<ProcessMetrics>,
    /// Busy ticks / trace length, as a percentage in [0, 100]
    pub cpu_utilization: f64,
    pub average_waiting_time: f64,
    pub average_turnaround_time: f64,
    pub average_response_time: f64,
    /// Length of the trace (time of the last completion)
    pub makespan: Tick,
}

/// Compute the metrics of a completed run.
pub fn compute_metrics(
    processes: &[ProcessRecord],
    trace: &ExecutionTrace,
) -> Result<MetricsReport, MetricsError> {
    if processes.is_empty() {
        return Err(MetricsError::NoProcesses);
    }

    let rows = processes
        .iter()
        .map(ProcessMetrics::from_record)
        .collect::<Result<Vec<_>, _>>()?;

    let cpu_utilization = trace.utilization().ok_or(MetricsError::EmptyTrace)?;

    let n = rows.len() as f64;
    let average =
        |f: fn(&ProcessMetrics) -> Tick| rows.iter().map(|m| f(m) as f64).sum::<f64>() / n;
    let average_waiting_time = average(|m| m.waiting_time);
    let average_turnaround_time = average(|m| m.turnaround_time);
    let average_response_time = average(|m| m.response_time);

    Ok(MetricsReport {
        cpu_utilization,
        average_waiting_time,
        average_turnaround_time,
        average_response_time,
        makespan: trace.len() as Tick,
        processes: rows,
    })
}
