//! Python bindings, built with the `python` feature.
//!
//! The interactive prompt, the result tables and the Gantt chart live on the
//! Python side; this module only hands them plain data.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use pyo3::prelude::*;

use crate::config::{InputBounds, SimulationConfig};
use crate::engine::{simulate, PcbLogEntry};
use crate::metrics::ProcessMetrics;
use crate::models::{PcbSnapshot, ProcessSpec};
use crate::policy::Policy;

/// Process parameters (PyO3 wrapper).
#[pyclass(name = "ProcessSpec")]
#[derive(Clone, Debug)]
pub struct PyProcessSpec {
    #[pyo3(get, set)]
    pub pid: u32,
    #[pyo3(get, set)]
    pub arrival_time: u64,
    #[pyo3(get, set)]
    pub burst_time: u64,
    #[pyo3(get, set)]
    pub needs_resource: bool,
    #[pyo3(get, set)]
    pub quantum: Option<u64>,
}

#[pymethods]
impl PyProcessSpec {
    #[new]
    #[pyo3(signature = (pid, arrival_time, burst_time, needs_resource=false, quantum=None))]
    fn new(
        pid: u32,
        arrival_time: u64,
        burst_time: u64,
        needs_resource: bool,
        quantum: Option<u64>,
    ) -> Self {
        Self {
            pid,
            arrival_time,
            burst_time,
            needs_resource,
            quantum,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "ProcessSpec(pid={}, arrival={}, burst={}, resource={}, quantum={:?})",
            self.pid, self.arrival_time, self.burst_time, self.needs_resource, self.quantum
        )
    }
}

impl From<&PyProcessSpec> for ProcessSpec {
    fn from(p: &PyProcessSpec) -> Self {
        Self {
            pid: p.pid,
            arrival_time: p.arrival_time,
            burst_time: p.burst_time,
            needs_resource: p.needs_resource,
            quantum: p.quantum,
        }
    }
}

/// One row of the result table.
#[pyclass(name = "ProcessSummary")]
#[derive(Clone, Debug)]
pub struct PyProcessSummary {
    #[pyo3(get)]
    pub pid: u32,
    #[pyo3(get)]
    pub arrival_time: u64,
    #[pyo3(get)]
    pub burst_time: u64,
    #[pyo3(get)]
    pub start_time: u64,
    #[pyo3(get)]
    pub completion_time: u64,
    #[pyo3(get)]
    pub turnaround_time: u64,
    #[pyo3(get)]
    pub waiting_time: u64,
    #[pyo3(get)]
    pub response_time: u64,
}

impl From<&ProcessMetrics> for PyProcessSummary {
    fn from(m: &ProcessMetrics) -> Self {
        Self {
            pid: m.pid,
            arrival_time: m.arrival_time,
            burst_time: m.burst_time,
            start_time: m.start_time,
            completion_time: m.completion_time,
            turnaround_time: m.turnaround_time,
            waiting_time: m.waiting_time,
            response_time: m.response_time,
        }
    }
}

/// Process control block dump.
#[pyclass(name = "Pcb")]
#[derive(Clone, Debug)]
pub struct PyPcb {
    #[pyo3(get)]
    pub pid: u32,
    #[pyo3(get)]
    pub arrival_time: u64,
    #[pyo3(get)]
    pub burst_time: u64,
    #[pyo3(get)]
    pub finish_time: Option<u64>,
    #[pyo3(get)]
    pub resume_info_num: Option<u64>,
    #[pyo3(get)]
    pub resume_info_address: Option<String>,
    #[pyo3(get)]
    pub resource_demand: bool,
    #[pyo3(get)]
    pub quantum: Option<u64>,
    #[pyo3(get)]
    pub state: String,
    #[pyo3(get)]
    pub program_counter: u64,
    #[pyo3(get)]
    pub instruction_register: Option<u64>,
    #[pyo3(get)]
    pub processed_instructions: u64,
}

impl From<&PcbSnapshot> for PyPcb {
    fn from(pcb: &PcbSnapshot) -> Self {
        Self {
            pid: pcb.pid,
            arrival_time: pcb.arrival_time,
            burst_time: pcb.burst_time,
            finish_time: pcb.finish_time,
            resume_info_num: pcb.resume_info.as_ref().map(|r| r.counter),
            resume_info_address: pcb.resume_info.as_ref().map(|r| r.address.clone()),
            resource_demand: pcb.resource_demand,
            quantum: pcb.quantum,
            state: pcb.state.to_string(),
            program_counter: pcb.program_counter,
            instruction_register: pcb.instruction_register,
            processed_instructions: pcb.processed_instructions,
        }
    }
}

#[pymethods]
impl PyPcb {
    fn __repr__(&self) -> String {
        format!(
            "Pcb(pid={}, state={}, pc={}, processed={})",
            self.pid, self.state, self.program_counter, self.processed_instructions
        )
    }
}

/// PCB state right after one executed instruction.
#[pyclass(name = "PcbLogEntry")]
#[derive(Clone, Debug)]
pub struct PyPcbLogEntry {
    #[pyo3(get)]
    pub tick: u64,
    #[pyo3(get)]
    pub pcb: PyPcb,
}

impl From<&PcbLogEntry> for PyPcbLogEntry {
    fn from(entry: &PcbLogEntry) -> Self {
        Self {
            tick: entry.tick,
            pcb: PyPcb::from(&entry.pcb),
        }
    }
}

/// Result of one simulation run.
#[pyclass(name = "SimulationResult")]
#[derive(Clone, Debug)]
pub struct PySimulationResult {
    #[pyo3(get)]
    pub policy: String,
    /// Running pid per tick, None when idle
    #[pyo3(get)]
    pub trace: Vec<Option<u32>>,
    #[pyo3(get)]
    pub summaries: Vec<PyProcessSummary>,
    #[pyo3(get)]
    pub pcbs: Vec<PyPcb>,
    /// Per-instruction PCB history, empty unless `pcb_snapshots` was set
    #[pyo3(get)]
    pub pcb_log: Vec<PyPcbLogEntry>,
    #[pyo3(get)]
    pub cpu_utilization: f64,
    #[pyo3(get)]
    pub average_waiting_time: f64,
    #[pyo3(get)]
    pub average_turnaround_time: f64,
    #[pyo3(get)]
    pub average_response_time: f64,
    #[pyo3(get)]
    pub makespan: u64,
}

#[pymethods]
impl PySimulationResult {
    fn __repr__(&self) -> String {
        format!(
            "SimulationResult(policy={:?}, processes={}, makespan={}, utilization={:.2})",
            self.policy,
            self.summaries.len(),
            self.makespan,
            self.cpu_utilization
        )
    }
}

/// Run one scheduling policy over a list of processes.
///
/// # Arguments
/// * `processes` - Process parameters, in input order
/// * `policy` - One of "fifo", "sjf", "srt", "rr", "hrrn"
/// * `verbosity` - 0=silent, 1=changes, 2=checks, 3=debug (written to stderr)
/// * `default_quantum` - Round-Robin quantum for processes without their own
/// * `lab_bounds` - Enforce the PCB exercise bounds (<= 5 processes, burst 10-12, quantum 1-3)
/// * `pcb_snapshots` - Record the PCB after every executed instruction
///
/// # Raises
/// * ValueError on invalid input or an inconsistent run
#[pyfunction]
#[pyo3(name = "simulate", signature = (processes, policy, verbosity=0, default_quantum=None, lab_bounds=false, pcb_snapshots=false))]
fn py_simulate(
    processes: Vec<PyProcessSpec>,
    policy: &str,
    verbosity: u8,
    default_quantum: Option<u64>,
    lab_bounds: bool,
    pcb_snapshots: bool,
) -> PyResult<PySimulationResult> {
    let to_py_err = |e: &dyn std::error::Error| pyo3::exceptions::PyValueError::new_err(e.to_string());

    let policy: Policy = policy.parse().map_err(|e| to_py_err(&e))?;
    let specs: Vec<ProcessSpec> = processes.iter().map(ProcessSpec::from).collect();

    let mut config = SimulationConfig::default().with_verbosity(verbosity);
    if lab_bounds {
        config = config.with_bounds(InputBounds::lab());
    }
    if pcb_snapshots {
        config = config.with_pcb_snapshots();
    }
    config.default_quantum = default_quantum;

    let outcome = simulate(&specs, policy, &config).map_err(|e| to_py_err(&e))?;
    let report = outcome.metrics().map_err(|e| to_py_err(&e))?;

    Ok(PySimulationResult {
        policy: policy.name().to_string(),
        trace: outcome.trace.slots().map(|s| s.pid()).collect(),
        summaries: report.processes.iter().map(PyProcessSummary::from).collect(),
        pcbs: outcome.pcb_table().iter().map(PyPcb::from).collect(),
        pcb_log: outcome.pcb_log.iter().map(PyPcbLogEntry::from).collect(),
        cpu_utilization: report.cpu_utilization,
        average_waiting_time: report.average_waiting_time,
        average_turnaround_time: report.average_turnaround_time,
        average_response_time: report.average_response_time,
        makespan: report.makespan,
    })
}

/// The schedsim.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyProcessSpec>()?;
    m.add_class::<PyProcessSummary>()?;
    m.add_class::<PyPcb>()?;
    m.add_class::<PyPcbLogEntry>()?;
    m.add_class::<PySimulationResult>()?;

    m.add_function(wrap_pyfunction!(py_simulate, m)?)?;

    Ok(())
}
