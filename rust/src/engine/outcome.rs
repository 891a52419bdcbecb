//! Result of a completed simulation run.

use crate::metrics::{compute_metrics, MetricsError, MetricsReport};
use crate::models::{PcbSnapshot, Pid, ProcessRecord, Tick};
use crate::policy::Policy;
use crate::trace::ExecutionTrace;

/// PCB state right after the instruction executed at `tick`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PcbLogEntry {
    pub tick: Tick,
    pub pcb: PcbSnapshot,
}

/// Trace and final process records of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub policy: Policy,
    pub trace: ExecutionTrace,
    /// Final records, in input order
    pub processes: Vec<ProcessRecord>,
    /// Per-instruction PCB history (empty unless snapshots were requested)
    pub pcb_log: Vec<PcbLogEntry>,
}

impl SimulationOutcome {
    pub fn process(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.processes.iter().find(|p| p.pid() == pid)
    }

    /// Final PCB of every process, in input order.
    pub fn pcb_table(&self) -> Vec<PcbSnapshot> {
        self.processes.iter().map(|p| p.pcb_snapshot()).collect()
    }

    pub fn metrics(&self) -> Result<MetricsReport, MetricsError> {
        compute_metrics(&self.processes, &self.trace)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SimulationConfig;
    use crate::engine::simulate;
    use crate::models::{ProcessSpec, ProcessState};
    use crate::policy::Policy;

    #[test]
    fn test_pcb_table_reports_final_state() {
        let specs = vec![ProcessSpec::new(1, 0, 3), ProcessSpec::new(2, 1, 1)];
        let outcome = simulate(&specs, Policy::Fifo, &SimulationConfig::default()).unwrap();

        let table = outcome.pcb_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].finish_time, Some(3));
        assert_eq!(table[0].program_counter, 3);
        assert_eq!(table[0].instruction_register, Some(2));
        assert_eq!(table[1].state, ProcessState::Terminated);
        assert!(outcome.pcb_log.is_empty());
        assert!(outcome.process(9).is_none());
    }

    #[test]
    fn test_metrics_from_outcome() {
        let specs = vec![ProcessSpec::new(1, 0, 2)];
        let outcome = simulate(&specs, Policy::Srt, &SimulationConfig::default()).unwrap();
        let report = outcome.metrics().unwrap();
        assert_eq!(report.cpu_utilization, 100.0);
        assert_eq!(report.processes[0].completion_time, 2);
    }
}
