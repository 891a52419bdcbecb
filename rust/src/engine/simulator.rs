//! The simulation loop.

use thiserror::Error;

use crate::config::{ConfigError, SimulationConfig};
use crate::models::{Pid, ProcessSpec, Tick};
use crate::policy::{Policy, Preemption};
use crate::trace::{ExecutionTrace, TraceSlot};
use crate::{log_changes, log_checks, log_debug};

use super::outcome::{PcbLogEntry, SimulationOutcome};
use super::state::ProcessTable;

/// Errors that can occur during a simulation run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("Policy {policy} selected nothing at t={time} with {ready} ready processes")]
    PolicyStalled {
        policy: &'static str,
        time: Tick,
        ready: usize,
    },
    #[error("Policy selected P{pid} at t={time}, which is not ready")]
    UnknownProcess { pid: Pid, time: Tick },
    #[error("Nothing runnable, blocked or pending at t={time} with unfinished processes")]
    Stalled { time: Tick },
    #[error("Simulation did not finish within {0} steps")]
    IterationLimit(usize),
}

/// Discrete-time simulator driving one policy over one process set.
///
/// Owns the clock and every queue, so independent simulators never share state.
pub struct Simulator {
    policy: Policy,
    verbosity: u8,
    capture_pcb_snapshots: bool,
    table: ProcessTable,
    clock: Tick,
    trace: ExecutionTrace,
    pcb_log: Vec<PcbLogEntry>,
    max_steps: usize,
}

impl Simulator {
    /// Validate the input and build the initial process table.
    ///
    /// Nothing is simulated when validation fails.
    pub fn new(
        specs: &[ProcessSpec],
        policy: Policy,
        config: &SimulationConfig,
    ) -> Result<Self, SimulationError> {
        config.bounds.validate(specs)?;

        let quanta = if policy.uses_quantum() {
            Some(config.bounds.resolve_quanta(specs, config.default_quantum)?)
        } else {
            None
        };
        let table = ProcessTable::new(specs, quanta.as_deref());

        // Each step executes at least one unit, idles before an arrival,
        // blocks a process, or releases the blocked set.
        let max_steps = (table.len() as Tick)
            .checked_mul(2)
            .and_then(|extra| table.horizon()?.checked_add(extra))
            .and_then(|bound| bound.checked_add(1))
            .ok_or(ConfigError::HorizonOverflow)?;
        let max_steps = usize::try_from(max_steps).unwrap_or(usize::MAX);

        Ok(Self {
            policy,
            verbosity: config.verbosity,
            capture_pcb_snapshots: config.capture_pcb_snapshots,
            table,
            clock: 0,
            trace: ExecutionTrace::new(),
            pcb_log: Vec::new(),
            max_steps,
        })
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn clock(&self) -> Tick {
        self.clock
    }

    /// Run until every process has terminated.
    pub fn run(mut self) -> Result<SimulationOutcome, SimulationError> {
        log_changes!(
            self.verbosity,
            "Simulating {} processes under {}",
            self.table.len(),
            self.policy
        );

        for _ in 0..self.max_steps {
            if self.table.all_terminated() {
                break;
            }
            self.step()?;
        }

        if !self.table.all_terminated() {
            return Err(SimulationError::IterationLimit(self.max_steps));
        }

        log_changes!(
            self.verbosity,
            "All processes terminated at t={}",
            self.clock
        );

        Ok(SimulationOutcome {
            policy: self.policy,
            trace: self.trace,
            processes: self.table.into_records(),
            pcb_log: self.pcb_log,
        })
    }

    /// One scheduling decision: idle, release, block, or a dispatch of one or
    /// more ticks.
    fn step(&mut self) -> Result<(), SimulationError> {
        self.admit();

        if !self.table.has_runnable() {
            if self.table.has_blocked() {
                let released = self.table.release_blocked();
                log_changes!(
                    self.verbosity,
                    "t={}: ready queue empty, releasing resource to {:?}",
                    self.clock,
                    released
                );
                return Ok(());
            }
            if self.table.has_pending() {
                log_debug!(self.verbosity, "t={}: idle", self.clock);
                self.trace.push(TraceSlot::Idle);
                self.clock += 1;
                return Ok(());
            }
            return Err(SimulationError::Stalled { time: self.clock });
        }

        let slot = self.select()?;

        if self.table.running() != Some(slot) {
            if let Some(prev) = self.table.preempt_running() {
                log_changes!(
                    self.verbosity,
                    "t={}: P{} preempted with {} remaining",
                    self.clock,
                    self.table.record(prev).pid(),
                    self.table.record(prev).remaining_work()
                );
            }
            self.table.dispatch(slot);
            log_changes!(
                self.verbosity,
                "t={}: dispatch P{}",
                self.clock,
                self.table.record(slot).pid()
            );
        }

        // Resource check happens before any quantum is consumed
        if self.table.record(slot).resource_demand() {
            self.table.block_running();
            log_changes!(
                self.verbosity,
                "t={}: P{} blocked waiting for resource",
                self.clock,
                self.table.record(slot).pid()
            );
            return Ok(());
        }

        let record = self.table.record(slot);
        let budget = match self.policy.preemption() {
            Preemption::Never => record.remaining_work(),
            Preemption::EveryTick => 1,
            Preemption::Quantum => record
                .quantum()
                .ok_or(ConfigError::MissingQuantum(record.pid()))?,
        };

        for _ in 0..budget {
            if self.tick()? {
                return Ok(());
            }
        }

        if self.policy.preemption() == Preemption::Quantum {
            self.table.preempt_running();
            let record = self.table.record(slot);
            log_changes!(
                self.verbosity,
                "t={}: P{} quantum expired, resumes at {}",
                self.clock,
                record.pid(),
                record
                    .resume_info()
                    .map(|r| r.address.as_str())
                    .unwrap_or("-")
            );
        }
        Ok(())
    }

    /// Execute one unit of the running process. Returns true if it terminated.
    fn tick(&mut self) -> Result<bool, SimulationError> {
        let (slot, finished) = self
            .table
            .execute_running(self.clock)
            .ok_or(SimulationError::Stalled { time: self.clock })?;
        let pid = self.table.record(slot).pid();

        log_debug!(self.verbosity, "t={}: run P{}", self.clock, pid);
        self.trace.push(TraceSlot::Busy(pid));
        if self.capture_pcb_snapshots {
            self.pcb_log.push(PcbLogEntry {
                tick: self.clock,
                pcb: self.table.record(slot).pcb_snapshot(),
            });
        }
        self.clock += 1;

        if finished {
            self.table.terminate_running(self.clock);
            log_changes!(self.verbosity, "t={}: P{} terminated", self.clock, pid);
        }
        self.admit();
        Ok(finished)
    }

    fn admit(&mut self) {
        let admitted = self.table.admit_arrivals(self.clock);
        if !admitted.is_empty() {
            log_checks!(self.verbosity, "t={}: arrived {:?}", self.clock, admitted);
        }
    }

    /// Ask the policy for the next process and check the answer.
    fn select(&self) -> Result<usize, SimulationError> {
        let ctx = self.table.context(self.clock);
        log_checks!(
            self.verbosity,
            "t={}: ready {:?}, blocked {:?}",
            self.clock,
            ctx.ready.iter().map(|p| p.pid()).collect::<Vec<_>>(),
            ctx.blocked.iter().map(|p| p.pid()).collect::<Vec<_>>()
        );

        let pid = self
            .policy
            .select_next(&ctx)
            .ok_or(SimulationError::PolicyStalled {
                policy: self.policy.name(),
                time: self.clock,
                ready: ctx.ready.len(),
            })?;

        self.table
            .slot_of(pid)
            .filter(|&slot| self.table.is_schedulable(slot))
            .ok_or(SimulationError::UnknownProcess {
                pid,
                time: self.clock,
            })
    }
}

/// Validate `specs`, run `policy` over them and return the outcome.
///
/// The input is never mutated, so repeated calls yield identical outcomes.
pub fn simulate(
    specs: &[ProcessSpec],
    policy: Policy,
    config: &SimulationConfig,
) -> Result<SimulationOutcome, SimulationError> {
    Simulator::new(specs, policy, config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputBounds;
    use crate::models::ProcessState;

    fn p(pid: Pid, arrival: Tick, burst: Tick) -> ProcessSpec {
        ProcessSpec::new(pid, arrival, burst)
    }

    fn run(specs: &[ProcessSpec], policy: Policy) -> SimulationOutcome {
        let config = SimulationConfig::default().with_default_quantum(2);
        simulate(specs, policy, &config).unwrap()
    }

    fn slots(outcome: &SimulationOutcome) -> Vec<Option<Pid>> {
        outcome.trace.slots().map(|s| s.pid()).collect()
    }

    #[test]
    fn test_fifo_runs_in_arrival_order() {
        let outcome = run(&[p(1, 0, 5), p(2, 1, 3)], Policy::Fifo);
        assert_eq!(
            slots(&outcome),
            vec![Some(1), Some(1), Some(1), Some(1), Some(1), Some(2), Some(2), Some(2)]
        );

        let a = outcome.process(1).unwrap();
        let b = outcome.process(2).unwrap();
        assert_eq!((a.waiting_time(), a.turnaround_time()), (Some(0), Some(5)));
        assert_eq!((b.waiting_time(), b.turnaround_time()), (Some(4), Some(7)));
    }

    #[test]
    fn test_fifo_ties_keep_input_order() {
        let outcome = run(&[p(7, 2, 1), p(3, 0, 1), p(5, 0, 1)], Policy::Fifo);
        assert_eq!(slots(&outcome), vec![Some(3), Some(5), Some(7)]);
    }

    #[test]
    fn test_fifo_idles_until_first_arrival() {
        let outcome = run(&[p(1, 2, 2)], Policy::Fifo);
        assert_eq!(slots(&outcome), vec![None, None, Some(1), Some(1)]);
        assert_eq!(outcome.process(1).unwrap().start_time(), Some(2));
    }

    #[test]
    fn test_sjf_picks_shortest_arrived_job() {
        let outcome = run(&[p(1, 0, 4), p(2, 1, 5), p(3, 2, 1)], Policy::Sjf);
        // P1 runs to completion, then P3 (1) beats P2 (5)
        assert_eq!(
            slots(&outcome),
            vec![
                Some(1),
                Some(1),
                Some(1),
                Some(1),
                Some(3),
                Some(2),
                Some(2),
                Some(2),
                Some(2),
                Some(2)
            ]
        );
    }

    #[test]
    fn test_sjf_idles_one_tick_at_a_time() {
        let outcome = run(&[p(1, 3, 1), p(2, 3, 2)], Policy::Sjf);
        assert_eq!(
            slots(&outcome),
            vec![None, None, None, Some(1), Some(2), Some(2)]
        );
    }

    #[test]
    fn test_srt_preempts_for_shorter_arrival() {
        let outcome = run(&[p(1, 0, 8), p(2, 1, 4)], Policy::Srt);
        let trace = slots(&outcome);
        assert_eq!(trace[0], Some(1));
        assert_eq!(&trace[1..5], &[Some(2); 4]);
        assert_eq!(&trace[5..12], &[Some(1); 7]);

        let a = outcome.process(1).unwrap();
        let b = outcome.process(2).unwrap();
        assert_eq!((a.turnaround_time(), a.waiting_time()), (Some(12), Some(4)));
        assert_eq!((b.turnaround_time(), b.waiting_time()), (Some(4), Some(0)));
        assert_eq!(a.resume_info().map(|r| r.counter), Some(1));
        assert_eq!(a.dispatch_count(), 2);
    }

    #[test]
    fn test_srt_does_not_switch_on_equal_remaining() {
        // At t=2 P1 has 2 left, P2 arrives needing 2: earlier arrival wins
        let outcome = run(&[p(1, 0, 4), p(2, 2, 2)], Policy::Srt);
        assert_eq!(
            slots(&outcome),
            vec![Some(1), Some(1), Some(1), Some(1), Some(2), Some(2)]
        );
        assert_eq!(outcome.process(1).unwrap().dispatch_count(), 1);
    }

    #[test]
    fn test_round_robin_alternates_quanta() {
        let outcome = run(&[p(1, 0, 5), p(2, 0, 3)], Policy::RoundRobin);
        assert_eq!(
            slots(&outcome),
            vec![
                Some(1),
                Some(1),
                Some(2),
                Some(2),
                Some(1),
                Some(1),
                Some(2),
                Some(1)
            ]
        );
        for rec in &outcome.processes {
            assert_eq!(outcome.trace.ticks_for(rec.pid()) as Tick, rec.total_work());
        }
        assert_eq!(outcome.process(2).unwrap().finish_time(), Some(7));
        assert_eq!(outcome.process(1).unwrap().finish_time(), Some(8));
    }

    #[test]
    fn test_round_robin_uses_per_process_quantum() {
        let specs = vec![p(1, 0, 4).with_quantum(3), p(2, 0, 2).with_quantum(1)];
        let outcome = run(&specs, Policy::RoundRobin);
        assert_eq!(
            slots(&outcome),
            vec![Some(1), Some(1), Some(1), Some(2), Some(1), Some(2)]
        );
    }

    #[test]
    fn test_round_robin_blocks_then_resumes() {
        let specs = vec![p(1, 0, 3).with_resource(), p(2, 0, 2)];
        let outcome = run(&specs, Policy::RoundRobin);
        // P1 blocks without consuming a tick, P2 finishes, then the release
        assert_eq!(
            slots(&outcome),
            vec![Some(2), Some(2), Some(1), Some(1), Some(1)]
        );
        let a = outcome.process(1).unwrap();
        assert_eq!(a.resume_info().map(|r| r.address.as_str()), Some("P1[2]"));
        assert_eq!(a.start_time(), Some(2));
        assert!(!a.resource_demand());
    }

    #[test]
    fn test_blocked_process_resumes_from_saved_position() {
        // P2 blocks on its first dispatch and waits until P1 has finished
        let specs = vec![p(1, 0, 4), p(2, 0, 2).with_resource()];
        let outcome = run(&specs, Policy::RoundRobin);
        assert_eq!(
            slots(&outcome),
            vec![Some(1), Some(1), Some(1), Some(1), Some(2), Some(2)]
        );
        let b = outcome.process(2).unwrap();
        assert_eq!(b.processed_instructions(), 2);
        assert_eq!(b.dispatch_count(), 2);
    }

    #[test]
    fn test_all_blocked_are_released_together() {
        let specs = vec![
            p(1, 0, 1).with_resource(),
            p(2, 0, 1).with_resource(),
            p(3, 0, 1),
        ];
        let outcome = run(&specs, Policy::RoundRobin);
        assert_eq!(slots(&outcome), vec![Some(3), Some(1), Some(2)]);
    }

    #[test]
    fn test_blocking_applies_to_non_preemptive_policies() {
        let specs = vec![p(1, 0, 2).with_resource(), p(2, 0, 3)];
        let outcome = run(&specs, Policy::Sjf);
        assert_eq!(
            slots(&outcome),
            vec![Some(2), Some(2), Some(2), Some(1), Some(1)]
        );
    }

    #[test]
    fn test_release_preferred_over_idle() {
        let specs = vec![p(1, 0, 1).with_resource(), p(2, 5, 1)];
        let outcome = run(&specs, Policy::Fifo);
        assert_eq!(
            slots(&outcome),
            vec![Some(1), None, None, None, None, Some(2)]
        );
    }

    #[test]
    fn test_hrrn_favours_long_waiters() {
        // At t=3: P2 ratio (2+6)/6, P3 ratio (1+1)/1; P3 wins
        let outcome = run(&[p(1, 0, 3), p(2, 1, 6), p(3, 2, 1)], Policy::Hrrn);
        assert_eq!(slots(&outcome)[3], Some(3));
        assert_eq!(outcome.process(2).unwrap().start_time(), Some(4));
    }

    #[test]
    fn test_every_policy_terminates_everything() {
        let specs = vec![p(1, 0, 3), p(2, 2, 6), p(3, 4, 4), p(4, 6, 5), p(5, 8, 2)];
        for policy in Policy::ALL {
            let outcome = run(&specs, policy);
            for rec in &outcome.processes {
                assert_eq!(rec.state(), ProcessState::Terminated, "{}", policy);
                assert!(rec.check_invariants().is_ok());
                assert!(rec.start_time() >= Some(rec.arrival_time()));
            }
            assert_eq!(outcome.trace.busy_ticks(), 20);
        }
    }

    #[test]
    fn test_runs_are_deterministic() {
        let specs = vec![p(1, 0, 3).with_resource(), p(2, 1, 5), p(3, 1, 2)];
        for policy in Policy::ALL {
            assert_eq!(run(&specs, policy), run(&specs, policy));
        }
    }

    #[test]
    fn test_invalid_input_is_rejected_before_running() {
        let specs = vec![p(1, 0, 5)];
        let config = SimulationConfig::default().with_bounds(InputBounds::lab());
        assert!(matches!(
            simulate(&specs, Policy::Fifo, &config),
            Err(SimulationError::InvalidConfig(ConfigError::BurstOutOfRange { .. }))
        ));

        let err = simulate(&specs, Policy::RoundRobin, &SimulationConfig::default());
        assert_eq!(
            err,
            Err(SimulationError::InvalidConfig(ConfigError::MissingQuantum(1)))
        );
    }

    #[test]
    fn test_unrepresentable_horizon_is_rejected() {
        let config = SimulationConfig::default();
        assert!(matches!(
            Simulator::new(&[p(1, Tick::MAX, 1)], Policy::Fifo, &config),
            Err(SimulationError::InvalidConfig(ConfigError::HorizonOverflow))
        ));
        assert!(matches!(
            Simulator::new(&[p(1, 0, Tick::MAX), p(2, 0, 1)], Policy::Sjf, &config),
            Err(SimulationError::InvalidConfig(ConfigError::HorizonOverflow))
        ));
    }

    #[test]
    fn test_step_limit_stops_a_run() {
        let config = SimulationConfig::default();
        let mut sim = Simulator::new(&[p(1, 0, 3)], Policy::Fifo, &config).unwrap();
        sim.max_steps = 0;
        assert_eq!(sim.run().err(), Some(SimulationError::IterationLimit(0)));

        // One non-preemptive step finishes P1 but leaves P2 unstarted
        let mut sim = Simulator::new(&[p(1, 0, 3), p(2, 0, 2)], Policy::Fifo, &config).unwrap();
        sim.max_steps = 1;
        assert_eq!(sim.run().err(), Some(SimulationError::IterationLimit(1)));
    }

    #[test]
    fn test_step_after_completion_is_stalled() {
        let config = SimulationConfig::default();
        let mut sim = Simulator::new(&[p(1, 0, 3)], Policy::Fifo, &config).unwrap();
        sim.step().unwrap();
        assert!(sim.table.all_terminated());
        assert_eq!(sim.clock(), 3);
        assert_eq!(sim.step(), Err(SimulationError::Stalled { time: 3 }));
    }

    #[test]
    fn test_select_with_nothing_ready_is_an_error() {
        let config = SimulationConfig::default();
        let sim = Simulator::new(&[p(1, 5, 2)], Policy::Hrrn, &config).unwrap();
        assert_eq!(
            sim.select(),
            Err(SimulationError::PolicyStalled {
                policy: Policy::Hrrn.name(),
                time: 0,
                ready: 0,
            })
        );
    }

    #[test]
    fn test_quantum_only_required_for_round_robin() {
        let specs = vec![p(1, 0, 2)];
        assert!(simulate(&specs, Policy::Srt, &SimulationConfig::default()).is_ok());
    }

    #[test]
    fn test_pcb_snapshots_follow_every_unit() {
        let config = SimulationConfig::default()
            .with_default_quantum(1)
            .with_pcb_snapshots();
        let outcome = simulate(&[p(1, 0, 2), p(2, 0, 1)], Policy::RoundRobin, &config).unwrap();
        let ticks: Vec<Tick> = outcome.pcb_log.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![0, 1, 2]);
        assert_eq!(outcome.pcb_log[2].pcb.pid, 1);
        assert_eq!(outcome.pcb_log[2].pcb.processed_instructions, 2);
    }
}
