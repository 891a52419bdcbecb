//! Core data types for the simulation: process input, run-state and PCB view.

use std::fmt;

use thiserror::Error;

/// Numeric process identifier, displayed as `P<id>`.
pub type Pid = u32;

/// Logical time and work unit. One tick executes one instruction.
pub type Tick = u64;

/// Process parameters supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessSpec {
    pub pid: Pid,
    pub arrival_time: Tick,
    pub burst_time: Tick,
    /// Set when the process needs an external resource before it can run.
    pub needs_resource: bool,
    /// Round-Robin quantum for this process; falls back to the config default.
    pub quantum: Option<Tick>,
}

impl ProcessSpec {
    pub fn new(pid: Pid, arrival_time: Tick, burst_time: Tick) -> Self {
        Self {
            pid,
            arrival_time,
            burst_time,
            needs_resource: false,
            quantum: None,
        }
    }

    pub fn with_resource(mut self) -> Self {
        self.needs_resource = true;
        self
    }

    pub fn with_quantum(mut self, quantum: Tick) -> Self {
        self.quantum = Some(quantum);
        self
    }
}

/// Scheduling state of a process.
///
/// A process that has not arrived yet is simply excluded from eligibility; it
/// sits in `Ready` without being admitted to the ready queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessState {
    Ready,
    Running,
    Blocked,
    Terminated,
}

impl ProcessState {
    /// Whether `self -> next` is an edge of the process state machine.
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (Ready, Running)
                | (Running, Ready)
                | (Running, Blocked)
                | (Running, Terminated)
                | (Blocked, Ready)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Ready => "Ready",
            ProcessState::Running => "Running",
            ProcessState::Blocked => "Blocked",
            ProcessState::Terminated => "Terminated",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Saved execution position (PSW) for resuming after preemption or blocking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResumeInfo {
    /// Program counter at the moment the process left the CPU.
    pub counter: Tick,
    /// Symbolic resume address, `P<pid>[<pc>]`.
    pub address: String,
}

impl ResumeInfo {
    fn capture(pid: Pid, counter: Tick) -> Self {
        Self {
            counter,
            address: format!("P{}[{}]", pid, counter),
        }
    }
}

/// A simulated process: static parameters plus mutable run-state.
///
/// Fields are only mutated by the engine through the transition methods
/// below; policies and callers see `&ProcessRecord`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessRecord {
    pub(crate) pid: Pid,
    pub(crate) input_order: usize,
    pub(crate) arrival_time: Tick,
    pub(crate) total_work: Tick,
    pub(crate) remaining_work: Tick,
    pub(crate) resource_demand: bool,
    pub(crate) quantum: Option<Tick>,
    pub(crate) state: ProcessState,
    pub(crate) start_time: Option<Tick>,
    pub(crate) finish_time: Option<Tick>,
    pub(crate) resume_info: Option<ResumeInfo>,
    pub(crate) program_counter: Tick,
    pub(crate) instruction_register: Option<Tick>,
    pub(crate) processed_instructions: Tick,
    pub(crate) dispatch_count: u32,
}

impl ProcessRecord {
    pub(crate) fn from_spec(spec: &ProcessSpec, input_order: usize, quantum: Option<Tick>) -> Self {
        Self {
            pid: spec.pid,
            input_order,
            arrival_time: spec.arrival_time,
            total_work: spec.burst_time,
            remaining_work: spec.burst_time,
            resource_demand: spec.needs_resource,
            quantum,
            state: ProcessState::Ready,
            start_time: None,
            finish_time: None,
            resume_info: None,
            program_counter: 0,
            instruction_register: None,
            processed_instructions: 0,
            dispatch_count: 0,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Position of this process in the caller's input list.
    pub fn input_order(&self) -> usize {
        self.input_order
    }

    pub fn arrival_time(&self) -> Tick {
        self.arrival_time
    }

    pub fn total_work(&self) -> Tick {
        self.total_work
    }

    pub fn remaining_work(&self) -> Tick {
        self.remaining_work
    }

    pub fn resource_demand(&self) -> bool {
        self.resource_demand
    }

    pub fn quantum(&self) -> Option<Tick> {
        self.quantum
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn start_time(&self) -> Option<Tick> {
        self.start_time
    }

    pub fn finish_time(&self) -> Option<Tick> {
        self.finish_time
    }

    pub fn resume_info(&self) -> Option<&ResumeInfo> {
        self.resume_info.as_ref()
    }

    pub fn program_counter(&self) -> Tick {
        self.program_counter
    }

    pub fn processed_instructions(&self) -> Tick {
        self.processed_instructions
    }

    pub fn dispatch_count(&self) -> u32 {
        self.dispatch_count
    }

    pub fn is_terminated(&self) -> bool {
        self.state == ProcessState::Terminated
    }

    pub fn has_arrived(&self, now: Tick) -> bool {
        self.arrival_time <= now
    }

    /// `finish - arrival`, once terminated.
    pub fn turnaround_time(&self) -> Option<Tick> {
        self.finish_time.map(|f| f - self.arrival_time)
    }

    /// `turnaround - total work`, once terminated.
    pub fn waiting_time(&self) -> Option<Tick> {
        self.turnaround_time().map(|t| t - self.total_work)
    }

    /// `start - arrival`, once the process has executed at least one unit.
    pub fn response_time(&self) -> Option<Tick> {
        self.start_time.map(|s| s - self.arrival_time)
    }

    /// Checks the record-level invariants and reports the first violation.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let pid = self.pid;
        if self.remaining_work > self.total_work {
            return Err(InvariantError::RemainingExceedsTotal {
                pid,
                remaining: self.remaining_work,
                total: self.total_work,
            });
        }
        if self.finish_time.is_some() != self.is_terminated() {
            return Err(InvariantError::FinishTimeMismatch {
                pid,
                finish_time: self.finish_time,
                state: self.state,
            });
        }
        if (self.remaining_work == 0) != self.is_terminated() {
            return Err(InvariantError::RemainingWorkMismatch {
                pid,
                remaining: self.remaining_work,
                state: self.state,
            });
        }
        if self.program_counter + self.remaining_work != self.total_work {
            return Err(InvariantError::ProgramCounterMismatch {
                pid,
                program_counter: self.program_counter,
                remaining: self.remaining_work,
                total: self.total_work,
            });
        }
        Ok(())
    }

    pub fn pcb_snapshot(&self) -> PcbSnapshot {
        PcbSnapshot {
            pid: self.pid,
            arrival_time: self.arrival_time,
            burst_time: self.total_work,
            finish_time: self.finish_time,
            resume_info: self.resume_info.clone(),
            resource_demand: self.resource_demand,
            quantum: self.quantum,
            state: self.state,
            program_counter: self.program_counter,
            instruction_register: self.instruction_register,
            processed_instructions: self.processed_instructions,
        }
    }

    fn transition(&mut self, next: ProcessState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "P{}: illegal transition {} -> {}",
            self.pid,
            self.state,
            next
        );
        self.state = next;
    }

    fn snapshot_resume_info(&mut self) {
        self.resume_info = Some(ResumeInfo::capture(self.pid, self.program_counter));
    }

    /// Ready -> Running.
    pub(crate) fn dispatch(&mut self) {
        self.transition(ProcessState::Running);
        self.dispatch_count += 1;
    }

    /// Executes one instruction at tick `now`. Returns true when the work is
    /// exhausted; the caller must then `terminate`.
    pub(crate) fn execute_unit(&mut self, now: Tick) -> bool {
        debug_assert_eq!(self.state, ProcessState::Running);
        debug_assert!(self.remaining_work > 0);
        if self.start_time.is_none() {
            self.start_time = Some(now);
        }
        self.instruction_register = Some(self.program_counter);
        self.program_counter += 1;
        self.processed_instructions += 1;
        self.remaining_work -= 1;
        self.remaining_work == 0
    }

    /// Running -> Ready, keeping the resume position.
    pub(crate) fn suspend(&mut self) {
        self.snapshot_resume_info();
        self.transition(ProcessState::Ready);
    }

    /// Running -> Blocked, keeping the resume position.
    pub(crate) fn block(&mut self) {
        self.snapshot_resume_info();
        self.transition(ProcessState::Blocked);
    }

    /// Blocked -> Ready, the resource is now held.
    pub(crate) fn release(&mut self) {
        self.resource_demand = false;
        self.transition(ProcessState::Ready);
    }

    /// Running -> Terminated at tick `now`.
    pub(crate) fn terminate(&mut self, now: Tick) {
        debug_assert_eq!(self.remaining_work, 0);
        self.finish_time = Some(now);
        self.transition(ProcessState::Terminated);
    }
}

/// A record whose fields contradict each other.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("P{pid}: remaining work {remaining} exceeds total {total}")]
    RemainingExceedsTotal { pid: Pid, remaining: Tick, total: Tick },
    #[error("P{pid}: finish time {finish_time:?} inconsistent with state {state}")]
    FinishTimeMismatch {
        pid: Pid,
        finish_time: Option<Tick>,
        state: ProcessState,
    },
    #[error("P{pid}: remaining work {remaining} inconsistent with state {state}")]
    RemainingWorkMismatch {
        pid: Pid,
        remaining: Tick,
        state: ProcessState,
    },
    #[error("P{pid}: program counter {program_counter} + remaining {remaining} != total {total}")]
    ProgramCounterMismatch {
        pid: Pid,
        program_counter: Tick,
        remaining: Tick,
        total: Tick,
    },
}

/// PCB-style field dump of one process, for debug printers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PcbSnapshot {
    pub pid: Pid,
    pub arrival_time: Tick,
    pub burst_time: Tick,
    pub finish_time: Option<Tick>,
    pub resume_info: Option<ResumeInfo>,
    pub resource_demand: bool,
    pub quantum: Option<Tick>,
    pub state: ProcessState,
    /// Index of the next instruction to execute.
    pub program_counter: Tick,
    /// Index of the last executed instruction.
    pub instruction_register: Option<Tick>,
    pub processed_instructions: Tick,
}
