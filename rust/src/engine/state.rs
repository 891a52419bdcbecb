//! Process table: records plus the pending, ready, blocked and running sets.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use crate::models::{Pid, ProcessRecord, ProcessSpec, Tick};
use crate::policy::SchedulingContext;

/// Owns every process record and the queues that partition the live ones.
///
/// Invariant: each unterminated slot is in exactly one of `pending`, `ready`,
/// `blocked` or `running`. Terminated slots are in none of them and are never
/// touched again.
#[derive(Clone, Debug)]
pub struct ProcessTable {
    records: Vec<ProcessRecord>,
    slots: FxHashMap<Pid, usize>,
    /// Not yet arrived, sorted by (arrival, input order)
    pending: VecDeque<usize>,
    ready: VecDeque<usize>,
    blocked: VecDeque<usize>,
    running: Option<usize>,
    terminated: usize,
}

impl ProcessTable {
    /// Build records in input order. `quanta`, when given, is parallel to `specs`.
    pub fn new(specs: &[ProcessSpec], quanta: Option<&[Tick]>) -> Self {
        let records: Vec<ProcessRecord> = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let quantum = quanta.and_then(|q| q.get(i).copied());
                ProcessRecord::from_spec(spec, i, quantum)
            })
            .collect();

        let slots: FxHashMap<Pid, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.pid(), i))
            .collect();

        let mut pending: Vec<usize> = (0..records.len()).collect();
        pending.sort_by_key(|&i| (records[i].arrival_time(), i));

        Self {
            records,
            slots,
            pending: pending.into(),
            ready: VecDeque::new(),
            blocked: VecDeque::new(),
            running: None,
            terminated: 0,
        }
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, slot: usize) -> &ProcessRecord {
        &self.records[slot]
    }

    pub fn records(&self) -> &[ProcessRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ProcessRecord> {
        self.records
    }

    pub fn slot_of(&self, pid: Pid) -> Option<usize> {
        self.slots.get(&pid).copied()
    }

    pub fn running(&self) -> Option<usize> {
        self.running
    }

    /// Running or waiting in the ready queue.
    pub fn is_schedulable(&self, slot: usize) -> bool {
        self.running == Some(slot) || self.ready.contains(&slot)
    }

    pub fn has_runnable(&self) -> bool {
        self.running.is_some() || !self.ready.is_empty()
    }

    pub fn has_blocked(&self) -> bool {
        !self.blocked.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn all_terminated(&self) -> bool {
        self.terminated == self.records.len()
    }

    pub fn latest_arrival(&self) -> Tick {
        self.records
            .iter()
            .map(|r| r.arrival_time())
            .max()
            .unwrap_or(0)
    }

    /// Sum of all bursts, None on overflow.
    pub fn total_work(&self) -> Option<Tick> {
        self.records
            .iter()
            .try_fold(0 as Tick, |acc, r| acc.checked_add(r.total_work()))
    }

    /// Upper bound on the clock: every process has arrived and all work is
    /// done by then. None when it does not fit in a `Tick`.
    pub fn horizon(&self) -> Option<Tick> {
        self.total_work()?.checked_add(self.latest_arrival())
    }

    /// Move every process with `arrival <= now` into the ready queue.
    /// Returns the admitted pids in admission order.
    pub(crate) fn admit_arrivals(&mut self, now: Tick) -> Vec<Pid> {
        let mut admitted = Vec::new();
        while let Some(&slot) = self.pending.front() {
            if !self.records[slot].has_arrived(now) {
                break;
            }
            self.pending.pop_front();
            self.ready.push_back(slot);
            admitted.push(self.records[slot].pid());
        }
        admitted
    }

    /// Read-only view for the policy. The running process, if any, leads.
    pub fn context(&self, now: Tick) -> SchedulingContext<'_> {
        let ready = self
            .running
            .iter()
            .chain(self.ready.iter())
            .map(|&slot| &self.records[slot])
            .collect();
        let blocked = self.blocked.iter().map(|&slot| &self.records[slot]).collect();
        SchedulingContext {
            now,
            ready,
            blocked,
        }
    }

    /// Ready -> Running. The slot must be in the ready queue and the CPU free.
    pub(crate) fn dispatch(&mut self, slot: usize) {
        debug_assert!(self.running.is_none());
        if let Some(pos) = self.ready.iter().position(|&s| s == slot) {
            self.ready.remove(pos);
        }
        self.records[slot].dispatch();
        self.running = Some(slot);
    }

    /// Executes one unit of the running process at tick `now`.
    /// Returns the slot and whether its work is now exhausted.
    pub(crate) fn execute_running(&mut self, now: Tick) -> Option<(usize, bool)> {
        let slot = self.running?;
        let finished = self.records[slot].execute_unit(now);
        Some((slot, finished))
    }

    /// Running -> Ready at the back of the queue.
    pub(crate) fn preempt_running(&mut self) -> Option<usize> {
        let slot = self.running.take()?;
        self.records[slot].suspend();
        self.ready.push_back(slot);
        Some(slot)
    }

    /// Running -> Blocked.
    pub(crate) fn block_running(&mut self) -> Option<usize> {
        let slot = self.running.take()?;
        self.records[slot].block();
        self.blocked.push_back(slot);
        Some(slot)
    }

    /// Running -> Terminated at tick `now`.
    pub(crate) fn terminate_running(&mut self, now: Tick) -> Option<usize> {
        let slot = self.running.take()?;
        self.records[slot].terminate(now);
        self.terminated += 1;
        Some(slot)
    }

    /// Releases the resource to every blocked process at once; they rejoin the
    /// ready queue in the order they blocked. Returns the released pids.
    pub(crate) fn release_blocked(&mut self) -> Vec<Pid> {
        let released: Vec<usize> = self.blocked.drain(..).collect();
        let mut pids = Vec::with_capacity(released.len());
        for slot in released {
            self.records[slot].release();
            self.ready.push_back(slot);
            pids.push(self.records[slot].pid());
        }
        pids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProcessState;

    fn table() -> ProcessTable {
        let specs = vec![
            ProcessSpec::new(1, 3, 2),
            ProcessSpec::new(2, 0, 1).with_resource(),
            ProcessSpec::new(3, 3, 4),
        ];
        ProcessTable::new(&specs, Some(&[2, 2, 2][..]))
    }

    #[test]
    fn test_admission_follows_arrival_then_input_order() {
        let mut t = table();
        assert_eq!(t.admit_arrivals(0), vec![2]);
        assert_eq!(t.admit_arrivals(2), Vec::<Pid>::new());
        assert_eq!(t.admit_arrivals(3), vec![1, 3]);
        assert!(!t.has_pending());
    }

    #[test]
    fn test_context_puts_running_first() {
        let mut t = table();
        t.admit_arrivals(3);
        let slot = t.slot_of(3).unwrap();
        t.dispatch(slot);
        let ctx = t.context(3);
        let pids: Vec<Pid> = ctx.ready.iter().map(|p| p.pid()).collect();
        assert_eq!(pids, vec![3, 2, 1]);
        assert!(ctx.blocked.is_empty());
    }

    #[test]
    fn test_block_and_release_cycle() {
        let mut t = table();
        t.admit_arrivals(0);
        let slot = t.slot_of(2).unwrap();
        t.dispatch(slot);
        assert_eq!(t.block_running(), Some(slot));
        assert!(!t.has_runnable());
        assert!(t.has_blocked());
        assert_eq!(t.record(slot).state(), ProcessState::Blocked);

        assert_eq!(t.release_blocked(), vec![2]);
        assert!(!t.has_blocked());
        assert!(t.is_schedulable(slot));
        assert!(!t.record(slot).resource_demand());
    }

    #[test]
    fn test_execute_and_terminate() {
        let mut t = table();
        t.admit_arrivals(3);
        let slot = t.slot_of(1).unwrap();
        t.dispatch(slot);
        assert_eq!(t.execute_running(3), Some((slot, false)));
        assert_eq!(t.execute_running(4), Some((slot, true)));
        assert_eq!(t.terminate_running(5), Some(slot));
        assert_eq!(t.record(slot).finish_time(), Some(5));
        assert!(!t.is_schedulable(slot));
        assert_eq!(t.execute_running(5), None);
    }

    #[test]
    fn test_preempt_requeues_at_back() {
        let mut t = table();
        t.admit_arrivals(3);
        let slot = t.slot_of(2).unwrap();
        t.dispatch(slot);
        t.preempt_running();
        let ctx = t.context(3);
        let pids: Vec<Pid> = ctx.ready.iter().map(|p| p.pid()).collect();
        assert_eq!(pids, vec![1, 3, 2]);
    }

    #[test]
    fn test_totals() {
        let t = table();
        assert_eq!(t.len(), 3);
        assert_eq!(t.total_work(), Some(7));
        assert_eq!(t.horizon(), Some(10));
        assert_eq!(t.latest_arrival(), 3);
        assert_eq!(t.record(0).quantum(), Some(2));
    }

    #[test]
    fn test_horizon_overflow_is_reported() {
        let late = ProcessTable::new(&[ProcessSpec::new(1, Tick::MAX, 1)], None);
        assert_eq!(late.total_work(), Some(1));
        assert_eq!(late.horizon(), None);

        let long = ProcessTable::new(
            &[ProcessSpec::new(1, 0, Tick::MAX), ProcessSpec::new(2, 0, 1)],
            None,
        );
        assert_eq!(long.total_work(), None);
        assert_eq!(long.horizon(), None);
    }
}
