//! Simulation engine: owns the clock and the process state machine and
//! delegates every "who runs next" decision to a [`Policy`](crate::Policy).

mod outcome;
mod simulator;
mod state;

pub use outcome::{PcbLogEntry, SimulationOutcome};
pub use simulator::{simulate, SimulationError, Simulator};
pub use state::ProcessTable;
