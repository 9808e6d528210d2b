//! Stage queues: one ordered, bounded, suspendable queue per stage.

mod stage_queue;
mod state;
mod unit;

pub use stage_queue::{CancelDisposition, StageQueue, UnitLease};
pub use state::QueueState;
pub use unit::{UnitHandle, UnitInput, WorkUnit};
