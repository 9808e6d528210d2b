//! App layer: the control context and its wiring.
//!
//! - **Scheduler**: records, in-flight registry, reconciliation
//! - **AppBuilder / App**: ports + worker groups around one scheduler
//! - **control loop**: `App::run` interleaves viewport events and completions

pub mod builder;
mod control_loop;
pub mod scheduler;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::scheduler::{ReconcileReport, Scheduler};
