//! onscreen-core
//!
//! Visibility-driven two-stage item processing. Each item is fetched, then
//! transformed, but only while it is on screen. Scrolling cancels work for
//! items that left the viewport and schedules work for items that entered it.
//!
//! # Modules
//! - **domain**: ids, item state machine, records, manifest, outcomes, events
//! - **ports**: FetchTransport, TransformEngine, ManifestLoader, StateSink
//! - **queue**: per-stage bounded FIFO with suspend/resume and cancellation
//! - **registry**: in-flight (stage, item) -> unit handle
//! - **runtime / worker**: unit execution and worker groups
//! - **app**: Scheduler (control context), AppBuilder, control loop
//! - **impls**: development implementations of the ports
//! - **config / error / observability**: SchedulerConfig, SchedulerError, ItemCounts

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod registry;
pub mod runtime;
pub mod worker;

pub use app::{App, AppBuilder, BuildError, ReconcileReport, Scheduler};
pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use observability::ItemCounts;
