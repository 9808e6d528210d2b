//! Ports - interfaces to the collaborators outside the core.
//!
//! The core only sees these traits:
//! - **FetchTransport**: source location -> raw payload
//! - **TransformEngine**: raw payload -> final result
//! - **ManifestLoader**: the one-shot item list
//! - **StateSink**: per-transition notifications back to the display layer
//!
//! Development implementations live in `impls`.

pub mod fetch;
pub mod manifest;
pub mod state_sink;
pub mod transform;

pub use self::fetch::FetchTransport;
pub use self::manifest::ManifestLoader;
pub use self::state_sink::StateSink;
pub use self::transform::TransformEngine;
