//! Impls - development and test implementations of the ports.
//!
//! - **JsonManifestLoader / StaticManifestLoader**: manifest sources
//! - **SimulatedTransport**: latency-only fetch with deterministic payloads
//! - **SepiaTransform**: RGB8 sepia tone
//! - **ChannelStateSink / NoopStateSink / RecordingStateSink**: state change consumers
//!
//! Real network transports and image decoders belong in the embedding application.

pub mod manifest;
pub mod sepia;
pub mod sinks;
pub mod transport;

pub use self::manifest::{JsonManifestLoader, StaticManifestLoader};
pub use self::sepia::SepiaTransform;
pub use self::sinks::{ChannelStateSink, NoopStateSink, RecordingStateSink};
pub use self::transport::SimulatedTransport;
