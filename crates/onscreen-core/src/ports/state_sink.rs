//! StateSink port - state-change notifications to the display layer.

use crate::domain::StateChange;

/// Receives one [`StateChange`] per record transition.
///
/// Called on the control context; implementations must not block.
pub trait StateSink: Send + Sync {
    fn emit(&self, change: StateChange);
}
