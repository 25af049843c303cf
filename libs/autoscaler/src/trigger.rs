//! Single-slot scale trigger.
//!
//! Producers post to demand an immediate sizing pass (with scale-down
//! suppressed). The slot holds at most one pending signal: posting to a full
//! slot drops the post, so bursts coalesce into one wake and callers never
//! block.

use tokio::sync::mpsc;

/// Cloneable handle for demanding an immediate sizing pass.
#[derive(Clone)]
pub struct ScaleTrigger {
    tx: mpsc::Sender<()>,
}

impl ScaleTrigger {
    /// Post to the slot. Dropped when a signal is already pending.
    pub fn post(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Create the trigger slot and its consumer side.
pub(crate) fn scale_trigger() -> (ScaleTrigger, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(1);
    (ScaleTrigger { tx }, rx)
}
