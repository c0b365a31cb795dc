//! Outbound seam towards the UI state store.

use serde::Serialize;
use tokio::sync::mpsc;

use opengroup_core::ReactionMap;

/// Effective reactions for one message, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUpdate {
    pub server: String,
    pub room: String,
    pub message_id: u64,
    pub reactions: ReactionMap,
}

/// Receives effective reaction views. Implemented by the UI layer.
///
/// Called with no cache lock held. Implementations must not block.
pub trait ReactionSink: Send + Sync {
    fn on_reactions(&self, update: ReactionUpdate);
}

/// Forwards updates over an unbounded channel to a UI task.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ReactionUpdate>,
}

impl ChannelSink {
    /// Creates the sink and the receiving half for the consumer.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReactionUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReactionSink for ChannelSink {
    fn on_reactions(&self, update: ReactionUpdate) {
        if self.tx.send(update).is_err() {
            tracing::debug!("reaction consumer dropped, discarding update");
        }
    }
}
