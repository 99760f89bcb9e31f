//! Where user-facing notices go.

use hintforge_session::Notice;
use tokio::sync::mpsc;

/// Receives the notices a session raises.
///
/// Called from the supervisor task; implementations must not block.
pub trait NoticeSink: Send + Sync + 'static {
    /// In-app display of a notice.
    fn notify(&self, notice: &Notice);

    /// A local push notification, raised in addition to [`notify`](Self::notify)
    /// for hints about items in the connected player's own world.
    fn push(&self, _message: &str) {}
}

/// Writes notices to the log. The default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNoticeSink;

impl NoticeSink for LogNoticeSink {
    fn notify(&self, notice: &Notice) {
        match notice {
            Notice::NewHint { message, .. } => tracing::info!(%message, "new hint"),
            Notice::NoMoreHints => tracing::info!("no more hints available"),
            Notice::HintsDisabled => tracing::warn!("hints are disabled on the server"),
        }
    }

    fn push(&self, message: &str) {
        tracing::info!(%message, "hint in your world");
    }
}

/// Forwards notices to a channel, for front ends that render them.
///
/// Local alerts are not sent separately: a hint about the connected
/// player's own world arrives once, as `Notice::NewHint` with
/// `for_local_slot: true`, and the receiver raises the alert from that.
#[derive(Debug, Clone)]
pub struct ChannelNoticeSink {
    sender: mpsc::UnboundedSender<Notice>,
}

impl ChannelNoticeSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NoticeSink for ChannelNoticeSink {
    fn notify(&self, notice: &Notice) {
        // Nobody listening any more.
        let _ = self.sender.send(notice.clone());
    }

    /// The alert is already carried by the `NewHint` notice's flag.
    fn push(&self, _message: &str) {}
}
