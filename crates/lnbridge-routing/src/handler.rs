//! Local application delivery

use lnbridge_protocol::Message;
use tokio::sync::mpsc;

/// Receiver of messages routed to the local application
///
/// Called synchronously from the router; implementations must not block.
/// Every message handed over is detagged.
pub trait ApplicationHandler: Send {
    fn deliver(&mut self, message: Message);
}

impl<F> ApplicationHandler for F
where
    F: FnMut(Message) + Send,
{
    fn deliver(&mut self, message: Message) {
        self(message)
    }
}

/// Delivers into an unbounded channel
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelHandler {
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        ChannelHandler { tx }
    }
}

impl ApplicationHandler for ChannelHandler {
    fn deliver(&mut self, message: Message) {
        if self.tx.send(message).is_err() {
            tracing::warn!("Application channel closed, message discarded");
        }
    }
}
