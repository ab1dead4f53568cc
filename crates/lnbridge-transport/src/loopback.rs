//! In-memory loop-back transports
//!
//! Both buses observe our own transmissions again: the control bus because
//! it is half-duplex, the broker because we subscribe to the topics we
//! publish on. A `LoopbackTransport` records every accepted frame and hands
//! it back on the next processing pass with the echo flag set, tag
//! untouched. Frames from other devices are queued with `LoopbackHandle::inject`.

use crate::error::{Result, TransportError};
use crate::transport::{BusKind, BusTransport, SubmitId, TransportStatus};
use lnbridge_protocol::Message;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Default number of frames that may wait for loop-back
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug)]
struct LoopbackState {
    online: bool,
    capacity: usize,
    /// Frames awaiting delivery on the next pass (echoes and injected)
    inbound: VecDeque<Message>,
    /// Every accepted frame, in submission order
    transmitted: Vec<Message>,
    echoes_pending: usize,
    next_id: SubmitId,
}

impl LoopbackState {
    fn allocate_id(&mut self) -> SubmitId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        if self.next_id == 0 {
            self.next_id = 1;
        }
        id
    }
}

/// In-memory transport that echoes its own transmissions
pub struct LoopbackTransport {
    kind: BusKind,
    name: String,
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackTransport {
    /// Create a loop-back transport for either side of the bridge
    pub fn new(kind: BusKind, name: impl Into<String>, capacity: usize) -> Self {
        LoopbackTransport {
            kind,
            name: name.into(),
            state: Arc::new(Mutex::new(LoopbackState {
                online: true,
                capacity,
                inbound: VecDeque::new(),
                transmitted: Vec::new(),
                echoes_pending: 0,
                next_id: 1,
            })),
        }
    }

    /// Half-duplex control bus stand-in
    pub fn control_bus(capacity: usize) -> Self {
        Self::new(BusKind::ControlBus, "loopback-control-bus", capacity)
    }

    /// Broker stand-in that confirms every publish
    pub fn broker(capacity: usize) -> Self {
        Self::new(BusKind::Broker, "loopback-broker", capacity)
    }

    /// Inspection/injection handle sharing this transport's state
    pub fn handle(&self) -> LoopbackHandle {
        LoopbackHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl BusTransport for LoopbackTransport {
    fn kind(&self) -> BusKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn submit(&mut self, message: Message) -> Result<SubmitId> {
        let mut state = self.state.lock();

        if !state.online {
            return Err(TransportError::NotReady(self.name.clone()));
        }

        if message.payload.is_empty() {
            return Err(TransportError::Rejected("empty frame".to_string()));
        }

        if state.echoes_pending >= state.capacity {
            return Err(TransportError::QueueFull {
                name: self.name.clone(),
                capacity: state.capacity,
            });
        }

        let id = state.allocate_id();
        log::debug!(
            "{} TX #{}: {} bytes, tag {:?}",
            self.name,
            id,
            message.payload.len(),
            message.tag
        );

        let mut echo = message.clone();
        echo.echo = true;
        state.transmitted.push(message);
        state.inbound.push_back(echo);
        state.echoes_pending += 1;

        Ok(id)
    }

    fn process(&mut self, deliver: &mut dyn FnMut(Message)) {
        // Frames queued while delivering wait for the next pass.
        let batch = {
            let mut state = self.state.lock();
            if !state.online {
                return;
            }
            state.echoes_pending = 0;
            std::mem::take(&mut state.inbound)
        };

        if !batch.is_empty() {
            log::trace!("{} RX: {} frames", self.name, batch.len());
        }

        for message in batch {
            deliver(message);
        }
    }

    fn status(&self) -> TransportStatus {
        if self.state.lock().online {
            TransportStatus::Ready
        } else {
            TransportStatus::Offline
        }
    }
}

/// Shared handle onto a `LoopbackTransport`
#[derive(Clone)]
pub struct LoopbackHandle {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackHandle {
    /// Queue a frame as if another device had sent it
    pub fn inject(&self, message: Message) {
        self.state.lock().inbound.push_back(message);
    }

    /// All frames accepted so far
    pub fn transmitted(&self) -> Vec<Message> {
        self.state.lock().transmitted.clone()
    }

    /// Drain the transmit log
    pub fn take_transmitted(&self) -> Vec<Message> {
        std::mem::take(&mut self.state.lock().transmitted)
    }

    pub fn transmit_count(&self) -> usize {
        self.state.lock().transmitted.len()
    }

    /// Frames waiting for the next processing pass
    pub fn pending(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// Bring the link up or down
    pub fn set_online(&self, online: bool) {
        log::info!("Loopback link {}", if online { "up" } else { "down" });
        self.state.lock().online = online;
    }
}
