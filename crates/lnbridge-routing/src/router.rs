//! Control-bus / broker router
//!
//! Holds the two transports, the application handler and the mode. Nothing
//! about an individual message survives a dispatch: each inbound message is
//! classified, rewritten and handed on before the next one is looked at.

use crate::dispatch::{classify_broker, classify_control_bus, Action, Decision};
use crate::error::{Result, RoutingError};
use crate::handler::{ApplicationHandler, ChannelHandler};
use crate::mode::Mode;
use lnbridge_protocol::{Message, RequestId, RouteClass};
use lnbridge_transport::{BusKind, BusTransport, SubmitId};
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Router statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouterStats {
    pub delivered: u64,
    pub forwarded_to_broker: u64,
    pub forwarded_to_control_bus: u64,
    pub echoes_suppressed: u64,
    pub discarded: u64,
    /// Steps skipped because the target was not attached
    pub skipped: u64,
    pub forward_failures: u64,
    pub submissions: u64,
    pub submission_failures: u64,
}

/// Borrowed view of everything a decision may touch
///
/// The transport currently running its processing pass is left out.
struct Sinks<'a> {
    control_bus: Option<&'a mut Box<dyn BusTransport>>,
    broker: Option<&'a mut Box<dyn BusTransport>>,
    application: &'a mut Option<Box<dyn ApplicationHandler>>,
    stats: &'a mut RouterStats,
}

impl Sinks<'_> {
    fn transport(&mut self, bus: BusKind) -> Option<&mut Box<dyn BusTransport>> {
        match bus {
            BusKind::ControlBus => self.control_bus.as_deref_mut(),
            BusKind::Broker => self.broker.as_deref_mut(),
        }
    }

    fn apply(&mut self, source: BusKind, mode: Mode, decision: Decision, mut message: Message) {
        debug!(
            %source,
            %mode,
            class = %message.route_class(),
            request_id = %message.request_id(),
            echo = message.echo,
            actions = ?decision.actions().collect::<Vec<_>>(),
            "routing decision"
        );

        if decision.echo_suppressed {
            self.stats.echoes_suppressed += 1;
        }
        if decision.is_drop() {
            self.stats.discarded += 1;
            return;
        }

        if let Err(e) = message.set_route_class(decision.route_class) {
            warn!("Cannot stamp route class: {}", e);
            self.stats.discarded += 1;
            return;
        }
        message.echo = false;

        let mut actions = decision.actions().peekable();
        while let Some(action) = actions.next() {
            if actions.peek().is_some() {
                self.perform(action, message.clone());
            } else {
                self.perform(action, message);
                break;
            }
        }
    }

    fn perform(&mut self, action: Action, message: Message) {
        match action {
            Action::Deliver => match self.application.as_mut() {
                Some(handler) => {
                    handler.deliver(message);
                    self.stats.delivered += 1;
                }
                None => self.stats.skipped += 1,
            },
            Action::Forward(bus) => {
                let Some(transport) = self.transport(bus) else {
                    self.stats.skipped += 1;
                    return;
                };
                let result = transport.submit(message);
                match result {
                    Ok(id) => {
                        debug!(%bus, submit_id = id, "forwarded");
                        match bus {
                            BusKind::ControlBus => self.stats.forwarded_to_control_bus += 1,
                            BusKind::Broker => self.stats.forwarded_to_broker += 1,
                        }
                    }
                    Err(e) => {
                        warn!(%bus, "Forward failed: {}", e);
                        self.stats.forward_failures += 1;
                    }
                }
            }
        }
    }
}

/// Message router between the control bus, the broker and the application
pub struct Router {
    mode: Mode,
    control_bus: Option<Box<dyn BusTransport>>,
    broker: Option<Box<dyn BusTransport>>,
    application: Option<Box<dyn ApplicationHandler>>,
    rng: StdRng,
    stats: RouterStats,
}

impl Router {
    /// Create a router with no collaborators attached
    pub fn new(mode: Mode) -> Self {
        Self::with_rng(mode, StdRng::from_entropy())
    }

    /// Create a router whose request IDs are reproducible
    pub fn with_seed(mode: Mode, seed: u64) -> Self {
        Self::with_rng(mode, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mode: Mode, rng: StdRng) -> Self {
        Router {
            mode,
            control_bus: None,
            broker: None,
            application: None,
            rng,
            stats: RouterStats::default(),
        }
    }

    /// Create a gateway-mode router with every collaborator attached
    pub fn with_collaborators(
        control_bus: Box<dyn BusTransport>,
        broker: Box<dyn BusTransport>,
        application: impl ApplicationHandler + 'static,
    ) -> Result<Self> {
        let mut router = Router::new(Mode::default());
        router.attach_control_bus(control_bus)?;
        router.attach_broker(broker)?;
        router.set_application_handler(application);
        Ok(router)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Change the mode; applies from the next message on
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            info!("Router mode {} -> {}", self.mode, mode);
        }
        self.mode = mode;
    }

    /// Attach (or replace) the control-bus transport
    pub fn attach_control_bus(&mut self, transport: Box<dyn BusTransport>) -> Result<()> {
        check_kind(BusKind::ControlBus, &*transport)?;
        info!("Control bus attached: {}", transport.name());
        self.control_bus = Some(transport);
        Ok(())
    }

    /// Attach (or replace) the broker transport
    pub fn attach_broker(&mut self, transport: Box<dyn BusTransport>) -> Result<()> {
        check_kind(BusKind::Broker, &*transport)?;
        info!("Broker attached: {}", transport.name());
        self.broker = Some(transport);
        Ok(())
    }

    pub fn detach_control_bus(&mut self) -> Option<Box<dyn BusTransport>> {
        self.control_bus.take()
    }

    pub fn detach_broker(&mut self) -> Option<Box<dyn BusTransport>> {
        self.broker.take()
    }

    pub fn has_control_bus(&self) -> bool {
        self.control_bus.is_some()
    }

    pub fn has_broker(&self) -> bool {
        self.broker.is_some()
    }

    /// Register the local application handler, replacing any previous one
    pub fn set_application_handler(&mut self, handler: impl ApplicationHandler + 'static) {
        self.application = Some(Box::new(handler));
    }

    /// Deliver to the application through a channel
    pub fn set_application_channel(&mut self, tx: mpsc::UnboundedSender<Message>) {
        self.set_application_handler(ChannelHandler::new(tx));
    }

    /// Create a channel for receiving application deliveries
    pub fn create_application_channel() -> (
        mpsc::UnboundedSender<Message>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        mpsc::unbounded_channel()
    }

    pub fn clear_application_handler(&mut self) {
        self.application = None;
    }

    /// Route a frame received (or echoed) by the control-bus transport
    pub fn on_control_bus_message(&mut self, message: Message) {
        let mode = self.mode;
        let decision = classify_control_bus(message.tag, message.echo, mode);
        self.sinks().apply(BusKind::ControlBus, mode, decision, message);
    }

    /// Route a message received (or confirmed) by the broker transport
    pub fn on_broker_message(&mut self, message: Message) {
        let mode = self.mode;
        let decision = classify_broker(message.tag, message.echo, mode);
        self.sinks().apply(BusKind::Broker, mode, decision, message);
    }

    /// Send an application message onto the control bus
    ///
    /// Assigns a random request ID when none is set and tags the frame as
    /// application-originated. Returns the transport's submission ID.
    pub fn submit(&mut self, mut message: Message) -> Result<SubmitId> {
        if !message.request_id().is_assigned() {
            let id = RequestId::random(&mut self.rng);
            message = message.with_request_id(id);
        }
        message.set_route_class(RouteClass::FromApplication)?;
        message.echo = false;

        let Some(transport) = self.control_bus.as_mut() else {
            self.stats.submission_failures += 1;
            return Err(RoutingError::NoControlBus);
        };

        let request_id = message.request_id();
        match transport.submit(message) {
            Ok(id) => {
                debug!(%request_id, submit_id = id, "submitted to control bus");
                self.stats.submissions += 1;
                Ok(id)
            }
            Err(e) => {
                self.stats.submission_failures += 1;
                Err(e.into())
            }
        }
    }

    /// Periodic driver: run each attached transport's processing pass
    ///
    /// Frames the transports hand over are routed immediately, from inside
    /// the transport's pass.
    pub fn process(&mut self) {
        let mode = self.mode;

        if let Some(control_bus) = self.control_bus.as_mut() {
            let mut sinks = Sinks {
                control_bus: None,
                broker: self.broker.as_mut(),
                application: &mut self.application,
                stats: &mut self.stats,
            };
            control_bus.process(&mut |message| {
                let decision = classify_control_bus(message.tag, message.echo, mode);
                sinks.apply(BusKind::ControlBus, mode, decision, message);
            });
        }

        if let Some(broker) = self.broker.as_mut() {
            let mut sinks = Sinks {
                control_bus: self.control_bus.as_mut(),
                broker: None,
                application: &mut self.application,
                stats: &mut self.stats,
            };
            broker.process(&mut |message| {
                let decision = classify_broker(message.tag, message.echo, mode);
                sinks.apply(BusKind::Broker, mode, decision, message);
            });
        }
    }

    pub fn stats(&self) -> RouterStats {
        self.stats.clone()
    }

    pub fn clear_stats(&mut self) {
        self.stats = RouterStats::default();
    }

    fn sinks(&mut self) -> Sinks<'_> {
        Sinks {
            control_bus: self.control_bus.as_mut(),
            broker: self.broker.as_mut(),
            application: &mut self.application,
            stats: &mut self.stats,
        }
    }
}

fn check_kind(expected: BusKind, transport: &dyn BusTransport) -> Result<()> {
    if transport.kind() != expected {
        return Err(RoutingError::WrongBusKind {
            expected,
            found: transport.kind(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lnbridge_protocol::CorrelationTag;
    use lnbridge_transport::{LoopbackHandle, LoopbackTransport};

    fn control_bus() -> (Box<dyn BusTransport>, LoopbackHandle) {
        let bus = LoopbackTransport::control_bus(16);
        let handle = bus.handle();
        (Box::new(bus), handle)
    }

    fn broker() -> (Box<dyn BusTransport>, LoopbackHandle) {
        let broker = LoopbackTransport::broker(16);
        let handle = broker.handle();
        (Box::new(broker), handle)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_router_creation() {
        let router = Router::new(Mode::Gateway);
        assert_eq!(router.mode(), Mode::Gateway);
        assert!(!router.has_control_bus());
        assert!(!router.has_broker());
        assert_eq!(router.stats(), RouterStats::default());
    }

    #[test]
    fn test_attach_checks_bus_kind() {
        let mut router = Router::new(Mode::Gateway);
        let (broker, _) = broker();

        assert_eq!(
            router.attach_control_bus(broker).unwrap_err(),
            RoutingError::WrongBusKind {
                expected: BusKind::ControlBus,
                found: BusKind::Broker,
            }
        );
        assert!(!router.has_control_bus());
    }

    #[test]
    fn test_detach() {
        let (bus, _) = control_bus();
        let (broker, _) = broker();
        let mut router = Router::with_collaborators(bus, broker, |_msg: Message| {}).unwrap();

        assert!(router.detach_broker().is_some());
        assert!(!router.has_broker());
        assert!(router.detach_broker().is_none());
        assert!(router.has_control_bus());
    }

    #[test]
    fn test_submit_without_control_bus() {
        let mut router = Router::new(Mode::Gateway);
        let err = router.submit(Message::new(vec![0xA0])).unwrap_err();

        assert_eq!(err, RoutingError::NoControlBus);
        assert_eq!(router.stats().submission_failures, 1);
    }

    #[test]
    fn test_submit_assigns_request_id() {
        let (bus, handle) = control_bus();
        let mut router = Router::with_seed(Mode::Gateway, 42);
        router.attach_control_bus(bus).unwrap();

        for _ in 0..200 {
            router.submit(Message::new(vec![0xA0, 0x01])).unwrap();
            router.process();
        }

        for frame in handle.transmitted() {
            assert!(frame.request_id().is_assigned());
            assert_eq!(frame.route_class(), RouteClass::FromApplication);
        }
        assert_eq!(router.stats().submissions, 200);
    }

    #[test]
    fn test_submit_preserves_request_id() {
        let (bus, handle) = control_bus();
        let mut router = Router::new(Mode::LocalOnly);
        router.attach_control_bus(bus).unwrap();

        let id = RequestId::new(16383).unwrap();
        let submit_id = router.submit(Message::new(vec![0xBF]).with_request_id(id)).unwrap();

        assert_eq!(submit_id, 1);
        let sent = handle.transmitted();
        assert_eq!(sent[0].tag.bits(), 0x8000 | 16383);
    }

    #[test]
    fn test_submit_overrides_stale_route_class() {
        let (bus, handle) = control_bus();
        let mut router = Router::new(Mode::Gateway);
        router.attach_control_bus(bus).unwrap();

        let msg = Message::new(vec![0xBF]).with_tag(CorrelationTag::from_bits(0x4000 | 9));
        router.submit(msg).unwrap();

        assert_eq!(handle.transmitted()[0].tag.bits(), 0x8000 | 9);
    }

    #[test]
    fn test_submit_clears_echo_flag() {
        let (bus, handle) = control_bus();
        let mut router = Router::new(Mode::Gateway);
        router.attach_control_bus(bus).unwrap();

        router.submit(Message::new(vec![0xA0]).with_echo(true)).unwrap();

        let sent = handle.transmitted();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].echo);
        assert_eq!(sent[0].route_class(), RouteClass::FromApplication);
    }

    #[test]
    fn test_submit_surfaces_transport_failure() {
        let (bus, handle) = control_bus();
        let mut router = Router::new(Mode::Gateway);
        router.attach_control_bus(bus).unwrap();
        handle.set_online(false);

        let err = router.submit(Message::new(vec![0xA0])).unwrap_err();
        assert!(matches!(err, RoutingError::Transport(_)));
        assert_eq!(router.stats().submission_failures, 1);
        assert_eq!(handle.transmit_count(), 0);
    }

    #[test]
    fn test_missing_application_still_forwards() {
        let (broker, handle) = broker();
        let mut router = Router::new(Mode::Gateway);
        router.attach_broker(broker).unwrap();

        router.on_control_bus_message(Message::new(vec![0xB2, 0x10]));

        assert_eq!(handle.transmit_count(), 1);
        let stats = router.stats();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.forwarded_to_broker, 1);
    }

    #[test]
    fn test_missing_broker_still_delivers() {
        let (tx, mut rx) = Router::create_application_channel();
        let mut router = Router::new(Mode::Gateway);
        router.set_application_channel(tx);

        router.on_control_bus_message(Message::new(vec![0xB2, 0x10]));

        assert_eq!(drain(&mut rx).len(), 1);
        assert_eq!(router.stats().skipped, 1);
    }

    #[test]
    fn test_forward_failure_does_not_block_delivery() {
        let (broker, handle) = broker();
        let (tx, mut rx) = Router::create_application_channel();
        let mut router = Router::new(Mode::Gateway);
        router.attach_broker(broker).unwrap();
        router.set_application_channel(tx);
        handle.set_online(false);

        let msg = Message::new(vec![0xB2]).with_tag(CorrelationTag::from_bits(0x4000 | 5));
        router.on_control_bus_message(msg);

        assert_eq!(drain(&mut rx).len(), 1);
        assert_eq!(router.stats().forward_failures, 1);
    }

    #[test]
    fn test_mode_change_applies_to_next_message() {
        let (broker, handle) = broker();
        let mut router = Router::new(Mode::Gateway);
        router.attach_broker(broker).unwrap();

        router.on_control_bus_message(Message::new(vec![0x01]));
        router.set_mode(Mode::LocalOnly);
        router.on_control_bus_message(Message::new(vec![0x02]));

        let sent = handle.transmitted();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, vec![0x01]);
    }

    #[test]
    fn test_closure_handler() {
        let (tx, mut rx) = Router::create_application_channel();
        let mut router = Router::new(Mode::LocalOnly);
        router.set_application_handler(move |msg: Message| {
            let _ = tx.send(msg);
        });

        router.on_control_bus_message(
            Message::new(vec![0xE7]).with_tag(CorrelationTag::from_bits(0x8000 | 3)),
        );

        let got = drain(&mut rx);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].tag.bits(), 3);

        router.clear_application_handler();
        router.on_control_bus_message(Message::new(vec![0xE7]));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_channel_delivery_across_tasks() {
        let (tx, mut rx) = Router::create_application_channel();
        let mut router = Router::new(Mode::BrokerOnly);
        router.set_application_channel(tx);

        router.on_broker_message(Message::new(vec![0x83]));
        drop(router);

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.payload, vec![0x83]);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_clear_stats() {
        let mut router = Router::new(Mode::LocalOnly);
        router.on_broker_message(Message::new(vec![0x83]));
        assert_eq!(router.stats().discarded, 1);

        router.clear_stats();
        assert_eq!(router.stats(), RouterStats::default());
    }
}
