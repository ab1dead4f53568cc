//! Routing decisions
//!
//! Classification is a pure function of the correlation tag, the echo flag
//! and the mode. The router applies the returned `Decision`: it stamps
//! `route_class`, clears the echo flag, then runs the actions in order.

use crate::mode::Mode;
use lnbridge_protocol::{CorrelationTag, RouteClass};
use lnbridge_transport::BusKind;

/// A single side effect of routing a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Hand the message to the local application
    Deliver,
    /// Submit the message to the transport serving this bus
    Forward(BusKind),
}

/// Outcome of classifying one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Route class stamped on the message before any action runs
    pub route_class: RouteClass,

    /// An echo was absorbed instead of being forwarded
    pub echo_suppressed: bool,

    actions: [Option<Action>; 2],
}

impl Decision {
    /// No action at all
    pub const fn discard() -> Self {
        Decision {
            route_class: RouteClass::Untagged,
            echo_suppressed: false,
            actions: [None, None],
        }
    }

    /// Broker confirmation of our own publish
    const fn confirmation() -> Self {
        Decision {
            echo_suppressed: true,
            ..Decision::discard()
        }
    }

    const fn untagged(first: Action, second: Option<Action>) -> Self {
        Decision {
            route_class: RouteClass::Untagged,
            echo_suppressed: false,
            actions: [Some(first), second],
        }
    }

    /// Actions in the order they must be performed
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.actions.iter().flatten().copied()
    }

    pub fn is_drop(&self) -> bool {
        self.actions.iter().all(Option::is_none)
    }

    pub fn delivers(&self) -> bool {
        self.actions().any(|a| a == Action::Deliver)
    }

    pub fn forwards_to(&self, bus: BusKind) -> bool {
        self.actions().any(|a| a == Action::Forward(bus))
    }
}

const TO_BROKER: Action = Action::Forward(BusKind::Broker);
const TO_CONTROL_BUS: Action = Action::Forward(BusKind::ControlBus);

/// Classify a frame delivered by the control-bus transport
///
/// `Reserved` is never stamped by this router; a frame carrying it is
/// treated as newly observed traffic, same as `Untagged`.
pub fn classify_control_bus(tag: CorrelationTag, echo: bool, mode: Mode) -> Decision {
    match mode {
        Mode::LocalOnly | Mode::BrokerOnly => Decision::untagged(Action::Deliver, None),
        Mode::Gateway => match tag.route_class() {
            RouteClass::Untagged | RouteClass::Reserved => {
                Decision::untagged(Action::Deliver, Some(TO_BROKER))
            }
            // An echo of a frame relayed from the broker must not go back
            // to the broker; an independent reply must.
            RouteClass::FromBroker if echo => Decision {
                echo_suppressed: true,
                ..Decision::untagged(Action::Deliver, None)
            },
            RouteClass::FromBroker => Decision::untagged(TO_BROKER, Some(Action::Deliver)),
            // Forwarded whether or not the echo flag is set.
            RouteClass::FromApplication => {
                Decision::untagged(Action::Deliver, Some(TO_BROKER))
            }
        },
    }
}

/// Classify a message delivered by the broker transport
///
/// Inbound broker traffic is routed on the echo flag and mode alone; the
/// tag is taken so both classifiers share one signature.
pub fn classify_broker(_tag: CorrelationTag, echo: bool, mode: Mode) -> Decision {
    if echo {
        return Decision::confirmation();
    }

    match mode {
        Mode::BrokerOnly => Decision::untagged(Action::Deliver, None),
        Mode::Gateway => Decision {
            route_class: RouteClass::FromBroker,
            echo_suppressed: false,
            actions: [Some(TO_CONTROL_BUS), None],
        },
        Mode::LocalOnly => Decision::discard(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [Mode; 3] = [Mode::LocalOnly, Mode::BrokerOnly, Mode::Gateway];
    const CLASSES: [u16; 4] = [0x0000, 0x4000, 0x8000, 0xC000];

    fn tag(bits: u16) -> CorrelationTag {
        CorrelationTag::from_bits(bits | 77)
    }

    fn actions(decision: Decision) -> Vec<Action> {
        decision.actions().collect()
    }

    #[test]
    fn test_local_only_delivers_everything_from_control_bus() {
        for class in CLASSES {
            for echo in [false, true] {
                let d = classify_control_bus(tag(class), echo, Mode::LocalOnly);
                assert_eq!(actions(d), vec![Action::Deliver]);
                assert_eq!(d.route_class, RouteClass::Untagged);
            }
        }
    }

    #[test]
    fn test_broker_only_degrades_to_local_path_on_control_bus() {
        for class in CLASSES {
            for echo in [false, true] {
                assert_eq!(
                    classify_control_bus(tag(class), echo, Mode::BrokerOnly),
                    classify_control_bus(tag(class), echo, Mode::LocalOnly)
                );
            }
        }
    }

    #[test]
    fn test_gateway_untagged() {
        let d = classify_control_bus(tag(0x0000), false, Mode::Gateway);
        assert_eq!(actions(d), vec![Action::Deliver, TO_BROKER]);
    }

    #[test]
    fn test_gateway_reserved_behaves_as_untagged() {
        for echo in [false, true] {
            assert_eq!(
                classify_control_bus(tag(0xC000), echo, Mode::Gateway),
                classify_control_bus(tag(0x0000), echo, Mode::Gateway)
            );
        }
    }

    #[test]
    fn test_gateway_from_broker_reply_forwards_before_delivery() {
        let d = classify_control_bus(tag(0x4000), false, Mode::Gateway);
        assert_eq!(actions(d), vec![TO_BROKER, Action::Deliver]);
        assert!(!d.echo_suppressed);
    }

    #[test]
    fn test_gateway_from_broker_echo_delivers_only() {
        let d = classify_control_bus(tag(0x4000), true, Mode::Gateway);
        assert_eq!(actions(d), vec![Action::Deliver]);
        assert!(d.echo_suppressed);
    }

    #[test]
    fn test_gateway_from_application_forwards_regardless_of_echo() {
        // Unlike FromBroker, the echo flag does not gate the broker forward.
        for echo in [false, true] {
            let d = classify_control_bus(tag(0x8000), echo, Mode::Gateway);
            assert_eq!(actions(d), vec![Action::Deliver, TO_BROKER]);
            assert!(!d.echo_suppressed);
        }
    }

    #[test]
    fn test_broker_confirmation_is_dropped_in_every_mode() {
        for mode in MODES {
            let d = classify_broker(tag(0), true, mode);
            assert!(d.is_drop());
            assert!(d.echo_suppressed);
        }
    }

    #[test]
    fn test_broker_inbound_per_mode() {
        let d = classify_broker(tag(0), false, Mode::BrokerOnly);
        assert_eq!(actions(d), vec![Action::Deliver]);
        assert_eq!(d.route_class, RouteClass::Untagged);

        let d = classify_broker(tag(0), false, Mode::Gateway);
        assert_eq!(actions(d), vec![TO_CONTROL_BUS]);
        assert_eq!(d.route_class, RouteClass::FromBroker);

        assert!(classify_broker(tag(0), false, Mode::LocalOnly).is_drop());
    }

    #[test]
    fn test_mode_isolation() {
        for class in CLASSES {
            for echo in [false, true] {
                let t = tag(class);
                assert!(!classify_control_bus(t, echo, Mode::LocalOnly)
                    .forwards_to(BusKind::Broker));
                assert!(!classify_broker(t, echo, Mode::LocalOnly).forwards_to(BusKind::Broker));
                assert!(!classify_control_bus(t, echo, Mode::BrokerOnly)
                    .forwards_to(BusKind::ControlBus));
                assert!(!classify_broker(t, echo, Mode::BrokerOnly)
                    .forwards_to(BusKind::ControlBus));
            }
        }
    }

    #[test]
    fn test_never_forwards_back_to_source() {
        for mode in MODES {
            for class in CLASSES {
                for echo in [false, true] {
                    let t = tag(class);
                    assert!(!classify_control_bus(t, echo, mode).forwards_to(BusKind::ControlBus));
                    assert!(!classify_broker(t, echo, mode).forwards_to(BusKind::Broker));
                }
            }
        }
    }

    #[test]
    fn test_deliveries_and_broker_forwards_are_untagged() {
        for mode in MODES {
            for class in CLASSES {
                for echo in [false, true] {
                    let t = tag(class);
                    for d in [classify_control_bus(t, echo, mode), classify_broker(t, echo, mode)] {
                        if d.delivers() || d.forwards_to(BusKind::Broker) {
                            assert_eq!(d.route_class, RouteClass::Untagged);
                        }
                    }
                }
            }
        }
    }
}
