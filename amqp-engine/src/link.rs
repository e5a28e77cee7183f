//! Link state machine: attach/detach, credit, and drain/echo bookkeeping.
//!
//! The wire types (`amqp_types::performatives::{Attach, Flow, Detach}`) are
//! reused as-is; this module only adds the state a link endpoint must keep
//! between frames, grounded on the teacher's `endpoint::Link`/`SenderLink`/
//! `ReceiverLink` split (kept here as one struct parameterised by `Role`
//! since the engine core drives both sides identically up to the point
//! where sender- and receiver-only behaviour diverges).

use amqp_types::definitions::{
    Handle, ReceiverSettleMode, Role, SenderSettleMode, SequenceNo,
};
use amqp_types::messaging::{Source, TargetArchetype};
use amqp_types::performatives::{Attach, Detach, Flow};

use crate::error::{EngineError, Result};
use crate::frame::{Frame, FrameBody};

/// Link lifecycle, mirrored on spec section 2.6.10's state diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Detached,
    AttachSent,
    AttachReceived,
    Attached,
    DetachSent,
    DetachReceived,
}

/// Simplified settlement policy, resolved into the wire-level settle modes
/// at attach time: `AtMostOnce` pre-settles every outgoing transfer on this
/// link regardless of `snd_settle_mode`, `AtLeastOnce` leaves the negotiated
/// settle modes as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    AtMostOnce,
    AtLeastOnce,
}

/// Local link configuration supplied when attaching.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub name: String,
    pub role: Role,
    pub snd_settle_mode: SenderSettleMode,
    pub rcv_settle_mode: ReceiverSettleMode,
    pub source: Option<Source>,
    pub target: Option<TargetArchetype>,
    /// At-most-once vs. at-least-once delivery; see [`DeliveryMode`].
    pub delivery_mode: DeliveryMode,
    /// Receiver-only: settle a delivery as soon as it completes reassembly,
    /// without waiting for the application to call `accept` explicitly.
    pub auto_settle: bool,
}

/// One link endpoint's attach/credit/detach state.
pub struct Link {
    handle: Handle,
    options: LinkOptions,
    state: LinkState,
    /// Receiver: credit granted to the sender. Sender: credit the receiver granted us.
    link_credit: u32,
    delivery_count: SequenceNo,
    /// Sender-side: messages queued and awaiting credit.
    available: u32,
    drain: bool,
}

impl Link {
    /// Creates a link in `Detached`, not yet exchanged any frame.
    pub fn new(handle: Handle, options: LinkOptions) -> Self {
        Self {
            handle,
            options,
            state: LinkState::Detached,
            link_credit: 0,
            delivery_count: 0,
            available: 0,
            drain: false,
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn role(&self) -> &Role {
        &self.options.role
    }

    /// The settlement mode this link advertises as the sender, after
    /// resolving `delivery_mode` against the raw `snd_settle_mode`.
    pub fn effective_snd_settle_mode(&self) -> SenderSettleMode {
        match self.options.delivery_mode {
            DeliveryMode::AtMostOnce => SenderSettleMode::Settled,
            DeliveryMode::AtLeastOnce => self.options.snd_settle_mode.clone(),
        }
    }

    /// Receiver-only: whether this link should settle deliveries as soon as
    /// they complete, without an explicit application `accept`.
    pub fn auto_settle(&self) -> bool {
        self.options.auto_settle
    }

    fn local_attach(&self) -> Attach {
        Attach {
            name: self.options.name.clone(),
            handle: self.handle.clone(),
            role: self.options.role,
            snd_settle_mode: self.effective_snd_settle_mode(),
            rcv_settle_mode: self.options.rcv_settle_mode.clone(),
            source: self.options.source.clone().map(Box::new),
            target: self.options.target.clone().map(Box::new),
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: matches!(self.options.role, Role::Sender).then_some(0),
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }

    /// Builds the outgoing `attach` frame and moves to `AttachSent`.
    pub fn send_attach(&mut self, channel: u16) -> Frame {
        self.state = LinkState::AttachSent;
        Frame::amqp(channel, FrameBody::Attach(self.local_attach()))
    }

    /// Reacting to the remote's `attach`, answering an attach we initiated
    /// or one the remote initiated first.
    pub fn on_incoming_attach(&mut self, channel: u16, remote: &Attach) -> Result<Option<Frame>> {
        match self.state {
            LinkState::Detached => {
                if let Some(count) = remote.initial_delivery_count {
                    if matches!(self.options.role, Role::Receiver) {
                        self.delivery_count = count;
                    }
                }
                self.state = LinkState::Attached;
                Ok(Some(Frame::amqp(channel, FrameBody::Attach(self.local_attach()))))
            }
            LinkState::AttachSent => {
                if let Some(count) = remote.initial_delivery_count {
                    if matches!(self.options.role, Role::Receiver) {
                        self.delivery_count = count;
                    }
                }
                self.state = LinkState::Attached;
                Ok(None)
            }
            other => Err(EngineError::ProtocolViolation(format!(
                "attach received while link in state {other:?}"
            ))),
        }
    }

    /// Receiver side: sets the credit advertised to the sender on the next `flow`.
    pub fn set_credit(&mut self, credit: u32) {
        self.link_credit = credit;
    }

    /// Builds the `flow` body this link contributes, to be merged with the
    /// session's window fields by the caller before framing.
    pub fn flow_state(&self, drain: bool, echo: bool) -> (Option<Handle>, Option<SequenceNo>, Option<u32>, Option<u32>, bool, bool) {
        (
            Some(self.handle.clone()),
            Some(self.delivery_count),
            Some(self.link_credit),
            Some(self.available),
            drain,
            echo,
        )
    }

    /// Reacting to an incoming `flow` carrying link-specific state. Returns
    /// `true` if this side now owes the peer an echoing `flow` (it just
    /// satisfied a drain request as the sender).
    pub fn on_incoming_flow(&mut self, flow: &Flow) -> bool {
        if let Some(count) = flow.delivery_count {
            self.delivery_count = count;
        }
        if let Some(credit) = flow.link_credit {
            self.link_credit = credit;
        }
        if let Some(available) = flow.available {
            self.available = available;
        }
        self.drain = flow.drain;

        // Drain obliges the sender to deliver everything it has available or,
        // having none, advance delivery-count to consume all granted credit.
        // This engine never queues messages behind the app's back, so
        // "available" is always what the app last reported (0 unless it told
        // us otherwise) and draining always completes immediately.
        if self.drain && matches!(self.options.role, Role::Sender) {
            self.delivery_count = self.delivery_count.wrapping_add(self.link_credit);
            self.link_credit = 0;
            self.drain = false;
            true
        } else {
            false
        }
    }

    /// True if this link (as a sender) currently has credit to send.
    pub fn has_credit(&self) -> bool {
        self.link_credit > 0
    }

    /// Sender side: consumes one unit of credit for an outgoing transfer.
    pub fn consume_credit(&mut self) -> Result<()> {
        if self.link_credit == 0 {
            return Err(EngineError::ResourceExhausted(
                "no link-credit available to send".into(),
            ));
        }
        self.link_credit -= 1;
        self.delivery_count = self.delivery_count.wrapping_add(1);
        Ok(())
    }

    /// Initiates a local detach.
    pub fn send_detach(&mut self, channel: u16, closed: bool, error: Option<amqp_types::definitions::Error>) -> Frame {
        self.state = LinkState::DetachSent;
        Frame::amqp(
            channel,
            FrameBody::Detach(Detach {
                handle: self.handle.clone(),
                closed,
                error,
            }),
        )
    }

    /// Reacting to an incoming `detach`.
    pub fn on_incoming_detach(&mut self, _detach: &Detach) {
        self.state = match self.state {
            LinkState::DetachSent => LinkState::Detached,
            _ => LinkState::DetachReceived,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender_options() -> LinkOptions {
        LinkOptions {
            name: "test-link".into(),
            role: Role::Sender,
            snd_settle_mode: SenderSettleMode::Mixed,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: Some(Source::default()),
            target: None,
            delivery_mode: DeliveryMode::AtLeastOnce,
            auto_settle: false,
        }
    }

    #[test]
    fn attach_round_trip_moves_to_attached() {
        let mut link = Link::new(Handle(0), sender_options());
        let _ = link.send_attach(0);
        assert!(matches!(link.state(), LinkState::AttachSent));

        let remote = Attach {
            name: "test-link".into(),
            handle: Handle(0),
            role: Role::Receiver,
            snd_settle_mode: SenderSettleMode::Mixed,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: None,
            target: None,
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: None,
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        link.on_incoming_attach(0, &remote).unwrap();
        assert!(matches!(link.state(), LinkState::Attached));
    }

    #[test]
    fn sending_without_credit_fails() {
        let mut link = Link::new(Handle(0), sender_options());
        assert!(!link.has_credit());
        assert!(link.consume_credit().is_err());
    }

    #[test]
    fn granted_credit_allows_one_send_per_unit() {
        let mut link = Link::new(Handle(0), sender_options());
        link.link_credit = 2;
        link.consume_credit().unwrap();
        link.consume_credit().unwrap();
        assert!(link.consume_credit().is_err());
    }

    #[test]
    fn drain_with_nothing_available_consumes_all_credit_and_requests_echo() {
        let mut link = Link::new(Handle(0), sender_options());
        link.link_credit = 5;
        link.delivery_count = 10;
        let flow = Flow {
            next_incoming_id: None,
            incoming_window: 0,
            next_outgoing_id: 0,
            outgoing_window: 0,
            handle: Some(Handle(0)),
            delivery_count: None,
            link_credit: None,
            available: Some(0),
            drain: true,
            echo: false,
            properties: None,
        };
        let echo_due = link.on_incoming_flow(&flow);
        assert!(echo_due, "drain must be answered with an echoed flow");
        assert_eq!(link.link_credit, 0);
        assert_eq!(link.delivery_count, 15);
    }

    #[test]
    fn delivery_mode_at_most_once_pre_settles_regardless_of_snd_settle_mode() {
        let mut options = sender_options();
        options.snd_settle_mode = SenderSettleMode::Unsettled;
        options.delivery_mode = DeliveryMode::AtMostOnce;
        let link = Link::new(Handle(0), options);
        assert!(matches!(
            link.effective_snd_settle_mode(),
            SenderSettleMode::Settled
        ));
    }
}
