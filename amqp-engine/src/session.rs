//! Session state machine: the session window and the local handle table.
//!
//! Grounded on the same `begin`/`end` exchange shape the teacher's
//! `endpoint::Session` trait models, but expressed as a concrete struct that
//! only ever drives one state machine (no trait, no actor).

use std::collections::BTreeMap;

use amqp_types::definitions::{DeliveryNumber, Error as AmqpTypesError, Handle, SessionError};
use amqp_types::performatives::{Attach, Begin, Detach, Disposition, Flow, Transfer};
use amqp_types::states::SessionState;
use bytes::Bytes;

use crate::error::{EngineError, Result};
use crate::frame::{Frame, FrameBody};

/// Local session configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Initial incoming-window advertised on `begin`.
    pub incoming_window: u32,
    /// Initial outgoing-window advertised on `begin`.
    pub outgoing_window: u32,
    /// Largest link handle this session will allocate.
    pub handle_max: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            incoming_window: u32::MAX,
            outgoing_window: u32::MAX,
            handle_max: u32::MAX,
        }
    }
}

/// Per-link bookkeeping the session keeps to route frames by handle.
#[derive(Debug)]
struct LinkSlot {
    name: String,
}

/// A single session's flow-control windows and handle table.
pub struct Session {
    local_channel: u16,
    state: SessionState,
    options: SessionOptions,
    next_outgoing_id: u32,
    outgoing_window: u32,
    next_incoming_id: u32,
    incoming_window: u32,
    remote_incoming_window: u32,
    remote_outgoing_window: u32,
    /// Transfers emitted but not yet acknowledged by the peer's incoming-window.
    unacked_outgoing: u32,
    /// Handles attached on this session, whichever side chose the number.
    links: BTreeMap<u32, LinkSlot>,
    next_local_handle: u32,
}

impl Session {
    /// Begins a new local session on `local_channel`, the outgoing channel
    /// number `Connection::allocate_session` assigned it.
    pub fn new(local_channel: u16, options: SessionOptions) -> Self {
        Self {
            local_channel,
            state: SessionState::Unmapped,
            next_outgoing_id: 0,
            outgoing_window: options.outgoing_window,
            next_incoming_id: 0,
            incoming_window: options.incoming_window,
            remote_incoming_window: 0,
            remote_outgoing_window: 0,
            unacked_outgoing: 0,
            options,
            links: BTreeMap::new(),
            next_local_handle: 0,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The next transfer-id this session expects to assign locally.
    pub fn next_outgoing_id(&self) -> u32 {
        self.next_outgoing_id
    }

    /// Remaining capacity to receive transfers before the window must refresh.
    pub fn incoming_window(&self) -> u32 {
        self.incoming_window
    }

    /// Remaining capacity to send transfers, bounded by the peer's window.
    pub fn outgoing_window(&self) -> u32 {
        self.outgoing_window
    }

    /// The next transfer-id this session expects from the peer.
    pub fn next_incoming_id(&self) -> u32 {
        self.next_incoming_id
    }

    fn local_begin(&self, remote_channel: Option<u16>) -> Begin {
        Begin {
            remote_channel,
            next_outgoing_id: self.next_outgoing_id,
            incoming_window: self.incoming_window,
            outgoing_window: self.outgoing_window,
            handle_max: Handle(self.options.handle_max),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }

    /// Builds the outgoing `begin` frame for a locally-initiated session.
    pub fn send_begin(&mut self) -> Frame {
        self.state = SessionState::BeginSent;
        Frame::amqp(self.local_channel, FrameBody::Begin(self.local_begin(None)))
    }

    /// Answers a remote-initiated `begin` (`remote_channel` is the peer's
    /// own channel for this session).
    pub fn answer_begin(&mut self, remote_channel: u16, remote_begin: &Begin) -> Frame {
        self.remote_incoming_window = remote_begin.incoming_window;
        self.remote_outgoing_window = remote_begin.outgoing_window;
        self.next_incoming_id = remote_begin.next_outgoing_id;
        self.state = SessionState::Mapped;
        Frame::amqp(
            self.local_channel,
            FrameBody::Begin(self.local_begin(Some(remote_channel))),
        )
    }

    /// Reacting to the remote's `begin` in response to ours.
    pub fn on_incoming_begin(&mut self, begin: &Begin) -> Result<()> {
        match self.state {
            SessionState::BeginSent => {
                self.remote_incoming_window = begin.incoming_window;
                self.remote_outgoing_window = begin.outgoing_window;
                self.next_incoming_id = begin.next_outgoing_id;
                self.state = SessionState::Mapped;
                Ok(())
            }
            other => Err(EngineError::ProtocolViolation(format!(
                "begin received while session in state {other:?}"
            ))),
        }
    }

    /// Allocates a new local link handle, bounded by the negotiated handle-max.
    pub fn allocate_link(&mut self, name: impl Into<String>) -> Result<Handle> {
        if self.links.len() > self.options.handle_max as usize {
            return Err(EngineError::ResourceExhausted(
                "handle-max links already attached".into(),
            ));
        }
        let mut handle = self.next_local_handle;
        while self.links.contains_key(&handle) {
            handle += 1;
        }
        self.next_local_handle = handle + 1;
        self.links.insert(handle, LinkSlot { name: name.into() });
        Ok(Handle(handle))
    }

    fn require_handle(&self, handle: &Handle) -> Result<()> {
        if self.links.contains_key(&handle.0) {
            Ok(())
        } else {
            Err(EngineError::ProtocolViolation(format!(
                "unattached-handle ({:?}): {} is not attached to this session",
                SessionError::UnattachedHandle,
                handle.0
            )))
        }
    }

    /// Reacting to an incoming `attach`, registering the peer-chosen handle
    /// if this session hasn't seen it (it has, if this side initiated).
    pub fn on_incoming_attach(&mut self, attach: &Attach) -> Result<()> {
        self.links
            .entry(attach.handle.0)
            .or_insert_with(|| LinkSlot {
                name: attach.name.clone(),
            });
        Ok(())
    }

    /// Reacting to an incoming `flow`. Unattached handles are the session
    /// error `unattached-handle`.
    pub fn on_incoming_flow(&mut self, flow: &Flow) -> Result<()> {
        if let Some(handle) = &flow.handle {
            self.require_handle(handle)?;
        }
        if let Some(next_incoming_id) = flow.next_incoming_id {
            self.remote_incoming_window = next_incoming_id
                .wrapping_add(flow.incoming_window)
                .wrapping_sub(self.next_outgoing_id);
        } else {
            self.remote_incoming_window = flow.incoming_window;
        }
        self.remote_outgoing_window = flow.outgoing_window;
        Ok(())
    }

    /// Reacting to an incoming `transfer`. Tracks the session's incoming
    /// window and validates the handle is attached.
    pub fn on_incoming_transfer(&mut self, transfer: &Transfer, _payload: &Bytes) -> Result<()> {
        self.require_handle(&transfer.handle)?;
        self.next_incoming_id = self.next_incoming_id.wrapping_add(1);
        if self.incoming_window > 0 {
            self.incoming_window -= 1;
        }
        Ok(())
    }

    /// Accounts for a locally-emitted transfer against the outgoing window.
    /// Returns an error if the session's outgoing-window (bounded by the
    /// peer's incoming-window) is exhausted.
    pub fn on_outgoing_transfer(&mut self) -> Result<Transfer> {
        if self.unacked_outgoing >= self.remote_incoming_window {
            return Err(EngineError::ResourceExhausted(
                "session outgoing-window exhausted; sender must wait for flow".into(),
            ));
        }
        let delivery_id = self.next_outgoing_id;
        self.next_outgoing_id = self.next_outgoing_id.wrapping_add(1);
        self.unacked_outgoing += 1;
        Ok(Transfer {
            handle: Handle(0),
            delivery_id: Some(delivery_id),
            delivery_tag: None,
            message_format: Some(0),
            settled: None,
            more: false,
            rcv_settle_mode: None,
            state: None,
            resume: false,
            aborted: false,
            batchable: false,
        })
    }

    /// Reacting to an incoming `disposition`. Releases acknowledged
    /// outgoing transfers and validates `first <= last`.
    pub fn on_incoming_disposition(&mut self, disposition: &Disposition) -> Result<()> {
        let last = disposition.last.unwrap_or(disposition.first);
        if disposition.first > last {
            return Err(EngineError::ProtocolViolation(
                "disposition first > last".into(),
            ));
        }
        let acked = last.wrapping_sub(disposition.first).wrapping_add(1);
        self.unacked_outgoing = self.unacked_outgoing.saturating_sub(acked);
        Ok(())
    }

    /// Coalesces a batch of settled delivery ids into the minimal set of
    /// contiguous `(first, last)` ranges a `disposition` frame can express.
    pub fn coalesce_disposition_ranges(mut ids: Vec<DeliveryNumber>) -> Vec<(DeliveryNumber, DeliveryNumber)> {
        ids.sort_unstable();
        ids.dedup();
        let mut ranges = Vec::new();
        let mut iter = ids.into_iter();
        if let Some(mut start) = iter.next() {
            let mut end = start;
            for id in iter {
                if id == end.wrapping_add(1) {
                    end = id;
                } else {
                    ranges.push((start, end));
                    start = id;
                    end = id;
                }
            }
            ranges.push((start, end));
        }
        ranges
    }

    /// Reacting to an incoming `detach` for `handle`.
    pub fn on_incoming_detach(&mut self, detach: &Detach) -> Result<()> {
        self.require_handle(&detach.handle)?;
        self.links.remove(&detach.handle.0);
        Ok(())
    }

    /// Initiates a local end, moving to `EndSent`.
    pub fn send_end(&mut self, error: Option<AmqpTypesError>) -> Frame {
        self.state = SessionState::EndSent;
        Frame::amqp(
            self.local_channel,
            FrameBody::End(amqp_types::performatives::End { error }),
        )
    }

    /// Reacting to a remote `end`.
    pub fn on_incoming_end(&mut self) {
        self.state = match self.state {
            SessionState::EndSent => SessionState::Discarding,
            _ => SessionState::EndReceived,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_handshake_updates_remote_windows() {
        let mut session = Session::new(0, SessionOptions::default());
        let frame = session.send_begin();
        assert!(matches!(frame.body, FrameBody::Begin(_)));
        assert!(matches!(session.state(), SessionState::BeginSent));

        let remote_begin = Begin {
            remote_channel: Some(0),
            next_outgoing_id: 7,
            incoming_window: 100,
            outgoing_window: 50,
            handle_max: Handle(u32::MAX),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        session.on_incoming_begin(&remote_begin).unwrap();
        assert!(matches!(session.state(), SessionState::Mapped));
        assert_eq!(session.remote_incoming_window, 100);
        assert_eq!(session.next_incoming_id, 7);
    }

    #[test]
    fn disposition_with_first_greater_than_last_is_rejected() {
        let mut session = Session::new(0, SessionOptions::default());
        let disposition = Disposition {
            role: amqp_types::definitions::Role::Receiver,
            first: 5,
            last: Some(2),
            settled: true,
            state: None,
            batchable: false,
        };
        assert!(session.on_incoming_disposition(&disposition).is_err());
    }

    #[test]
    fn coalesces_contiguous_delivery_ids() {
        let ranges = Session::coalesce_disposition_ranges(vec![1, 2, 3, 7, 8, 10]);
        assert_eq!(ranges, vec![(1, 3), (7, 8), (10, 10)]);
    }

    #[test]
    fn transfer_on_unknown_handle_is_unattached_handle_error() {
        let mut session = Session::new(0, SessionOptions::default());
        session.state = SessionState::Mapped;
        let transfer = Transfer {
            handle: Handle(42),
            delivery_id: Some(0),
            delivery_tag: None,
            message_format: Some(0),
            settled: Some(true),
            more: false,
            rcv_settle_mode: None,
            state: None,
            resume: false,
            aborted: false,
            batchable: false,
        };
        let payload = Bytes::new();
        assert!(session.on_incoming_transfer(&transfer, &payload).is_err());
    }
}
