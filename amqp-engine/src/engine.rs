//! The top-level, I/O-free protocol engine: feed it bytes, drain its
//! pending output, and tick it for timers. Composes the connection,
//! session, and link state machines from the rest of this crate.
//!
//! Grounded on the shape of the teacher's `connection::engine::ConnectionEngine`
//! event loop (`on_incoming`, `on_outgoing_session_frames`, `on_heartbeat`)
//! but driven by explicit calls instead of a tokio select loop, since this
//! engine never touches a socket itself.

use std::collections::HashMap;
use std::time::Duration;

use amqp_buffer::{Chunk, CompositeBuffer};
use amqp_types::definitions::{DeliveryNumber, Error as AmqpTypesError, Handle, Role};
use amqp_types::messaging::DeliveryState;
use amqp_types::performatives::{Disposition, Flow};
use bytes::{BufMut, BytesMut};

use crate::connection::{Connection, ConnectionOptions};
use crate::delivery::{Delivery, DeliveryTracker};
use crate::error::{EngineError, Result};
use crate::frame::{encode_frame, Frame, FrameBody, FrameDecoder};
use crate::link::{DeliveryMode, Link, LinkOptions};
use crate::protocol_header::ProtocolHeader;
use crate::sasl::{Credentials, Progress, SaslClient};
use crate::session::{Session, SessionOptions};

/// Observable events the engine surfaces to the driving client facade.
#[derive(Debug)]
pub enum Event {
    SaslOutcomeFailed(amqp_types::sasl::SaslCode),
    ConnectionOpened,
    ConnectionClosed {
        error: Option<AmqpTypesError>,
    },
    SessionBegun {
        channel: u16,
    },
    SessionEnded {
        channel: u16,
    },
    LinkAttached {
        channel: u16,
        handle: Handle,
    },
    LinkDetached {
        channel: u16,
        handle: Handle,
    },
    DeliveryReceived {
        channel: u16,
        handle: Handle,
        delivery: Delivery,
    },
    DeliverySettled {
        channel: u16,
        delivery_id: u32,
    },
}

enum Phase {
    /// Waiting to send/receive the (possibly SASL) protocol header.
    Header,
    /// SASL negotiation in progress.
    Sasl,
    /// Ordinary AMQP traffic.
    Amqp,
    /// The engine has failed or shut down and refuses further input.
    Done,
}

/// The I/O-free protocol engine core.
pub struct Engine {
    phase: Phase,
    connection: Connection,
    sasl: Option<SaslClient>,
    decoder: FrameDecoder,
    inbound: CompositeBuffer,
    outbound: BytesMut,
    sessions: HashMap<u16, Session>,
    links: HashMap<(u16, u32), Link>,
    deliveries: HashMap<(u16, u32), DeliveryTracker>,
    events: Vec<Event>,
}

impl Engine {
    /// Creates a new engine. If `credentials` is `Some`, SASL negotiation
    /// runs ahead of the AMQP connection; otherwise the connection starts
    /// immediately.
    pub fn new(options: ConnectionOptions, credentials: Option<Credentials>) -> Self {
        let hostname = options.hostname.clone();
        Self {
            phase: Phase::Header,
            connection: Connection::new(options),
            sasl: credentials.map(|creds| SaslClient::new(creds, hostname)),
            decoder: FrameDecoder::new(),
            inbound: CompositeBuffer::new(),
            outbound: BytesMut::new(),
            sessions: HashMap::new(),
            links: HashMap::new(),
            deliveries: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Call once, before the first `ingest`, to obtain the initial bytes to
    /// write to the transport (the protocol header).
    pub fn start(&mut self) -> Result<()> {
        let header = match &self.sasl {
            Some(client) => client.header(),
            None => ProtocolHeader::amqp(),
        };
        self.outbound.put_slice(&header.encode());
        if self.sasl.is_none() {
            let frames = self.connection.on_local_header_sent()?;
            self.frame_out_many(frames)?;
        }
        Ok(())
    }

    /// Feeds inbound bytes read from the transport.
    pub fn ingest(&mut self, bytes: &[u8]) -> Result<()> {
        if matches!(self.phase, Phase::Done) {
            return Err(EngineError::EngineFailed);
        }
        self.inbound.append(Chunk::wrap(bytes.to_vec()))?;

        loop {
            match self.phase {
                Phase::Header => {
                    if self.inbound.readable() < 8 {
                        break;
                    }
                    let mut raw = [0u8; 8];
                    let header_bytes = self.inbound.read_bytes(8)?;
                    raw.copy_from_slice(&header_bytes);
                    let header = ProtocolHeader::decode(&raw)?;
                    if !header.is_supported_version() {
                        self.fail(Connection::framing_error("unsupported protocol version"));
                        break;
                    }
                    if let Some(client) = self.sasl.as_mut() {
                        client.on_header(&header)?;
                        self.phase = Phase::Sasl;
                    } else {
                        let frames = self.connection.on_remote_header()?;
                        self.frame_out_many(frames)?;
                        self.phase = Phase::Amqp;
                    }
                }
                Phase::Sasl => {
                    match self.decoder.poll(&mut self.inbound)? {
                        None => break,
                        Some(frame) => self.drive_sasl(frame.body)?,
                    }
                }
                Phase::Amqp => match self.decoder.poll(&mut self.inbound)? {
                    None => break,
                    Some(frame) => {
                        self.connection.note_incoming_frame();
                        self.on_amqp_frame(frame)?;
                    }
                },
                Phase::Done => break,
            }
        }
        Ok(())
    }

    fn drive_sasl(&mut self, body: FrameBody) -> Result<()> {
        let client = self.sasl.as_mut().expect("sasl phase without a client");
        match client.on_frame(body)? {
            Progress::Continue(frames) => {
                for frame in frames {
                    encode_frame(frame, u32::MAX, &mut self.outbound)?;
                }
            }
            Progress::Authenticated => {
                self.outbound.put_slice(&ProtocolHeader::amqp().encode());
                self.phase = Phase::Header;
            }
            Progress::Failed(code) => {
                self.events.push(Event::SaslOutcomeFailed(code));
                self.phase = Phase::Done;
            }
        }
        Ok(())
    }

    fn on_amqp_frame(&mut self, frame: Frame) -> Result<()> {
        let channel = frame.channel;
        match frame.body {
            FrameBody::Open(open) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(container_id = %open.container_id, "received open");
                #[cfg(feature = "log")]
                log::debug!("received open: container_id={}", open.container_id);
                let frames = self.connection.on_incoming_open(open)?;
                self.frame_out_many(frames)?;
                self.events.push(Event::ConnectionOpened);
            }
            FrameBody::Begin(begin) => {
                let key = self.connection.on_incoming_begin(channel, &begin)?;
                let local_channel = key as u16;
                if begin.remote_channel.is_some() {
                    let session = self.sessions.get_mut(&local_channel).ok_or_else(|| {
                        EngineError::ProtocolViolation(
                            "begin answers a session this engine never opened".into(),
                        )
                    })?;
                    session.on_incoming_begin(&begin)?;
                } else {
                    let mut session = Session::new(local_channel, SessionOptions::default());
                    let answer = session.answer_begin(channel, &begin);
                    self.sessions.insert(local_channel, session);
                    self.frame_out(answer)?;
                }
                self.events.push(Event::SessionBegun { channel: local_channel });
            }
            FrameBody::Attach(attach) => {
                let local_channel = self.connection.session_by_remote_channel(channel).ok_or_else(|| {
                    EngineError::ProtocolViolation(format!(
                        "attach on unmapped channel {channel}"
                    ))
                })? as u16;
                if let Some(session) = self.sessions.get_mut(&local_channel) {
                    session.on_incoming_attach(&attach)?;
                }
                let handle = attach.handle.clone();
                let link = self.links.entry((local_channel, handle.0)).or_insert_with(|| {
                    Link::new(
                        handle.clone(),
                        LinkOptions {
                            name: attach.name.clone(),
                            role: match attach.role {
                                amqp_types::definitions::Role::Sender => amqp_types::definitions::Role::Receiver,
                                amqp_types::definitions::Role::Receiver => amqp_types::definitions::Role::Sender,
                            },
                            snd_settle_mode: attach.snd_settle_mode.clone(),
                            rcv_settle_mode: attach.rcv_settle_mode.clone(),
                            source: attach.source.as_deref().cloned(),
                            target: attach.target.as_deref().cloned(),
                            // The remote already chose its settle modes; this
                            // side only mirrors them, it doesn't renegotiate.
                            delivery_mode: DeliveryMode::AtLeastOnce,
                            auto_settle: false,
                        },
                    )
                });
                if let Some(answer) = link.on_incoming_attach(local_channel, &attach)? {
                    self.frame_out(answer)?;
                }
                self.deliveries
                    .entry((local_channel, handle.0))
                    .or_insert_with(DeliveryTracker::new);
                self.events.push(Event::LinkAttached {
                    channel: local_channel,
                    handle,
                });
            }
            FrameBody::Flow(flow) => {
                let local_channel = self.connection.session_by_remote_channel(channel).ok_or_else(|| {
                    EngineError::ProtocolViolation(format!("flow on unmapped channel {channel}"))
                })? as u16;
                if let Some(session) = self.sessions.get_mut(&local_channel) {
                    session.on_incoming_flow(&flow)?;
                }
                let echo_requested = flow.echo;
                let mut drain_satisfied = false;
                if let Some(handle) = &flow.handle {
                    if let Some(link) = self.links.get_mut(&(local_channel, handle.0)) {
                        drain_satisfied = link.on_incoming_flow(&flow);
                    }
                }
                if echo_requested || drain_satisfied {
                    if let Some(handle) = flow.handle.clone() {
                        self.emit_link_flow(local_channel, &handle, false, false)?;
                    }
                }
            }
            FrameBody::Transfer { performative, payload } => {
                let local_channel = self.connection.session_by_remote_channel(channel).ok_or_else(|| {
                    EngineError::ProtocolViolation(format!("transfer on unmapped channel {channel}"))
                })? as u16;
                let handle = performative.handle.clone();
                if let Some(session) = self.sessions.get_mut(&local_channel) {
                    session.on_incoming_transfer(&performative, &payload)?;
                }
                let tracker = self
                    .deliveries
                    .entry((local_channel, handle.0))
                    .or_insert_with(DeliveryTracker::new);
                if let Some(delivery) = tracker.on_incoming_transfer(performative, payload)? {
                    self.events.push(Event::DeliveryReceived {
                        channel: local_channel,
                        handle,
                        delivery,
                    });
                }
            }
            FrameBody::Disposition(disposition) => {
                let local_channel = self.connection.session_by_remote_channel(channel).ok_or_else(|| {
                    EngineError::ProtocolViolation(format!(
                        "disposition on unmapped channel {channel}"
                    ))
                })? as u16;
                if let Some(session) = self.sessions.get_mut(&local_channel) {
                    session.on_incoming_disposition(&disposition)?;
                }
                let last = disposition.last.unwrap_or(disposition.first);
                let mut id = disposition.first;
                while id <= last {
                    self.events.push(Event::DeliverySettled {
                        channel: local_channel,
                        delivery_id: id,
                    });
                    if id == last {
                        break;
                    }
                    id += 1;
                }
            }
            FrameBody::Detach(detach) => {
                let local_channel = self.connection.session_by_remote_channel(channel).ok_or_else(|| {
                    EngineError::ProtocolViolation(format!("detach on unmapped channel {channel}"))
                })? as u16;
                let handle = detach.handle.clone();
                if let Some(session) = self.sessions.get_mut(&local_channel) {
                    session.on_incoming_detach(&detach)?;
                }
                if let Some(link) = self.links.get_mut(&(local_channel, handle.0)) {
                    link.on_incoming_detach(&detach);
                }
                self.events.push(Event::LinkDetached {
                    channel: local_channel,
                    handle,
                });
            }
            FrameBody::End(end) => {
                let local_channel = self.connection.session_by_remote_channel(channel).ok_or_else(|| {
                    EngineError::ProtocolViolation(format!("end on unmapped channel {channel}"))
                })? as u16;
                self.connection.on_incoming_end(channel, end)?;
                if let Some(session) = self.sessions.get_mut(&local_channel) {
                    session.on_incoming_end();
                }
                self.events.push(Event::SessionEnded { channel: local_channel });
            }
            FrameBody::Close(close) => {
                let error = close.error.clone();
                #[cfg(feature = "tracing")]
                tracing::debug!(?error, "received close");
                #[cfg(feature = "log")]
                log::debug!("received close: error={error:?}");
                let frames = self.connection.on_incoming_close(close)?;
                self.frame_out_many(frames)?;
                self.phase = Phase::Done;
                self.events.push(Event::ConnectionClosed { error });
            }
            FrameBody::Empty => {}
            other => {
                return Err(EngineError::ProtocolViolation(format!(
                    "unexpected SASL frame on an open AMQP connection: {other:?}"
                )))
            }
        }
        Ok(())
    }

    /// Opens a new local session, returning its local channel for addressing
    /// later `attach_link`/`send_transfer` calls.
    pub fn begin_session(&mut self, options: SessionOptions) -> Result<u16> {
        let (channel, _key) = self.connection.allocate_session()?;
        let mut session = Session::new(channel, options);
        let frame = session.send_begin();
        self.sessions.insert(channel, session);
        self.frame_out(frame)?;
        Ok(channel)
    }

    /// Attaches a new link on an already-begun session.
    pub fn attach_link(&mut self, channel: u16, options: LinkOptions) -> Result<Handle> {
        let session = self
            .sessions
            .get_mut(&channel)
            .ok_or_else(|| EngineError::ProtocolViolation(format!("no session on channel {channel}")))?;
        let handle = session.allocate_link(options.name.clone())?;
        let mut link = Link::new(handle.clone(), options);
        let frame = link.send_attach(channel);
        self.links.insert((channel, handle.0), link);
        self.deliveries.insert((channel, handle.0), DeliveryTracker::new());
        self.frame_out(frame)?;
        Ok(handle)
    }

    /// Grants the given credit to a receiver link and emits the resulting `flow`.
    pub fn grant_credit(&mut self, channel: u16, handle: &Handle, credit: u32) -> Result<()> {
        {
            let link = self
                .links
                .get_mut(&(channel, handle.0))
                .ok_or_else(|| EngineError::ProtocolViolation(format!("no link for handle {}", handle.0)))?;
            link.set_credit(credit);
        }
        self.emit_link_flow(channel, handle, false, false)
    }

    /// Requests the peer on the other end of this link to drain: deliver up
    /// to its remaining credit, or advance delivery-count to consume it all,
    /// and echo a `flow` back either way.
    pub fn drain_link(&mut self, channel: u16, handle: &Handle) -> Result<()> {
        self.emit_link_flow(channel, handle, true, false)
    }

    /// Builds and emits the `flow` body for one link, merging its credit/
    /// delivery-count/available/drain/echo state with the owning session's
    /// window fields.
    fn emit_link_flow(&mut self, channel: u16, handle: &Handle, drain: bool, echo: bool) -> Result<()> {
        let link = self
            .links
            .get(&(channel, handle.0))
            .ok_or_else(|| EngineError::ProtocolViolation(format!("no link for handle {}", handle.0)))?;
        let (link_handle, delivery_count, link_credit, available, drain, echo) =
            link.flow_state(drain, echo);
        let session = self
            .sessions
            .get(&channel)
            .ok_or_else(|| EngineError::ProtocolViolation(format!("no session on channel {channel}")))?;
        let flow = Flow {
            next_incoming_id: Some(session.next_incoming_id()),
            incoming_window: session.incoming_window(),
            next_outgoing_id: session.next_outgoing_id(),
            outgoing_window: session.outgoing_window(),
            handle: link_handle,
            delivery_count,
            link_credit,
            available: Some(available.unwrap_or(0)),
            drain,
            echo,
            properties: None,
        };
        self.frame_out(Frame::amqp(channel, FrameBody::Flow(flow)))
    }

    /// Sends a single-frame transfer on an attached link.
    pub fn send_transfer(&mut self, channel: u16, handle: &Handle, payload: bytes::Bytes) -> Result<u32> {
        let link = self
            .links
            .get_mut(&(channel, handle.0))
            .ok_or_else(|| EngineError::ProtocolViolation(format!("no link for handle {}", handle.0)))?;
        link.consume_credit()?;
        let pre_settled = matches!(
            link.effective_snd_settle_mode(),
            amqp_types::definitions::SenderSettleMode::Settled
        );
        let session = self
            .sessions
            .get_mut(&channel)
            .ok_or_else(|| EngineError::ProtocolViolation(format!("no session on channel {channel}")))?;
        let mut performative = session.on_outgoing_transfer()?;
        performative.handle = handle.clone();
        performative.settled = Some(pre_settled);
        let delivery_id = performative.delivery_id.expect("set by on_outgoing_transfer");
        self.frame_out(Frame::amqp(
            channel,
            FrameBody::Transfer {
                performative,
                payload,
            },
        ))?;
        Ok(delivery_id)
    }

    /// Detaches a link, optionally closing it permanently.
    pub fn detach_link(&mut self, channel: u16, handle: &Handle, closed: bool) -> Result<()> {
        let link = self
            .links
            .get_mut(&(channel, handle.0))
            .ok_or_else(|| EngineError::ProtocolViolation(format!("no link for handle {}", handle.0)))?;
        let frame = link.send_detach(channel, closed, None);
        self.frame_out(frame)
    }

    /// Settles one or more deliveries as the receiver, emitting a
    /// `disposition` per coalesced contiguous run of delivery-ids sharing the
    /// same `(settled, state)` rather than one frame per id.
    pub fn send_disposition(
        &mut self,
        channel: u16,
        delivery_ids: &[DeliveryNumber],
        state: Option<DeliveryState>,
        settled: bool,
    ) -> Result<()> {
        for (first, last) in Session::coalesce_disposition_ranges(delivery_ids.to_vec()) {
            let frame = Frame::amqp(
                channel,
                FrameBody::Disposition(Disposition {
                    role: Role::Receiver,
                    first,
                    last: (last != first).then_some(last),
                    settled,
                    state: state.clone(),
                    batchable: false,
                }),
            );
            self.frame_out(frame)?;
        }
        Ok(())
    }

    /// Ends a session, optionally reporting an error condition.
    pub fn end_session(&mut self, channel: u16, error: Option<AmqpTypesError>) -> Result<()> {
        let session = self
            .sessions
            .get_mut(&channel)
            .ok_or_else(|| EngineError::ProtocolViolation(format!("no session on channel {channel}")))?;
        let frame = session.send_end(error);
        self.frame_out(frame)
    }

    /// Advances timers by `elapsed`. Returns any keepalive frames emitted.
    pub fn tick(&mut self, elapsed: Duration) -> Result<()> {
        match self.connection.tick(elapsed) {
            Ok(frames) => self.frame_out_many(frames),
            Err(EngineError::RemoteClosed(error)) => {
                self.phase = Phase::Done;
                self.events.push(Event::ConnectionClosed { error: Some(error) });
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// Drains and returns bytes pending a transport write.
    pub fn pending_output(&mut self) -> BytesMut {
        std::mem::take(&mut self.outbound)
    }

    /// Drains and returns events observed since the last call.
    pub fn poll_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Initiates a graceful shutdown, emitting `close`.
    pub fn shutdown(&mut self, error: Option<AmqpTypesError>) -> Result<()> {
        let frames = self.connection.close(error.clone());
        self.phase = Phase::Done;
        self.events.push(Event::ConnectionClosed { error });
        self.frame_out_many(frames)
    }

    fn fail(&mut self, error: AmqpTypesError) {
        self.phase = Phase::Done;
        self.events.push(Event::ConnectionClosed { error: Some(error) });
    }

    fn frame_out(&mut self, frame: Frame) -> Result<()> {
        encode_frame(frame, self.connection.max_frame_size(), &mut self.outbound)?;
        self.connection.note_outgoing_frame();
        Ok(())
    }

    fn frame_out_many(&mut self, frames: Vec<Frame>) -> Result<()> {
        for frame in frames {
            self.frame_out(frame)?;
        }
        Ok(())
    }
}
