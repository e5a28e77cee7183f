//! Connection state machine: header/open/close handshake, negotiated
//! parameters, and the per-connection session table.
//!
//! Mirrors the responsibilities of the teacher's `connection::Connection`
//! trait (`on_incoming_open`/`on_incoming_begin`/`on_incoming_end`/
//! `on_incoming_close`, `allocate_session`/`deallocate_session`) but as a
//! plain synchronous struct: no actor, no channel, no I/O.

use std::time::Duration;

use amqp_types::definitions::{AmqpError, ConnectionError, Error as AmqpTypesError, Handle};
use amqp_types::performatives::{Begin, ChannelMax, Close, End, MaxFrameSize, Open};
use amqp_types::states::ConnectionState;
use slab::Slab;

use crate::error::{EngineError, Result};
use crate::frame::{Frame, FrameBody};

/// Local connection configuration, supplied at construction.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Container id advertised in the local `open`.
    pub container_id: String,
    /// Hostname/SNI hint advertised in the local `open`.
    pub hostname: Option<String>,
    /// Largest frame this engine will ever emit or accept.
    pub max_frame_size: u32,
    /// Largest channel number (inclusive of 0) this engine supports.
    pub channel_max: u16,
    /// Idle timeout advertised to the peer, used to size local keepalives.
    pub idle_time_out: Option<Duration>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            container_id: String::new(),
            hostname: None,
            max_frame_size: u32::MAX,
            channel_max: u16::MAX,
            idle_time_out: None,
        }
    }
}

/// Per-session bookkeeping the connection keeps to route frames by channel.
#[derive(Debug)]
pub(crate) struct SessionSlot {
    pub(crate) remote_channel: Option<u16>,
    pub(crate) ended: bool,
}

/// The connection-level state machine.
pub struct Connection {
    local_state: ConnectionState,
    options: ConnectionOptions,
    remote_open: Option<Open>,
    /// `None` until negotiated on incoming `open`.
    max_frame_size: u32,
    channel_max: u16,
    /// Negotiated keepalive interval: half of whichever side advertised an
    /// idle-timeout (the remote's, per spec; local otherwise).
    keepalive_interval: Option<Duration>,
    /// Local failure deadline: 2x the local idle-timeout with no inbound frame.
    failure_deadline: Option<Duration>,
    since_last_incoming: Duration,
    since_last_outgoing: Duration,
    sessions: Slab<SessionSlot>,
    /// remote channel -> local slab key, populated once a `begin` resolves it.
    remote_channel_index: std::collections::HashMap<u16, usize>,
    failed: Option<AmqpTypesError>,
}

impl Connection {
    /// Creates a connection in the `Start` state.
    pub fn new(options: ConnectionOptions) -> Self {
        let local_idle = options.idle_time_out;
        Self {
            local_state: ConnectionState::Start,
            max_frame_size: options.max_frame_size,
            channel_max: options.channel_max,
            keepalive_interval: None,
            failure_deadline: local_idle.map(|d| d * 2),
            since_last_incoming: Duration::ZERO,
            since_last_outgoing: Duration::ZERO,
            options,
            remote_open: None,
            sessions: Slab::new(),
            remote_channel_index: std::collections::HashMap::new(),
            failed: None,
        }
    }

    /// Current local state.
    pub fn state(&self) -> ConnectionState {
        self.local_state
    }

    /// Negotiated max-frame-size, valid once the handshake completes.
    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    /// Negotiated channel-max, valid once the handshake completes.
    pub fn channel_max(&self) -> u16 {
        self.channel_max
    }

    /// The error condition that failed the connection, if any.
    pub fn failure(&self) -> Option<&AmqpTypesError> {
        self.failed.as_ref()
    }

    fn local_open(&self) -> Open {
        Open {
            container_id: self.options.container_id.clone(),
            hostname: self.options.hostname.clone(),
            max_frame_size: MaxFrameSize(self.options.max_frame_size),
            channel_max: ChannelMax(self.options.channel_max),
            idle_time_out: self.options.idle_time_out.map(|d| d.as_millis() as u32),
            outgoing_locales: None,
            incoming_locales: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }

    /// Called once the local protocol header has been written. Emits `open`
    /// if the remote header has already arrived.
    pub fn on_local_header_sent(&mut self) -> Result<Vec<Frame>> {
        match self.local_state {
            ConnectionState::Start => {
                self.local_state = ConnectionState::HeaderSent;
                Ok(vec![])
            }
            ConnectionState::HeaderReceived => {
                self.local_state = ConnectionState::HeaderExchange;
                self.send_open()
            }
            other => Err(EngineError::ProtocolViolation(format!(
                "local header sent while in state {other:?}"
            ))),
        }
    }

    /// Called once the remote protocol header has arrived.
    pub fn on_remote_header(&mut self) -> Result<Vec<Frame>> {
        match self.local_state {
            ConnectionState::Start => {
                self.local_state = ConnectionState::HeaderReceived;
                Ok(vec![])
            }
            ConnectionState::HeaderSent => {
                self.local_state = ConnectionState::HeaderExchange;
                self.send_open()
            }
            other => Err(EngineError::ProtocolViolation(format!(
                "remote header received while in state {other:?}"
            ))),
        }
    }

    fn send_open(&mut self) -> Result<Vec<Frame>> {
        self.local_state = ConnectionState::OpenSent;
        Ok(vec![Frame::amqp(0, FrameBody::Open(self.local_open()))])
    }

    /// Feeds an inbound frame arriving on channel 0 (or routes a non-zero
    /// channel frame to its session). Returns any frames the connection
    /// itself must emit in response.
    pub fn on_incoming_open(&mut self, open: Open) -> Result<Vec<Frame>> {
        match self.local_state {
            ConnectionState::HeaderExchange | ConnectionState::OpenSent => {
                self.negotiate(&open);
                self.remote_open = Some(open);
                self.local_state = match self.local_state {
                    ConnectionState::HeaderExchange => ConnectionState::OpenReceived,
                    ConnectionState::OpenSent => ConnectionState::Opened,
                    _ => unreachable!(),
                };
                if matches!(self.local_state, ConnectionState::OpenReceived) {
                    let open_frame = self.send_open()?;
                    self.local_state = ConnectionState::Opened;
                    Ok(open_frame)
                } else {
                    Ok(vec![])
                }
            }
            other => Err(EngineError::ProtocolViolation(format!(
                "open received while in state {other:?}"
            ))),
        }
    }

    fn negotiate(&mut self, remote: &Open) {
        self.max_frame_size = self.max_frame_size.min(remote.max_frame_size.0);
        self.channel_max = self.channel_max.min(remote.channel_max.0);
        self.keepalive_interval = remote
            .idle_time_out
            .map(|millis| Duration::from_millis(millis as u64) / 2);
    }

    /// Allocates a new local session, returning the outgoing channel to use
    /// for its `begin` and the slab key to address it by thereafter.
    pub fn allocate_session(&mut self) -> Result<(u16, usize)> {
        if self.sessions.len() >= self.channel_max as usize + 1 {
            return Err(EngineError::ResourceExhausted(
                "channel-max sessions already allocated".into(),
            ));
        }
        let key = self.sessions.insert(SessionSlot {
            remote_channel: None,
            ended: false,
        });
        Ok((key as u16, key))
    }

    /// Reacting to a remote `begin` on `channel`. `remote_channel` is the
    /// peer's own channel number for this session, or `None` if the peer is
    /// beginning a brand-new session rather than answering ours.
    pub fn on_incoming_begin(
        &mut self,
        channel: u16,
        begin: &Begin,
    ) -> Result<usize> {
        if let Some(remote_channel) = begin.remote_channel {
            let key = remote_channel as usize;
            let slot = self
                .sessions
                .get_mut(key)
                .ok_or_else(|| EngineError::ProtocolViolation(
                    "begin answers a channel with no pending session".into(),
                ))?;
            if slot.remote_channel.is_some() {
                return Err(EngineError::ProtocolViolation(
                    "session-busy: begin answers an already-mapped channel".into(),
                ));
            }
            slot.remote_channel = Some(channel);
            self.remote_channel_index.insert(channel, key);
            Ok(key)
        } else {
            if self.remote_channel_index.contains_key(&channel) {
                return Err(EngineError::ProtocolViolation(
                    "session-busy: begin received on an already-mapped remote channel".into(),
                ));
            }
            let key = self.sessions.insert(SessionSlot {
                remote_channel: Some(channel),
                ended: false,
            });
            self.remote_channel_index.insert(channel, key);
            Ok(key)
        }
    }

    /// Looks up the session slab key owning `remote_channel`.
    pub fn session_by_remote_channel(&self, remote_channel: u16) -> Option<usize> {
        self.remote_channel_index.get(&remote_channel).copied()
    }

    /// Reacting to a remote `end` on `remote_channel`.
    pub fn on_incoming_end(&mut self, remote_channel: u16, _end: End) -> Result<usize> {
        let key = self.session_by_remote_channel(remote_channel).ok_or_else(|| {
            EngineError::ProtocolViolation(format!(
                "end received on unmapped channel {remote_channel}"
            ))
        })?;
        if let Some(slot) = self.sessions.get_mut(key) {
            slot.ended = true;
        }
        Ok(key)
    }

    /// Deallocates a session once both ends have exchanged `end`.
    pub fn deallocate_session(&mut self, key: usize) {
        if let Some(slot) = self.sessions.try_remove(key) {
            if let Some(remote_channel) = slot.remote_channel {
                self.remote_channel_index.remove(&remote_channel);
            }
        }
    }

    /// Builds the outgoing `end` frame for a locally-initiated session close.
    pub fn on_outgoing_end(&self, local_channel: u16, end: End) -> Frame {
        Frame::amqp(local_channel, FrameBody::End(end))
    }

    /// Reacting to a remote `close`. Returns the error condition the peer
    /// reported, if any, and whether this side still needs to answer with
    /// its own `close`.
    pub fn on_incoming_close(&mut self, close: Close) -> Result<Vec<Frame>> {
        let error = close.error;
        match self.local_state {
            ConnectionState::CloseSent => {
                self.local_state = ConnectionState::End;
                Ok(vec![])
            }
            _ => {
                self.local_state = ConnectionState::CloseReceived;
                if let Some(error) = error.clone() {
                    self.fail(error);
                }
                let reply = Close { error: None };
                self.local_state = ConnectionState::End;
                Ok(vec![Frame::amqp(0, FrameBody::Close(reply))])
            }
        }
    }

    /// Initiates a local close, optionally reporting an error condition.
    pub fn close(&mut self, error: Option<AmqpTypesError>) -> Vec<Frame> {
        if let Some(error) = error.clone() {
            self.fail(error);
        }
        self.local_state = ConnectionState::CloseSent;
        vec![Frame::amqp(0, FrameBody::Close(Close { error }))]
    }

    fn fail(&mut self, error: AmqpTypesError) {
        self.local_state = ConnectionState::Discarding;
        self.failed = Some(error);
    }

    /// Advances the idle-timeout clock by `elapsed` since the last call.
    /// Returns frames to emit (an empty keepalive) or an error if the
    /// remote has gone silent past the local failure deadline.
    pub fn tick(&mut self, elapsed: Duration) -> Result<Vec<Frame>> {
        self.since_last_incoming += elapsed;
        self.since_last_outgoing += elapsed;

        if let Some(deadline) = self.failure_deadline {
            if self.since_last_incoming >= deadline {
                let error = AmqpTypesError::new(
                    ConnectionError::ConnectionForced,
                    Some("no frame received within 2x idle-timeout".into()),
                    None,
                );
                #[cfg(feature = "tracing")]
                tracing::warn!(?error, "idle-timeout exceeded, forcing connection closed");
                self.fail(error.clone());
                return Err(EngineError::RemoteClosed(error));
            }
        }

        if let Some(interval) = self.keepalive_interval {
            if self.since_last_outgoing >= interval {
                self.since_last_outgoing = Duration::ZERO;
                return Ok(vec![Frame::empty()]);
            }
        }
        Ok(vec![])
    }

    /// Call whenever any frame (not just channel-0 ones) is received, to
    /// reset the idle-timeout clock.
    pub fn note_incoming_frame(&mut self) {
        self.since_last_incoming = Duration::ZERO;
    }

    /// Call whenever any frame is sent, to reset the local keepalive clock.
    pub fn note_outgoing_frame(&mut self) {
        self.since_last_outgoing = Duration::ZERO;
    }

    /// Maps a protocol violation against `handle` into the session error
    /// the spec requires for references to handles outside the local table.
    pub fn unattached_handle_error(handle: Handle) -> AmqpTypesError {
        AmqpTypesError::new(
            amqp_types::definitions::SessionError::UnattachedHandle,
            Some(format!("handle {} is not attached", handle.0)),
            None,
        )
    }

    /// Maps a decode failure into the connection error the spec requires.
    pub fn framing_error(description: impl Into<String>) -> AmqpTypesError {
        AmqpTypesError::new(ConnectionError::FramingError, Some(description.into()), None)
    }

    /// Internal-error wrapper for conditions with no dedicated AMQP code.
    pub fn internal_error(description: impl Into<String>) -> AmqpTypesError {
        AmqpTypesError::new(AmqpError::InternalError, Some(description.into()), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ConnectionOptions {
        ConnectionOptions {
            container_id: "test-container".into(),
            ..Default::default()
        }
    }

    #[test]
    fn handshake_happy_path() {
        let mut conn = Connection::new(options());
        assert!(conn.on_local_header_sent().unwrap().is_empty());
        let frames = conn.on_remote_header().unwrap();
        assert_eq!(frames.len(), 1);
        assert!(matches!(conn.state(), ConnectionState::OpenSent));

        let remote_open = Open {
            container_id: "peer".into(),
            hostname: None,
            max_frame_size: MaxFrameSize(1024),
            channel_max: ChannelMax(10),
            idle_time_out: None,
            outgoing_locales: None,
            incoming_locales: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        let frames = conn.on_incoming_open(remote_open).unwrap();
        assert!(frames.is_empty());
        assert!(matches!(conn.state(), ConnectionState::Opened));
        assert_eq!(conn.max_frame_size(), 1024);
        assert_eq!(conn.channel_max(), 10);
    }

    #[test]
    fn begin_on_already_mapped_remote_channel_is_rejected() {
        let mut conn = Connection::new(options());
        conn.on_local_header_sent().unwrap();
        conn.on_remote_header().unwrap();
        let remote_open = Open {
            container_id: "peer".into(),
            hostname: None,
            max_frame_size: MaxFrameSize(u32::MAX),
            channel_max: ChannelMax(u16::MAX),
            idle_time_out: None,
            outgoing_locales: None,
            incoming_locales: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        conn.on_incoming_open(remote_open).unwrap();

        let begin = Begin {
            remote_channel: None,
            next_outgoing_id: 0,
            incoming_window: 1,
            outgoing_window: 1,
            handle_max: Handle(u32::MAX),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        conn.on_incoming_begin(3, &begin).unwrap();
        let err = conn.on_incoming_begin(3, &begin);
        assert!(err.is_err());
    }
}
