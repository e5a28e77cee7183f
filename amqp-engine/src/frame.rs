//! Frame header and performative (de)serialization.
//!
//! Wire layout (big-endian):
//!
//! ```text
//! +------+------+------+------+------+------+------+------+---------+
//! |           size (4B)       | DOFF | TYPE |     CH (2B)    | body...
//! +------+------+------+------+------+------+------+------+---------+
//! ```
//!
//! `size` is the total frame length including the 8-byte header, `DOFF` is
//! the data offset in 4-byte words (extended headers between byte 8 and
//! `DOFF * 4` are skipped), `TYPE` distinguishes AMQP (0x00) from SASL
//! (0x01) frames, and `CH` is the channel (always 0 for SASL frames).

use amqp_buffer::{ByteCursor, CompositeBuffer};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{de::Deserialize, ser::Serialize};

use amqp_types::performatives::{
    Attach, Begin, Close, Detach, Disposition, End, Flow, Open, Performative, Transfer,
};
use amqp_types::sasl::{SaslChallenge, SaslInit, SaslMechanisms, SaslOutcome, SaslResponse};

use crate::error::{EngineError, Result};

/// Frame type byte for AMQP frames.
pub const FRAME_TYPE_AMQP: u8 = 0x00;
/// Frame type byte for SASL frames.
pub const FRAME_TYPE_SASL: u8 = 0x01;

/// Minimum legal frame size, per the AMQP negotiation floor.
pub const MIN_MAX_FRAME_SIZE: u32 = amqp_types::definitions::MIN_MAX_FRAME_SIZE as u32;

const HEADER_LEN: usize = 8;

/// A fully decoded frame: its channel and its body.
#[derive(Debug)]
pub struct Frame {
    /// The channel the frame was received on (always 0 for SASL frames).
    pub channel: u16,
    /// The frame body.
    pub body: FrameBody,
}

impl Frame {
    /// Wraps an AMQP-type frame body on the given channel.
    pub fn amqp(channel: u16, body: FrameBody) -> Self {
        Self { channel, body }
    }

    /// An empty frame, used only to reset the remote idle timeout.
    pub fn empty() -> Self {
        Self {
            channel: 0,
            body: FrameBody::Empty,
        }
    }
}

/// The body of a frame: either an AMQP performative (with payload, for
/// transfers), a SASL performative, or nothing (a keepalive).
#[derive(Debug)]
pub enum FrameBody {
    /// `open`
    Open(Open),
    /// `begin`
    Begin(Begin),
    /// `attach`
    Attach(Attach),
    /// `flow`
    Flow(Flow),
    /// `transfer`, with any message bytes that followed the performative.
    Transfer {
        /// The transfer performative.
        performative: Transfer,
        /// Payload bytes carried verbatim to the delivery.
        payload: Bytes,
    },
    /// `disposition`
    Disposition(Disposition),
    /// `detach`
    Detach(Detach),
    /// `end`
    End(End),
    /// `close`
    Close(Close),
    /// `sasl-mechanisms`
    SaslMechanisms(SaslMechanisms),
    /// `sasl-init`
    SaslInit(SaslInit),
    /// `sasl-challenge`
    SaslChallenge(SaslChallenge),
    /// `sasl-response`
    SaslResponse(SaslResponse),
    /// `sasl-outcome`
    SaslOutcome(SaslOutcome),
    /// Empty frame (idle timeout keepalive).
    Empty,
}

/// Encodes a frame header plus body into `dst`, prefixed with its declared
/// size. `max_frame_size` is enforced here so no oversized frame is ever
/// handed to the transport.
pub fn encode_frame(frame: Frame, max_frame_size: u32, dst: &mut BytesMut) -> Result<()> {
    let mut body_buf = BytesMut::new();
    let frame_type = match &frame.body {
        FrameBody::SaslMechanisms(_)
        | FrameBody::SaslInit(_)
        | FrameBody::SaslChallenge(_)
        | FrameBody::SaslResponse(_)
        | FrameBody::SaslOutcome(_) => FRAME_TYPE_SASL,
        _ => FRAME_TYPE_AMQP,
    };

    encode_body(frame.body, &mut body_buf)?;

    let total_len = HEADER_LEN + body_buf.len();
    if total_len as u64 > max_frame_size as u64 {
        return Err(EngineError::ResourceExhausted(format!(
            "encoded frame of {total_len} bytes exceeds negotiated max-frame-size {max_frame_size}"
        )));
    }

    dst.put_u32(total_len as u32);
    dst.put_u8(2); // DOFF: engine never emits an extended header
    dst.put_u8(frame_type);
    dst.put_u16(frame.channel);
    dst.extend_from_slice(&body_buf);
    Ok(())
}

fn encode_body(body: FrameBody, dst: &mut BytesMut) -> Result<()> {
    use amqp_codec::ser::Serializer;

    let mut serializer = Serializer::from(dst.writer());
    match body {
        FrameBody::Open(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::Begin(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::Attach(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::Flow(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::Transfer {
            performative,
            payload,
        } => {
            performative.serialize(&mut serializer)?;
            dst.extend_from_slice(&payload);
            Ok(())
        }
        FrameBody::Disposition(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::Detach(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::End(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::Close(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::SaslMechanisms(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::SaslInit(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::SaslChallenge(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::SaslResponse(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::SaslOutcome(p) => p.serialize(&mut serializer).map_err(Into::into),
        FrameBody::Empty => Ok(()),
    }
}

#[derive(Debug)]
struct PendingHeader {
    body_len: usize,
    doff: u8,
    frame_type: u8,
    channel: u16,
}

/// A three-stage streaming frame decoder: header, then body (once enough
/// bytes have accumulated). Holds no more than one frame's worth of state
/// across calls, and poisons itself on the first fatal parse error so every
/// later call keeps reporting failure rather than silently resynchronising.
#[derive(Debug)]
pub struct FrameDecoder {
    pending: Option<PendingHeader>,
    poisoned: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// A fresh decoder, ready to read a header.
    pub fn new() -> Self {
        Self {
            pending: None,
            poisoned: false,
        }
    }

    /// Attempts to decode the next frame out of `buf`. Returns `Ok(None)` if
    /// not enough bytes have arrived yet; does not consume bytes it cannot
    /// yet make sense of.
    pub fn poll(&mut self, buf: &mut CompositeBuffer) -> Result<Option<Frame>> {
        if self.poisoned {
            return Err(EngineError::Framing(
                "frame decoder already failed fatally".into(),
            ));
        }

        if self.pending.is_none() {
            if buf.readable() < HEADER_LEN {
                return Ok(None);
            }
            let size = buf.read_u32().map_err(EngineError::from)?;
            let doff = buf.read_u8().map_err(EngineError::from)?;
            let frame_type = buf.read_u8().map_err(EngineError::from)?;
            let channel = buf.read_u16().map_err(EngineError::from)?;

            if (size as usize) < HEADER_LEN {
                self.poisoned = true;
                return Err(EngineError::Framing(format!(
                    "frame size {size} is smaller than the 8-byte header"
                )));
            }
            if doff < 2 {
                self.poisoned = true;
                return Err(EngineError::Framing(format!(
                    "data offset {doff} is smaller than the minimum of 2"
                )));
            }

            self.pending = Some(PendingHeader {
                body_len: size as usize - HEADER_LEN,
                doff,
                frame_type,
                channel,
            });
        }

        let header = self.pending.as_ref().expect("checked above");
        if buf.readable() < header.body_len {
            return Ok(None);
        }

        let header = self.pending.take().expect("checked above");
        let ext_header_len = header.doff as usize * 4 - HEADER_LEN;
        if ext_header_len > header.body_len {
            self.poisoned = true;
            return Err(EngineError::Framing(
                "extended header longer than the frame body".into(),
            ));
        }
        if ext_header_len > 0 {
            buf.read_bytes(ext_header_len).map_err(EngineError::from)?;
        }
        let remaining = header.body_len - ext_header_len;

        if remaining == 0 {
            return Ok(Some(Frame {
                channel: header.channel,
                body: FrameBody::Empty,
            }));
        }

        let raw = buf.read_bytes(remaining).map_err(EngineError::from)?;
        let body = decode_body(header.frame_type, raw).map_err(|err| {
            self.poisoned = true;
            err
        })?;
        Ok(Some(Frame {
            channel: header.channel,
            body,
        }))
    }
}

fn decode_body(frame_type: u8, raw: Bytes) -> Result<FrameBody> {
    if raw.is_empty() {
        return Ok(FrameBody::Empty);
    }

    // `src.reader()` on a `&mut BytesMut` advances the original buffer as
    // the deserializer consumes bytes, leaving whatever is left over as the
    // transfer payload -- the AMQP list encoding is self-delimiting so the
    // deserializer stops exactly at the end of the performative.
    let mut src = BytesMut::from(&raw[..]);
    match frame_type {
        FRAME_TYPE_AMQP => {
            let reader = amqp_codec::read::IoReader::new((&mut src).reader());
            let mut deserializer = amqp_codec::de::Deserializer::new(reader);
            let performative = Performative::deserialize(&mut deserializer)?;
            Ok(match performative {
                Performative::Open(p) => FrameBody::Open(p),
                Performative::Begin(p) => FrameBody::Begin(p),
                Performative::Attach(p) => FrameBody::Attach(p),
                Performative::Flow(p) => FrameBody::Flow(p),
                Performative::Transfer(performative) => FrameBody::Transfer {
                    performative,
                    payload: src.split().freeze(),
                },
                Performative::Disposition(p) => FrameBody::Disposition(p),
                Performative::Detach(p) => FrameBody::Detach(p),
                Performative::End(p) => FrameBody::End(p),
                Performative::Close(p) => FrameBody::Close(p),
            })
        }
        FRAME_TYPE_SASL => decode_sasl_body(&raw),
        other => Err(EngineError::Framing(format!(
            "unrecognised frame type byte {other}"
        ))),
    }
}

fn decode_sasl_body(raw: &[u8]) -> Result<FrameBody> {
    let frame: SaslFrameBody = amqp_codec::from_slice(raw)?;
    Ok(match frame {
        SaslFrameBody::Mechanisms(p) => FrameBody::SaslMechanisms(p),
        SaslFrameBody::Init(p) => FrameBody::SaslInit(p),
        SaslFrameBody::Challenge(p) => FrameBody::SaslChallenge(p),
        SaslFrameBody::Response(p) => FrameBody::SaslResponse(p),
        SaslFrameBody::Outcome(p) => FrameBody::SaslOutcome(p),
    })
}

/// Tagged union over the five SASL performatives, dispatching on their
/// descriptor the same way [`Performative`] does for the AMQP set.
enum SaslFrameBody {
    Mechanisms(SaslMechanisms),
    Init(SaslInit),
    Challenge(SaslChallenge),
    Response(SaslResponse),
    Outcome(SaslOutcome),
}

enum SaslField {
    Mechanisms,
    Init,
    Challenge,
    Response,
    Outcome,
}

struct SaslFieldVisitor;

impl<'de> serde::de::Visitor<'de> for SaslFieldVisitor {
    type Value = SaslField;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("SASL frame body variant identifier")
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        match v {
            "amqp:sasl-mechanisms:list" => Ok(SaslField::Mechanisms),
            "amqp:sasl-init:list" => Ok(SaslField::Init),
            "amqp:sasl-challenge:list" => Ok(SaslField::Challenge),
            "amqp:sasl-response:list" => Ok(SaslField::Response),
            "amqp:sasl-outcome:list" => Ok(SaslField::Outcome),
            other => Err(serde::de::Error::custom(format!(
                "unrecognised SASL descriptor name {other}"
            ))),
        }
    }

    fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        match v {
            0x40 => Ok(SaslField::Mechanisms),
            0x41 => Ok(SaslField::Init),
            0x42 => Ok(SaslField::Challenge),
            0x43 => Ok(SaslField::Response),
            0x44 => Ok(SaslField::Outcome),
            other => Err(serde::de::Error::custom(format!(
                "unrecognised SASL descriptor code {other:#x}"
            ))),
        }
    }
}

impl<'de> serde::de::Deserialize<'de> for SaslField {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_identifier(SaslFieldVisitor)
    }
}

struct SaslFrameBodyVisitor;

impl<'de> serde::de::Visitor<'de> for SaslFrameBodyVisitor {
    type Value = SaslFrameBody;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("enum SASL frame body")
    }

    fn visit_enum<A>(self, data: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: serde::de::EnumAccess<'de>,
    {
        use serde::de::VariantAccess;
        let (field, variant) = data.variant()?;
        Ok(match field {
            SaslField::Mechanisms => SaslFrameBody::Mechanisms(variant.newtype_variant()?),
            SaslField::Init => SaslFrameBody::Init(variant.newtype_variant()?),
            SaslField::Challenge => SaslFrameBody::Challenge(variant.newtype_variant()?),
            SaslField::Response => SaslFrameBody::Response(variant.newtype_variant()?),
            SaslField::Outcome => SaslFrameBody::Outcome(variant.newtype_variant()?),
        })
    }
}

impl<'de> serde::de::Deserialize<'de> for SaslFrameBody {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        const VARIANTS: &[&str] = &[
            "amqp:sasl-mechanisms:list",
            "amqp:sasl-init:list",
            "amqp:sasl-challenge:list",
            "amqp:sasl-response:list",
            "amqp:sasl-outcome:list",
        ];
        deserializer.deserialize_enum("sasl::FrameBody", VARIANTS, SaslFrameBodyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqp_buffer::Chunk;

    #[test]
    fn empty_frame_round_trips() {
        let mut dst = BytesMut::new();
        encode_frame(Frame::empty(), u32::MAX, &mut dst).unwrap();
        assert_eq!(&dst[..], &[0x00, 0x00, 0x00, 0x08, 0x02, 0x00, 0x00, 0x00]);

        let mut composite = CompositeBuffer::new();
        composite.append(Chunk::wrap(dst.to_vec())).unwrap();
        let mut decoder = FrameDecoder::new();
        let frame = decoder.poll(&mut composite).unwrap().unwrap();
        assert_eq!(frame.channel, 0);
        assert!(matches!(frame.body, FrameBody::Empty));
    }

    #[test]
    fn decoder_reports_underrun_without_consuming() {
        let mut composite = CompositeBuffer::new();
        composite.append(Chunk::wrap(vec![0x00, 0x00, 0x00])).unwrap();
        let mut decoder = FrameDecoder::new();
        assert!(decoder.poll(&mut composite).unwrap().is_none());
        assert_eq!(composite.readable(), 3);
    }

    #[test]
    fn open_frame_round_trips() {
        let open = Open {
            container_id: "c1".into(),
            hostname: None,
            max_frame_size: Default::default(),
            channel_max: Default::default(),
            idle_time_out: None,
            outgoing_locales: None,
            incoming_locales: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };

        let mut dst = BytesMut::new();
        encode_frame(Frame::amqp(0, FrameBody::Open(open)), u32::MAX, &mut dst).unwrap();

        let mut composite = CompositeBuffer::new();
        composite.append(Chunk::wrap(dst.to_vec())).unwrap();
        let mut decoder = FrameDecoder::new();
        let frame = decoder.poll(&mut composite).unwrap().unwrap();
        match frame.body {
            FrameBody::Open(o) => assert_eq!(o.container_id, "c1"),
            other => panic!("expected Open, got {other:?}"),
        }
    }

    #[test]
    fn oversized_frame_is_rejected_at_encode() {
        let mut dst = BytesMut::new();
        let err = encode_frame(Frame::empty(), 4, &mut dst);
        assert!(err.is_err());
    }
}
