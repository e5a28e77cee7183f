//! Client-side SASL negotiation.
//!
//! Runs ahead of the AMQP connection proper when the transport announces a
//! SASL security layer. ANONYMOUS and PLAIN are always available; SCRAM-SHA-256
//! is available behind the `scram` feature.

use amqp_types::primitives::{Binary, Symbol};
use amqp_types::sasl::{SaslChallenge, SaslCode, SaslInit, SaslMechanisms, SaslOutcome, SaslResponse};
use bytes::BufMut;
use serde_bytes::ByteBuf;

use crate::error::{EngineError, Result};
use crate::frame::{Frame, FrameBody};
use crate::protocol_header::ProtocolHeader;

const ANONYMOUS: &str = "ANONYMOUS";
const PLAIN: &str = "PLAIN";
#[cfg(feature = "scram")]
const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

/// Credentials a client can authenticate with.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// No credentials; server must accept the ANONYMOUS mechanism.
    Anonymous,
    /// Username/password, sent as a PLAIN initial response.
    Plain {
        /// Authentication identity.
        username: String,
        /// Cleartext password.
        password: String,
    },
    /// Username/password, authenticated via SCRAM-SHA-256 instead of PLAIN.
    #[cfg(feature = "scram")]
    ScramSha256 {
        /// Authentication identity.
        username: String,
        /// Cleartext password.
        password: String,
    },
}

impl Credentials {
    fn mechanism(&self) -> Symbol {
        let name = match self {
            Credentials::Anonymous => ANONYMOUS,
            Credentials::Plain { .. } => PLAIN,
            #[cfg(feature = "scram")]
            Credentials::ScramSha256 { .. } => SCRAM_SHA_256,
        };
        Symbol::from(name)
    }

    fn plain_initial_response(username: &str, password: &str) -> Binary {
        let username = username.as_bytes();
        let password = password.as_bytes();
        let mut buf = Vec::with_capacity(username.len() + password.len() + 2);
        buf.put_u8(0);
        buf.put_slice(username);
        buf.put_u8(0);
        buf.put_slice(password);
        ByteBuf::from(buf)
    }
}

#[derive(Debug)]
enum Step {
    AwaitingHeader,
    AwaitingMechanisms,
    AwaitingOutcome,
    #[cfg(feature = "scram")]
    AwaitingScramChallenge,
    #[cfg(feature = "scram")]
    AwaitingScramOutcome,
    Done,
}

/// Outcome of feeding one inbound frame/header to the client.
pub enum Progress {
    /// Negotiation needs to emit more frames; caller should send them and
    /// keep driving.
    Continue(Vec<Frame>),
    /// The remote accepted authentication; the connection can proceed.
    Authenticated,
    /// The remote rejected authentication.
    Failed(SaslCode),
}

/// Drives the client side of SASL negotiation to completion.
pub struct SaslClient {
    credentials: Credentials,
    hostname: Option<String>,
    step: Step,
    #[cfg(feature = "scram")]
    scram: Option<crate::scram::ScramSha256>,
}

impl SaslClient {
    /// Starts a negotiation for the given credentials.
    pub fn new(credentials: Credentials, hostname: Option<String>) -> Self {
        Self {
            credentials,
            hostname,
            step: Step::AwaitingHeader,
            #[cfg(feature = "scram")]
            scram: None,
        }
    }

    /// The protocol header to send to start SASL negotiation.
    pub fn header(&self) -> ProtocolHeader {
        ProtocolHeader::sasl()
    }

    /// Call once the remote's SASL protocol header has arrived.
    pub fn on_header(&mut self, header: &ProtocolHeader) -> Result<()> {
        if !matches!(self.step, Step::AwaitingHeader) {
            return Err(EngineError::ProtocolViolation(
                "unexpected SASL header".into(),
            ));
        }
        if !header.is_supported_version() {
            return Err(EngineError::SaslFailed(
                "remote announced an unsupported SASL version".into(),
            ));
        }
        self.step = Step::AwaitingMechanisms;
        Ok(())
    }

    /// Feeds one SASL frame to the state machine.
    pub fn on_frame(&mut self, body: FrameBody) -> Result<Progress> {
        match (&self.step, body) {
            (Step::AwaitingMechanisms, FrameBody::SaslMechanisms(mechanisms)) => {
                self.handle_mechanisms(mechanisms)
            }
            #[cfg(feature = "scram")]
            (Step::AwaitingScramChallenge, FrameBody::SaslChallenge(challenge)) => {
                self.handle_scram_challenge(challenge)
            }
            (Step::AwaitingOutcome, FrameBody::SaslOutcome(outcome))
            | (Step::AwaitingScramOutcome, FrameBody::SaslOutcome(outcome)) => {
                self.handle_outcome(outcome)
            }
            (_, other) => Err(EngineError::ProtocolViolation(format!(
                "unexpected SASL frame {other:?} in state {:?}",
                self.step
            ))),
        }
    }

    fn handle_mechanisms(&mut self, mechanisms: SaslMechanisms) -> Result<Progress> {
        let wanted = self.credentials.mechanism();
        if !mechanisms.sasl_server_mechanisms.contains(&wanted) {
            return Err(EngineError::SaslFailed(format!(
                "server does not support mechanism {wanted}"
            )));
        }

        let (initial_response, next) = match &self.credentials {
            Credentials::Anonymous => (None, Step::AwaitingOutcome),
            Credentials::Plain { username, password } => (
                Some(Credentials::plain_initial_response(username, password)),
                Step::AwaitingOutcome,
            ),
            #[cfg(feature = "scram")]
            Credentials::ScramSha256 { username, password } => {
                let mut client = crate::scram::ScramSha256::new(username.clone(), password.clone());
                let first = client.client_first_message();
                self.scram = Some(client);
                (Some(ByteBuf::from(first.to_vec())), Step::AwaitingScramChallenge)
            }
        };

        let init = SaslInit {
            mechanism: wanted,
            initial_response,
            hostname: self.hostname.clone(),
        };
        self.step = next;
        Ok(Progress::Continue(vec![Frame::amqp(
            0,
            FrameBody::SaslInit(init),
        )]))
    }

    #[cfg(feature = "scram")]
    fn handle_scram_challenge(&mut self, challenge: SaslChallenge) -> Result<Progress> {
        let client = self
            .scram
            .as_mut()
            .ok_or_else(|| EngineError::SaslFailed("SCRAM state missing".into()))?;
        let response = client.client_final_message(&challenge.challenge)?;
        self.step = Step::AwaitingScramOutcome;
        Ok(Progress::Continue(vec![Frame::amqp(
            0,
            FrameBody::SaslResponse(SaslResponse {
                response: ByteBuf::from(response),
            }),
        )]))
    }

    fn handle_outcome(&mut self, outcome: SaslOutcome) -> Result<Progress> {
        if matches!(outcome.code, SaslCode::Ok) {
            #[cfg(feature = "scram")]
            if let Some(client) = self.scram.as_mut() {
                if let Some(data) = &outcome.additional_data {
                    client.validate_server_final(data)?;
                }
            }
            self.step = Step::Done;
            Ok(Progress::Authenticated)
        } else {
            self.step = Step::Done;
            Ok(Progress::Failed(outcome.code))
        }
    }

    /// True once negotiation has reached a terminal state.
    pub fn is_done(&self) -> bool {
        matches!(self.step, Step::Done)
    }
}
