//! Error kinds produced while decoding frames or driving the protocol engine.

use amqp_types::definitions::Error as AmqpError;

/// Errors surfaced by the engine, its component codecs, and the client facade.
///
/// These map onto the error kinds the engine is required to distinguish: a
/// protocol violation or decode error is always fatal to the component where
/// it was detected (link, session, or connection), while timeouts and
/// resource-exhaustion errors are local to the failed operation and leave
/// engine state untouched.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A frame header or protocol header could not be parsed.
    #[error("framing error: {0}")]
    Framing(String),

    /// The AMQP type codec rejected a performative or value.
    #[error("codec error: {0}")]
    Codec(#[from] amqp_codec::Error),

    /// A buffer operation failed (out of range, duplicate constituent, capacity).
    #[error("buffer error: {0}")]
    Buffer(#[from] amqp_buffer::Error),

    /// A performative arrived that violates the state machine for its component.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The SASL negotiation could not complete.
    #[error("sasl negotiation failed: {0}")]
    SaslFailed(String),

    /// A facade operation did not complete before its deadline.
    #[error("operation timed out")]
    Timeout,

    /// The remote peer closed the affected scope with an error condition.
    #[error("remote closed with error: {0:?}")]
    RemoteClosed(AmqpError),

    /// A local resource limit was hit (handle-max, window, buffer capacity).
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The remote aborted an in-flight delivery.
    #[error("delivery aborted by remote")]
    AbortedDelivery,

    /// The connection has already failed and refuses further input.
    #[error("engine has failed and refuses further input")]
    EngineFailed,

    /// The engine shut down while the operation was still pending.
    #[error("engine shut down")]
    ShutDown,
}

/// Convenience alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
