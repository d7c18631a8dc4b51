//! Error taxonomy for the broker adapter layer.
//!
//! Everything a caller can see synchronously is a [`BusError`]. Failures that
//! happen after a message was handed to the transport never show up here;
//! they are reported to the failure watcher instead.

use thiserror::Error;

/// Example of the header format accepted by the translator.
pub const HEADERS_FORMAT_EXAMPLE: &str = "foo:bar,bar:foo";

/// Top-level error returned by publishers, subscribers and the registry.
#[derive(Debug, Error)]
pub enum BusError {
    /// The event is structurally malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Event metadata could not be mapped onto a transport message.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// The operation needs a successful `connect()` first.
    #[error("not connected")]
    NotConnected,

    /// The registry slot for this role was never set.
    #[error("{0} not initialized")]
    NotInitialized(&'static str),

    /// A handler is already registered for this topic.
    #[error("topic {0} already has a handler")]
    AlreadySubscribed(String),

    /// Adapter configuration was rejected before connecting.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// An event failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid event: {field} {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl ValidationError {
    pub(crate) fn missing(field: &'static str) -> Self {
        Self {
            field,
            reason: "is required",
        }
    }
}

/// Failures while coercing event metadata into transport message fields.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    /// The metadata value has a kind the target field cannot accept.
    #[error("metadata {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// An integer does not fit into the target field.
    #[error("metadata {key}: {value} does not fit into {target}")]
    OutOfRange {
        key: String,
        value: i64,
        target: &'static str,
    },

    /// A float has no JSON form (NaN or infinite).
    #[error("metadata {key}: {value} cannot be encoded")]
    NonFinite { key: String, value: f64 },

    /// A string value does not follow the expected layout.
    #[error("metadata {key}: malformed entry {entry:?}, should be key:value. Example: {example}")]
    Format {
        key: String,
        entry: String,
        example: &'static str,
    },

    /// The event could not be serialized.
    #[error("encode event: {0}")]
    Encode(String),

    /// A received payload is not a valid encoded event.
    #[error("decode event: {0}")]
    Decode(String),
}

/// Invalid adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid config: {0}")]
pub struct ConfigError(pub String);

/// Opaque transport failure, at connect time or at send time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The broker cannot be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// The producer or consumer was already closed.
    #[error("transport closed")]
    Closed,

    /// The message names a partition the topic does not have.
    #[error("topic {topic} has no partition {partition}")]
    UnknownPartition { topic: String, partition: i32 },

    /// Error reported by a transport client library.
    #[error("client error: {0}")]
    Client(String),
}

/// Error type returned by subscription handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
