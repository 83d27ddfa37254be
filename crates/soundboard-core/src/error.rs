//! Error taxonomy surfaced by the coordinator and its collaborators.
//!
//! Sink failures during a stream are not errors at this level: they are logged and handled
//! like a normal completion (see [`crate::sink::SinkError`]).

use std::fmt;

/// Connection-level failures. The rejected operation leaves coordinator state unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The operation needs a connected sink.
    NotConnected,
    /// `connect` was called while already connected.
    AlreadyConnected,
    /// No output channel with the requested name exists.
    ChannelNotFound { channel: String },
    /// The sink could not be reached to look up channels.
    Unavailable { reason: String },
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::NotConnected => write!(f, "not connected to an output channel"),
            ConnectionError::AlreadyConnected => write!(f, "already connected to an output channel"),
            ConnectionError::ChannelNotFound { channel } => {
                write!(f, "output channel not found: {channel}")
            }
            ConnectionError::Unavailable { reason } => write!(f, "output unavailable: {reason}"),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Errors returned through a [`crate::coordinator::CoordinatorHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    Connection(ConnectionError),
    /// The coordinator worker has shut down.
    Offline,
}

impl From<ConnectionError> for CoordinatorError {
    fn from(err: ConnectionError) -> Self {
        CoordinatorError::Connection(err)
    }
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorError::Connection(err) => err.fmt(f),
            CoordinatorError::Offline => write!(f, "playback coordinator offline"),
        }
    }
}

impl std::error::Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoordinatorError::Connection(err) => Some(err),
            CoordinatorError::Offline => None,
        }
    }
}

/// A quick-sound label has no assigned resource; the caller should prompt for one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingResource {
    pub label: String,
}

impl fmt::Display for MissingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no sound assigned to {}", self.label)
    }
}

impl std::error::Error for MissingResource {}
