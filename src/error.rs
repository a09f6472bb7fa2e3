//! Canonical error and result types for the crate.
//!
//! The engine resolves protocol-level conditions internally and exposes only
//! two observable failure surfaces: a [`BoshError`] raised from `send` (and
//! related calls) once the session is void, and the asynchronous
//! connection-status notification carrying a [`TerminationCause`].

use std::fmt;

use thiserror::Error;

use crate::condition::TerminalBindingCondition;

/// Why a session became permanently void.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TerminationCause {
    /// The connection manager reported a terminal binding condition.
    Condition(TerminalBindingCondition),
    /// A legacy connection manager answered with an HTTP error status,
    /// which voids the session regardless of body content.
    LegacyHttpError(u16),
    /// The remote endpoint violated the protocol (for example, a session
    /// creation response without a `sid`).
    ProtocolViolation(String),
    /// The underlying transport failed beyond the retry ceiling.
    Transport(String),
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condition(condition) => f.write_str(condition.message()),
            Self::LegacyHttpError(status) => {
                write!(f, "HTTP error {status} from a legacy connection manager")
            }
            Self::ProtocolViolation(detail) => write!(f, "protocol violation: {detail}"),
            Self::Transport(detail) => write!(f, "transport failure: {detail}"),
        }
    }
}

/// Errors surfaced by [`crate::BoshClient`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BoshError {
    /// The session was voided by a terminal condition; the cause is carried
    /// by every subsequent rejection.
    #[error("session terminated: {cause}")]
    Terminated {
        /// What voided the session.
        cause: TerminationCause,
    },
    /// The session was closed normally and accepts no further sends.
    #[error("session closed")]
    Closed,
}

/// Canonical result alias used by public APIs.
pub type Result<T> = std::result::Result<T, BoshError>;
