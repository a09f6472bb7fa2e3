//! Terminal binding conditions.
//!
//! XEP-0124 §17.2 defines a closed set of fatal, session-ending conditions a
//! connection manager may report via `type="terminate"`. Each carries a fixed
//! wire name and a fixed human-readable message; the message surfaces in
//! connection-status notifications and in errors raised from later sends.

use std::fmt;

/// A named fatal condition that permanently voids a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalBindingCondition {
    /// The request format was unacceptable to the connection manager.
    BadRequest,
    /// The target host is no longer serviced by the connection manager.
    HostGone,
    /// The target host is unknown to the connection manager.
    HostUnknown,
    /// A required `to` or `route` attribute was missing or empty.
    ImproperAddressing,
    /// The connection manager hit an internal error servicing the request.
    InternalServerError,
    /// A session, stream, rid, or key referenced by the request is invalid.
    ItemNotFound,
    /// A concurrently processed request terminated the session.
    OtherRequest,
    /// The client broke the session rules.
    PolicyViolation,
    /// The connection manager lost (or could not establish) its connection
    /// to the server.
    RemoteConnectionFailed,
    /// A fatal error in the transported protocol.
    RemoteStreamError,
    /// The connection manager does not operate at this URI.
    SeeOtherUri,
    /// The connection manager is shutting down all sessions.
    SystemShutdown,
    /// An error outside the set defined by the protocol.
    UndefinedCondition,
}

impl TerminalBindingCondition {
    /// All conditions, in wire-name order.
    pub const ALL: [Self; 13] = [
        Self::BadRequest,
        Self::HostGone,
        Self::HostUnknown,
        Self::ImproperAddressing,
        Self::InternalServerError,
        Self::ItemNotFound,
        Self::OtherRequest,
        Self::PolicyViolation,
        Self::RemoteConnectionFailed,
        Self::RemoteStreamError,
        Self::SeeOtherUri,
        Self::SystemShutdown,
        Self::UndefinedCondition,
    ];

    /// The `condition` attribute value naming this condition on the wire.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::BadRequest => "bad-request",
            Self::HostGone => "host-gone",
            Self::HostUnknown => "host-unknown",
            Self::ImproperAddressing => "improper-addressing",
            Self::InternalServerError => "internal-server-error",
            Self::ItemNotFound => "item-not-found",
            Self::OtherRequest => "other-request",
            Self::PolicyViolation => "policy-violation",
            Self::RemoteConnectionFailed => "remote-connection-failed",
            Self::RemoteStreamError => "remote-stream-error",
            Self::SeeOtherUri => "see-other-uri",
            Self::SystemShutdown => "system-shutdown",
            Self::UndefinedCondition => "undefined-condition",
        }
    }

    /// Fixed human-readable description of this condition.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::BadRequest => {
                "The format of an HTTP header or binding element received from \
                 the client is unacceptable"
            }
            Self::HostGone => {
                "The target domain or host addressed by the request is no \
                 longer serviced by the connection manager"
            }
            Self::HostUnknown => {
                "The target domain or host addressed by the request is unknown \
                 to the connection manager"
            }
            Self::ImproperAddressing => {
                "The initialization element lacks a 'to' or 'route' attribute \
                 but the connection manager requires one"
            }
            Self::InternalServerError => {
                "The connection manager has experienced an internal error that \
                 prevents it from servicing the request"
            }
            Self::ItemNotFound => {
                "The session, stream, request id, or key referenced by the \
                 request could not be found"
            }
            Self::OtherRequest => {
                "Another request being processed at the same time as this \
                 request caused the session to terminate"
            }
            Self::PolicyViolation => {
                "The client has broken the session rules (polling or \
                 requesting too frequently, or too many simultaneous requests)"
            }
            Self::RemoteConnectionFailed => {
                "The connection manager was unable to connect to, or has lost \
                 its connection to, the server"
            }
            Self::RemoteStreamError => {
                "Encapsulates a fatal error of the protocol being transported"
            }
            Self::SeeOtherUri => {
                "The connection manager does not operate at this URI"
            }
            Self::SystemShutdown => {
                "The connection manager is being shut down and all active \
                 sessions are being terminated"
            }
            Self::UndefinedCondition => {
                "An unknown or unspecified terminal binding condition occurred"
            }
        }
    }

    /// Look up a condition from its wire name.
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.wire_name() == name)
    }
}

impl fmt::Display for TerminalBindingCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
