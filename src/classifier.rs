//! Response classification.
//!
//! Classifies each completed exchange as an acknowledgment, a recoverable
//! error requiring retransmission, or a terminal condition voiding the
//! session. Classification is a pure function of the negotiated protocol
//! mode, the HTTP status, and the response body's `type`/`condition`
//! attributes; the lifecycle controller routes the verdict.

use crate::{
    body::{Body, attributes},
    condition::TerminalBindingCondition,
    error::TerminationCause,
};

/// Behavioural variant selected once, at session creation.
///
/// A connection manager that negotiates the version attribute (`ver` present
/// in its creation response) follows modern semantics: only body-level
/// signalling is authoritative. One that predates version negotiation is a
/// legacy endpoint whose HTTP error statuses void the session outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMode {
    /// Pre-version-negotiation connection manager.
    Legacy,
    /// Version-negotiating connection manager.
    Modern,
}

/// Verdict on one classified response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The request is acknowledged; normal processing continues.
    Success,
    /// The connection manager reported a recoverable error; all outstanding
    /// requests must be retransmitted.
    Recoverable,
    /// The session is permanently void.
    Terminal(TerminationCause),
}

const TYPE_ERROR: &str = "error";
const TYPE_TERMINATE: &str = "terminate";

/// Classify one response.
///
/// Legacy sessions fold any HTTP error status into a terminal outcome before
/// the body is consulted. In modern sessions the transport status alone is
/// never authoritative: a well-formed body without an error or terminate
/// marker is a success even on an HTTP error status.
#[must_use]
pub fn classify(mode: ProtocolMode, status: u16, body: &Body) -> Verdict {
    if mode == ProtocolMode::Legacy && !is_success_status(status) {
        return Verdict::Terminal(TerminationCause::LegacyHttpError(status));
    }
    match body.attribute(&attributes::TYPE) {
        Some(TYPE_TERMINATE) => {
            let condition = body
                .attribute(&attributes::CONDITION)
                .and_then(TerminalBindingCondition::from_wire_name)
                .unwrap_or(TerminalBindingCondition::UndefinedCondition);
            Verdict::Terminal(TerminationCause::Condition(condition))
        }
        Some(TYPE_ERROR) => Verdict::Recoverable,
        _ => Verdict::Success,
    }
}

fn is_success_status(status: u16) -> bool { (200..300).contains(&status) }
