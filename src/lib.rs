#![doc(html_root_url = "https://docs.rs/boshwire/latest")]
//! Client-side engine for BOSH (Bidirectional-streams Over Synchronous
//! HTTP, XEP-0124).
//!
//! BOSH simulates a persistent bidirectional stream over a sequence of
//! synchronous HTTP request/response pairs, using long-polling to
//! approximate server push. This crate implements the client side of that
//! session: it establishes a session with a remote connection manager,
//! multiplexes outgoing payloads onto a bounded pool of concurrent
//! exchanges, correlates out-of-order responses back to their requests,
//! classifies protocol and transport errors, and deterministically
//! retransmits unacknowledged data after a recoverable error.
//!
//! The HTTP transport itself and the XML parsing of payload contents are
//! collaborators behind the [`Transport`] and [`Body`] seams; the engine is
//! in-memory and session-scoped.

pub mod body;
pub mod classifier;
pub mod condition;
pub mod error;
pub mod events;
pub mod session;
pub mod transport;

pub use body::{BOSH_XMLNS, Body, BodyBuilder, BodyQName};
pub use classifier::{ProtocolMode, Verdict, classify};
pub use condition::TerminalBindingCondition;
pub use error::{BoshError, Result, TerminationCause};
pub use events::{ConnectionEvent, ConnectionListener, ListenerId, RequestListener};
pub use session::{BoshClient, SessionConfig};
pub use transport::{Transport, TransportError, TransportResponse};
