//! Transport collaborator contract.
//!
//! The engine never performs HTTP itself. It hands each wire [`Body`] to an
//! injected [`Transport`] and consumes the exchange result asynchronously.
//! Exchanges dispatched concurrently may complete in any order; the engine
//! correlates responses by request id, never by connection identity.

use async_trait::async_trait;
use thiserror::Error;

use crate::body::Body;

/// Result of one completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code of the response.
    pub status: u16,
    /// Parsed `<body/>` wrapper of the response.
    pub body: Body,
}

impl TransportResponse {
    /// Construct a response from its status and body.
    #[must_use]
    pub fn new(status: u16, body: Body) -> Self { Self { status, body } }
}

/// Failure of the exchange itself, before any response body was obtained.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// Network-level failure.
    #[error("transport I/O failure: {0}")]
    Io(#[from] std::io::Error),
    /// The exchange did not complete within the transport's deadline.
    #[error("request timed out")]
    Timeout,
    /// Any other transport-defined failure.
    #[error("{0}")]
    Other(String),
}

/// One-exchange-at-a-time HTTP collaborator.
///
/// Implementations must tolerate multiple concurrent `dispatch` calls (one
/// per connection slot) completing out of order.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Perform one request/response exchange for `body`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the exchange could not complete at
    /// all; an HTTP error status is not a transport error and is reported
    /// through [`TransportResponse::status`].
    async fn dispatch(&self, body: &Body) -> Result<TransportResponse, TransportError>;

    /// Whether the active connection mode can pipeline several exchanges on
    /// one physical connection. The engine only bounds slot usage; it is
    /// otherwise agnostic to this distinction.
    fn pipelining(&self) -> bool { false }
}
