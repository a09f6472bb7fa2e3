//! Session negotiation parameters proposed by the client.

/// Client-side configuration for one BOSH session.
///
/// `hold` and `wait` are proposals; the connection manager may tighten them
/// in its creation response. The concurrency limit defaults to `hold + 1`
/// until a `requests` attribute overrides it.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Target domain for the session creation request, when addressed.
    pub to: Option<String>,
    /// Proposed number of requests the connection manager may hold open.
    pub hold: u16,
    /// Proposed longest time, in seconds, a request may be held open.
    pub wait: u16,
    /// Protocol version offered in the creation request.
    pub ver: String,
    /// Transport-failure retry ceiling per request; exceeding it voids the
    /// session with a transport cause.
    pub max_attempts: u32,
    /// Explicit first request id, overriding random seeding. Intended for
    /// deterministic tests.
    pub initial_rid: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            to: None,
            hold: 1,
            wait: 60,
            ver: "1.11".to_owned(),
            max_attempts: 3,
            initial_rid: None,
        }
    }
}

impl SessionConfig {
    /// Address the session creation request to `domain`.
    #[must_use]
    pub fn with_to(mut self, domain: impl Into<String>) -> Self {
        self.to = Some(domain.into());
        self
    }

    /// Propose a different `hold` value.
    #[must_use]
    pub fn with_hold(mut self, hold: u16) -> Self {
        self.hold = hold;
        self
    }

    /// Propose a different `wait` value.
    #[must_use]
    pub fn with_wait(mut self, wait: u16) -> Self {
        self.wait = wait;
        self
    }

    /// Pin the first request id instead of seeding it randomly.
    #[must_use]
    pub fn with_initial_rid(mut self, rid: u64) -> Self {
        self.initial_rid = Some(rid);
        self
    }
}
