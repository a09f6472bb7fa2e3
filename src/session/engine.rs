//! Session lifecycle state machine.
//!
//! The engine owns every piece of shared mutable session state: lifecycle
//! phase, negotiated mode, the outstanding-request set, the pending queue,
//! and the slot pool. All mutations are serialized behind one lock held by
//! the client; the engine itself is synchronous and returns the side effects
//! (dispatches to launch, a connection event to publish) for the caller to
//! carry out after the lock is released.

use std::collections::VecDeque;

use tracing::{debug, error, warn};

use super::{
    config::SessionConfig,
    scheduler::{OutstandingRequest, OutstandingSet, SlotPool, seed_initial_rid},
};
use crate::{
    body::{Body, attributes},
    classifier::{ProtocolMode, Verdict, classify},
    error::{BoshError, TerminationCause},
    events::ConnectionEvent,
    transport::{TransportError, TransportResponse},
};

/// Lifecycle phase of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionState {
    /// No request sent yet.
    Created,
    /// Session creation request is in flight.
    AwaitingCreation,
    /// Session established; normal exchange.
    Active,
    /// Session over. `None` is a normal close; `Some` carries the fatal
    /// cause echoed by every later `send`.
    Terminated(Option<TerminationCause>),
}

/// A wire body ready to hand to the transport.
#[derive(Debug, Clone)]
pub(crate) struct Dispatch {
    pub rid: u64,
    pub attempt: u32,
    pub body: Body,
}

/// Side effects of one engine step, applied outside the lock.
///
/// Dispatches are ordered; the caller must emit request-sent notifications
/// and launch exchanges in exactly this order so observers can reconstruct
/// retransmission order deterministically.
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub dispatches: Vec<Dispatch>,
    pub connection: Option<ConnectionEvent>,
}

#[derive(Debug)]
struct PendingSend {
    rid: u64,
    body: Body,
}

#[derive(Debug)]
pub(crate) struct Engine {
    config: SessionConfig,
    state: SessionState,
    mode: Option<ProtocolMode>,
    sid: Option<String>,
    negotiated_wait: Option<u16>,
    next_rid: u64,
    outstanding: OutstandingSet,
    pending: VecDeque<PendingSend>,
    slots: SlotPool,
}

impl Engine {
    pub(crate) fn new(config: SessionConfig) -> Self {
        let next_rid = seed_initial_rid(config.initial_rid);
        let slots = SlotPool::new(usize::from(config.hold) + 1);
        Self {
            config,
            state: SessionState::Created,
            mode: None,
            sid: None,
            negotiated_wait: None,
            next_rid,
            outstanding: OutstandingSet::default(),
            pending: VecDeque::new(),
            slots,
        }
    }

    /// Assign the next rid to `body` and queue it for dispatch.
    ///
    /// The first enqueue turns into the session creation request; everything
    /// queued before activation waits for the creation response.
    pub(crate) fn enqueue(&mut self, body: Body) -> Result<(u64, Vec<Dispatch>), BoshError> {
        if let SessionState::Terminated(cause) = &self.state {
            return Err(terminated_error(cause));
        }
        let rid = self.next_rid;
        self.next_rid += 1;
        self.pending.push_back(PendingSend { rid, body });
        if self.state == SessionState::Created {
            self.state = SessionState::AwaitingCreation;
            debug!(rid, "initiating session");
        }
        Ok((rid, self.pump()))
    }

    /// Process one completed exchange.
    pub(crate) fn on_response(
        &mut self,
        rid: u64,
        attempt: u32,
        result: Result<TransportResponse, TransportError>,
    ) -> Outcome {
        if matches!(self.state, SessionState::Terminated(_)) {
            return Outcome::default();
        }
        self.slots.release();
        match self.outstanding.get(rid).map(|request| request.attempt) {
            None => return self.pump_outcome(),
            Some(current) if current != attempt => {
                // Superseded by a retransmission; the pending round already
                // covers this rid.
                debug!(rid, attempt, current, "dropping stale exchange");
                return self.pump_outcome();
            }
            Some(_) => {}
        }
        match result {
            Err(err) => self.on_transport_failure(rid, &err),
            Ok(response) => {
                let mode = self.effective_mode(&response);
                match classify(mode, response.status, &response.body) {
                    Verdict::Success => self.on_success(rid, &response, mode),
                    Verdict::Recoverable => {
                        warn!(rid, "recoverable error reported; retransmitting outstanding set");
                        self.retransmit_round()
                    }
                    Verdict::Terminal(cause) => self.terminate(cause),
                }
            }
        }
    }

    /// Graceful close: emit a session-end marker when the session is live,
    /// then stop accepting sends. Idempotent.
    pub(crate) fn close(&mut self) -> Outcome {
        match self.state {
            SessionState::Terminated(_) => Outcome::default(),
            SessionState::Created => {
                self.state = SessionState::Terminated(None);
                Outcome {
                    dispatches: Vec::new(),
                    connection: Some(disconnected(None)),
                }
            }
            SessionState::AwaitingCreation | SessionState::Active => {
                let dispatches = self.terminate_marker().into_iter().collect();
                self.state = SessionState::Terminated(None);
                self.outstanding.clear();
                self.pending.clear();
                debug!("session closed");
                Outcome {
                    dispatches,
                    connection: Some(disconnected(None)),
                }
            }
        }
    }

    pub(crate) fn state(&self) -> &SessionState { &self.state }

    #[cfg(test)]
    pub(crate) fn mode(&self) -> Option<ProtocolMode> { self.mode }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize { self.slots.in_flight() }

    /// The mode used to classify `response`: the negotiated one, or, for the
    /// creation response itself, the mode its `ver` attribute selects.
    fn effective_mode(&self, response: &TransportResponse) -> ProtocolMode {
        self.mode.unwrap_or_else(|| {
            if response.body.attribute(&attributes::VER).is_some() {
                ProtocolMode::Modern
            } else {
                ProtocolMode::Legacy
            }
        })
    }

    fn on_success(
        &mut self,
        rid: u64,
        response: &TransportResponse,
        mode: ProtocolMode,
    ) -> Outcome {
        if self.state == SessionState::AwaitingCreation {
            return self.activate(rid, response, mode);
        }
        self.outstanding.mark_responded(rid);
        let confirmed = self.outstanding.confirm_front();
        if !confirmed.is_empty() {
            debug!(?confirmed, "requests acknowledged");
        }
        self.pump_outcome()
    }

    /// Consume the session creation response and move to `Active`.
    fn activate(&mut self, rid: u64, response: &TransportResponse, mode: ProtocolMode) -> Outcome {
        let Some(sid) = response.body.attribute(&attributes::SID) else {
            return self.terminate(TerminationCause::ProtocolViolation(
                "session creation response carries no 'sid'".to_owned(),
            ));
        };
        self.sid = Some(sid.to_owned());
        self.mode = Some(mode);
        self.negotiated_wait = response
            .body
            .attribute(&attributes::WAIT)
            .and_then(|value| value.parse().ok());
        if let Some(requests) = response
            .body
            .attribute(&attributes::REQUESTS)
            .and_then(|value| value.parse::<usize>().ok())
        {
            self.slots.set_limit(requests);
        }
        self.state = SessionState::Active;
        self.outstanding.mark_responded(rid);
        self.outstanding.confirm_front();
        debug!(sid, ?mode, requests = self.slots.limit(), "session established");
        let mut outcome = self.pump_outcome();
        outcome.connection = Some(ConnectionEvent {
            connected: true,
            cause: None,
        });
        outcome
    }

    /// Re-dispatch every unconfirmed request in ascending rid order.
    ///
    /// The wire bodies are reused unchanged and the round may oversubscribe
    /// the slot pool; blocking a retransmission burst on its own slot limit
    /// would deadlock the session.
    fn retransmit_round(&mut self) -> Outcome {
        let rids = self.outstanding.unconfirmed_in_order();
        let mut dispatches = Vec::with_capacity(rids.len());
        for rid in rids {
            if let Some(request) = self.outstanding.get_mut(rid) {
                request.attempt += 1;
                request.responded = false;
                self.slots.acquire_oversubscribed();
                dispatches.push(Dispatch {
                    rid,
                    attempt: request.attempt,
                    body: request.body.clone(),
                });
            }
        }
        debug!(count = dispatches.len(), "retransmission round");
        Outcome {
            dispatches,
            connection: None,
        }
    }

    fn on_transport_failure(&mut self, rid: u64, err: &TransportError) -> Outcome {
        // A legacy endpoint offers no body-level recovery signalling, so a
        // failed exchange there is unrecoverable.
        if self.mode == Some(ProtocolMode::Legacy) {
            return self.terminate(TerminationCause::Transport(err.to_string()));
        }
        let exhausted = self
            .outstanding
            .get(rid)
            .is_some_and(|request| request.attempt >= self.config.max_attempts);
        if exhausted {
            return self.terminate(TerminationCause::Transport(err.to_string()));
        }
        warn!(rid, %err, "exchange failed; retransmitting outstanding set");
        self.retransmit_round()
    }

    fn terminate(&mut self, cause: TerminationCause) -> Outcome {
        error!(%cause, "session terminated");
        self.state = SessionState::Terminated(Some(cause.clone()));
        self.outstanding.clear();
        self.pending.clear();
        Outcome {
            dispatches: Vec::new(),
            connection: Some(disconnected(Some(cause))),
        }
    }

    /// Build the `type="terminate"` marker for a graceful close, when the
    /// session got far enough to address one.
    fn terminate_marker(&mut self) -> Option<Dispatch> {
        let sid = self.sid.clone()?;
        let rid = self.next_rid;
        self.next_rid += 1;
        let body = Body::builder()
            .attribute(attributes::TYPE.clone(), "terminate")
            .attribute(attributes::RID.clone(), rid.to_string())
            .attribute(attributes::SID.clone(), sid)
            .build();
        self.slots.acquire_oversubscribed();
        Some(Dispatch {
            rid,
            attempt: 1,
            body,
        })
    }

    /// Dispatch queued sends while slots and lifecycle phase allow.
    fn pump(&mut self) -> Vec<Dispatch> {
        let mut dispatches = Vec::new();
        loop {
            match self.state {
                SessionState::Active => {}
                // Exactly one request (the creation request) may be in
                // flight before the session is established.
                SessionState::AwaitingCreation
                    if self.outstanding.is_empty() && dispatches.is_empty() => {}
                _ => break,
            }
            if self.pending.is_empty() || !self.slots.try_acquire() {
                break;
            }
            let Some(send) = self.pending.pop_front() else {
                break;
            };
            let body = self.wire_body(&send);
            self.outstanding.insert(OutstandingRequest {
                rid: send.rid,
                body: body.clone(),
                attempt: 1,
                responded: false,
            });
            debug!(rid = send.rid, "dispatching request");
            dispatches.push(Dispatch {
                rid: send.rid,
                attempt: 1,
                body,
            });
            if self.state == SessionState::AwaitingCreation {
                break;
            }
        }
        dispatches
    }

    fn pump_outcome(&mut self) -> Outcome {
        Outcome {
            dispatches: self.pump(),
            connection: None,
        }
    }

    /// Stamp the session-level attributes onto a caller body. Before a `sid`
    /// exists this is the creation request and carries the negotiation
    /// proposal instead.
    fn wire_body(&self, send: &PendingSend) -> Body {
        let mut body = send
            .body
            .with_attribute(attributes::RID.clone(), send.rid.to_string());
        if let Some(sid) = &self.sid {
            body = body.with_attribute(attributes::SID.clone(), sid.clone());
        } else {
            body = body
                .with_attribute(attributes::WAIT.clone(), self.config.wait.to_string())
                .with_attribute(attributes::HOLD.clone(), self.config.hold.to_string())
                .with_attribute(attributes::VER.clone(), self.config.ver.clone());
            if let Some(to) = &self.config.to {
                body = body.with_attribute(attributes::TO.clone(), to.clone());
            }
        }
        body
    }
}

fn terminated_error(cause: &Option<TerminationCause>) -> BoshError {
    match cause {
        Some(cause) => BoshError::Terminated {
            cause: cause.clone(),
        },
        None => BoshError::Closed,
    }
}

fn disconnected(cause: Option<TerminationCause>) -> ConnectionEvent {
    ConnectionEvent {
        connected: false,
        cause,
    }
}
