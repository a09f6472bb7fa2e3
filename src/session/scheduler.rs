//! Request correlation and connection-slot accounting.
//!
//! The outstanding set is the session-level record of sent-but-unconfirmed
//! requests, ordered by request id. Arrival of an HTTP response body marks a
//! request as responded, but the request only leaves the set once every
//! earlier request has also been responded to; a recoverable error observed
//! before that point still invalidates it. The slot pool bounds how many
//! exchanges are in flight at once, with deliberate oversubscription during
//! retransmission bursts so a burst can never deadlock on its own limit.

use std::collections::BTreeMap;

use rand::Rng;

use crate::body::Body;

/// Upper bound on request ids (2^53, the interoperable ceiling for the
/// attribute value).
const MAX_RID: u64 = 1 << 53;

/// Seed the first request id, leaving headroom so the sequence cannot reach
/// [`MAX_RID`] within any realistic session.
pub(crate) fn seed_initial_rid(explicit: Option<u64>) -> u64 {
    explicit.unwrap_or_else(|| rand::thread_rng().gen_range(1..MAX_RID / 2))
}

/// One dispatched request awaiting session-level confirmation.
#[derive(Debug, Clone)]
pub(crate) struct OutstandingRequest {
    /// Request id, unique and strictly increasing within the session.
    pub rid: u64,
    /// Wire body exactly as dispatched; retransmission reuses it unchanged.
    pub body: Body,
    /// Dispatch count, starting at 1. A response carrying a stale attempt
    /// number belongs to a superseded exchange and is dropped.
    pub attempt: u32,
    /// Whether an HTTP response body has arrived for the latest attempt.
    pub responded: bool,
}

/// Rid-ordered set of outstanding requests.
#[derive(Debug, Default)]
pub(crate) struct OutstandingSet {
    entries: BTreeMap<u64, OutstandingRequest>,
}

impl OutstandingSet {
    pub(crate) fn insert(&mut self, request: OutstandingRequest) {
        self.entries.insert(request.rid, request);
    }

    pub(crate) fn get(&self, rid: u64) -> Option<&OutstandingRequest> { self.entries.get(&rid) }

    pub(crate) fn get_mut(&mut self, rid: u64) -> Option<&mut OutstandingRequest> {
        self.entries.get_mut(&rid)
    }

    /// Record that the latest attempt for `rid` received its response.
    pub(crate) fn mark_responded(&mut self, rid: u64) {
        if let Some(request) = self.entries.get_mut(&rid) {
            request.responded = true;
        }
    }

    /// Confirm responded requests from the front of the rid order, removing
    /// and returning them. A request behind an unresponded one stays put:
    /// confirmation is contiguous, never skipping.
    pub(crate) fn confirm_front(&mut self) -> Vec<u64> {
        let mut confirmed = Vec::new();
        while let Some((&rid, request)) = self.entries.iter().next() {
            if !request.responded {
                break;
            }
            self.entries.remove(&rid);
            confirmed.push(rid);
        }
        confirmed
    }

    /// Ascending-rid snapshot of everything still awaiting confirmation.
    pub(crate) fn unconfirmed_in_order(&self) -> Vec<u64> {
        self.entries.keys().copied().collect()
    }

    pub(crate) fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub(crate) fn clear(&mut self) { self.entries.clear(); }
}

/// Bounded pool of permitted concurrent exchanges.
#[derive(Debug)]
pub(crate) struct SlotPool {
    limit: usize,
    busy: usize,
}

impl SlotPool {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            busy: 0,
        }
    }

    /// Adopt the limit negotiated via the `requests` attribute.
    pub(crate) fn set_limit(&mut self, limit: usize) { self.limit = limit.max(1); }

    pub(crate) fn limit(&self) -> usize { self.limit }

    pub(crate) fn in_flight(&self) -> usize { self.busy }

    /// Acquire a slot for a normal dispatch, failing at the limit.
    pub(crate) fn try_acquire(&mut self) -> bool {
        if self.busy < self.limit {
            self.busy += 1;
            true
        } else {
            false
        }
    }

    /// Acquire a slot for a retransmission, allowing transient
    /// oversubscription past the limit.
    pub(crate) fn acquire_oversubscribed(&mut self) { self.busy += 1; }

    pub(crate) fn release(&mut self) { self.busy = self.busy.saturating_sub(1); }
}
