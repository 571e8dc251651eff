//! ---
//! scs_section: "03-session-liveness"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Session registries, watchdogs, and liveness tracking."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use r_scs_wire::LinkResult;
use tracing::{debug, info, warn};

use crate::session::Session;

#[derive(Debug)]
struct PeerEntry {
    remote_port: u16,
    session: Session,
}

/// Supervisor-side registry arbitrating LINK_REQ traffic and tracking one
/// session per spoke.
#[derive(Debug)]
pub struct LinkRegistry {
    watchdog_timeout: Duration,
    inner: Mutex<HashMap<u32, PeerEntry>>,
}

/// Emitted by [`LinkRegistry::sweep`] when a spoke's watchdog expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeout {
    /// Unit id whose session lapsed.
    pub peer_id: u32,
    /// Port the peer was last heard on.
    pub remote_port: u16,
}

impl LinkRegistry {
    /// Create an empty registry with the given per-session watchdog timeout.
    pub fn new(watchdog_timeout: Duration) -> Self {
        Self {
            watchdog_timeout,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Arbitrate a LINK_REQ from `peer_id` heard on `remote_port`.
    ///
    /// * `Allow` — no session exists, or the peer is re-linking from the
    ///   port we already know it by (a rebooted spoke restarts its handshake).
    /// * `Collision` — a live session for this unit id exists on a different
    ///   port; the first claimant keeps the id.
    /// * `Deny` — the unit id is invalid.
    pub fn handle_link_request(&self, peer_id: u32, remote_port: u16, now: Instant) -> LinkResult {
        if peer_id == 0 {
            warn!(remote_port, "denying link request with invalid unit id 0");
            return LinkResult::Deny;
        }
        let mut inner = self.inner.lock();
        match inner.get_mut(&peer_id) {
            Some(entry) if entry.session.is_linked() && entry.remote_port != remote_port => {
                warn!(
                    peer_id,
                    held_by = entry.remote_port,
                    claimed_by = remote_port,
                    "link collision"
                );
                LinkResult::Collision
            }
            Some(entry) => {
                entry.remote_port = remote_port;
                entry.session.mark_linked(now);
                debug!(peer_id, remote_port, "peer re-linked");
                LinkResult::Allow
            }
            None => {
                let mut session = Session::new(peer_id, self.watchdog_timeout);
                session.mark_linked(now);
                inner.insert(
                    peer_id,
                    PeerEntry {
                        remote_port,
                        session,
                    },
                );
                info!(peer_id, remote_port, "peer linked");
                LinkResult::Allow
            }
        }
    }

    /// Account for a valid inbound frame from an established session.
    ///
    /// Returns `false` for unknown peers and for stale sequence reruns.
    pub fn touch(&self, peer_id: u32, seq: u32, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        match inner.get_mut(&peer_id) {
            Some(entry) => entry.session.accept(seq, now),
            None => {
                debug!(peer_id, "frame from unlinked peer ignored");
                false
            }
        }
    }

    /// Record a keep-alive round-trip estimate for a peer.
    pub fn record_rtt(&self, peer_id: u32, rtt: Duration) {
        if let Some(entry) = self.inner.lock().get_mut(&peer_id) {
            entry.session.record_rtt(rtt);
        }
    }

    /// Latest round-trip estimate for a peer.
    pub fn rtt(&self, peer_id: u32) -> Option<Duration> {
        self.inner.lock().get(&peer_id).and_then(|e| e.session.rtt())
    }

    /// Tear down a session on an orderly CLOSE. Returns whether it existed.
    pub fn close(&self, peer_id: u32) -> bool {
        let removed = self.inner.lock().remove(&peer_id).is_some();
        if removed {
            info!(peer_id, "session closed by peer");
        }
        removed
    }

    /// Observe every session watchdog, removing and reporting expired peers.
    pub fn sweep(&self, now: Instant) -> Vec<SessionTimeout> {
        let mut inner = self.inner.lock();
        let mut expired = Vec::new();
        inner.retain(|peer_id, entry| {
            if entry.session.timed_out(now) {
                warn!(peer_id, remote_port = entry.remote_port, "session watchdog expired");
                expired.push(SessionTimeout {
                    peer_id: *peer_id,
                    remote_port: entry.remote_port,
                });
                false
            } else {
                true
            }
        });
        expired
    }

    /// Whether a live session exists for the given unit id.
    pub fn is_linked(&self, peer_id: u32) -> bool {
        self.inner
            .lock()
            .get(&peer_id)
            .map_or(false, |e| e.session.is_linked())
    }

    /// Port a linked peer was last heard on.
    pub fn remote_port(&self, peer_id: u32) -> Option<u16> {
        self.inner.lock().get(&peer_id).map(|e| e.remote_port)
    }

    /// Unit ids of every live session.
    pub fn linked_peers(&self) -> Vec<u32> {
        self.inner.lock().keys().copied().collect()
    }
}
