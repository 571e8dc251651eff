//! ---
//! scs_section: "03-session-liveness"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Session registries, watchdogs, and liveness tracking."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use tracing::debug;

use crate::watchdog::Watchdog;

/// Per-peer session state as seen from one side of an edge.
///
/// A session exists between link and close. The watchdog, sequence
/// expectations, and RTT estimate all reset when the link drops.
#[derive(Debug, Clone)]
pub struct Session {
    peer_id: u32,
    linked: bool,
    last_rx: Option<Instant>,
    rtt: Option<Duration>,
    highest_seq: Option<u32>,
    next_tx_seq: u32,
    watchdog: Watchdog,
}

impl Session {
    /// Create an unlinked session toward the given peer.
    pub fn new(peer_id: u32, watchdog_timeout: Duration) -> Self {
        Self {
            peer_id,
            linked: false,
            last_rx: None,
            rtt: None,
            highest_seq: None,
            next_tx_seq: 0,
            watchdog: Watchdog::new(watchdog_timeout),
        }
    }

    /// Identifier of the peer this session tracks.
    pub fn peer_id(&self) -> u32 {
        self.peer_id
    }

    /// Whether the link handshake has completed.
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Transition to linked and start the connection watchdog.
    pub fn mark_linked(&mut self, now: Instant) {
        self.linked = true;
        self.watchdog.feed(now);
        debug!(peer_id = self.peer_id, "session linked");
    }

    /// Tear the session down to its boot state.
    pub fn unlink(&mut self) {
        if self.linked {
            debug!(peer_id = self.peer_id, "session unlinked");
        }
        self.linked = false;
        self.watchdog.disarm();
        self.highest_seq = None;
        self.rtt = None;
        self.last_rx = None;
    }

    /// Allocate the next outbound sequence number.
    pub fn next_seq(&mut self) -> u32 {
        let seq = self.next_tx_seq;
        self.next_tx_seq = self.next_tx_seq.wrapping_add(1);
        seq
    }

    /// Account for a valid inbound frame.
    ///
    /// Returns `false` when the frame is a strictly-lower sequence rerun on
    /// a linked session; such frames are silently dropped by the caller.
    /// Accepted frames feed the watchdog and advance the high-water mark.
    pub fn accept(&mut self, seq: u32, now: Instant) -> bool {
        if self.linked {
            if let Some(highest) = self.highest_seq {
                if seq < highest {
                    debug!(
                        peer_id = self.peer_id,
                        seq, highest, "dropping stale sequence rerun"
                    );
                    return false;
                }
            }
        }
        self.highest_seq = Some(self.highest_seq.map_or(seq, |h| h.max(seq)));
        self.last_rx = Some(now);
        if self.linked {
            self.watchdog.feed(now);
        }
        true
    }

    /// Record a round-trip estimate from a keep-alive echo.
    pub fn record_rtt(&mut self, rtt: Duration) {
        self.rtt = Some(rtt);
    }

    /// Latest round-trip estimate, if any.
    pub fn rtt(&self) -> Option<Duration> {
        self.rtt
    }

    /// Instant of the last accepted inbound frame.
    pub fn last_rx(&self) -> Option<Instant> {
        self.last_rx
    }

    /// Observe the connection watchdog; `true` exactly once per expiry.
    pub fn timed_out(&mut self, now: Instant) -> bool {
        self.watchdog.poll(now)
    }
}
