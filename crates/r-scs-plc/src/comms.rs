//! ---
//! scs_section: "04-plc-safety-loop"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Reactor PLC safety loop, communications, and scheduler."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use std::time::Instant;

use r_scs_common::config::TimingConfig;
use r_scs_session::Session;
use r_scs_wire::{
    log_frame, FrameDirection, IssStatus, LinkResult, MgmtPacket, MgmtType, ProtocolTag,
    RplcPacket, RplcType, ScadaFrame, StatusReport,
};
use tracing::{debug, info, warn};

use crate::state::{PlcState, RemoteCommand};

/// What one inbound frame asks the rest of the node to do.
#[derive(Debug, Default)]
pub struct FrameOutcome {
    /// Commands to forward to the safety core, in arrival order.
    pub commands: Vec<RemoteCommand>,
    /// Frames to transmit back to the supervisor.
    pub replies: Vec<ScadaFrame>,
}

/// Binds the PLC safety core to the messaging layer: one supervisor session,
/// tick-counted STATUS and LINK_REQ cadences, and inbound command parsing.
#[derive(Debug)]
pub struct PlcComms {
    plc_id: u32,
    server_port: u16,
    networked: bool,
    session: Session,
    remote_scram: bool,
    status_interval: u32,
    link_interval: u32,
    ticks_since_status: u32,
    ticks_since_link: u32,
    last_sent_iss: Option<IssStatus>,
    link_req_sent_at: Option<Instant>,
}

impl PlcComms {
    /// Create the comms binding for a configured node.
    pub fn new(plc_id: u32, server_port: u16, networked: bool, timing: &TimingConfig) -> Self {
        let link_interval = timing.link_interval_ticks;
        Self {
            plc_id,
            server_port,
            networked,
            session: Session::new(plc_id, timing.watchdog_timeout),
            remote_scram: false,
            status_interval: timing.status_interval_ticks,
            link_interval,
            ticks_since_status: 0,
            // first link request goes out on the first tick after boot
            ticks_since_link: link_interval.saturating_sub(1),
            last_sent_iss: None,
            link_req_sent_at: None,
        }
    }

    /// Port of the supervisor hub.
    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Whether the supervisor session is established.
    pub fn is_linked(&self) -> bool {
        self.session.is_linked()
    }

    /// Whether the last remote packet asked for SCRAM (cleared by RPS_RESET).
    pub fn is_scrammed(&self) -> bool {
        self.remote_scram
    }

    /// Latest round-trip estimate toward the supervisor.
    pub fn rtt(&self) -> Option<std::time::Duration> {
        self.session.rtt()
    }

    /// Tear the session down and resume the link-request cadence at once.
    pub fn unlink(&mut self) {
        self.session.unlink();
        self.ticks_since_link = self.link_interval.saturating_sub(1);
    }

    /// Observe the session watchdog; `true` exactly once per expiry.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        self.session.timed_out(now)
    }

    /// Advance the tick-counted cadences, producing frames due this tick.
    ///
    /// While linked a STATUS goes out every `status_interval` ticks (with an
    /// RPS_STATUS alongside whenever the cause set changed); while unlinked
    /// a LINK_REQ goes out every `link_interval` ticks.
    pub fn on_tick(&mut self, now: Instant, state: PlcState, iss_status: IssStatus) -> Vec<ScadaFrame> {
        let mut out = Vec::new();
        if !self.networked {
            return out;
        }
        if self.session.is_linked() {
            self.ticks_since_status += 1;
            if self.ticks_since_status >= self.status_interval {
                self.ticks_since_status = 0;
                let report = StatusReport {
                    scram: state.scram,
                    degraded: state.degraded,
                    iss_status,
                };
                let seq = self.session.next_seq();
                out.push(RplcPacket::status(self.plc_id, report).into_frame(seq));
                if self.last_sent_iss != Some(iss_status) {
                    self.last_sent_iss = Some(iss_status);
                    let seq = self.session.next_seq();
                    out.push(
                        RplcPacket::rps_status(self.plc_id, !iss_status.is_empty(), iss_status)
                            .into_frame(seq),
                    );
                }
            }
        } else {
            self.ticks_since_link += 1;
            if self.ticks_since_link >= self.link_interval {
                self.ticks_since_link = 0;
                self.link_req_sent_at = Some(now);
                let seq = self.session.next_seq();
                out.push(RplcPacket::link_request(self.plc_id).into_frame(seq));
                debug!(plc_id = self.plc_id, "link request queued");
            }
        }
        out
    }

    /// Wrap a one-shot trip alarm for transmission.
    pub fn iss_alarm(&mut self, status: IssStatus) -> ScadaFrame {
        let seq = self.session.next_seq();
        RplcPacket::alarm(self.plc_id, status).into_frame(seq)
    }

    /// Wrap an orderly session teardown notice.
    pub fn close_notice(&mut self) -> ScadaFrame {
        let seq = self.session.next_seq();
        MgmtPacket::close().into_frame(seq)
    }

    /// Parse one inbound frame and produce commands and replies.
    ///
    /// Every accepted frame feeds the session watchdog. Stale sequence
    /// reruns, packets for other unit ids, and undecodable payloads are
    /// dropped where they stand.
    pub fn handle_frame(&mut self, frame: &ScadaFrame, now: Instant) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();
        if !self.session.accept(frame.seq_num(), now) {
            log_frame(FrameDirection::Dropped, frame);
            return outcome;
        }
        log_frame(FrameDirection::Inbound, frame);

        match frame.protocol() {
            ProtocolTag::Rplc => self.handle_rplc(frame, now, &mut outcome),
            ProtocolTag::ScadaMgmt => self.handle_mgmt(frame, now, &mut outcome),
            other => {
                debug!(protocol = %other, "protocol not handled by a plc node");
            }
        }
        outcome
    }

    fn handle_rplc(&mut self, frame: &ScadaFrame, now: Instant, outcome: &mut FrameOutcome) {
        let packet = match RplcPacket::decode(frame) {
            Ok(packet) => packet,
            Err(err) => {
                debug!(error = %err, "dropping undecodable rplc frame");
                return;
            }
        };
        if packet.plc_id != self.plc_id {
            warn!(
                addressed = packet.plc_id,
                configured = self.plc_id,
                "dropping packet addressed to another unit"
            );
            return;
        }
        match packet.kind {
            RplcType::LinkReq => match packet.link_result() {
                Some(LinkResult::Allow) => {
                    if let Some(sent_at) = self.link_req_sent_at.take() {
                        self.session.record_rtt(now.duration_since(sent_at));
                    }
                    self.mark_linked(now);
                }
                Some(LinkResult::Deny) => {
                    warn!(plc_id = self.plc_id, "supervisor denied link request");
                }
                Some(LinkResult::Collision) => {
                    warn!(
                        plc_id = self.plc_id,
                        "unit id already linked elsewhere (collision)"
                    );
                }
                None => debug!("link reply without a verdict field"),
            },
            RplcType::RpsScram => {
                self.remote_scram = true;
                outcome.commands.push(RemoteCommand::Scram);
            }
            RplcType::RpsEnable => outcome.commands.push(RemoteCommand::Enable),
            RplcType::RpsReset => {
                self.remote_scram = false;
                outcome.commands.push(RemoteCommand::Reset);
            }
            RplcType::MekBurnRate => match packet.burn_rate() {
                Some(rate) => outcome.commands.push(RemoteCommand::SetBurnRate(rate)),
                None => debug!("burn rate command without a rate field"),
            },
            RplcType::KeepAlive => {
                if let Some(timestamp) = packet.timestamp() {
                    let seq = self.session.next_seq();
                    outcome
                        .replies
                        .push(RplcPacket::keep_alive(self.plc_id, timestamp).into_frame(seq));
                }
            }
            other => {
                debug!(kind = other.name(), "inbound rplc sub-type not expected at a plc");
            }
        }
    }

    fn handle_mgmt(&mut self, frame: &ScadaFrame, now: Instant, outcome: &mut FrameOutcome) {
        let packet = match MgmtPacket::decode(frame) {
            Ok(packet) => packet,
            Err(err) => {
                debug!(error = %err, "dropping undecodable management frame");
                return;
            }
        };
        match packet.kind {
            MgmtType::RemoteLinked => self.mark_linked(now),
            MgmtType::Close => {
                info!(plc_id = self.plc_id, "supervisor closed the session");
                self.unlink();
            }
            MgmtType::KeepAlive => {
                if let Some(timestamp) = packet.timestamp() {
                    let seq = self.session.next_seq();
                    outcome
                        .replies
                        .push(MgmtPacket::keep_alive(timestamp).into_frame(seq));
                }
            }
            MgmtType::RtuAdvert => {
                debug!("rtu advertisement ignored by a plc node");
            }
        }
    }

    fn mark_linked(&mut self, now: Instant) {
        if !self.session.is_linked() {
            info!(plc_id = self.plc_id, "linked to supervisor");
        }
        self.session.mark_linked(now);
        self.ticks_since_status = 0;
        self.last_sent_iss = None;
    }
}
