//! ---
//! scs_section: "02-messaging-wire-protocols"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Frame codec, protocol packets, and radio transports."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use tracing::debug;

use crate::frame::ScadaFrame;

/// Direction of frame movement, used for consistent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirection {
    /// Frame handed to a transport for transmission.
    Outbound,
    /// Frame accepted from a transport.
    Inbound,
    /// Frame received but discarded before dispatch.
    Dropped,
}

/// Emit a structured log entry for frame activity.
pub fn log_frame(direction: FrameDirection, frame: &ScadaFrame) {
    debug!(
        seq_num = frame.seq_num(),
        protocol = %frame.protocol(),
        fields = frame.len(),
        direction = ?direction,
        "frame activity"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ProtocolTag;

    #[test]
    fn log_frame_accepts_every_direction() {
        let frame = ScadaFrame::new(1, ProtocolTag::Rplc, Vec::new());
        log_frame(FrameDirection::Outbound, &frame);
        log_frame(FrameDirection::Inbound, &frame);
        log_frame(FrameDirection::Dropped, &frame);
    }
}
