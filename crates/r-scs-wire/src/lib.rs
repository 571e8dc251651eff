//! ---
//! scs_section: "02-messaging-wire-protocols"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Frame codec, protocol packets, and radio transports."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! SCADA messaging layer: one framing scheme, five payload protocols, and
//! the datagram radio transports that carry them between nodes.

pub mod frame;
pub mod logging;
pub mod packets;
pub mod transport;

/// Shared result type for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors surfaced by the framing, packet, and transport layers.
///
/// Malformed traffic is an expected condition on a radio channel; every
/// variant here is recoverable by dropping the offending datagram.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The datagram did not decode into a three-element SCADA frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),
    /// The frame carried a protocol tag outside the recognized set.
    #[error("unknown protocol tag {0}")]
    UnknownProtocol(u8),
    /// A packet parser was handed a frame for a different protocol.
    #[error("attempted {expected} parse of incorrect protocol {actual}")]
    WrongProtocol {
        /// Protocol the parser expected.
        expected: &'static str,
        /// Protocol the frame actually carried.
        actual: &'static str,
    },
    /// The payload was shorter than the protocol's minimum field count.
    #[error("{protocol} payload too short: {len} fields, need at least {min}")]
    TruncatedPayload {
        /// Protocol whose minimum was violated.
        protocol: &'static str,
        /// Observed payload length.
        len: usize,
        /// Required minimum length.
        min: usize,
    },
    /// A sub-type value fell outside the protocol's enumeration.
    #[error("{protocol} sub-type {value} not recognized")]
    UnknownSubType {
        /// Protocol whose sub-type namespace was violated.
        protocol: &'static str,
        /// The offending raw value.
        value: u64,
    },
    /// A payload field had the wrong shape for its slot.
    #[error("{protocol} field {index} has unexpected type")]
    BadField {
        /// Protocol being parsed.
        protocol: &'static str,
        /// Zero-based payload index of the bad field.
        index: usize,
    },
    /// CBOR serialization failure while encoding an outbound frame.
    #[error("frame encode error: {0}")]
    Encode(#[from] serde_cbor::Error),
    /// Transport-level socket failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The peer side of an in-memory radio pair has been dropped.
    #[error("radio channel closed")]
    ChannelClosed,
}

pub use frame::{FieldValue, ProtocolTag, ScadaFrame};
pub use logging::{log_frame, FrameDirection};
pub use packets::{
    CoordApiPacket, CoordDataPacket, IssStatus, LinkResult, MgmtPacket, MgmtType, ModbusPacket,
    RplcPacket, RplcType, RtuAdvertType, StatusReport,
};
pub use transport::{loopback_pair, LoopbackRadio, RadioMessage, RadioTransport, UdpRadio};
