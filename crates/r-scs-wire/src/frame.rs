//! ---
//! scs_section: "02-messaging-wire-protocols"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Frame codec, protocol packets, and radio transports."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::transport::RadioMessage;
use crate::{Result, WireError};

/// Payload protocols multiplexed over the shared SCADA framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolTag {
    /// MODBUS-TCP style RTU sub-protocol.
    ModbusTcp = 0,
    /// Reactor PLC protocol.
    Rplc = 1,
    /// SCADA session management protocol.
    ScadaMgmt = 2,
    /// Coordinator data subscription protocol.
    CoordData = 3,
    /// Coordinator API protocol.
    CoordApi = 4,
}

impl ProtocolTag {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolTag::ModbusTcp => "MODBUS_TCP",
            ProtocolTag::Rplc => "RPLC",
            ProtocolTag::ScadaMgmt => "SCADA_MGMT",
            ProtocolTag::CoordData => "COORD_DATA",
            ProtocolTag::CoordApi => "COORD_API",
        }
    }
}

impl TryFrom<u8> for ProtocolTag {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ProtocolTag::ModbusTcp),
            1 => Ok(ProtocolTag::Rplc),
            2 => Ok(ProtocolTag::ScadaMgmt),
            3 => Ok(ProtocolTag::CoordData),
            4 => Ok(ProtocolTag::CoordApi),
            other => Err(WireError::UnknownProtocol(other)),
        }
    }
}

impl std::fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One heterogeneous payload field.
///
/// The wire format is a self-describing sequence of mixed scalars; CBOR
/// preserves each variant across a round-trip without a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean flag.
    Bool(bool),
    /// Unsigned integer (identifiers, sub-types, bitfields).
    Uint(u64),
    /// Signed integer.
    Int(i64),
    /// Floating point reading.
    Float(f64),
    /// Text field.
    Text(String),
    /// Nested ordered sequence (e.g. RTU capability lists).
    Seq(Vec<FieldValue>),
}

impl FieldValue {
    /// Interpret the field as an unsigned integer if it is one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Uint(v) => Some(*v),
            FieldValue::Int(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Interpret the field as a `u32`, rejecting out-of-range values.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|v| u32::try_from(v).ok())
    }

    /// Interpret the field as a `u16`, rejecting out-of-range values.
    pub fn as_u16(&self) -> Option<u16> {
        self.as_u64().and_then(|v| u16::try_from(v).ok())
    }

    /// Interpret the field as a `u8`, rejecting out-of-range values.
    pub fn as_u8(&self) -> Option<u8> {
        self.as_u64().and_then(|v| u8::try_from(v).ok())
    }

    /// Interpret the field as a boolean if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Interpret the field as a float, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Uint(v) => Some(*v as f64),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Borrow the field as a nested sequence if it is one.
    pub fn as_seq(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Seq(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        FieldValue::Uint(u64::from(v))
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        FieldValue::Uint(u64::from(v))
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Uint(u64::from(v))
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Uint(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(v: Vec<FieldValue>) -> Self {
        FieldValue::Seq(v)
    }
}

/// The unit of transmission: `(seq_num, protocol, payload)`.
///
/// Frames exist only for the duration of one send or one receive; nothing in
/// the codec retains them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScadaFrame {
    seq_num: u32,
    protocol: ProtocolTag,
    payload: Vec<FieldValue>,
}

impl ScadaFrame {
    /// Assemble a frame for transmission.
    pub fn new(seq_num: u32, protocol: ProtocolTag, payload: Vec<FieldValue>) -> Self {
        Self {
            seq_num,
            protocol,
            payload,
        }
    }

    /// Sender-assigned monotone sequence number.
    pub fn seq_num(&self) -> u32 {
        self.seq_num
    }

    /// Payload protocol tag.
    pub fn protocol(&self) -> ProtocolTag {
        self.protocol
    }

    /// Number of payload fields.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Borrow the raw payload fields. The codec never interprets them.
    pub fn data(&self) -> &[FieldValue] {
        &self.payload
    }

    /// Serialize to the on-air representation.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let tuple = (self.seq_num, self.protocol as u8, &self.payload);
        Ok(serde_cbor::to_vec(&tuple)?)
    }

    /// Decode an on-air byte sequence.
    ///
    /// Valid iff the bytes form a 3-element sequence whose second element is
    /// a recognized protocol tag and whose third element is a sequence.
    /// Failures are reported as errors, never panics, and leave no state
    /// behind.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (seq_num, raw_tag, payload): (u32, u8, Vec<FieldValue>) =
            serde_cbor::from_slice(bytes)
                .map_err(|_| WireError::MalformedFrame("not a (seq, protocol, payload) tuple"))?;
        let protocol = ProtocolTag::try_from(raw_tag)?;
        Ok(Self {
            seq_num,
            protocol,
            payload,
        })
    }

    /// Validate and decode a message delivered by a radio transport.
    pub fn receive(message: &RadioMessage) -> Result<Self> {
        match Self::decode(&message.bytes) {
            Ok(frame) => {
                debug!(
                    local_port = message.local_port,
                    remote_port = message.remote_port,
                    distance = message.distance,
                    seq_num = frame.seq_num,
                    protocol = %frame.protocol,
                    fields = frame.len(),
                    "frame received"
                );
                Ok(frame)
            }
            Err(err) => {
                debug!(
                    local_port = message.local_port,
                    remote_port = message.remote_port,
                    error = %err,
                    "dropping undecodable datagram"
                );
                Err(err)
            }
        }
    }
}
