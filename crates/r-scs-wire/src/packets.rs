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

use crate::frame::{FieldValue, ProtocolTag, ScadaFrame};
use crate::{Result, WireError};

fn wrong_protocol(expected: &'static str, frame: &ScadaFrame) -> WireError {
    debug!(
        expected,
        actual = %frame.protocol(),
        "attempted {} parse of incorrect protocol {}",
        expected,
        frame.protocol()
    );
    WireError::WrongProtocol {
        expected,
        actual: frame.protocol().name(),
    }
}

fn require_len(protocol: &'static str, frame: &ScadaFrame, min: usize) -> Result<()> {
    if frame.len() < min {
        return Err(WireError::TruncatedPayload {
            protocol,
            len: frame.len(),
            min,
        });
    }
    Ok(())
}

/// RPLC sub-types carried between a reactor PLC and the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RplcType {
    /// Session establishment request (reply carries a [`LinkResult`]).
    LinkReq = 0,
    /// Periodic PLC status report.
    Status = 1,
    /// Reactor structure descriptor.
    MekStruct = 2,
    /// Burn rate setpoint command.
    MekBurnRate = 3,
    /// Enable the reactor protection system.
    RpsEnable = 4,
    /// Remote emergency shutdown command.
    RpsScram = 5,
    /// Protection system status report.
    RpsStatus = 6,
    /// One-shot trip alarm notification.
    RpsAlarm = 7,
    /// Clear a latched trip after causes resolve.
    RpsReset = 8,
    /// Session keep-alive with echo timestamp.
    KeepAlive = 9,
}

impl RplcType {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            RplcType::LinkReq => "LINK_REQ",
            RplcType::Status => "STATUS",
            RplcType::MekStruct => "MEK_STRUCT",
            RplcType::MekBurnRate => "MEK_BURN_RATE",
            RplcType::RpsEnable => "RPS_ENABLE",
            RplcType::RpsScram => "RPS_SCRAM",
            RplcType::RpsStatus => "RPS_STATUS",
            RplcType::RpsAlarm => "RPS_ALARM",
            RplcType::RpsReset => "RPS_RESET",
            RplcType::KeepAlive => "KEEP_ALIVE",
        }
    }
}

impl TryFrom<u8> for RplcType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RplcType::LinkReq),
            1 => Ok(RplcType::Status),
            2 => Ok(RplcType::MekStruct),
            3 => Ok(RplcType::MekBurnRate),
            4 => Ok(RplcType::RpsEnable),
            5 => Ok(RplcType::RpsScram),
            6 => Ok(RplcType::RpsStatus),
            7 => Ok(RplcType::RpsAlarm),
            8 => Ok(RplcType::RpsReset),
            9 => Ok(RplcType::KeepAlive),
            other => Err(WireError::UnknownSubType {
                protocol: "RPLC",
                value: u64::from(other),
            }),
        }
    }
}

/// Supervisor verdict on a LINK_REQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkResult {
    /// Session granted.
    Allow = 0,
    /// Peer rejected (wrong channel or unknown unit).
    Deny = 1,
    /// Another session already holds this unit id.
    Collision = 2,
}

impl TryFrom<u8> for LinkResult {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(LinkResult::Allow),
            1 => Ok(LinkResult::Deny),
            2 => Ok(LinkResult::Collision),
            other => Err(WireError::UnknownSubType {
                protocol: "LINK_RESULT",
                value: u64::from(other),
            }),
        }
    }
}

/// Management sub-types shared by every session edge.
///
/// `KeepAlive` is the canonical name for the liveness probe; legacy symbol
/// aliases are not carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MgmtType {
    /// Liveness probe with echo timestamp.
    KeepAlive = 0,
    /// Orderly session teardown.
    Close = 1,
    /// RTU gateway capability advertisement.
    RtuAdvert = 2,
    /// Notification that the remote end considers the session linked.
    RemoteLinked = 3,
}

impl MgmtType {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            MgmtType::KeepAlive => "KEEP_ALIVE",
            MgmtType::Close => "CLOSE",
            MgmtType::RtuAdvert => "RTU_ADVERT",
            MgmtType::RemoteLinked => "REMOTE_LINKED",
        }
    }
}

impl TryFrom<u8> for MgmtType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MgmtType::KeepAlive),
            1 => Ok(MgmtType::Close),
            2 => Ok(MgmtType::RtuAdvert),
            3 => Ok(MgmtType::RemoteLinked),
            other => Err(WireError::UnknownSubType {
                protocol: "SCADA_MGMT",
                value: u64::from(other),
            }),
        }
    }
}

/// Peripheral capabilities an RTU gateway can advertise, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RtuAdvertType {
    /// Redstone I/O bank.
    Redstone = 0,
    /// Thermoelectric boiler.
    Boiler = 1,
    /// Boiler steam valve.
    BoilerValve = 2,
    /// Industrial turbine.
    Turbine = 3,
    /// Turbine steam valve.
    TurbineValve = 4,
    /// Energy machine.
    Emachine = 5,
    /// Induction matrix.
    Imatrix = 6,
}

impl TryFrom<u8> for RtuAdvertType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RtuAdvertType::Redstone),
            1 => Ok(RtuAdvertType::Boiler),
            2 => Ok(RtuAdvertType::BoilerValve),
            3 => Ok(RtuAdvertType::Turbine),
            4 => Ok(RtuAdvertType::TurbineValve),
            5 => Ok(RtuAdvertType::Emachine),
            6 => Ok(RtuAdvertType::Imatrix),
            other => Err(WireError::UnknownSubType {
                protocol: "RTU_ADVERT",
                value: u64::from(other),
            }),
        }
    }
}

/// Bitfield of independent-safety-system trip causes.
///
/// Carried verbatim inside STATUS, RPS_STATUS, and RPS_ALARM bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IssStatus(u16);

impl IssStatus {
    /// Reactor damage above the critical threshold.
    pub const DAMAGE_CRIT: IssStatus = IssStatus(1 << 0);
    /// Core temperature above the critical threshold.
    pub const TEMP_CRIT: IssStatus = IssStatus(1 << 1);
    /// Coolant level too low.
    pub const NO_COOLANT: IssStatus = IssStatus(1 << 2);
    /// Waste tank at capacity.
    pub const EX_WASTE: IssStatus = IssStatus(1 << 3);
    /// Heated coolant tank at capacity.
    pub const EX_HCOOLANT: IssStatus = IssStatus(1 << 4);
    /// Fuel level too low.
    pub const NO_FUEL: IssStatus = IssStatus(1 << 5);
    /// Protection system hardware fault.
    pub const FAULT: IssStatus = IssStatus(1 << 6);
    /// Supervisor session timed out.
    pub const TIMEOUT: IssStatus = IssStatus(1 << 7);
    /// Operator-commanded trip.
    pub const MANUAL: IssStatus = IssStatus(1 << 8);

    const ALL: u16 = 0x01FF;

    /// No trip causes set.
    pub fn empty() -> Self {
        IssStatus(0)
    }

    /// Reconstruct from wire bits, discarding undefined positions.
    pub fn from_bits(bits: u16) -> Self {
        IssStatus(bits & Self::ALL)
    }

    /// Raw bit representation for the wire.
    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Whether no cause is set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set in `self`.
    pub fn contains(&self, other: IssStatus) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: IssStatus) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: IssStatus) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for IssStatus {
    type Output = IssStatus;

    fn bitor(self, rhs: IssStatus) -> IssStatus {
        IssStatus(self.0 | rhs.0)
    }
}

impl std::fmt::Display for IssStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(IssStatus, &str); 9] = [
            (IssStatus::DAMAGE_CRIT, "DAMAGE_CRIT"),
            (IssStatus::TEMP_CRIT, "TEMP_CRIT"),
            (IssStatus::NO_COOLANT, "NO_COOLANT"),
            (IssStatus::EX_WASTE, "EX_WASTE"),
            (IssStatus::EX_HCOOLANT, "EX_HCOOLANT"),
            (IssStatus::NO_FUEL, "NO_FUEL"),
            (IssStatus::FAULT, "FAULT"),
            (IssStatus::TIMEOUT, "TIMEOUT"),
            (IssStatus::MANUAL, "MANUAL"),
        ];
        if self.is_empty() {
            return f.write_str("CLEAR");
        }
        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Decoded body of an RPLC STATUS packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    /// Latched emergency-stop state.
    pub scram: bool,
    /// Whether a required peripheral is missing.
    pub degraded: bool,
    /// Current trip bitfield.
    pub iss_status: IssStatus,
}

/// Reactor PLC protocol packet: `(plc_id, type, body…)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RplcPacket {
    /// Unit id of the PLC this packet concerns.
    pub plc_id: u32,
    /// RPLC sub-type.
    pub kind: RplcType,
    /// Sub-type specific trailing fields.
    pub body: Vec<FieldValue>,
}

impl RplcPacket {
    const PROTOCOL: &'static str = "RPLC";
    const MIN_LEN: usize = 2;

    /// Construct a packet with an explicit body.
    pub fn new(plc_id: u32, kind: RplcType, body: Vec<FieldValue>) -> Self {
        Self { plc_id, kind, body }
    }

    /// Session establishment request.
    pub fn link_request(plc_id: u32) -> Self {
        Self::new(plc_id, RplcType::LinkReq, Vec::new())
    }

    /// Supervisor reply to a LINK_REQ.
    pub fn link_reply(plc_id: u32, result: LinkResult) -> Self {
        Self::new(
            plc_id,
            RplcType::LinkReq,
            vec![FieldValue::from(result as u8)],
        )
    }

    /// Periodic status report.
    pub fn status(plc_id: u32, report: StatusReport) -> Self {
        Self::new(
            plc_id,
            RplcType::Status,
            vec![
                FieldValue::from(report.scram),
                FieldValue::from(report.degraded),
                FieldValue::from(report.iss_status.bits()),
            ],
        )
    }

    /// Full protection-system status.
    pub fn rps_status(plc_id: u32, tripped: bool, status: IssStatus) -> Self {
        Self::new(
            plc_id,
            RplcType::RpsStatus,
            vec![
                FieldValue::from(tripped),
                FieldValue::from(status.bits()),
            ],
        )
    }

    /// One-shot trip alarm, emitted exactly once per rising edge.
    pub fn alarm(plc_id: u32, status: IssStatus) -> Self {
        Self::new(
            plc_id,
            RplcType::RpsAlarm,
            vec![FieldValue::from(status.bits())],
        )
    }

    /// Remote emergency shutdown command.
    pub fn scram_command(plc_id: u32) -> Self {
        Self::new(plc_id, RplcType::RpsScram, Vec::new())
    }

    /// Remote enable command.
    pub fn enable_command(plc_id: u32) -> Self {
        Self::new(plc_id, RplcType::RpsEnable, Vec::new())
    }

    /// Remote trip-latch reset command.
    pub fn reset_command(plc_id: u32) -> Self {
        Self::new(plc_id, RplcType::RpsReset, Vec::new())
    }

    /// Burn rate setpoint command.
    pub fn burn_rate_command(plc_id: u32, rate: f64) -> Self {
        Self::new(
            plc_id,
            RplcType::MekBurnRate,
            vec![FieldValue::from(rate)],
        )
    }

    /// Session keep-alive carrying the sender's millisecond timestamp.
    pub fn keep_alive(plc_id: u32, timestamp_ms: u64) -> Self {
        Self::new(
            plc_id,
            RplcType::KeepAlive,
            vec![FieldValue::from(timestamp_ms)],
        )
    }

    /// Wrap into a SCADA frame for transmission.
    pub fn into_frame(self, seq_num: u32) -> ScadaFrame {
        let mut payload = Vec::with_capacity(2 + self.body.len());
        payload.push(FieldValue::from(self.plc_id));
        payload.push(FieldValue::from(self.kind as u8));
        payload.extend(self.body);
        ScadaFrame::new(seq_num, ProtocolTag::Rplc, payload)
    }

    /// Parse an RPLC packet out of a received frame.
    ///
    /// Requires the RPLC protocol tag, at least two payload fields, and a
    /// recognized sub-type in the second slot.
    pub fn decode(frame: &ScadaFrame) -> Result<Self> {
        if frame.protocol() != ProtocolTag::Rplc {
            return Err(wrong_protocol(Self::PROTOCOL, frame));
        }
        require_len(Self::PROTOCOL, frame, Self::MIN_LEN)?;
        let data = frame.data();
        let plc_id = data[0].as_u32().ok_or(WireError::BadField {
            protocol: Self::PROTOCOL,
            index: 0,
        })?;
        let raw_kind = data[1].as_u8().ok_or(WireError::BadField {
            protocol: Self::PROTOCOL,
            index: 1,
        })?;
        let kind = RplcType::try_from(raw_kind)?;
        Ok(Self {
            plc_id,
            kind,
            body: data[2..].to_vec(),
        })
    }

    /// Link verdict from a LINK_REQ reply, if this packet carries one.
    pub fn link_result(&self) -> Option<LinkResult> {
        if self.kind != RplcType::LinkReq {
            return None;
        }
        self.body
            .first()
            .and_then(FieldValue::as_u8)
            .and_then(|raw| LinkResult::try_from(raw).ok())
    }

    /// Decoded STATUS body, if this packet is a STATUS.
    pub fn status_report(&self) -> Option<StatusReport> {
        if self.kind != RplcType::Status || self.body.len() < 3 {
            return None;
        }
        Some(StatusReport {
            scram: self.body[0].as_bool()?,
            degraded: self.body[1].as_bool()?,
            iss_status: IssStatus::from_bits(self.body[2].as_u16()?),
        })
    }

    /// Burn rate setpoint, if this packet is a MEK_BURN_RATE command.
    pub fn burn_rate(&self) -> Option<f64> {
        if self.kind != RplcType::MekBurnRate {
            return None;
        }
        self.body.first().and_then(FieldValue::as_f64)
    }

    /// Trip bitfield, if this packet is an RPS_ALARM.
    pub fn alarm_status(&self) -> Option<IssStatus> {
        if self.kind != RplcType::RpsAlarm {
            return None;
        }
        self.body
            .first()
            .and_then(FieldValue::as_u16)
            .map(IssStatus::from_bits)
    }

    /// Echo timestamp, if this packet is a KEEP_ALIVE.
    pub fn timestamp(&self) -> Option<u64> {
        if self.kind != RplcType::KeepAlive {
            return None;
        }
        self.body.first().and_then(FieldValue::as_u64)
    }
}

/// Management protocol packet: `(type, body…)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MgmtPacket {
    /// Management sub-type.
    pub kind: MgmtType,
    /// Sub-type specific trailing fields.
    pub body: Vec<FieldValue>,
}

impl MgmtPacket {
    const PROTOCOL: &'static str = "SCADA_MGMT";
    const MIN_LEN: usize = 1;

    /// Construct a packet with an explicit body.
    pub fn new(kind: MgmtType, body: Vec<FieldValue>) -> Self {
        Self { kind, body }
    }

    /// Liveness probe carrying the sender's millisecond timestamp.
    pub fn keep_alive(timestamp_ms: u64) -> Self {
        Self::new(MgmtType::KeepAlive, vec![FieldValue::from(timestamp_ms)])
    }

    /// Orderly session teardown.
    pub fn close() -> Self {
        Self::new(MgmtType::Close, Vec::new())
    }

    /// Remote-linked notification.
    pub fn remote_linked() -> Self {
        Self::new(MgmtType::RemoteLinked, Vec::new())
    }

    /// RTU capability advertisement, order preserved.
    pub fn rtu_advert(capabilities: &[RtuAdvertType]) -> Self {
        Self::new(
            MgmtType::RtuAdvert,
            capabilities
                .iter()
                .map(|cap| FieldValue::from(*cap as u8))
                .collect(),
        )
    }

    /// Wrap into a SCADA frame for transmission.
    pub fn into_frame(self, seq_num: u32) -> ScadaFrame {
        let mut payload = Vec::with_capacity(1 + self.body.len());
        payload.push(FieldValue::from(self.kind as u8));
        payload.extend(self.body);
        ScadaFrame::new(seq_num, ProtocolTag::ScadaMgmt, payload)
    }

    /// Parse a management packet out of a received frame.
    pub fn decode(frame: &ScadaFrame) -> Result<Self> {
        if frame.protocol() != ProtocolTag::ScadaMgmt {
            return Err(wrong_protocol(Self::PROTOCOL, frame));
        }
        require_len(Self::PROTOCOL, frame, Self::MIN_LEN)?;
        let data = frame.data();
        let raw_kind = data[0].as_u8().ok_or(WireError::BadField {
            protocol: Self::PROTOCOL,
            index: 0,
        })?;
        let kind = MgmtType::try_from(raw_kind)?;
        Ok(Self {
            kind,
            body: data[1..].to_vec(),
        })
    }

    /// Advertised capability list, if this packet is a valid RTU_ADVERT.
    ///
    /// Returns `None` (after a debug log) when any tag falls outside the
    /// capability enum; a gateway advertising unknown hardware is dropped
    /// whole rather than partially mounted.
    pub fn capabilities(&self) -> Option<Vec<RtuAdvertType>> {
        if self.kind != MgmtType::RtuAdvert {
            return None;
        }
        let mut caps = Vec::with_capacity(self.body.len());
        for (index, field) in self.body.iter().enumerate() {
            let Some(raw) = field.as_u8() else {
                debug!(index, "RTU_ADVERT capability field has unexpected type");
                return None;
            };
            match RtuAdvertType::try_from(raw) {
                Ok(cap) => caps.push(cap),
                Err(err) => {
                    debug!(index, error = %err, "RTU_ADVERT carries unknown capability");
                    return None;
                }
            }
        }
        Some(caps)
    }

    /// Echo timestamp, if this packet is a KEEP_ALIVE.
    pub fn timestamp(&self) -> Option<u64> {
        if self.kind != MgmtType::KeepAlive {
            return None;
        }
        self.body.first().and_then(FieldValue::as_u64)
    }
}

/// MODBUS-TCP style packet: `(txn_id, unit_id, func_code, data…)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModbusPacket {
    /// Transaction identifier echoed by the responder.
    pub txn_id: u16,
    /// Addressed unit.
    pub unit_id: u8,
    /// Function code.
    pub func_code: u8,
    /// Register/coil data tail.
    pub data: Vec<FieldValue>,
}

impl ModbusPacket {
    const PROTOCOL: &'static str = "MODBUS_TCP";
    const MIN_LEN: usize = 3;

    /// Construct a packet with an explicit data tail.
    pub fn new(txn_id: u16, unit_id: u8, func_code: u8, data: Vec<FieldValue>) -> Self {
        Self {
            txn_id,
            unit_id,
            func_code,
            data,
        }
    }

    /// Wrap into a SCADA frame for transmission.
    pub fn into_frame(self, seq_num: u32) -> ScadaFrame {
        let mut payload = Vec::with_capacity(3 + self.data.len());
        payload.push(FieldValue::from(self.txn_id));
        payload.push(FieldValue::from(self.unit_id));
        payload.push(FieldValue::from(self.func_code));
        payload.extend(self.data);
        ScadaFrame::new(seq_num, ProtocolTag::ModbusTcp, payload)
    }

    /// Parse a MODBUS packet out of a received frame.
    pub fn decode(frame: &ScadaFrame) -> Result<Self> {
        if frame.protocol() != ProtocolTag::ModbusTcp {
            return Err(wrong_protocol(Self::PROTOCOL, frame));
        }
        require_len(Self::PROTOCOL, frame, Self::MIN_LEN)?;
        let data = frame.data();
        let txn_id = data[0].as_u16().ok_or(WireError::BadField {
            protocol: Self::PROTOCOL,
            index: 0,
        })?;
        let unit_id = data[1].as_u8().ok_or(WireError::BadField {
            protocol: Self::PROTOCOL,
            index: 1,
        })?;
        let func_code = data[2].as_u8().ok_or(WireError::BadField {
            protocol: Self::PROTOCOL,
            index: 2,
        })?;
        Ok(Self {
            txn_id,
            unit_id,
            func_code,
            data: data[3..].to_vec(),
        })
    }
}

/// Coordinator data-subscription packet.
///
/// The sub-type namespace for this protocol is defined on the coordinator
/// side of the fleet and is not part of this repository; decode validates
/// shape only and rejects every sub-type, leaving the protocol structurally
/// present but unreachable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoordDataPacket {
    /// Raw sub-type value (no defined namespace here).
    pub sub_type: u64,
    /// Unparsed trailing fields.
    pub body: Vec<FieldValue>,
}

impl CoordDataPacket {
    const PROTOCOL: &'static str = "COORD_DATA";

    /// Parse attempt; always yields `UnknownSubType` for a shaped frame.
    pub fn decode(frame: &ScadaFrame) -> Result<Self> {
        if frame.protocol() != ProtocolTag::CoordData {
            return Err(wrong_protocol(Self::PROTOCOL, frame));
        }
        require_len(Self::PROTOCOL, frame, 1)?;
        let raw = frame.data()[0].as_u64().ok_or(WireError::BadField {
            protocol: Self::PROTOCOL,
            index: 0,
        })?;
        Err(WireError::UnknownSubType {
            protocol: Self::PROTOCOL,
            value: raw,
        })
    }
}

/// Coordinator API packet. Same status as [`CoordDataPacket`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoordApiPacket {
    /// Raw sub-type value (no defined namespace here).
    pub sub_type: u64,
    /// Unparsed trailing fields.
    pub body: Vec<FieldValue>,
}

impl CoordApiPacket {
    const PROTOCOL: &'static str = "COORD_API";

    /// Parse attempt; always yields `UnknownSubType` for a shaped frame.
    pub fn decode(frame: &ScadaFrame) -> Result<Self> {
        if frame.protocol() != ProtocolTag::CoordApi {
            return Err(wrong_protocol(Self::PROTOCOL, frame));
        }
        require_len(Self::PROTOCOL, frame, 1)?;
        let raw = frame.data()[0].as_u64().ok_or(WireError::BadField {
            protocol: Self::PROTOCOL,
            index: 0,
        })?;
        Err(WireError::UnknownSubType {
            protocol: Self::PROTOCOL,
            value: raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rplc_roundtrip_preserves_fields() {
        let report = StatusReport {
            scram: true,
            degraded: false,
            iss_status: IssStatus::TEMP_CRIT | IssStatus::NO_FUEL,
        };
        let frame = RplcPacket::status(7, report).into_frame(12);
        let packet = RplcPacket::decode(&frame).expect("decode status");
        assert_eq!(packet.plc_id, 7);
        assert_eq!(packet.kind, RplcType::Status);
        assert_eq!(packet.status_report(), Some(report));
    }

    #[test]
    fn rplc_minimum_length_is_two_fields() {
        // exactly at the minimum: [plc_id, type]
        let frame = RplcPacket::link_request(7).into_frame(1);
        assert_eq!(frame.len(), 2);
        assert!(RplcPacket::decode(&frame).is_ok());

        // one short: [plc_id]
        let short = ScadaFrame::new(1, ProtocolTag::Rplc, vec![FieldValue::from(7u32)]);
        assert!(matches!(
            RplcPacket::decode(&short),
            Err(WireError::TruncatedPayload { min: 2, len: 1, .. })
        ));
    }

    #[test]
    fn rplc_rejects_unknown_sub_type() {
        let frame = ScadaFrame::new(
            1,
            ProtocolTag::Rplc,
            vec![FieldValue::from(7u32), FieldValue::from(10u8)],
        );
        assert!(matches!(
            RplcPacket::decode(&frame),
            Err(WireError::UnknownSubType { value: 10, .. })
        ));
    }

    #[test]
    fn rplc_rejects_wrong_protocol() {
        let frame = MgmtPacket::close().into_frame(1);
        assert!(matches!(
            RplcPacket::decode(&frame),
            Err(WireError::WrongProtocol {
                expected: "RPLC",
                actual: "SCADA_MGMT",
            })
        ));
    }

    #[test]
    fn link_reply_carries_verdict() {
        let frame = RplcPacket::link_reply(3, LinkResult::Collision).into_frame(2);
        let packet = RplcPacket::decode(&frame).expect("decode link reply");
        assert_eq!(packet.link_result(), Some(LinkResult::Collision));

        let bare = RplcPacket::decode(&RplcPacket::link_request(3).into_frame(3)).unwrap();
        assert_eq!(bare.link_result(), None);
    }

    #[test]
    fn mgmt_minimum_length_is_one_field() {
        let frame = MgmtPacket::remote_linked().into_frame(1);
        assert_eq!(frame.len(), 1);
        assert!(MgmtPacket::decode(&frame).is_ok());

        let empty = ScadaFrame::new(1, ProtocolTag::ScadaMgmt, Vec::new());
        assert!(matches!(
            MgmtPacket::decode(&empty),
            Err(WireError::TruncatedPayload { min: 1, len: 0, .. })
        ));
    }

    #[test]
    fn mgmt_rejects_unknown_sub_type() {
        let frame = ScadaFrame::new(1, ProtocolTag::ScadaMgmt, vec![FieldValue::from(4u8)]);
        assert!(matches!(
            MgmtPacket::decode(&frame),
            Err(WireError::UnknownSubType { value: 4, .. })
        ));
    }

    #[test]
    fn rtu_advert_preserves_capability_order() {
        let caps = [
            RtuAdvertType::Boiler,
            RtuAdvertType::BoilerValve,
            RtuAdvertType::Turbine,
        ];
        let frame = MgmtPacket::rtu_advert(&caps).into_frame(5);
        let packet = MgmtPacket::decode(&frame).expect("decode advert");
        assert_eq!(packet.capabilities(), Some(caps.to_vec()));
    }

    #[test]
    fn rtu_advert_with_unknown_capability_is_dropped_whole() {
        let frame = ScadaFrame::new(
            1,
            ProtocolTag::ScadaMgmt,
            vec![FieldValue::from(2u8), FieldValue::from(1u8), FieldValue::from(7u8)],
        );
        let packet = MgmtPacket::decode(&frame).expect("shape decodes");
        assert_eq!(packet.capabilities(), None);
    }

    #[test]
    fn modbus_minimum_length_is_three_fields() {
        let frame = ModbusPacket::new(1, 2, 3, Vec::new()).into_frame(1);
        assert_eq!(frame.len(), 3);
        let packet = ModbusPacket::decode(&frame).expect("decode modbus");
        assert_eq!((packet.txn_id, packet.unit_id, packet.func_code), (1, 2, 3));

        let short = ScadaFrame::new(
            1,
            ProtocolTag::ModbusTcp,
            vec![FieldValue::from(1u16), FieldValue::from(2u8)],
        );
        assert!(matches!(
            ModbusPacket::decode(&short),
            Err(WireError::TruncatedPayload { min: 3, len: 2, .. })
        ));
    }

    #[test]
    fn coordinator_sub_types_are_unreachable() {
        let data = ScadaFrame::new(1, ProtocolTag::CoordData, vec![FieldValue::from(0u8)]);
        assert!(matches!(
            CoordDataPacket::decode(&data),
            Err(WireError::UnknownSubType { value: 0, .. })
        ));
        let api = ScadaFrame::new(1, ProtocolTag::CoordApi, vec![FieldValue::from(1u8)]);
        assert!(matches!(
            CoordApiPacket::decode(&api),
            Err(WireError::UnknownSubType { value: 1, .. })
        ));
    }

    #[test]
    fn iss_status_bits_are_stable() {
        assert_eq!(IssStatus::DAMAGE_CRIT.bits(), 0x0001);
        assert_eq!(IssStatus::TEMP_CRIT.bits(), 0x0002);
        assert_eq!(IssStatus::NO_COOLANT.bits(), 0x0004);
        assert_eq!(IssStatus::EX_WASTE.bits(), 0x0008);
        assert_eq!(IssStatus::EX_HCOOLANT.bits(), 0x0010);
        assert_eq!(IssStatus::NO_FUEL.bits(), 0x0020);
        assert_eq!(IssStatus::FAULT.bits(), 0x0040);
        assert_eq!(IssStatus::TIMEOUT.bits(), 0x0080);
        assert_eq!(IssStatus::MANUAL.bits(), 0x0100);
    }

    #[test]
    fn iss_status_display_lists_causes() {
        let status = IssStatus::TEMP_CRIT | IssStatus::TIMEOUT;
        assert_eq!(status.to_string(), "TEMP_CRIT|TIMEOUT");
        assert_eq!(IssStatus::empty().to_string(), "CLEAR");
    }

    #[test]
    fn iss_status_from_bits_masks_undefined_positions() {
        let status = IssStatus::from_bits(0xFFFF);
        assert_eq!(status.bits(), 0x01FF);
    }

    #[test]
    fn iss_status_set_operations() {
        let mut status = IssStatus::empty();
        status.insert(IssStatus::MANUAL);
        status.insert(IssStatus::TIMEOUT);
        assert!(status.contains(IssStatus::MANUAL));
        status.remove(IssStatus::MANUAL);
        assert!(!status.contains(IssStatus::MANUAL));
        assert!(status.contains(IssStatus::TIMEOUT));
    }
}
