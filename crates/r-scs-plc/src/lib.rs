//! ---
//! scs_section: "04-plc-safety-loop"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Reactor PLC safety loop, communications, and scheduler."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
//! Reactor PLC node: the latching-SCRAM safety core, the supervisor comms
//! binding, and the 20 Hz cooperative tick scheduler that owns them both.

pub mod comms;
pub mod iss;
pub mod peripherals;
pub mod scheduler;
pub mod state;

pub use comms::{FrameOutcome, PlcComms};
pub use iss::{Iss, IssCheck, IssSample};
pub use peripherals::{PeripheralError, PeripheralResult, Reactor, SimReactor};
pub use scheduler::{PlugEvent, Scheduler, SchedulerHandles};
pub use state::{PeripheralEvent, PlcState, RemoteCommand, SafetyCore, TickOutcome};
