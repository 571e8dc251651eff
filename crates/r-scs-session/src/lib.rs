//! ---
//! scs_section: "03-session-liveness"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Session registries, watchdogs, and liveness tracking."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
//! Session layer shared by every SCADA edge: single-shot watchdogs, the
//! PLC-side supervisor session, and the supervisor-side link registry.
//!
//! Nothing here owns a timer thread. Deadlines are plain instants compared
//! against a caller-supplied clock at the top of each scheduler tick, which
//! keeps the whole layer deterministic under test.

pub mod registry;
pub mod session;
pub mod watchdog;

pub use registry::{LinkRegistry, SessionTimeout};
pub use session::Session;
pub use watchdog::Watchdog;
