//! ---
//! scs_section: "01-core-functionality"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Shared primitives and utilities for the node runtimes."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
//! Core shared primitives for the R-SCS node workspace.
//! This crate exposes configuration loading, logging setup, and monotonic
//! time utilities consumed by every node binary.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{LoggingConfig, NodeConfig, TimingConfig};
pub use logging::{alert, init_tracing, LogFormat};
