//! ---
//! scs_section: "04-plc-safety-loop"
//! scs_subsection: "binary"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Binary entrypoint for the reactor PLC daemon."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use r_scs_common::config::NodeConfig;
use r_scs_common::logging::init_tracing;
use r_scs_common::time::{duration_to_millis, monotonic_now};
use r_scs_plc::peripherals::SimReactor;
use r_scs_plc::scheduler::Scheduler;
use r_scs_wire::{RadioTransport, UdpRadio};
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "R-SCS reactor PLC daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,
}

// The PLC is a single thread of control: every state change happens inside
// one scheduler iteration, so the runtime is pinned to the current thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/plc.toml"));
    candidates.push(PathBuf::from("configs/plc.dev.toml"));

    let load_started = monotonic_now();
    let loaded = NodeConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    init_tracing("r-scs-plcd", &config.logging)?;
    info!(
        config_path = %loaded.source.display(),
        load_ms = duration_to_millis(load_started.elapsed()),
        reactor_id = config.reactor_id,
        listen_port = config.listen_port,
        server_port = config.server_port,
        networked = config.networked,
        "configuration loaded"
    );

    let reactor = SimReactor::new();
    let modem: Option<Box<dyn RadioTransport>> = if config.networked {
        match UdpRadio::bind(config.listen_port).await {
            Ok(radio) => Some(Box::new(radio)),
            Err(err) => {
                // boot degraded rather than refuse to boot: the safety loop
                // must run even without a modem
                warn!(error = %err, "modem unavailable at boot");
                None
            }
        }
    } else {
        info!("standalone mode; no modem mounted");
        None
    };

    let (scheduler, handles) = Scheduler::new(&config, Some(Box::new(reactor.handle())), modem);

    let terminate_handles = handles.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received; requesting terminate");
            terminate_handles.terminate();
        }
    });

    scheduler.run().await
}
