//! ---
//! scs_section: "04-plc-safety-loop"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Reactor PLC safety loop, communications, and scheduler."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use anyhow::Result;
use r_scs_common::config::NodeConfig;
use r_scs_common::logging::alert;
use r_scs_common::time::jitter_us;
use r_scs_wire::{RadioMessage, RadioTransport, ScadaFrame};
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::comms::PlcComms;
use crate::peripherals::Reactor;
use crate::state::{PeripheralEvent, SafetyCore};

/// Peripheral plug events as delivered to the scheduler, carrying the new
/// handles on attach.
pub enum PlugEvent {
    /// A reactor was mounted.
    ReactorAttached(Box<dyn Reactor>),
    /// The reactor was unmounted.
    ReactorDetached,
    /// A modem was mounted.
    ModemAttached(Box<dyn RadioTransport>),
    /// The modem was unmounted.
    ModemDetached,
}

enum SchedulerEvent {
    LoopTick,
    Modem(RadioMessage),
    Plug(PlugEvent),
    Terminate,
}

/// Control handles held by the process that hosts the scheduler.
#[derive(Clone)]
pub struct SchedulerHandles {
    plug_tx: mpsc::UnboundedSender<PlugEvent>,
    terminate_tx: mpsc::UnboundedSender<()>,
}

impl SchedulerHandles {
    /// Deliver a replacement reactor handle.
    pub fn reconnect_reactor(&self, reactor: Box<dyn Reactor>) {
        let _ = self.plug_tx.send(PlugEvent::ReactorAttached(reactor));
    }

    /// Report the reactor unmounted.
    pub fn detach_reactor(&self) {
        let _ = self.plug_tx.send(PlugEvent::ReactorDetached);
    }

    /// Deliver a replacement modem transport.
    pub fn reconnect_modem(&self, modem: Box<dyn RadioTransport>) {
        let _ = self.plug_tx.send(PlugEvent::ModemAttached(modem));
    }

    /// Report the modem unmounted.
    pub fn detach_modem(&self) {
        let _ = self.plug_tx.send(PlugEvent::ModemDetached);
    }

    /// Request a clean shutdown (one final scram attempt, then exit).
    pub fn terminate(&self) {
        let _ = self.terminate_tx.send(());
    }
}

/// The 20 Hz cooperative loop. Sole owner of the safety core, the comms
/// binding, and the modem handle; every state change happens inside one
/// iteration of [`Scheduler::run`].
pub struct Scheduler {
    core: SafetyCore,
    comms: PlcComms,
    modem: Option<Box<dyn RadioTransport>>,
    loop_period: Duration,
    plug_rx: mpsc::UnboundedReceiver<PlugEvent>,
    terminate_rx: mpsc::UnboundedReceiver<()>,
    tick_count: u64,
    last_tick_at: Option<Instant>,
}

impl Scheduler {
    /// Assemble a scheduler from the node configuration and the peripherals
    /// present at boot.
    pub fn new(
        config: &NodeConfig,
        reactor: Option<Box<dyn Reactor>>,
        modem: Option<Box<dyn RadioTransport>>,
    ) -> (Self, SchedulerHandles) {
        let (plug_tx, plug_rx) = mpsc::unbounded_channel();
        let (terminate_tx, terminate_rx) = mpsc::unbounded_channel();
        let core = SafetyCore::new(config.networked, reactor, modem.is_some());
        let comms = PlcComms::new(
            config.reactor_id,
            config.server_port,
            config.networked,
            &config.timing,
        );
        (
            Self {
                core,
                comms,
                modem,
                loop_period: config.timing.loop_period,
                plug_rx,
                terminate_rx,
                tick_count: 0,
                last_tick_at: None,
            },
            SchedulerHandles {
                plug_tx,
                terminate_tx,
            },
        )
    }

    /// Run the loop until an operator terminate.
    pub async fn run(mut self) -> Result<()> {
        let mut ticker = interval(self.loop_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_ms = self.loop_period.as_millis() as u64, "plc scheduler running");

        loop {
            let event = self.next_event(&mut ticker).await;
            let now = tokio::time::Instant::now().into_std();

            match event {
                SchedulerEvent::Terminate => {
                    self.core.shutdown();
                    if self.comms.is_linked() {
                        if let Some(modem) = self.modem.as_ref() {
                            let notice = self.comms.close_notice();
                            if let Err(err) = modem.send(self.comms.server_port(), &notice).await {
                                debug!(error = %err, "close notice not delivered");
                            }
                        }
                    }
                    alert("terminate requested, exiting");
                    info!(ticks = self.tick_count, "scheduler stopped");
                    return Ok(());
                }
                SchedulerEvent::Plug(plug) => {
                    self.apply_plug(plug);
                    self.step(now).await;
                }
                SchedulerEvent::LoopTick => {
                    self.step(now).await;
                    self.tick_count += 1;
                    if let Some(previous) = self.last_tick_at.replace(now) {
                        debug!(
                            tick = self.tick_count,
                            jitter_us = jitter_us(now.duration_since(previous), self.loop_period),
                            "loop tick"
                        );
                    }
                    let frames =
                        self.comms
                            .on_tick(now, self.core.state(), self.core.iss_status());
                    self.send_frames(frames).await;
                }
                SchedulerEvent::Modem(message) => {
                    self.step(now).await;
                    if let Ok(frame) = ScadaFrame::receive(&message) {
                        let outcome = self.comms.handle_frame(&frame, now);
                        for command in outcome.commands {
                            let applied = self.core.apply_command(command);
                            if let Some(status) = applied.alarm {
                                let frame = self.comms.iss_alarm(status);
                                self.send_frames(vec![frame]).await;
                            }
                        }
                        self.send_frames(outcome.replies).await;
                    }
                }
            }
        }
    }

    /// One blocking wait for the next event. The modem is polled directly
    /// when mounted; there is no reader task to race with.
    async fn next_event(&mut self, ticker: &mut Interval) -> SchedulerEvent {
        let terminate_rx = &mut self.terminate_rx;
        let plug_rx = &mut self.plug_rx;
        if let Some(modem) = self.modem.as_mut() {
            tokio::select! {
                biased;
                _ = terminate_rx.recv() => SchedulerEvent::Terminate,
                plug = plug_rx.recv() => match plug {
                    Some(plug) => SchedulerEvent::Plug(plug),
                    None => SchedulerEvent::Terminate,
                },
                message = modem.recv() => match message {
                    Ok(message) => SchedulerEvent::Modem(message),
                    Err(err) => {
                        warn!(error = %err, "modem receive failed; treating as modem loss");
                        SchedulerEvent::Plug(PlugEvent::ModemDetached)
                    }
                },
                _ = ticker.tick() => SchedulerEvent::LoopTick,
            }
        } else {
            tokio::select! {
                biased;
                _ = terminate_rx.recv() => SchedulerEvent::Terminate,
                plug = plug_rx.recv() => match plug {
                    Some(plug) => SchedulerEvent::Plug(plug),
                    None => SchedulerEvent::Terminate,
                },
                _ = ticker.tick() => SchedulerEvent::LoopTick,
            }
        }
    }

    fn apply_plug(&mut self, plug: PlugEvent) {
        match plug {
            PlugEvent::ReactorAttached(handle) => self
                .core
                .queue_peripheral(PeripheralEvent::ReactorAttached(handle)),
            PlugEvent::ReactorDetached => {
                self.core.queue_peripheral(PeripheralEvent::ReactorDetached)
            }
            PlugEvent::ModemAttached(transport) => {
                self.modem = Some(transport);
                self.core.queue_peripheral(PeripheralEvent::ModemAttached);
            }
            PlugEvent::ModemDetached => {
                self.modem = None;
                self.core.queue_peripheral(PeripheralEvent::ModemDetached);
            }
        }
    }

    /// The ordered per-iteration reaction shared by every event: watchdog
    /// observation, then the safety-core reducer, then any one-shot alarm.
    async fn step(&mut self, now: Instant) {
        if self.comms.check_timeout(now) {
            self.core.apply_timeout();
            self.comms.unlink();
            alert("server timeout, reactor disabled");
        }
        let outcome = self.core.tick();
        if let Some(status) = outcome.alarm {
            let frame = self.comms.iss_alarm(status);
            self.send_frames(vec![frame]).await;
        }
    }

    async fn send_frames(&self, frames: Vec<ScadaFrame>) {
        let Some(modem) = self.modem.as_ref() else {
            if !frames.is_empty() {
                debug!(count = frames.len(), "outbound frames dropped without a modem");
            }
            return;
        };
        for frame in frames {
            if let Err(err) = modem.send(self.comms.server_port(), &frame).await {
                warn!(error = %err, "frame transmission failed");
            }
        }
    }
}
