//! ---
//! scs_section: "04-plc-safety-loop"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Reactor PLC safety loop, communications, and scheduler."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use std::collections::VecDeque;

use r_scs_wire::IssStatus;
use tracing::{debug, info, warn};

use crate::iss::Iss;
use crate::peripherals::Reactor;

/// Immutable snapshot of the PLC's safety-relevant state.
///
/// Invariant: `degraded ⇔ (no_reactor ∨ (networked ∧ no_modem))`, maintained
/// exclusively by [`SafetyCore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlcState {
    /// The node has completed boot with all required peripherals.
    pub init_ok: bool,
    /// Latching emergency-stop flag.
    pub scram: bool,
    /// A required peripheral is missing.
    pub degraded: bool,
    /// No reactor handle is mounted.
    pub no_reactor: bool,
    /// No modem handle is mounted.
    pub no_modem: bool,
    /// Whether this node participates in the SCADA network.
    pub networked: bool,
}

impl PlcState {
    /// Boot defaults: scrammed until proven safe.
    fn boot(networked: bool, no_reactor: bool, no_modem: bool) -> Self {
        let degraded = no_reactor || (networked && no_modem);
        Self {
            init_ok: !degraded,
            scram: true,
            degraded,
            no_reactor,
            no_modem,
            networked,
        }
    }

    fn recompute_degraded(&mut self) {
        self.degraded = self.no_reactor || (self.networked && self.no_modem);
    }
}

/// Peripheral plug events delivered by the device manager.
pub enum PeripheralEvent {
    /// A reactor was mounted; the handle replaces any previous one.
    ReactorAttached(Box<dyn Reactor>),
    /// The reactor was unmounted.
    ReactorDetached,
    /// A modem was mounted (the transport swap happens in the scheduler).
    ModemAttached,
    /// The modem was unmounted.
    ModemDetached,
}

impl std::fmt::Debug for PeripheralEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PeripheralEvent::ReactorAttached(_) => "ReactorAttached",
            PeripheralEvent::ReactorDetached => "ReactorDetached",
            PeripheralEvent::ModemAttached => "ModemAttached",
            PeripheralEvent::ModemDetached => "ModemDetached",
        };
        f.write_str(name)
    }
}

/// Commands arriving from the supervisor over the RPLC protocol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    /// RPS_SCRAM: trip now.
    Scram,
    /// RPS_ENABLE: begin fission if safe.
    Enable,
    /// RPS_RESET: clear the trip latch if causes have resolved.
    Reset,
    /// MEK_BURN_RATE: adjust the setpoint.
    SetBurnRate(f64),
}

/// What one reducer step asks the comms layer to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Emit exactly one RPS_ALARM with this cause set.
    pub alarm: Option<IssStatus>,
}

/// The PLC safety core: sole owner of [`PlcState`], the ISS, and the reactor
/// handle. All mutation happens through [`SafetyCore::tick`],
/// [`SafetyCore::apply_command`], and the timeout/shutdown entry points, each
/// called only from the scheduler thread.
pub struct SafetyCore {
    state: PlcState,
    iss: Iss,
    reactor: Option<Box<dyn Reactor>>,
    pending: VecDeque<PeripheralEvent>,
}

impl SafetyCore {
    /// Boot the core. The reactor is commanded off immediately; the latch
    /// stays set until an operator reset proves conditions are clear.
    pub fn new(networked: bool, reactor: Option<Box<dyn Reactor>>, modem_present: bool) -> Self {
        let no_reactor = reactor.is_none();
        let no_modem = !modem_present;
        let mut core = Self {
            state: PlcState::boot(networked, no_reactor, no_modem),
            iss: Iss::new(),
            reactor,
            pending: VecDeque::new(),
        };
        core.quiet_scram();
        info!(
            init_ok = core.state.init_ok,
            degraded = core.state.degraded,
            "safety core booted (scram latched)"
        );
        core
    }

    /// Current state snapshot.
    pub fn state(&self) -> PlcState {
        self.state
    }

    /// Current latched trip causes.
    pub fn iss_status(&self) -> IssStatus {
        self.iss.status()
    }

    /// Enqueue a peripheral plug event; drained one per tick.
    pub fn queue_peripheral(&mut self, event: PeripheralEvent) {
        self.pending.push_back(event);
    }

    /// Run one reducer step: scram retry, one peripheral event, ISS check.
    ///
    /// The order is load-bearing: the retry runs against the pre-event
    /// handle, peripheral changes land before the ISS reads sensors, and the
    /// returned outcome reaches comms only after the trip state is current.
    pub fn tick(&mut self) -> TickOutcome {
        // 1. retry a latched scram until the reactor confirms off. Failure
        //    reporting is suppressed: a stale handle mid-detach retries next
        //    tick instead of flooding the log at loop rate.
        if self.state.init_ok && self.state.scram {
            self.quiet_scram();
        }

        // 2. drain one peripheral change
        if let Some(event) = self.pending.pop_front() {
            self.apply_peripheral(event);
        }

        // 3. trip evaluation, or fail-safe scram while blind
        let mut outcome = TickOutcome::default();
        if !self.state.degraded {
            let check = match self.reactor.as_ref() {
                Some(reactor) => match reactor.iss_sample() {
                    Ok(sample) => self.iss.check(&sample),
                    Err(err) => {
                        debug!(error = %err, "sensor read failed; recording protection fault");
                        self.iss.check_faulted()
                    }
                },
                // not degraded implies a reactor handle; treat the
                // impossible gap as a fault rather than skipping the check
                None => self.iss.check_faulted(),
            };
            if check.tripped {
                self.state.scram = true;
            }
            if check.first_trip {
                outcome.alarm = Some(check.status);
            }
        } else if self.state.init_ok {
            self.quiet_scram();
        }

        outcome
    }

    fn apply_peripheral(&mut self, event: PeripheralEvent) {
        let was_degraded = self.state.degraded;
        match event {
            PeripheralEvent::ReactorAttached(handle) => {
                self.reactor = Some(handle);
                self.state.no_reactor = false;
                // a rejoining reactor always starts commanded off
                self.state.scram = true;
                self.quiet_scram();
                info!("reactor attached; scram latched on new handle");
            }
            PeripheralEvent::ReactorDetached => {
                self.reactor = None;
                self.state.no_reactor = true;
                self.state.scram = true;
                warn!("reactor detached");
            }
            PeripheralEvent::ModemAttached => {
                self.state.no_modem = false;
                info!("modem attached");
            }
            PeripheralEvent::ModemDetached => {
                self.state.no_modem = true;
                if self.state.init_ok && self.state.networked {
                    self.state.scram = true;
                    self.quiet_scram();
                    warn!("modem detached; scram latched");
                }
            }
        }
        self.state.recompute_degraded();
        if was_degraded && !self.state.degraded {
            // re-initialization after recovery: back to boot defaults
            self.state.init_ok = true;
            self.state.scram = true;
            info!("peripherals recovered; re-initialized to boot defaults");
        }
    }

    /// Apply a remote command from the supervisor.
    pub fn apply_command(&mut self, command: RemoteCommand) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        match command {
            RemoteCommand::Scram => {
                self.iss.trip_manual();
                self.state.scram = true;
                self.loud_scram();
                info!("remote scram applied");
            }
            RemoteCommand::Enable => {
                if self.state.scram || self.state.degraded {
                    warn!(
                        scram = self.state.scram,
                        degraded = self.state.degraded,
                        "enable refused"
                    );
                } else if let Some(reactor) = self.reactor.as_mut() {
                    match reactor.activate() {
                        Ok(()) => info!("reactor enabled"),
                        Err(err) => warn!(error = %err, "reactor enable failed"),
                    }
                }
            }
            RemoteCommand::Reset => {
                if self.state.degraded {
                    warn!("reset refused while degraded");
                } else {
                    self.iss.reset();
                    // the latch clears only when a same-tick check comes
                    // back clean; a standing condition re-latches at once
                    let check = match self.reactor.as_ref() {
                        Some(reactor) => match reactor.iss_sample() {
                            Ok(sample) => self.iss.check(&sample),
                            Err(_) => self.iss.check_faulted(),
                        },
                        None => self.iss.check_faulted(),
                    };
                    if check.tripped {
                        warn!(status = %check.status, "reset left standing trip causes");
                        if check.first_trip {
                            outcome.alarm = Some(check.status);
                        }
                    } else {
                        self.state.scram = false;
                        info!("trip latch cleared by remote reset");
                    }
                }
            }
            RemoteCommand::SetBurnRate(rate) => {
                if self.state.scram {
                    debug!(rate, "burn rate ignored while scrammed");
                } else if let Some(reactor) = self.reactor.as_mut() {
                    match reactor.set_burn_rate(rate) {
                        Ok(()) => debug!(rate, "burn rate applied"),
                        Err(err) => warn!(rate, error = %err, "burn rate rejected"),
                    }
                }
            }
        }
        outcome
    }

    /// Supervisor session timed out: latch the trip and the scram.
    pub fn apply_timeout(&mut self) {
        self.iss.trip_timeout();
        self.state.scram = true;
        self.quiet_scram();
    }

    /// Operator terminate: one final scram attempt.
    pub fn shutdown(&mut self) {
        self.state.scram = true;
        if let Some(reactor) = self.reactor.as_mut() {
            if let Err(err) = reactor.scram() {
                warn!(error = %err, "final scram attempt failed");
            }
        }
    }

    /// Command the reactor off if it reports active, with failure reporting
    /// suppressed. Errors retry next tick.
    fn quiet_scram(&mut self) {
        if let Some(reactor) = self.reactor.as_mut() {
            match reactor.is_active() {
                Ok(true) => {
                    if let Err(err) = reactor.scram() {
                        debug!(error = %err, "suppressed scram failure; will retry");
                    }
                }
                Ok(false) => {} // confirmed off
                Err(err) => {
                    debug!(error = %err, "suppressed status read failure; will retry");
                }
            }
        }
    }

    /// Scram with failures reported at warning level (commanded actions).
    fn loud_scram(&mut self) {
        if let Some(reactor) = self.reactor.as_mut() {
            if let Err(err) = reactor.scram() {
                warn!(error = %err, "scram command failed; will retry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iss::IssSample;
    use crate::peripherals::SimReactor;

    fn healthy_core() -> (SafetyCore, SimReactor) {
        let device = SimReactor::new();
        let core = SafetyCore::new(true, Some(Box::new(device.handle())), true);
        (core, device)
    }

    #[test]
    fn boot_latches_scram_with_init_ok() {
        let (core, _device) = healthy_core();
        let state = core.state();
        assert!(state.scram);
        assert!(state.init_ok);
        assert!(!state.degraded);
        assert!(!state.no_reactor);
        assert!(!state.no_modem);
    }

    #[test]
    fn boot_without_reactor_is_degraded_not_initialized() {
        let core = SafetyCore::new(true, None, true);
        let state = core.state();
        assert!(state.degraded);
        assert!(state.no_reactor);
        assert!(!state.init_ok);
        assert!(state.scram);
    }

    #[test]
    fn scram_retries_until_reactor_confirms_off() {
        let (mut core, device) = healthy_core();
        device.set_active(true);
        let scrams_before = device.scram_count();
        core.tick();
        assert!(device.scram_count() > scrams_before);
        assert!(!device.active());

        // once confirmed off, no further scram commands are issued
        let settled = device.scram_count();
        core.tick();
        assert_eq!(device.scram_count(), settled);
    }

    #[test]
    fn iss_trip_latches_scram_and_alarms_once() {
        let (mut core, device) = healthy_core();
        // operator cleared the boot latch
        core.apply_command(RemoteCommand::Reset);
        assert!(!core.state().scram);

        device.set_sample(IssSample {
            temp_kelvin: 1_500.0,
            ..IssSample::nominal()
        });
        let first = core.tick();
        assert!(core.state().scram);
        let alarm = first.alarm.expect("one alarm on the rising edge");
        assert!(alarm.contains(IssStatus::TEMP_CRIT));

        let second = core.tick();
        assert_eq!(second.alarm, None, "no repeat alarm on a held trip");
    }

    #[test]
    fn reset_clears_only_when_causes_resolve() {
        let (mut core, device) = healthy_core();
        core.apply_command(RemoteCommand::Reset);
        device.set_sample(IssSample {
            coolant_fill: 0.0,
            ..IssSample::nominal()
        });
        core.tick();
        assert!(core.state().scram);

        // condition still standing: reset refused, latch holds
        core.apply_command(RemoteCommand::Reset);
        assert!(core.state().scram);

        // condition resolved: reset clears on the same tick
        device.set_sample(IssSample::nominal());
        core.apply_command(RemoteCommand::Reset);
        assert!(!core.state().scram);
        assert!(core.iss_status().is_empty());
    }

    #[test]
    fn modem_detach_scrams_and_degrades() {
        let (mut core, device) = healthy_core();
        core.apply_command(RemoteCommand::Reset);
        device.set_active(true);

        core.queue_peripheral(PeripheralEvent::ModemDetached);
        core.tick();
        let state = core.state();
        assert!(state.no_modem);
        assert!(state.degraded);
        assert!(state.scram);
        assert!(!device.active(), "reactor commanded off this tick");
    }

    #[test]
    fn standalone_node_tolerates_missing_modem() {
        let device = SimReactor::new();
        let mut core = SafetyCore::new(false, Some(Box::new(device.handle())), false);
        assert!(!core.state().degraded, "non-networked node needs no modem");
        core.apply_command(RemoteCommand::Reset);
        core.queue_peripheral(PeripheralEvent::ModemDetached);
        core.tick();
        assert!(!core.state().degraded);
        assert!(!core.state().scram);
    }

    #[test]
    fn reactor_reattach_starts_scrammed_on_new_handle() {
        let (mut core, device) = healthy_core();
        core.queue_peripheral(PeripheralEvent::ReactorDetached);
        core.tick();
        assert!(core.state().degraded);
        assert!(core.state().scram);

        let replacement = SimReactor::new();
        replacement.set_active(true);
        core.queue_peripheral(PeripheralEvent::ReactorAttached(Box::new(
            replacement.handle(),
        )));
        core.tick();
        let state = core.state();
        assert!(!state.degraded);
        assert!(state.init_ok, "recovery re-initializes the node");
        assert!(state.scram, "rejoining reactor starts latched");
        assert!(!replacement.active(), "new handle commanded off immediately");
    }

    #[test]
    fn degraded_fail_safe_keeps_commanding_shutdown() {
        let (mut core, device) = healthy_core();
        core.queue_peripheral(PeripheralEvent::ModemDetached);
        core.tick();
        device.set_active(true);
        core.tick();
        assert!(!device.active(), "blind node still commands shutdown");
    }

    #[test]
    fn scram_latch_survives_every_event_order() {
        // property: once any trip source fired, scram stays true until an
        // explicit reset with a clean check
        let (mut core, device) = healthy_core();
        core.apply_timeout();
        assert!(core.state().scram);
        assert!(core.iss_status().contains(IssStatus::TIMEOUT));

        device.set_sample(IssSample::nominal());
        for _ in 0..50 {
            core.tick();
            assert!(core.state().scram, "nothing but reset clears the latch");
        }
        core.apply_command(RemoteCommand::Reset);
        assert!(!core.state().scram);
    }

    #[test]
    fn enable_refused_while_scrammed_or_degraded() {
        let (mut core, device) = healthy_core();
        core.apply_command(RemoteCommand::Enable);
        assert!(!device.active(), "enable refused under boot latch");

        core.apply_command(RemoteCommand::Reset);
        core.apply_command(RemoteCommand::Enable);
        assert!(device.active(), "enable honored once clear");
    }

    #[test]
    fn burn_rate_ignored_while_scrammed() {
        let (mut core, device) = healthy_core();
        core.apply_command(RemoteCommand::SetBurnRate(25.0));
        assert_eq!(device.burn_rate(), 0.0);

        core.apply_command(RemoteCommand::Reset);
        core.apply_command(RemoteCommand::SetBurnRate(25.0));
        assert_eq!(device.burn_rate(), 25.0);
    }

    #[test]
    fn remote_scram_latches_manual_cause() {
        let (mut core, device) = healthy_core();
        core.apply_command(RemoteCommand::Reset);
        device.set_active(true);
        core.apply_command(RemoteCommand::Scram);
        assert!(core.state().scram);
        assert!(core.iss_status().contains(IssStatus::MANUAL));
        assert!(!device.active());
    }

    #[test]
    fn shutdown_issues_final_scram() {
        let (mut core, device) = healthy_core();
        device.set_active(true);
        let before = device.scram_count();
        core.shutdown();
        assert_eq!(device.scram_count(), before + 1);
        assert!(!device.active());
    }

    #[test]
    fn detached_handle_failures_are_suppressed_and_retried() {
        let (mut core, device) = healthy_core();
        device.set_active(true);
        device.detach();
        // stale handle: every call fails quietly, loop keeps running
        core.tick();
        core.tick();
        assert!(core.state().scram);

        device.reattach();
        core.tick();
        assert!(!device.active(), "retry succeeds once the handle is valid");
    }
}
