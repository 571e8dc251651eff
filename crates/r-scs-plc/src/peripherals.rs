//! ---
//! scs_section: "04-plc-safety-loop"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Reactor PLC safety loop, communications, and scheduler."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use parking_lot::Mutex;
use std::sync::Arc;

use crate::iss::IssSample;

/// Result type for calls across the peripheral boundary.
pub type PeripheralResult<T> = std::result::Result<T, PeripheralError>;

/// Failures surfaced by peripheral handles.
///
/// The peripheral manager may invalidate a handle at any moment; callers in
/// the safety loop treat every variant as "retry next tick", never as fatal.
#[derive(Debug, thiserror::Error)]
pub enum PeripheralError {
    /// The handle refers to a device that is no longer mounted.
    #[error("peripheral detached")]
    Detached,
    /// The device is mounted but refused the operation.
    #[error("device fault: {0}")]
    Fault(&'static str),
}

/// Opaque reactor handle as presented by the peripheral layer.
///
/// Every operation can fail when the underlying device has been torn down;
/// the safety core runs such calls with failure reporting suppressed and
/// retries on the next tick.
pub trait Reactor: Send + Sync {
    /// Whether fission is currently active.
    fn is_active(&self) -> PeripheralResult<bool>;
    /// Command an emergency shutdown.
    fn scram(&mut self) -> PeripheralResult<()>;
    /// Begin fission at the configured burn rate.
    fn activate(&mut self) -> PeripheralResult<()>;
    /// Adjust the burn rate setpoint.
    fn set_burn_rate(&mut self, rate: f64) -> PeripheralResult<()>;
    /// Read the protection-system sensor block.
    fn iss_sample(&self) -> PeripheralResult<IssSample>;
}

#[derive(Debug, Clone)]
struct SimReactorInner {
    active: bool,
    burn_rate: f64,
    detached: bool,
    scram_count: u64,
    sample: IssSample,
}

/// In-memory reactor used by tests and the simulation daemon.
///
/// Handles are cheap clones over shared state, so a test can keep one side
/// to inspect and inject faults while the scheduler owns the other.
#[derive(Debug, Clone)]
pub struct SimReactor {
    inner: Arc<Mutex<SimReactorInner>>,
}

impl SimReactor {
    /// Build an idle reactor with nominal sensor readings.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimReactorInner {
                active: false,
                burn_rate: 0.0,
                detached: false,
                scram_count: 0,
                sample: IssSample::nominal(),
            })),
        }
    }

    /// Clone a handle over the same simulated device.
    pub fn handle(&self) -> SimReactor {
        self.clone()
    }

    /// Simulate the peripheral manager invalidating every handle.
    pub fn detach(&self) {
        self.inner.lock().detached = true;
    }

    /// Restore handle validity after a reattach.
    pub fn reattach(&self) {
        self.inner.lock().detached = false;
    }

    /// Force the fission state directly (simulating the physical world).
    pub fn set_active(&self, active: bool) {
        self.inner.lock().active = active;
    }

    /// Replace the sensor block the protection system will read.
    pub fn set_sample(&self, sample: IssSample) {
        self.inner.lock().sample = sample;
    }

    /// Number of scram commands the device has accepted.
    pub fn scram_count(&self) -> u64 {
        self.inner.lock().scram_count
    }

    /// Current burn rate setpoint.
    pub fn burn_rate(&self) -> f64 {
        self.inner.lock().burn_rate
    }

    /// Whether fission is active right now.
    pub fn active(&self) -> bool {
        self.inner.lock().active
    }

    fn check_attached(inner: &SimReactorInner) -> PeripheralResult<()> {
        if inner.detached {
            Err(PeripheralError::Detached)
        } else {
            Ok(())
        }
    }
}

impl Default for SimReactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Reactor for SimReactor {
    fn is_active(&self) -> PeripheralResult<bool> {
        let inner = self.inner.lock();
        Self::check_attached(&inner)?;
        Ok(inner.active)
    }

    fn scram(&mut self) -> PeripheralResult<()> {
        let mut inner = self.inner.lock();
        Self::check_attached(&inner)?;
        inner.active = false;
        inner.scram_count += 1;
        Ok(())
    }

    fn activate(&mut self) -> PeripheralResult<()> {
        let mut inner = self.inner.lock();
        Self::check_attached(&inner)?;
        inner.active = true;
        Ok(())
    }

    fn set_burn_rate(&mut self, rate: f64) -> PeripheralResult<()> {
        let mut inner = self.inner.lock();
        Self::check_attached(&inner)?;
        if !(0.0..=1000.0).contains(&rate) {
            return Err(PeripheralError::Fault("burn rate out of range"));
        }
        inner.burn_rate = rate;
        Ok(())
    }

    fn iss_sample(&self) -> PeripheralResult<IssSample> {
        let inner = self.inner.lock();
        Self::check_attached(&inner)?;
        Ok(inner.sample.clone())
    }
}
