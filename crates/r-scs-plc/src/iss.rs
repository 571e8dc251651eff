//! ---
//! scs_section: "04-plc-safety-loop"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Reactor PLC safety loop, communications, and scheduler."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use r_scs_wire::IssStatus;
use tracing::warn;

/// One protection-system sensor snapshot.
///
/// Fill levels are fractions in `[0, 1]`; the core never interprets the
/// physical units beyond the trip thresholds below.
#[derive(Debug, Clone, PartialEq)]
pub struct IssSample {
    /// Structural damage, percent.
    pub damage_percent: f64,
    /// Core temperature, kelvin.
    pub temp_kelvin: f64,
    /// Coolant tank fill fraction.
    pub coolant_fill: f64,
    /// Waste tank fill fraction.
    pub waste_fill: f64,
    /// Heated coolant tank fill fraction.
    pub hcoolant_fill: f64,
    /// Fuel tank fill fraction.
    pub fuel_fill: f64,
}

impl IssSample {
    /// A healthy reactor at operating conditions.
    pub fn nominal() -> Self {
        Self {
            damage_percent: 0.0,
            temp_kelvin: 300.0,
            coolant_fill: 1.0,
            waste_fill: 0.0,
            hcoolant_fill: 0.0,
            fuel_fill: 1.0,
        }
    }
}

/// Trip thresholds. Matches the protection limits of the simulated fleet.
const DAMAGE_CRIT_PERCENT: f64 = 100.0;
const TEMP_CRIT_KELVIN: f64 = 1_200.0;
const MIN_COOLANT_FILL: f64 = 0.02;
const MAX_WASTE_FILL: f64 = 0.99;
const MAX_HCOOLANT_FILL: f64 = 0.99;
const MIN_FUEL_FILL: f64 = 0.0;

/// Result of one trip evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssCheck {
    /// Whether any cause is currently latched.
    pub tripped: bool,
    /// The full cause bitfield.
    pub status: IssStatus,
    /// True only on the rising edge from not-tripped to tripped; used to
    /// emit exactly one alarm per edge.
    pub first_trip: bool,
}

/// Independent safety system: evaluates sensor samples against trip limits
/// and latches causes until an explicit reset.
#[derive(Debug)]
pub struct Iss {
    status: IssStatus,
    was_tripped: bool,
}

impl Iss {
    /// A clear protection system.
    pub fn new() -> Self {
        Self {
            status: IssStatus::empty(),
            was_tripped: false,
        }
    }

    /// Evaluate one sensor sample. Newly violated limits are ORed into the
    /// latched cause set; causes never clear here.
    pub fn check(&mut self, sample: &IssSample) -> IssCheck {
        let mut fresh = IssStatus::empty();
        if sample.damage_percent >= DAMAGE_CRIT_PERCENT {
            fresh.insert(IssStatus::DAMAGE_CRIT);
        }
        if sample.temp_kelvin >= TEMP_CRIT_KELVIN {
            fresh.insert(IssStatus::TEMP_CRIT);
        }
        if sample.coolant_fill < MIN_COOLANT_FILL {
            fresh.insert(IssStatus::NO_COOLANT);
        }
        if sample.waste_fill > MAX_WASTE_FILL {
            fresh.insert(IssStatus::EX_WASTE);
        }
        if sample.hcoolant_fill > MAX_HCOOLANT_FILL {
            fresh.insert(IssStatus::EX_HCOOLANT);
        }
        if sample.fuel_fill <= MIN_FUEL_FILL {
            fresh.insert(IssStatus::NO_FUEL);
        }
        self.status.insert(fresh);
        self.finish_check()
    }

    /// Record a sensor-read failure as a protection fault.
    pub fn check_faulted(&mut self) -> IssCheck {
        self.status.insert(IssStatus::FAULT);
        self.finish_check()
    }

    fn finish_check(&mut self) -> IssCheck {
        let tripped = !self.status.is_empty();
        let first_trip = tripped && !self.was_tripped;
        if first_trip {
            warn!(status = %self.status, "protection system tripped");
        }
        self.was_tripped = tripped;
        IssCheck {
            tripped,
            status: self.status,
            first_trip,
        }
    }

    /// Latch a supervisor-session timeout trip.
    pub fn trip_timeout(&mut self) {
        self.status.insert(IssStatus::TIMEOUT);
    }

    /// Latch an operator-commanded trip.
    pub fn trip_manual(&mut self) {
        self.status.insert(IssStatus::MANUAL);
    }

    /// Clear every latched cause. Conditions that still hold will re-latch
    /// on the next [`Iss::check`].
    pub fn reset(&mut self) {
        self.status = IssStatus::empty();
        self.was_tripped = false;
    }

    /// Current latched cause set.
    pub fn status(&self) -> IssStatus {
        self.status
    }

    /// Whether any cause is latched.
    pub fn is_tripped(&self) -> bool {
        !self.status.is_empty()
    }
}

impl Default for Iss {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_sample_does_not_trip() {
        let mut iss = Iss::new();
        let check = iss.check(&IssSample::nominal());
        assert!(!check.tripped);
        assert!(!check.first_trip);
        assert!(check.status.is_empty());
    }

    #[test]
    fn first_trip_fires_exactly_once_per_edge() {
        let mut iss = Iss::new();
        let hot = IssSample {
            temp_kelvin: 1_500.0,
            ..IssSample::nominal()
        };

        let first = iss.check(&hot);
        assert!(first.tripped);
        assert!(first.first_trip);
        assert!(first.status.contains(IssStatus::TEMP_CRIT));

        let second = iss.check(&hot);
        assert!(second.tripped);
        assert!(!second.first_trip, "no second alarm on a held edge");

        // reset with the condition cleared, then a fresh edge
        iss.reset();
        let cleared = iss.check(&IssSample::nominal());
        assert!(!cleared.tripped);
        let again = iss.check(&hot);
        assert!(again.first_trip, "new edge after a clean reset");
    }

    #[test]
    fn causes_latch_until_reset() {
        let mut iss = Iss::new();
        let dry = IssSample {
            coolant_fill: 0.0,
            ..IssSample::nominal()
        };
        iss.check(&dry);
        // condition clears but the cause stays latched
        let check = iss.check(&IssSample::nominal());
        assert!(check.tripped);
        assert!(check.status.contains(IssStatus::NO_COOLANT));

        iss.reset();
        assert!(!iss.is_tripped());
    }

    #[test]
    fn reset_with_standing_condition_relatches() {
        let mut iss = Iss::new();
        let hot = IssSample {
            temp_kelvin: 1_500.0,
            ..IssSample::nominal()
        };
        iss.check(&hot);
        iss.reset();
        let check = iss.check(&hot);
        assert!(check.tripped, "standing condition re-latches after reset");
        assert!(check.first_trip);
    }

    #[test]
    fn external_trips_latch_their_causes() {
        let mut iss = Iss::new();
        iss.trip_timeout();
        assert!(iss.status().contains(IssStatus::TIMEOUT));
        iss.trip_manual();
        assert!(iss.status().contains(IssStatus::MANUAL));
        assert!(iss.is_tripped());
    }

    #[test]
    fn sensor_fault_is_its_own_cause() {
        let mut iss = Iss::new();
        let check = iss.check_faulted();
        assert!(check.tripped);
        assert!(check.first_trip);
        assert!(check.status.contains(IssStatus::FAULT));
    }

    #[test]
    fn multiple_causes_accumulate() {
        let mut iss = Iss::new();
        let bad = IssSample {
            temp_kelvin: 2_000.0,
            fuel_fill: 0.0,
            waste_fill: 1.0,
            ..IssSample::nominal()
        };
        let check = iss.check(&bad);
        assert!(check.status.contains(IssStatus::TEMP_CRIT));
        assert!(check.status.contains(IssStatus::NO_FUEL));
        assert!(check.status.contains(IssStatus::EX_WASTE));
    }
}
