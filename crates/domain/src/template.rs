//! Task templates
//!
//! A template is a pure function from the scheduled arrival to the 27 initial
//! task definitions, with deadlines expressed relative to that arrival.
//! Deadlines past the end of the clock saturate at `Timestamp::MAX`.

use crate::role::{Role, Timestamp};
use crate::task::{TaskDefinition, TASK_COUNT};

pub trait TaskTemplate {
    fn generate_tasks(&self, scheduled_arrival: Timestamp) -> [TaskDefinition; TASK_COUNT];
}

impl<F> TaskTemplate for F
where
    F: Fn(Timestamp) -> [TaskDefinition; TASK_COUNT],
{
    fn generate_tasks(&self, scheduled_arrival: Timestamp) -> [TaskDefinition; TASK_COUNT] {
        self(scheduled_arrival)
    }
}

/// (name, role, minutes after arrival, mandatory)
const STANDARD_SLOTS: [(&str, Role, u64, bool); TASK_COUNT] = [
    ("chocks_on", Role::GroundHandling, 2, true),
    ("ground_power_connected", Role::GroundHandling, 4, true),
    ("jet_bridge_docked", Role::Gate, 5, true),
    ("cabin_door_opened", Role::FlightCrew, 6, true),
    ("deboarding_complete", Role::FlightCrew, 15, true),
    ("hold_unloading_started", Role::GroundHandling, 8, true),
    ("hold_unloading_complete", Role::GroundHandling, 20, true),
    ("cabin_cleaning_started", Role::Cleaning, 17, true),
    ("lavatory_service", Role::Cleaning, 25, false),
    ("cabin_cleaning_complete", Role::Cleaning, 30, true),
    ("catering_unloaded", Role::Catering, 20, true),
    ("catering_loaded", Role::Catering, 32, true),
    ("bar_trolleys_sealed", Role::Catering, 34, false),
    ("fuel_truck_positioned", Role::Fuel, 15, false),
    ("fueling_started", Role::Fuel, 18, true),
    ("fueling_complete", Role::Fuel, 35, true),
    ("fuel_slip_signed", Role::FlightCrew, 38, true),
    ("potable_water_service", Role::GroundHandling, 30, false),
    ("cabin_security_check", Role::FlightCrew, 36, true),
    ("boarding_started", Role::Gate, 38, true),
    ("hold_loading_complete", Role::GroundHandling, 45, true),
    ("boarding_complete", Role::Gate, 50, true),
    ("passenger_reconciliation", Role::Gate, 52, true),
    ("load_sheet_signed", Role::FlightCrew, 53, true),
    ("cabin_doors_closed", Role::FlightCrew, 55, true),
    ("jet_bridge_retracted", Role::Gate, 56, true),
    ("pushback_ready", Role::GroundHandling, 58, true),
];

/// Narrow-body turnaround of roughly one hour
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTemplate;

impl TaskTemplate for StandardTemplate {
    fn generate_tasks(&self, scheduled_arrival: Timestamp) -> [TaskDefinition; TASK_COUNT] {
        STANDARD_SLOTS.map(|(name, role, minutes, mandatory)| {
            let deadline = scheduled_arrival.saturating_add(minutes * 60);
            TaskDefinition::new(name, role, deadline, mandatory)
        })
    }
}

/// Evenly spaced deadlines with roles assigned round-robin.
///
/// Task `i` is due at `scheduled_arrival + i * interval_secs`.
#[derive(Debug, Clone, Copy)]
pub struct FixedIntervalTemplate {
    pub interval_secs: u64,
    pub mandatory: bool,
}

impl FixedIntervalTemplate {
    pub fn new(interval_secs: u64, mandatory: bool) -> Self {
        Self {
            interval_secs,
            mandatory,
        }
    }
}

impl TaskTemplate for FixedIntervalTemplate {
    fn generate_tasks(&self, scheduled_arrival: Timestamp) -> [TaskDefinition; TASK_COUNT] {
        std::array::from_fn(|i| {
            TaskDefinition::new(
                format!("task_{:02}", i),
                Role::ALL[i % Role::ALL.len()],
                scheduled_arrival.saturating_add((i as u64).saturating_mul(self.interval_secs)),
                self.mandatory,
            )
        })
    }
}
