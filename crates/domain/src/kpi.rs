//! KPI aggregation over task state
//!
//! Pure reductions: the same task snapshot always yields the same counters,
//! whatever order the tasks were completed in.

use serde::{Deserialize, Serialize};

use crate::role::Role;
use crate::task::{Task, TaskStatus};

/// Counters derived from one pass over the tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub on_time: u32,
    /// Every late task, justified or not
    pub late: u32,
    pub late_unjustified: u32,
    pub pending: u32,
    pub mandatory_incomplete: u32,
}

impl KpiSnapshot {
    pub fn compute<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        tasks.into_iter().fold(Self::default(), |mut kpis, task| {
            match task.status {
                TaskStatus::OnTime => kpis.on_time += 1,
                TaskStatus::Late => {
                    kpis.late += 1;
                    if task.justification.is_empty() {
                        kpis.late_unjustified += 1;
                    }
                }
                TaskStatus::Pending => kpis.pending += 1,
            }
            if task.mandatory && !task.is_completed() {
                kpis.mandatory_incomplete += 1;
            }
            kpis
        })
    }

    /// At least one completed task is late and unexplained
    pub fn sla_breached(&self) -> bool {
        self.late_unjustified > 0
    }

    pub fn report(&self) -> KpiReport {
        KpiReport {
            on_time: self.on_time,
            late_unjustified: self.late_unjustified,
            sla_breached: self.sla_breached(),
        }
    }
}

/// Live KPI view exposed to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiReport {
    pub on_time: u32,
    pub late_unjustified: u32,
    pub sla_breached: bool,
}

/// Per-role task outcomes, the input to badge issuance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleOutcome {
    pub role: Role,
    pub assigned: u32,
    pub completed: u32,
    pub on_time: u32,
    pub late: u32,
    pub late_unjustified: u32,
}

impl RoleOutcome {
    fn empty(role: Role) -> Self {
        Self {
            role,
            assigned: 0,
            completed: 0,
            on_time: 0,
            late: 0,
            late_unjustified: 0,
        }
    }

    pub fn participated(&self) -> bool {
        self.completed > 0
    }

    pub fn badge_eligible(&self) -> bool {
        self.participated() && self.late_unjustified == 0
    }
}

/// Outcomes for all six roles, in `Role::ALL` order
pub fn role_outcomes<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Vec<RoleOutcome> {
    let mut outcomes: Vec<RoleOutcome> = Role::ALL.iter().map(|r| RoleOutcome::empty(*r)).collect();

    for task in tasks {
        let Some(outcome) = outcomes.iter_mut().find(|o| o.role == task.role) else {
            continue;
        };
        outcome.assigned += 1;
        match task.status {
            TaskStatus::OnTime => {
                outcome.completed += 1;
                outcome.on_time += 1;
            }
            TaskStatus::Late => {
                outcome.completed += 1;
                outcome.late += 1;
                if task.justification.is_empty() {
                    outcome.late_unjustified += 1;
                }
            }
            TaskStatus::Pending => {}
        }
    }

    outcomes
}
