//! Task records and the fixed 27-slot registry
//!
//! Each task runs a one-shot state machine: `Pending` until it is completed,
//! then `OnTime` or `Late` for good. The registry only enforces per-task rules;
//! authorization and certification gating live on the turnaround aggregate.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TurnaroundError};
use crate::role::{Identity, Role, Timestamp};

/// Number of tasks in every turnaround
pub const TASK_COUNT: usize = 27;

/// Index of a task, valid in `0..TASK_COUNT`
pub type TaskId = usize;

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    OnTime,
    Late,
}

impl TaskStatus {
    /// Both outcomes are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::OnTime | TaskStatus::Late)
    }

    /// Completion at the deadline instant still counts as on time
    pub fn classify(completed_at: Timestamp, deadline: Timestamp) -> Self {
        if completed_at <= deadline {
            TaskStatus::OnTime
        } else {
            TaskStatus::Late
        }
    }
}

/// Initial shape of a task as supplied by a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    pub role: Role,
    pub deadline: Timestamp,
    pub mandatory: bool,
}

impl TaskDefinition {
    pub fn new(name: impl Into<String>, role: Role, deadline: Timestamp, mandatory: bool) -> Self {
        Self {
            name: name.into(),
            role,
            deadline,
            mandatory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub role: Role,
    pub deadline: Timestamp,
    pub mandatory: bool,
    pub status: TaskStatus,
    pub completed_at: Option<Timestamp>,
    pub completed_by: Option<Identity>,
    /// Empty until a late completion is justified
    pub justification: String,
}

impl Task {
    fn from_definition(id: TaskId, definition: TaskDefinition) -> Self {
        Self {
            id,
            name: definition.name,
            role: definition.role,
            deadline: definition.deadline,
            mandatory: definition.mandatory,
            status: TaskStatus::Pending,
            completed_at: None,
            completed_by: None,
            justification: String::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_late_unjustified(&self) -> bool {
        self.status == TaskStatus::Late && self.justification.is_empty()
    }

    pub fn definition(&self) -> TaskDefinition {
        TaskDefinition {
            name: self.name.clone(),
            role: self.role,
            deadline: self.deadline,
            mandatory: self.mandatory,
        }
    }
}

/// Fixed collection of the 27 task records of one turnaround
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRegistry {
    tasks: [Task; TASK_COUNT],
}

impl TaskRegistry {
    pub fn new(definitions: [TaskDefinition; TASK_COUNT]) -> Self {
        let mut next_id = 0;
        let tasks = definitions.map(|definition| {
            let task = Task::from_definition(next_id, definition);
            next_id += 1;
            task
        });
        Self { tasks }
    }

    /// Rebuild from a definition slice that must hold exactly 27 entries
    pub fn from_slice(definitions: &[TaskDefinition]) -> Result<Self> {
        let array: [TaskDefinition; TASK_COUNT] =
            definitions.to_vec().try_into().map_err(|v: Vec<TaskDefinition>| {
                TurnaroundError::ReplayDivergence(format!(
                    "expected {} task definitions, found {}",
                    TASK_COUNT,
                    v.len()
                ))
            })?;
        Ok(Self::new(array))
    }

    pub fn get(&self, task_id: TaskId) -> Result<&Task> {
        self.tasks
            .get(task_id)
            .ok_or(TurnaroundError::InvalidTask { task_id })
    }

    fn get_mut(&mut self, task_id: TaskId) -> Result<&mut Task> {
        self.tasks
            .get_mut(task_id)
            .ok_or(TurnaroundError::InvalidTask { task_id })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    /// Record completion and classify against the deadline
    pub fn complete(
        &mut self,
        task_id: TaskId,
        completed_by: Identity,
        now: Timestamp,
    ) -> Result<TaskStatus> {
        let task = self.get_mut(task_id)?;
        if task.is_completed() {
            return Err(TurnaroundError::AlreadyCompleted { task_id });
        }

        let status = TaskStatus::classify(now, task.deadline);
        task.status = status;
        task.completed_at = Some(now);
        task.completed_by = Some(completed_by);
        Ok(status)
    }

    /// Check that a justification may be stored, without storing it
    pub fn check_justifiable(&self, task_id: TaskId, text: &str, allow_revision: bool) -> Result<()> {
        let task = self.get(task_id)?;
        if !task.is_completed() {
            return Err(TurnaroundError::NotCompleted { task_id });
        }
        if task.status != TaskStatus::Late {
            return Err(TurnaroundError::NotLate { task_id });
        }
        if text.trim().is_empty() {
            return Err(TurnaroundError::EmptyJustification { task_id });
        }
        if !allow_revision && !task.justification.is_empty() {
            return Err(TurnaroundError::AlreadyJustified { task_id });
        }
        Ok(())
    }

    pub fn justify(
        &mut self,
        task_id: TaskId,
        text: impl Into<String>,
        allow_revision: bool,
    ) -> Result<()> {
        let text = text.into();
        self.check_justifiable(task_id, &text, allow_revision)?;
        self.get_mut(task_id)?.justification = text;
        Ok(())
    }

    /// Returns the previous flag
    pub fn set_mandatory(&mut self, task_id: TaskId, mandatory: bool) -> Result<bool> {
        let task = self.get_mut(task_id)?;
        let previous = task.mandatory;
        task.mandatory = mandatory;
        Ok(previous)
    }

    /// Ids of mandatory tasks that are not completed, in id order
    pub fn outstanding_mandatory(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.mandatory && !t.is_completed())
            .map(|t| t.id)
            .collect()
    }

    /// Overwrite a task's outcome from an audit record during replay
    pub(crate) fn restore_completion(
        &mut self,
        task_id: TaskId,
        status: TaskStatus,
        completed_at: Timestamp,
        completed_by: Identity,
    ) -> Result<()> {
        let task = self.get_mut(task_id)?;
        if task.is_completed() {
            return Err(TurnaroundError::AlreadyCompleted { task_id });
        }
        if status != TaskStatus::classify(completed_at, task.deadline) {
            return Err(TurnaroundError::ReplayDivergence(format!(
                "task {} recorded as {:?} at {} against deadline {}",
                task_id, status, completed_at, task.deadline
            )));
        }
        task.status = status;
        task.completed_at = Some(completed_at);
        task.completed_by = Some(completed_by);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(deadline: Timestamp) -> TaskRegistry {
        TaskRegistry::new(std::array::from_fn(|i| {
            TaskDefinition::new(format!("task-{}", i), Role::ALL[i % 6], deadline, i % 2 == 0)
        }))
    }

    #[test]
    fn test_ids_follow_slots() {
        let registry = registry(100);
        for (i, task) in registry.iter().enumerate() {
            assert_eq!(task.id, i);
            assert_eq!(task.name, format!("task-{}", i));
            assert_eq!(task.status, TaskStatus::Pending);
        }
    }

    #[test]
    fn test_classify_boundary() {
        assert_eq!(TaskStatus::classify(100, 100), TaskStatus::OnTime);
        assert_eq!(TaskStatus::classify(99, 100), TaskStatus::OnTime);
        assert_eq!(TaskStatus::classify(101, 100), TaskStatus::Late);
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(TaskStatus::Late.is_terminal());
    }

    #[test]
    fn test_complete_is_one_shot() {
        let mut registry = registry(100);
        let who = Identity::from("gh-1");

        assert_eq!(registry.complete(3, who.clone(), 150).unwrap(), TaskStatus::Late);
        assert_eq!(
            registry.complete(3, who.clone(), 50),
            Err(TurnaroundError::AlreadyCompleted { task_id: 3 })
        );

        let task = registry.get(3).unwrap();
        assert_eq!(task.status, TaskStatus::Late);
        assert_eq!(task.completed_at, Some(150));
        assert_eq!(task.completed_by.as_ref(), Some(&who));
    }

    #[test]
    fn test_out_of_range() {
        let mut registry = registry(100);
        assert_eq!(
            registry.get(TASK_COUNT).unwrap_err(),
            TurnaroundError::InvalidTask { task_id: TASK_COUNT }
        );
        assert!(registry.complete(99, Identity::from("x"), 1).is_err());
        assert!(registry.set_mandatory(27, true).is_err());
    }

    #[test]
    fn test_justify_preconditions() {
        let mut registry = registry(100);
        let who = Identity::from("fuel-2");

        assert_eq!(
            registry.justify(0, "late fuel truck", true),
            Err(TurnaroundError::NotCompleted { task_id: 0 })
        );

        registry.complete(0, who.clone(), 10).unwrap();
        assert_eq!(
            registry.justify(0, "late fuel truck", true),
            Err(TurnaroundError::NotLate { task_id: 0 })
        );

        registry.complete(1, who, 200).unwrap();
        assert_eq!(
            registry.justify(1, "   ", true),
            Err(TurnaroundError::EmptyJustification { task_id: 1 })
        );
        registry.justify(1, "late fuel truck", true).unwrap();
        assert!(!registry.get(1).unwrap().is_late_unjustified());

        assert_eq!(
            registry.justify(1, "changed story", false),
            Err(TurnaroundError::AlreadyJustified { task_id: 1 })
        );
        registry.justify(1, "changed story", true).unwrap();
        assert_eq!(registry.get(1).unwrap().justification, "changed story");
    }

    #[test]
    fn test_outstanding_mandatory() {
        let mut registry = registry(100);
        let evens: Vec<TaskId> = (0..TASK_COUNT).filter(|i| i % 2 == 0).collect();
        assert_eq!(registry.outstanding_mandatory(), evens);

        registry.complete(0, Identity::from("a"), 1).unwrap();
        assert!(registry.set_mandatory(2, false).unwrap());
        let outstanding = registry.outstanding_mandatory();
        assert!(!outstanding.contains(&0));
        assert!(!outstanding.contains(&2));
        assert_eq!(outstanding.len(), evens.len() - 2);
    }

    #[test]
    fn test_from_slice_requires_exact_count() {
        let defs: Vec<TaskDefinition> = registry(5).iter().map(Task::definition).collect();
        assert!(TaskRegistry::from_slice(&defs).is_ok());
        assert!(matches!(
            TaskRegistry::from_slice(&defs[..26]),
            Err(TurnaroundError::ReplayDivergence(_))
        ));
    }
}
