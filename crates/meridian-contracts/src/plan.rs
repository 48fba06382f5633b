// Plan / PlanItem (spec.md §3, §4.6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanItemStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl PlanItemStatus {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            PlanItemStatus::Completed | PlanItemStatus::Failed | PlanItemStatus::Skipped
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    /// Position within the plan; also used to express dependencies.
    pub position: usize,
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Option<String>,
    /// Positions of prior items this one depends on.
    #[serde(default)]
    pub dependencies: Vec<usize>,
    pub status: PlanItemStatus,
    #[serde(default)]
    pub chosen_tool: Option<String>,
    #[serde(default)]
    pub execution_result: Option<serde_json::Value>,
}

impl PlanItem {
    pub fn new(position: usize, description: impl Into<String>) -> Self {
        Self {
            position,
            description: description.into(),
            acceptance_criteria: None,
            dependencies: Vec::new(),
            status: PlanItemStatus::Pending,
            chosen_tool: None,
            execution_result: None,
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<usize>) -> Self {
        self.dependencies = deps;
        self
    }
}

/// A session-scoped ordered list of plan items (spec.md §3 `Plan`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub items: Vec<PlanItem>,
}

/// Error returned when a plan mutation would violate an invariant.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("item at position {0} not found")]
    ItemNotFound(usize),
    #[error("dependency cycle detected involving position {0}")]
    Cycle(usize),
    #[error("item {0} has unfinished dependencies and cannot move to in-progress")]
    DependenciesUnfinished(usize),
}

impl Plan {
    pub fn new(items: Vec<PlanItem>) -> Self {
        Self { items }
    }

    pub fn add_item(&mut self, item: PlanItem) -> Result<(), PlanError> {
        let position = item.position;
        self.items.push(item);
        self.check_acyclic(position)?;
        Ok(())
    }

    pub fn get(&self, position: usize) -> Option<&PlanItem> {
        self.items.iter().find(|i| i.position == position)
    }

    fn get_mut(&mut self, position: usize) -> Option<&mut PlanItem> {
        self.items.iter_mut().find(|i| i.position == position)
    }

    /// Invariant: the dependency graph across items is acyclic (spec.md §3, §8 property 2).
    pub fn check_acyclic(&self, start: usize) -> Result<(), PlanError> {
        let mut visiting = std::collections::HashSet::new();
        let mut visited = std::collections::HashSet::new();
        self.visit(start, &mut visiting, &mut visited)
    }

    fn visit(
        &self,
        position: usize,
        visiting: &mut std::collections::HashSet<usize>,
        visited: &mut std::collections::HashSet<usize>,
    ) -> Result<(), PlanError> {
        if visited.contains(&position) {
            return Ok(());
        }
        if !visiting.insert(position) {
            return Err(PlanError::Cycle(position));
        }
        if let Some(item) = self.get(position) {
            for &dep in &item.dependencies {
                self.visit(dep, visiting, visited)?;
            }
        }
        visiting.remove(&position);
        visited.insert(position);
        Ok(())
    }

    /// Invariant: an item becomes in-progress only when all dependencies are
    /// completed or skipped (spec.md §3, §8 property 3).
    pub fn update_status(
        &mut self,
        position: usize,
        status: PlanItemStatus,
    ) -> Result<(), PlanError> {
        if status == PlanItemStatus::InProgress {
            let deps = self
                .get(position)
                .ok_or(PlanError::ItemNotFound(position))?
                .dependencies
                .clone();
            let all_done = deps.iter().all(|&d| {
                self.get(d)
                    .map(|i| matches!(i.status, PlanItemStatus::Completed | PlanItemStatus::Skipped))
                    .unwrap_or(false)
            });
            if !all_done {
                return Err(PlanError::DependenciesUnfinished(position));
            }
        }
        let item = self
            .get_mut(position)
            .ok_or(PlanError::ItemNotFound(position))?;
        item.status = status;
        Ok(())
    }

    pub fn reorder(&mut self, new_order: Vec<usize>) -> Result<(), PlanError> {
        let mut reordered = Vec::with_capacity(new_order.len());
        for pos in new_order {
            let item = self
                .items
                .iter()
                .find(|i| i.position == pos)
                .cloned()
                .ok_or(PlanError::ItemNotFound(pos))?;
            reordered.push(item);
        }
        self.items = reordered;
        Ok(())
    }

    pub fn all_finished(&self) -> bool {
        self.items.iter().all(|i| i.status.is_finished())
    }

    /// The first item whose dependencies are all satisfied and that is still pending.
    pub fn next_actionable(&self) -> Option<&PlanItem> {
        self.items.iter().find(|i| {
            i.status == PlanItemStatus::Pending
                && i.dependencies.iter().all(|&d| {
                    self.get(d)
                        .map(|dep| {
                            matches!(dep.status, PlanItemStatus::Completed | PlanItemStatus::Skipped)
                        })
                        .unwrap_or(false)
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_cyclic_dependencies() {
        let mut plan = Plan::new(vec![
            PlanItem::new(0, "a").with_dependencies(vec![1]),
            PlanItem::new(1, "b"),
        ]);
        // manually introduce a cycle 1 -> 0
        plan.items[1].dependencies = vec![0];
        assert!(matches!(
            plan.check_acyclic(0),
            Err(PlanError::Cycle(_))
        ));
    }

    #[test]
    fn blocks_in_progress_until_dependencies_finish() {
        let mut plan = Plan::new(vec![
            PlanItem::new(0, "write file"),
            PlanItem::new(1, "run file").with_dependencies(vec![0]),
        ]);
        assert!(matches!(
            plan.update_status(1, PlanItemStatus::InProgress),
            Err(PlanError::DependenciesUnfinished(1))
        ));
        plan.update_status(0, PlanItemStatus::Completed).unwrap();
        assert!(plan.update_status(1, PlanItemStatus::InProgress).is_ok());
    }

    #[test]
    fn next_actionable_skips_unfinished_dependencies() {
        let plan = Plan::new(vec![
            PlanItem::new(0, "a"),
            PlanItem::new(1, "b").with_dependencies(vec![0]),
        ]);
        assert_eq!(plan.next_actionable().unwrap().position, 0);
    }
}
