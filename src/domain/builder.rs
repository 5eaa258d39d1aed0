//! Tree builder placing synthetic members cycle by cycle.

use generational_arena::Index;
use tracing::{debug, instrument};

use crate::domain::arena::GenealogyTree;
use crate::domain::entities::{Cycle, SimulationConfig};
use crate::domain::error::DomainError;
use crate::domain::plan::PlanRule;

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, DomainError>;

/// Grows a [`GenealogyTree`] for a validated [`SimulationConfig`].
///
/// Placement takes the first member in creation order that still has a free
/// slot. Members never lose children during a build, so that member never
/// moves backwards and a cursor over the creation order finds it without
/// rescanning.
pub struct TreeBuilder {
    cursor: usize,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }

    #[instrument(level = "debug", skip(self, config), fields(plan = %config.plan_type))]
    pub fn build(&mut self, config: &SimulationConfig) -> TreeResult<GenealogyTree> {
        self.cursor = 0;
        let rule = PlanRule::for_plan(config.plan_type);
        let mut tree = GenealogyTree::new(rule, config.max_children());

        for (offset, quota) in config.cycle_quotas().into_iter().enumerate() {
            let cycle = offset as Cycle + 1;
            for _ in 0..quota {
                let parent = self.next_parent(&tree);
                tree.insert_child(parent, cycle)?;
            }
            debug!(cycle, quota, total = tree.len() - 1, "cycle built");
        }

        let built = tree.len() - 1;
        if built > config.max_expected_members as usize {
            return Err(DomainError::InvariantViolation(format!(
                "built {built} members, budget is {}",
                config.max_expected_members
            )));
        }
        Ok(tree)
    }

    /// First member with capacity; otherwise the shallowest member.
    fn next_parent(&mut self, tree: &GenealogyTree) -> Index {
        let order = tree.indices();
        while let Some(&idx) = order.get(self.cursor) {
            match tree.get(idx) {
                Some(member) if member.children.len() < tree.max_children() => return idx,
                _ => self.cursor += 1,
            }
        }

        // min_by_key keeps the first of equal keys, i.e. creation order
        order
            .iter()
            .copied()
            .filter_map(|idx| tree.get(idx).map(|m| (idx, m.level)))
            .min_by_key(|&(_, level)| level)
            .map(|(idx, _)| idx)
            .unwrap_or_else(|| tree.root())
    }
}
