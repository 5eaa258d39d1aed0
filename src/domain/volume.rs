//! Volume aggregation over a built and assigned tree.

use std::collections::BTreeMap;

use generational_arena::Index;
use tracing::{debug, instrument};

use crate::domain::arena::{CycleVolumes, GenealogyTree, Member};
use crate::domain::error::{DomainError, DomainResult};

const TOLERANCE: f64 = 1e-6;

/// Annotates every member with team, per-cycle and per-leg volume.
///
/// One post-order pass: each member merges its children's personal and team
/// series, so a descendant's volume reaches every ancestor under the
/// descendant's join cycle and under the leg it sits in.
#[instrument(level = "debug", skip_all, fields(members = tree.len()))]
pub fn aggregate(tree: &mut GenealogyTree) {
    let order: Vec<Index> = tree.iter_postorder().map(|(idx, _)| idx).collect();

    for idx in order {
        let Some(member) = tree.get(idx) else { continue };
        let mut team_volume = 0.0;
        let mut team_per_cycle = CycleVolumes::new();
        let mut leg_per_cycle: BTreeMap<String, CycleVolumes> = BTreeMap::new();
        let mut leg_volumes: BTreeMap<String, f64> = BTreeMap::new();

        for child in member.children.iter().filter_map(|&c| tree.get(c)) {
            let leg = child.leg.clone().unwrap_or_default();
            let subtree = child.personal_volume + child.team_volume;
            team_volume += subtree;
            *leg_volumes.entry(leg.clone()).or_insert(0.0) += subtree;

            let leg_series = leg_per_cycle.entry(leg).or_default();
            for (&cycle, &volume) in child
                .personal_volume_per_cycle
                .iter()
                .chain(child.team_volume_per_cycle.iter())
            {
                *team_per_cycle.entry(cycle).or_insert(0.0) += volume;
                *leg_series.entry(cycle).or_insert(0.0) += volume;
            }
        }

        if let Some(member) = tree.get_mut(idx) {
            if !member.is_root() {
                member.personal_volume_per_cycle = CycleVolumes::from([(member.join_cycle, member.personal_volume)]);
            }
            member.team_volume = team_volume;
            member.team_volume_per_cycle = team_per_cycle;
            member.leg_volume_per_cycle = leg_per_cycle;
            member.leg_volumes = leg_volumes;
        }
    }

    if let Some(root) = tree.get(tree.root()) {
        debug!(team_volume = root.team_volume, legs = root.leg_volumes.len(), "aggregated");
    }
}

/// Checks the volume and width invariants of an aggregated tree.
pub fn verify(tree: &GenealogyTree) -> DomainResult<()> {
    for member in tree.members() {
        if member.children.len() > tree.max_children() {
            return Err(violation(member, format!(
                "{} children exceed width {}",
                member.children.len(),
                tree.max_children()
            )));
        }

        let per_cycle: f64 = member.team_volume_per_cycle.values().sum();
        if !close(per_cycle, member.team_volume) {
            return Err(violation(member, format!(
                "per-cycle team volume {per_cycle} differs from team volume {}",
                member.team_volume
            )));
        }

        let per_leg: f64 = member
            .leg_volume_per_cycle
            .values()
            .flat_map(|series| series.values())
            .sum();
        if !close(per_leg, member.team_volume) {
            return Err(violation(member, format!(
                "per-leg volume {per_leg} differs from team volume {}",
                member.team_volume
            )));
        }
    }
    Ok(())
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

fn violation(member: &Member, detail: String) -> DomainError {
    DomainError::InvariantViolation(format!("{}: {detail}", member.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{MemberId, PlanType};
    use crate::domain::plan::PlanRule;

    /// root -> 1 (cycle 1, 100) -> 3 (cycle 2, 30)
    ///      -> 2 (cycle 1, 50)
    fn tree() -> GenealogyTree {
        let mut tree = GenealogyTree::new(PlanRule::for_plan(PlanType::Binary), 2);
        let root = tree.root();
        let a = tree.insert_child(root, 1).unwrap();
        let b = tree.insert_child(root, 1).unwrap();
        let c = tree.insert_child(a, 2).unwrap();
        for (idx, pv) in [(a, 100.0), (b, 50.0), (c, 30.0)] {
            tree.get_mut(idx).unwrap().personal_volume = pv;
        }
        tree
    }

    #[test]
    fn given_tree_when_aggregating_then_root_sees_all_descendants() {
        let mut tree = tree();
        aggregate(&mut tree);

        let root = tree.member(MemberId::ROOT).unwrap();
        assert_eq!(root.team_volume, 180.0);
        assert_eq!(root.team_volume_per_cycle, CycleVolumes::from([(1, 150.0), (2, 30.0)]));
        assert_eq!(root.leg_volumes["left"], 130.0);
        assert_eq!(root.leg_volumes["right"], 50.0);
        assert_eq!(root.leg_volume_per_cycle["left"], CycleVolumes::from([(1, 100.0), (2, 30.0)]));
        assert!(root.personal_volume_per_cycle.is_empty());
    }

    #[test]
    fn given_leaf_when_aggregating_then_only_personal_series_is_set() {
        let mut tree = tree();
        aggregate(&mut tree);

        let leaf = tree.member(MemberId(3)).unwrap();
        assert_eq!(leaf.team_volume, 0.0);
        assert_eq!(leaf.personal_volume_per_cycle, CycleVolumes::from([(2, 30.0)]));
        assert!(leaf.leg_volumes.is_empty());
        assert!(verify(&tree).is_ok());
    }

    #[test]
    fn given_tampered_team_volume_when_verifying_then_reports_violation() {
        let mut tree = tree();
        aggregate(&mut tree);
        let idx = tree.index_of(MemberId(1)).unwrap();
        tree.get_mut(idx).unwrap().team_volume += 1.0;

        let err = verify(&tree).unwrap_err();
        assert!(err.to_string().contains("user_1"));
    }
}
