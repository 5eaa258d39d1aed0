//! Result assembly: member records, summary statistics and the cycle report.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    Cycle, CycleVolumes, GenealogyTree, MemberId, PlanType, Position, SimulationConfig,
};

/// Frozen view of one member after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberRecord {
    pub id: MemberId,
    pub name: String,
    pub level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<MemberId>,
    pub child_ids: Vec<MemberId>,
    pub position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    pub join_cycle: Cycle,
    pub personal_volume: f64,
    pub team_volume: f64,
    pub personal_volume_per_cycle: CycleVolumes,
    pub team_volume_per_cycle: CycleVolumes,
    pub leg_volume_per_cycle: BTreeMap<String, CycleVolumes>,
    pub leg_volumes: BTreeMap<String, f64>,
}

/// Count, total, average and extremes of a set of volumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolumeStats {
    pub count: usize,
    pub total_volume: f64,
    pub average_volume: f64,
    pub max_volume: f64,
    pub min_volume: f64,
}

impl VolumeStats {
    fn add(&mut self, volume: f64) {
        if self.count == 0 {
            self.max_volume = volume;
            self.min_volume = volume;
        } else {
            self.max_volume = self.max_volume.max(volume);
            self.min_volume = self.min_volume.min(volume);
        }
        self.count += 1;
        self.total_volume += volume;
        self.average_volume = self.total_volume / self.count as f64;
    }
}

impl FromIterator<f64> for VolumeStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = VolumeStats::default();
        for volume in iter {
            stats.add(volume);
        }
        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductShare {
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductCycleShare {
    pub count: usize,
    pub total_volume: f64,
    pub percentage: f64,
    pub average_volume: f64,
}

/// Binary settlement of one cycle with carry-forward.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BinarySettlement {
    pub left_volume: f64,
    pub right_volume: f64,
    /// Remainders carried into the next cycle
    pub carry_forward_left: f64,
    pub carry_forward_right: f64,
    pub matched_volume: f64,
    pub payout_volume: f64,
    pub cap_flush: f64,
}

impl BinarySettlement {
    /// Settles a cycle given the carries brought into it.
    pub fn settle(left: f64, right: f64, carry: (f64, f64), payout_cap: Option<f64>) -> Self {
        let total_left = left + carry.0;
        let total_right = right + carry.1;
        let matched = total_left.min(total_right);
        let payout = match payout_cap {
            Some(cap) if cap > 0.0 => matched.min(cap),
            _ => matched,
        };
        Self {
            left_volume: left,
            right_volume: right,
            carry_forward_left: total_left - matched,
            carry_forward_right: total_right - matched,
            matched_volume: matched,
            payout_volume: payout,
            cap_flush: matched - payout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleVolume {
    pub cycle: Cycle,
    pub members_generated: usize,
    /// Personal volume of members joining in this cycle
    pub personal_volume: f64,
    /// Root team volume attributed to this cycle
    pub team_volume: f64,
    pub leg_volumes: BTreeMap<String, f64>,
    pub product_distribution: BTreeMap<String, ProductCycleShare>,
    pub level_breakdown: BTreeMap<u32, VolumeStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<BinarySettlement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    /// Non-root members
    pub total_members_generated: usize,
    pub members_per_cycle: BTreeMap<Cycle, usize>,
    pub product_distribution: BTreeMap<String, ProductShare>,
    pub total_personal_volume: f64,
    pub total_team_volume: f64,
    /// Average over every node, root included
    pub average_team_volume: f64,
    pub leg_volume_summary: BTreeMap<String, VolumeStats>,
    pub depth: usize,
}

/// Members and personal volume at one depth below a member.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DepthVolume {
    pub members: usize,
    pub personal_volume: f64,
}

/// Complete, immutable outcome of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub id: Uuid,
    /// Seed of the generator, when the run was seeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub config: SimulationConfig,
    pub members: Vec<MemberRecord>,
    /// Parent id to ordered child ids
    pub structure: BTreeMap<MemberId, Vec<MemberId>>,
    pub summary: SimulationSummary,
    pub cycles: Vec<CycleVolume>,
}

impl SimulationResult {
    /// Freezes an aggregated tree into a result.
    pub fn assemble(id: Uuid, config: &SimulationConfig, tree: &GenealogyTree) -> Self {
        let members: Vec<MemberRecord> = tree
            .members()
            .map(|m| MemberRecord {
                id: m.id,
                name: m.id.to_string(),
                level: m.level,
                parent_id: tree.parent_id(m),
                child_ids: tree.child_ids(m),
                position: m.position,
                leg: m.leg.clone(),
                product: m
                    .product
                    .and_then(|p| config.products.get(p))
                    .map(|p| p.name.clone()),
                join_cycle: m.join_cycle,
                personal_volume: m.personal_volume,
                team_volume: m.team_volume,
                personal_volume_per_cycle: m.personal_volume_per_cycle.clone(),
                team_volume_per_cycle: m.team_volume_per_cycle.clone(),
                leg_volume_per_cycle: m.leg_volume_per_cycle.clone(),
                leg_volumes: m.leg_volumes.clone(),
            })
            .collect();

        let structure = members
            .iter()
            .filter(|m| !m.child_ids.is_empty())
            .map(|m| (m.id, m.child_ids.clone()))
            .collect();
        let cohorts = cohorts_by_cycle(config, &members);
        let summary = summarize(config, &members, &cohorts, tree.depth());
        let cycles = cycle_report(config, &members, &cohorts);

        Self {
            id,
            seed: None,
            config: config.clone(),
            members,
            structure,
            summary,
            cycles,
        }
    }

    pub fn root(&self) -> Option<&MemberRecord> {
        self.members.first()
    }

    /// Records are stored in id order.
    pub fn member(&self, id: MemberId) -> Option<&MemberRecord> {
        self.members.get(id.index()).filter(|m| m.id == id)
    }

    /// Ancestors from the parent up to the root.
    pub fn upline(&self, id: MemberId) -> Vec<MemberId> {
        let mut upline = Vec::new();
        let mut current = self.member(id).and_then(|m| m.parent_id);
        while let Some(parent) = current {
            upline.push(parent);
            current = self.member(parent).and_then(|m| m.parent_id);
        }
        upline
    }

    /// All descendants, breadth first.
    pub fn downline(&self, id: MemberId) -> Vec<MemberId> {
        let mut downline = Vec::new();
        let mut queue: VecDeque<MemberId> = self
            .member(id)
            .map(|m| m.child_ids.iter().copied().collect())
            .unwrap_or_default();
        while let Some(next) = queue.pop_front() {
            downline.push(next);
            if let Some(member) = self.member(next) {
                queue.extend(member.child_ids.iter().copied());
            }
        }
        downline
    }

    /// Downline members and personal volume per depth, 1 is direct children.
    pub fn level_breakdown(&self, id: MemberId) -> BTreeMap<u32, DepthVolume> {
        let mut breakdown: BTreeMap<u32, DepthVolume> = BTreeMap::new();
        let Some(base) = self.member(id) else {
            return breakdown;
        };
        for member in self.downline(id).into_iter().filter_map(|d| self.member(d)) {
            let entry = breakdown.entry(member.level - base.level).or_default();
            entry.members += 1;
            entry.personal_volume += member.personal_volume;
        }
        breakdown
    }
}

/// Non-root members grouped by join cycle; index 0 is cycle 1.
fn cohorts_by_cycle<'a>(config: &SimulationConfig, members: &'a [MemberRecord]) -> Vec<Vec<&'a MemberRecord>> {
    let mut cohorts = vec![Vec::new(); config.number_of_cycles as usize];
    for member in members.iter().filter(|m| m.parent_id.is_some()) {
        if let Some(cohort) = (member.join_cycle as usize)
            .checked_sub(1)
            .and_then(|i| cohorts.get_mut(i))
        {
            cohort.push(member);
        }
    }
    cohorts
}

fn summarize(
    config: &SimulationConfig,
    members: &[MemberRecord],
    cohorts: &[Vec<&MemberRecord>],
    depth: usize,
) -> SimulationSummary {
    let generated: Vec<&MemberRecord> = members.iter().filter(|m| m.parent_id.is_some()).collect();
    let total = generated.len();

    let members_per_cycle = (1..=config.number_of_cycles)
        .zip(cohorts)
        .map(|(c, cohort)| (c, cohort.len()))
        .collect();

    let mut product_distribution: BTreeMap<String, ProductShare> = config
        .products
        .iter()
        .map(|p| (p.name.clone(), ProductShare::default()))
        .collect();
    for name in generated.iter().filter_map(|m| m.product.as_ref()) {
        if let Some(share) = product_distribution.get_mut(name) {
            share.count += 1;
        }
    }
    for share in product_distribution.values_mut() {
        share.percentage = percentage(share.count, total);
    }

    let total_team_volume: f64 = members.iter().map(|m| m.team_volume).sum();
    let average_team_volume = if members.is_empty() {
        0.0
    } else {
        total_team_volume / members.len() as f64
    };

    let mut leg_volume_summary: BTreeMap<String, VolumeStats> = BTreeMap::new();
    for member in members {
        for (leg, volume) in &member.leg_volumes {
            leg_volume_summary.entry(leg.clone()).or_default().add(*volume);
        }
    }

    SimulationSummary {
        total_members_generated: total,
        members_per_cycle,
        product_distribution,
        total_personal_volume: generated.iter().map(|m| m.personal_volume).sum(),
        total_team_volume,
        average_team_volume,
        leg_volume_summary,
        depth,
    }
}

fn cycle_report(
    config: &SimulationConfig,
    members: &[MemberRecord],
    cohorts: &[Vec<&MemberRecord>],
) -> Vec<CycleVolume> {
    let Some(root) = members.first() else {
        return Vec::new();
    };
    let binary = config.plan_type == PlanType::Binary;
    let payout_cap = config.effective_payout_cap();
    let mut carry = (0.0, 0.0);

    (1..=config.number_of_cycles)
        .zip(cohorts)
        .map(|(cycle, joined)| {

            let mut leg_volumes: BTreeMap<String, f64> = if binary {
                BTreeMap::from([("left".to_string(), 0.0), ("right".to_string(), 0.0)])
            } else {
                BTreeMap::new()
            };
            for (leg, series) in &root.leg_volume_per_cycle {
                leg_volumes.insert(leg.clone(), series.get(&cycle).copied().unwrap_or(0.0));
            }

            let settlement = binary.then(|| {
                let left = leg_volumes.get("left").copied().unwrap_or(0.0);
                let right = leg_volumes.get("right").copied().unwrap_or(0.0);
                let settled = BinarySettlement::settle(left, right, carry, payout_cap);
                carry = (settled.carry_forward_left, settled.carry_forward_right);
                settled
            });

            CycleVolume {
                cycle,
                members_generated: joined.len(),
                personal_volume: joined.iter().map(|m| m.personal_volume).sum(),
                team_volume: root.team_volume_per_cycle.get(&cycle).copied().unwrap_or(0.0),
                leg_volumes,
                product_distribution: cycle_products(config, joined),
                level_breakdown: cycle_levels(joined),
                binary: settlement,
            }
        })
        .collect()
}

fn cycle_products(config: &SimulationConfig, joined: &[&MemberRecord]) -> BTreeMap<String, ProductCycleShare> {
    let mut shares: BTreeMap<String, ProductCycleShare> = config
        .products
        .iter()
        .map(|p| (p.name.clone(), ProductCycleShare::default()))
        .collect();
    for member in joined {
        if let Some(share) = member.product.as_ref().and_then(|name| shares.get_mut(name)) {
            share.count += 1;
            share.total_volume += member.personal_volume;
        }
    }
    for share in shares.values_mut() {
        share.percentage = percentage(share.count, joined.len());
        if share.count > 0 {
            share.average_volume = share.total_volume / share.count as f64;
        }
    }
    shares
}

fn cycle_levels(joined: &[&MemberRecord]) -> BTreeMap<u32, VolumeStats> {
    let mut levels: BTreeMap<u32, VolumeStats> = BTreeMap::new();
    for member in joined {
        levels.entry(member.level).or_default().add(member.personal_volume);
    }
    levels
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(300.0, 100.0, (0.0, 0.0), None, 100.0, 200.0, 0.0)]
    #[case(0.0, 150.0, (200.0, 0.0), None, 150.0, 50.0, 0.0)]
    #[case(500.0, 500.0, (0.0, 0.0), Some(200.0), 500.0, 0.0, 300.0)]
    #[case(500.0, 500.0, (0.0, 0.0), Some(0.0), 500.0, 0.0, 0.0)]
    fn given_leg_volumes_when_settling_then_carries_remainder_and_flushes_cap(
        #[case] left: f64,
        #[case] right: f64,
        #[case] carry: (f64, f64),
        #[case] cap: Option<f64>,
        #[case] matched: f64,
        #[case] carry_left: f64,
        #[case] flush: f64,
    ) {
        let settled = BinarySettlement::settle(left, right, carry, cap);
        assert_relative_eq!(settled.matched_volume, matched);
        assert_relative_eq!(settled.carry_forward_left, carry_left);
        assert_relative_eq!(settled.cap_flush, flush);
        assert_relative_eq!(settled.payout_volume + settled.cap_flush, settled.matched_volume);
    }

    #[test]
    fn given_volumes_when_collecting_stats_then_tracks_extremes() {
        let stats: VolumeStats = [100.0, 50.0, 300.0].into_iter().collect();
        assert_eq!(stats.count, 3);
        assert_relative_eq!(stats.total_volume, 450.0);
        assert_relative_eq!(stats.average_volume, 150.0);
        assert_relative_eq!(stats.max_volume, 300.0);
        assert_relative_eq!(stats.min_volume, 50.0);
    }
}
