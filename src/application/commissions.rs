//! Commission evaluation over the members of a simulation result.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, instrument};

use crate::application::report::MemberRecord;
use crate::domain::{
    CommissionEngine, CommissionPlanSummary, CommissionResult, CommissionRules, CommissionSubject,
    MemberId,
};

impl From<&MemberRecord> for CommissionSubject {
    fn from(member: &MemberRecord) -> Self {
        Self {
            level: member.level,
            personal_volume: member.personal_volume,
            team_volume: member.team_volume,
            leg_volumes: member.leg_volumes.clone(),
        }
    }
}

/// Commissions earned by one member.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemberCommissions {
    pub results: Vec<CommissionResult>,
    pub standard_total: f64,
    pub custom_total: f64,
    pub total: f64,
}

impl MemberCommissions {
    pub fn new(results: Vec<CommissionResult>) -> Self {
        let (custom, standard): (Vec<&CommissionResult>, Vec<&CommissionResult>) =
            results.iter().partition(|r| r.is_custom());
        let standard_total: f64 = standard.iter().map(|r| r.amount).sum();
        let custom_total: f64 = custom.iter().map(|r| r.amount).sum();
        Self {
            results,
            standard_total,
            custom_total,
            total: standard_total + custom_total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionReport {
    pub members: BTreeMap<MemberId, MemberCommissions>,
    pub grand_total: f64,
    pub plan: CommissionPlanSummary,
}

impl CommissionReport {
    pub fn for_member(&self, id: MemberId) -> Option<&MemberCommissions> {
        self.members.get(&id)
    }

    /// Members earning anything, highest total first.
    pub fn top_earners(&self, limit: usize) -> Vec<(MemberId, f64)> {
        let mut earners: Vec<(MemberId, f64)> = self
            .members
            .iter()
            .filter(|(_, c)| c.total > 0.0)
            .map(|(id, c)| (*id, c.total))
            .collect();
        earners.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        earners.truncate(limit);
        earners
    }
}

/// Evaluates `rules` for every non-root member in parallel.
///
/// The root is the company node and never earns; it has no entry in the report.
#[instrument(level = "debug", skip_all, fields(members = members.len()))]
pub fn evaluate_commissions(members: &[MemberRecord], rules: &CommissionRules) -> CommissionReport {
    let evaluated: BTreeMap<MemberId, MemberCommissions> = members
        .par_iter()
        .filter(|member| member.parent_id.is_some())
        .map(|member| {
            let subject = CommissionSubject::from(member);
            (member.id, MemberCommissions::new(CommissionEngine::evaluate(&subject, rules)))
        })
        .collect();

    // summed in id order so the total does not depend on scheduling
    let grand_total = evaluated.values().map(|c| c.total).sum();
    info!(grand_total, "commissions evaluated");

    CommissionReport {
        members: evaluated,
        grand_total,
        plan: rules.summary(),
    }
}
