//! Commission rules and their evaluation for a single member.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::arena::Member;

/// Built-in commission formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionKind {
    Binary,
    Sales,
    Referral,
    Unilevel,
    FastStart,
}

impl CommissionKind {
    pub fn label(&self) -> &'static str {
        match self {
            CommissionKind::Binary => "binary",
            CommissionKind::Sales => "sales",
            CommissionKind::Referral => "referral",
            CommissionKind::Unilevel => "unilevel",
            CommissionKind::FastStart => "fast_start",
        }
    }
}

impl fmt::Display for CommissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Condition that fires a custom rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Volume,
    Level,
    Milestone,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Volume => f.write_str("volume"),
            TriggerKind::Level => f.write_str("level"),
            TriggerKind::Milestone => f.write_str("milestone"),
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardRule {
    /// Display name, empty means the kind label
    #[serde(default)]
    pub name: String,
    pub kind: CommissionKind,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_volume: Option<f64>,
}

impl StandardRule {
    pub fn new(kind: CommissionKind, percentage: f64) -> Self {
        Self {
            name: String::new(),
            kind,
            enabled: true,
            percentage,
            max_level: None,
            min_volume: None,
            max_volume: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_level(mut self, level: u32) -> Self {
        self.max_level = Some(level);
        self
    }

    pub fn with_min_volume(mut self, volume: f64) -> Self {
        self.min_volume = Some(volume);
        self
    }

    pub fn with_max_volume(mut self, volume: f64) -> Self {
        self.max_volume = Some(volume);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.kind.label()
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub percentage: f64,
    pub trigger_kind: TriggerKind,
    pub trigger_value: f64,
    /// Kept with the rule but not a firing condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_volume: Option<f64>,
}

impl CustomRule {
    pub fn new(name: impl Into<String>, trigger_kind: TriggerKind, trigger_value: f64, percentage: f64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            enabled: true,
            percentage,
            trigger_kind,
            trigger_value,
            max_level: None,
            max_volume: None,
        }
    }

    pub fn with_max_level(mut self, level: u32) -> Self {
        self.max_level = Some(level);
        self
    }

    pub fn with_max_volume(mut self, volume: f64) -> Self {
        self.max_volume = Some(volume);
        self
    }
}

/// The rule set evaluated against every member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommissionRules {
    #[serde(default)]
    pub standard: Vec<StandardRule>,
    #[serde(default)]
    pub custom: Vec<CustomRule>,
}

/// Totals of the enabled part of a rule set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionPlanSummary {
    pub total_percentage: f64,
    pub active_standard: usize,
    pub active_custom: usize,
    pub standard_kinds: Vec<CommissionKind>,
}

impl CommissionRules {
    pub fn is_empty(&self) -> bool {
        self.standard.is_empty() && self.custom.is_empty()
    }

    pub fn summary(&self) -> CommissionPlanSummary {
        let standard: Vec<&StandardRule> = self.standard.iter().filter(|r| r.enabled).collect();
        let custom: Vec<&CustomRule> = self.custom.iter().filter(|r| r.enabled).collect();
        CommissionPlanSummary {
            total_percentage: standard.iter().map(|r| r.percentage).sum::<f64>()
                + custom.iter().map(|r| r.percentage).sum::<f64>(),
            active_standard: standard.len(),
            active_custom: custom.len(),
            standard_kinds: standard.iter().map(|r| r.kind).collect(),
        }
    }
}

/// Label used for results of custom rules.
pub const CUSTOM_KIND: &str = "custom";

/// One emitted commission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionResult {
    pub rule_name: String,
    /// Standard kind label or `custom`
    pub kind: String,
    pub amount: f64,
    pub percentage_used: f64,
    /// Member level for level-based rules, 0 otherwise
    pub level: u32,
    pub volume_basis: f64,
    pub explanation: String,
}

impl CommissionResult {
    pub fn is_custom(&self) -> bool {
        self.kind == CUSTOM_KIND
    }
}

/// Volume snapshot a rule set is evaluated against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommissionSubject {
    pub level: u32,
    pub personal_volume: f64,
    pub team_volume: f64,
    pub leg_volumes: BTreeMap<String, f64>,
}

impl CommissionSubject {
    pub fn new(level: u32, personal_volume: f64, team_volume: f64) -> Self {
        Self {
            level,
            personal_volume,
            team_volume,
            leg_volumes: BTreeMap::new(),
        }
    }

    pub fn with_leg(mut self, leg: impl Into<String>, volume: f64) -> Self {
        self.leg_volumes.insert(leg.into(), volume);
        self
    }

    /// Volume of the weaker of the `left` and `right` legs.
    pub fn weaker_leg(&self) -> f64 {
        let leg = |key: &str| self.leg_volumes.get(key).copied().unwrap_or(0.0);
        leg("left").min(leg("right"))
    }
}

impl From<&Member> for CommissionSubject {
    fn from(member: &Member) -> Self {
        Self {
            level: member.level,
            personal_volume: member.personal_volume,
            team_volume: member.team_volume,
            leg_volumes: member.leg_volumes.clone(),
        }
    }
}

/// Zero or negative limits count as unset.
fn limit(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

fn level_limit(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v > 0)
}

fn clamp(basis: f64, max_volume: Option<f64>) -> f64 {
    match limit(max_volume) {
        Some(max) => basis.min(max),
        None => basis,
    }
}

fn below(basis: f64, min_volume: Option<f64>) -> bool {
    limit(min_volume).is_some_and(|min| basis < min)
}

fn beyond(level: u32, max_level: Option<u32>) -> bool {
    level_limit(max_level).is_some_and(|max| level > max)
}

/// Stateless evaluator of a [`CommissionRules`] set.
pub struct CommissionEngine;

impl CommissionEngine {
    /// All positive commissions `subject` earns, standard rules first.
    pub fn evaluate(subject: &CommissionSubject, rules: &CommissionRules) -> Vec<CommissionResult> {
        let standard = rules
            .standard
            .iter()
            .filter_map(|rule| Self::evaluate_standard(subject, rule));
        let custom = rules
            .custom
            .iter()
            .filter_map(|rule| Self::evaluate_custom(subject, rule));
        standard.chain(custom).collect()
    }

    pub fn evaluate_standard(subject: &CommissionSubject, rule: &StandardRule) -> Option<CommissionResult> {
        if !rule.enabled {
            return None;
        }
        let pct = rule.percentage;
        let (basis, multiplier, level, explanation) = match rule.kind {
            CommissionKind::Binary => {
                let weaker = subject.weaker_leg();
                if below(weaker, rule.min_volume) {
                    return None;
                }
                let basis = clamp(weaker, rule.max_volume);
                (basis, 1.0, 0, format!("binary commission on weaker leg volume {basis:.2}"))
            }
            CommissionKind::Sales => {
                let total = subject.personal_volume + subject.team_volume;
                if below(total, rule.min_volume) {
                    return None;
                }
                let basis = clamp(total, rule.max_volume);
                (
                    basis,
                    1.0,
                    0,
                    format!(
                        "sales commission on personal {:.2} and team {:.2} volume",
                        subject.personal_volume, subject.team_volume
                    ),
                )
            }
            CommissionKind::Referral => {
                if below(subject.personal_volume, rule.min_volume) {
                    return None;
                }
                let basis = clamp(subject.personal_volume, rule.max_volume);
                (basis, 1.0, 0, format!("referral commission on personal volume {basis:.2}"))
            }
            CommissionKind::Unilevel => {
                if beyond(subject.level, rule.max_level) || below(subject.team_volume, rule.min_volume) {
                    return None;
                }
                let basis = clamp(subject.team_volume, rule.max_volume);
                let multiplier = (1.0 - (subject.level as f64 - 1.0) * 0.1).max(0.1);
                (
                    basis,
                    multiplier,
                    subject.level,
                    format!(
                        "unilevel commission at level {} on team volume {basis:.2} (x{multiplier:.2})",
                        subject.level
                    ),
                )
            }
            CommissionKind::FastStart => {
                if beyond(subject.level, rule.max_level) || below(subject.team_volume, rule.min_volume) {
                    return None;
                }
                let basis = clamp(subject.team_volume, rule.max_volume);
                let multiplier = (1.5 - (subject.level as f64 - 1.0) * 0.2).max(0.5);
                (
                    basis,
                    multiplier,
                    subject.level,
                    format!(
                        "fast start commission at level {} on team volume {basis:.2} (x{multiplier:.2})",
                        subject.level
                    ),
                )
            }
        };

        let amount = basis * pct * multiplier / 100.0;
        (amount > 0.0).then(|| CommissionResult {
            rule_name: rule.display_name().to_string(),
            kind: rule.kind.label().to_string(),
            amount,
            percentage_used: pct,
            level,
            volume_basis: basis,
            explanation,
        })
    }

    pub fn evaluate_custom(subject: &CommissionSubject, rule: &CustomRule) -> Option<CommissionResult> {
        if !rule.enabled {
            return None;
        }
        let fired = match rule.trigger_kind {
            // milestone shares the volume test
            TriggerKind::Volume | TriggerKind::Milestone => subject.team_volume >= rule.trigger_value,
            TriggerKind::Level => subject.level as f64 >= rule.trigger_value,
        };
        if !fired {
            return None;
        }

        let pct = rule.percentage;
        let (basis, level, explanation) = match rule.trigger_kind {
            TriggerKind::Volume => (
                subject.team_volume,
                0,
                format!("volume trigger {:.2} reached with team volume {:.2}", rule.trigger_value, subject.team_volume),
            ),
            TriggerKind::Level => (
                subject.personal_volume,
                subject.level,
                format!(
                    "level trigger {} reached at level {} on personal volume {:.2}",
                    rule.trigger_value, subject.level, subject.personal_volume
                ),
            ),
            TriggerKind::Milestone => (
                rule.trigger_value,
                0,
                format!("milestone of {:.2} team volume reached", rule.trigger_value),
            ),
        };

        let mut amount = basis * pct / 100.0;
        if let Some(max) = limit(rule.max_volume) {
            amount = amount.min(max * pct / 100.0);
        }
        (amount > 0.0).then(|| CommissionResult {
            rule_name: rule.name.clone(),
            kind: CUSTOM_KIND.to_string(),
            amount,
            percentage_used: pct,
            level,
            volume_basis: basis,
            explanation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn rules(standard: Vec<StandardRule>, custom: Vec<CustomRule>) -> CommissionRules {
        CommissionRules { standard, custom }
    }

    #[test]
    fn given_level_two_member_when_unilevel_ten_percent_then_pays_ninety() {
        let subject = CommissionSubject::new(2, 0.0, 1000.0);
        let rule = StandardRule::new(CommissionKind::Unilevel, 10.0).with_max_level(5);

        let result = CommissionEngine::evaluate_standard(&subject, &rule).unwrap();

        assert_relative_eq!(result.amount, 90.0);
        assert_eq!(result.level, 2);
        assert_eq!(result.rule_name, "unilevel");
    }

    #[test]
    fn given_member_below_level_cap_when_fast_start_then_multiplier_applies() {
        let subject = CommissionSubject::new(1, 0.0, 1000.0);
        let rule = StandardRule::new(CommissionKind::FastStart, 10.0);
        let result = CommissionEngine::evaluate_standard(&subject, &rule).unwrap();
        assert_relative_eq!(result.amount, 150.0);

        let deep = CommissionSubject::new(10, 0.0, 1000.0);
        let result = CommissionEngine::evaluate_standard(&deep, &rule).unwrap();
        assert_relative_eq!(result.amount, 50.0);
    }

    #[test]
    fn given_member_beyond_max_level_when_unilevel_then_nothing() {
        let subject = CommissionSubject::new(6, 0.0, 1000.0);
        let rule = StandardRule::new(CommissionKind::Unilevel, 10.0).with_max_level(5);
        assert!(CommissionEngine::evaluate_standard(&subject, &rule).is_none());
    }

    #[rstest]
    #[case(300.0, 500.0, None, None, 30.0)]
    #[case(300.0, 500.0, Some(200.0), None, 20.0)]
    #[case(300.0, 500.0, None, Some(400.0), 0.0)]
    #[case(300.0, 0.0, None, None, 0.0)]
    fn given_legs_when_binary_then_weaker_leg_is_the_basis(
        #[case] left: f64,
        #[case] right: f64,
        #[case] max_volume: Option<f64>,
        #[case] min_volume: Option<f64>,
        #[case] expected: f64,
    ) {
        let subject = CommissionSubject::new(0, 0.0, left + right)
            .with_leg("left", left)
            .with_leg("right", right);
        let mut rule = StandardRule::new(CommissionKind::Binary, 10.0);
        rule.max_volume = max_volume;
        rule.min_volume = min_volume;

        let amount = CommissionEngine::evaluate_standard(&subject, &rule).map_or(0.0, |r| r.amount);
        assert_relative_eq!(amount, expected);
    }

    #[test]
    fn given_zero_limits_when_sales_then_limits_are_ignored() {
        let subject = CommissionSubject::new(1, 100.0, 400.0);
        let rule = StandardRule::new(CommissionKind::Sales, 5.0)
            .with_max_volume(0.0)
            .with_min_volume(0.0);
        let result = CommissionEngine::evaluate_standard(&subject, &rule).unwrap();
        assert_relative_eq!(result.amount, 25.0);
        assert_relative_eq!(result.volume_basis, 500.0);
    }

    #[test]
    fn given_volume_trigger_not_reached_when_custom_then_nothing() {
        let subject = CommissionSubject::new(1, 0.0, 400.0);
        let rule = CustomRule::new("bonus", TriggerKind::Volume, 500.0, 5.0);
        assert!(CommissionEngine::evaluate_custom(&subject, &rule).is_none());
    }

    #[test]
    fn given_milestone_reached_when_custom_then_pays_on_trigger_value() {
        let subject = CommissionSubject::new(1, 0.0, 2500.0);
        let rule = CustomRule::new("milestone", TriggerKind::Milestone, 1000.0, 10.0);
        let result = CommissionEngine::evaluate_custom(&subject, &rule).unwrap();
        assert_relative_eq!(result.amount, 100.0);
        assert!(result.is_custom());
    }

    #[test]
    fn given_max_volume_when_custom_volume_then_amount_is_capped() {
        let subject = CommissionSubject::new(1, 0.0, 5000.0);
        let rule = CustomRule::new("capped", TriggerKind::Volume, 100.0, 10.0).with_max_volume(1000.0);
        let result = CommissionEngine::evaluate_custom(&subject, &rule).unwrap();
        assert_relative_eq!(result.amount, 100.0);
    }

    #[test]
    fn given_level_trigger_when_custom_then_pays_on_personal_volume() {
        let subject = CommissionSubject::new(3, 200.0, 0.0);
        let rule = CustomRule::new("depth", TriggerKind::Level, 2.0, 10.0);
        let result = CommissionEngine::evaluate_custom(&subject, &rule).unwrap();
        assert_relative_eq!(result.amount, 20.0);
        assert_eq!(result.level, 3);

        // max_level is carried as data only, custom rules fire at any depth
        let deep = rule.with_max_level(2);
        assert_relative_eq!(CommissionEngine::evaluate_custom(&subject, &deep).unwrap().amount, 20.0);
    }

    #[test]
    fn given_rule_set_when_evaluating_then_skips_disabled_and_zero_amounts() {
        let subject = CommissionSubject::new(1, 100.0, 0.0);
        let rules = rules(
            vec![
                StandardRule::new(CommissionKind::Referral, 10.0).named("ref"),
                StandardRule::new(CommissionKind::Sales, 10.0).disabled(),
                StandardRule::new(CommissionKind::Unilevel, 10.0),
            ],
            vec![CustomRule::new("bonus", TriggerKind::Volume, 0.0, 5.0)],
        );

        let results = CommissionEngine::evaluate(&subject, &rules);

        let names: Vec<&str> = results.iter().map(|r| r.rule_name.as_str()).collect();
        assert_eq!(names, vec!["ref"]);
    }

    #[test]
    fn given_rule_set_when_summarizing_then_counts_enabled_rules() {
        let rules = rules(
            vec![
                StandardRule::new(CommissionKind::Binary, 10.0),
                StandardRule::new(CommissionKind::Sales, 5.0).disabled(),
            ],
            vec![CustomRule::new("bonus", TriggerKind::Volume, 0.0, 2.5)],
        );
        let summary = rules.summary();
        assert_relative_eq!(summary.total_percentage, 12.5);
        assert_eq!(summary.active_standard, 1);
        assert_eq!(summary.active_custom, 1);
        assert_eq!(summary.standard_kinds, vec![CommissionKind::Binary]);
    }
}
