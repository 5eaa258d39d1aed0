//! Static plan rule table.
//!
//! One immutable [`PlanRule`] per [`PlanType`] describes the structural rules
//! the tree builder follows: width limit, child position labels, fill order
//! and spillover.

use std::fmt;

use serde::Serialize;

use crate::domain::entities::{PlanType, Position};

/// Order in which free slots are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillOrder {
    LeftToRight,
    BreadthFirst,
}

impl fmt::Display for FillOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillOrder::LeftToRight => f.write_str("left to right"),
            FillOrder::BreadthFirst => f.write_str("breadth first"),
        }
    }
}

/// Structural rules of one plan type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRule {
    pub plan_type: PlanType,
    /// Width fixed by the plan; `None` means taken from the configuration
    pub fixed_max_children: Option<u32>,
    /// Named child slots; empty means numeric 1-based slots
    pub child_positions: &'static [&'static str],
    pub fill_order: FillOrder,
    pub spillover: bool,
    pub description: &'static str,
}

static PLAN_RULES: [PlanRule; 3] = [
    PlanRule {
        plan_type: PlanType::Binary,
        fixed_max_children: Some(2),
        child_positions: &["left", "right"],
        fill_order: FillOrder::LeftToRight,
        spillover: true,
        description: "two legs per member, volume matched between left and right",
    },
    PlanRule {
        plan_type: PlanType::Unilevel,
        fixed_max_children: None,
        child_positions: &[],
        fill_order: FillOrder::BreadthFirst,
        spillover: false,
        description: "every recruit on its own leg, commissions paid by depth",
    },
    PlanRule {
        plan_type: PlanType::Matrix,
        fixed_max_children: None,
        child_positions: &[],
        fill_order: FillOrder::BreadthFirst,
        spillover: true,
        description: "fixed width, overflow spills into the next free slot",
    },
];

impl PlanRule {
    pub fn for_plan(plan_type: PlanType) -> &'static PlanRule {
        match plan_type {
            PlanType::Binary => &PLAN_RULES[0],
            PlanType::Unilevel => &PLAN_RULES[1],
            PlanType::Matrix => &PLAN_RULES[2],
        }
    }

    /// All rules in table order.
    pub fn all() -> &'static [PlanRule] {
        &PLAN_RULES
    }

    /// Width limit; a fixed plan width overrides `configured`.
    pub fn max_children(&self, configured: u32) -> usize {
        self.fixed_max_children.unwrap_or(configured) as usize
    }

    pub fn accepts_children_count(&self, n: u32) -> bool {
        match self.fixed_max_children {
            Some(fixed) => n == fixed,
            None => n >= 1,
        }
    }

    pub fn children_requirement(&self) -> &'static str {
        match self.plan_type {
            PlanType::Binary => "exactly 2 children are required",
            PlanType::Unilevel | PlanType::Matrix => "at least 1 child is required",
        }
    }

    /// Position label of the child at `child_index` (0-based).
    pub fn position_for(&self, child_index: usize) -> Position {
        match (self.plan_type, child_index) {
            (PlanType::Binary, 0) => Position::Left,
            (PlanType::Binary, 1) => Position::Right,
            _ => Position::Slot(child_index as u32 + 1),
        }
    }

    /// Key under which the subtree at `position` is tracked in leg maps.
    pub fn leg_key(&self, position: Position) -> String {
        match position {
            Position::Left => "left".to_string(),
            Position::Right => "right".to_string(),
            Position::Slot(n) => format!("leg-{n}"),
            Position::Root => "root".to_string(),
        }
    }

    /// Self-check of the rule; returns the list of problems found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.fixed_max_children == Some(0) {
            problems.push(format!("{}: fixed max children must be greater than 0", self.plan_type));
        }
        if let Some(fixed) = self.fixed_max_children {
            if !self.child_positions.is_empty() && self.child_positions.len() != fixed as usize {
                problems.push(format!(
                    "{}: {} named positions for {} children",
                    self.plan_type,
                    self.child_positions.len(),
                    fixed
                ));
            }
        }
        if self.plan_type == PlanType::Binary {
            if self.fixed_max_children != Some(2) {
                problems.push("binary: max children must be 2".to_string());
            }
            if self.child_positions != ["left", "right"].as_slice() {
                problems.push("binary: positions must be left and right".to_string());
            }
        }
        problems
    }
}
