//! Domain entities: core data structures

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::plan::PlanRule;

/// Payout cycle number. Cycle 0 is reserved for the root.
pub type Cycle = u32;

/// Sales ratios of a product set must add up to this value.
pub const SALES_RATIO_TOTAL: f64 = 100.0;
/// Accepted deviation from [`SALES_RATIO_TOTAL`].
pub const SALES_RATIO_TOLERANCE: f64 = 0.01;

/// Structural rule set of a compensation plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Binary,
    Unilevel,
    Matrix,
}

impl PlanType {
    pub const ALL: [PlanType; 3] = [PlanType::Binary, PlanType::Unilevel, PlanType::Matrix];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Binary => "binary",
            PlanType::Unilevel => "unilevel",
            PlanType::Matrix => "matrix",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(PlanType::Binary),
            "unilevel" => Ok(PlanType::Unilevel),
            "matrix" => Ok(PlanType::Matrix),
            other => Err(format!("unknown plan type: {other}")),
        }
    }
}

/// Product category, informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Membership,
    #[default]
    Retail,
    Digital,
}

/// A product a member can purchase on enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub price: f64,
    /// Commissionable value credited as personal volume
    pub business_volume: f64,
    /// Selection weight in percent (0 to 100)
    pub sales_ratio: f64,
    #[serde(rename = "type", default)]
    pub product_type: ProductType,
}

impl Product {
    pub fn new(name: impl Into<String>, business_volume: f64, sales_ratio: f64) -> Self {
        Self {
            name: name.into(),
            price: business_volume,
            business_volume,
            sales_ratio,
            product_type: ProductType::default(),
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_type(mut self, product_type: ProductType) -> Self {
        self.product_type = product_type;
        self
    }
}

/// Input of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub plan_type: PlanType,
    pub max_expected_members: u32,
    pub number_of_cycles: u32,
    pub max_children_count: u32,
    pub products: Vec<Product>,
    /// Per-cycle cap on matched binary volume; unset or <= 0 means uncapped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_cap: Option<f64>,
}

impl SimulationConfig {
    pub fn new(
        plan_type: PlanType,
        max_expected_members: u32,
        number_of_cycles: u32,
        max_children_count: u32,
        products: Vec<Product>,
    ) -> Self {
        Self {
            plan_type,
            max_expected_members,
            number_of_cycles,
            max_children_count,
            products,
            payout_cap: None,
        }
    }

    pub fn with_payout_cap(mut self, cap: f64) -> Self {
        self.payout_cap = Some(cap);
        self
    }

    /// Reject configurations that cannot be built.
    ///
    /// Checks run in a fixed order so the first reported problem is stable:
    /// member count, cycle count, plan width, products, product names,
    /// sales ratios.
    pub fn validate(&self) -> DomainResult<()> {
        if self.max_expected_members == 0 {
            return Err(DomainError::NoMembersExpected);
        }
        if self.number_of_cycles == 0 {
            return Err(DomainError::NoCycles);
        }

        let rule = PlanRule::for_plan(self.plan_type);
        if !rule.accepts_children_count(self.max_children_count) {
            return Err(DomainError::ChildrenCountMismatch {
                plan_type: self.plan_type,
                max_children_count: self.max_children_count,
                requirement: rule.children_requirement(),
            });
        }

        if self.products.is_empty() {
            return Err(DomainError::NoProducts);
        }
        if let Some(name) = self.products.iter().map(|p| &p.name).duplicates().next() {
            return Err(DomainError::DuplicateProduct { name: name.clone() });
        }
        if let Some(bad) = self
            .products
            .iter()
            .find(|p| !(0.0..=SALES_RATIO_TOTAL).contains(&p.sales_ratio))
        {
            return Err(DomainError::InvalidSalesRatio {
                product: bad.name.clone(),
                ratio: bad.sales_ratio,
            });
        }

        let total: f64 = self.products.iter().map(|p| p.sales_ratio).sum();
        if (total - SALES_RATIO_TOTAL).abs() > SALES_RATIO_TOLERANCE {
            return Err(DomainError::SalesRatioTotal { total });
        }
        Ok(())
    }

    /// Effective width limit for this plan.
    pub fn max_children(&self) -> usize {
        PlanRule::for_plan(self.plan_type).max_children(self.max_children_count)
    }

    /// `ceil(max_expected_members / number_of_cycles)`
    pub fn members_per_cycle(&self) -> u32 {
        if self.number_of_cycles == 0 {
            return 0;
        }
        self.max_expected_members.div_ceil(self.number_of_cycles)
    }

    /// Number of members joining in each cycle, index 0 is cycle 1.
    ///
    /// Later cycles absorb the remainder; the sum never exceeds
    /// `max_expected_members`.
    pub fn cycle_quotas(&self) -> Vec<u32> {
        let per_cycle = self.members_per_cycle();
        let mut remaining = self.max_expected_members;
        (0..self.number_of_cycles)
            .map(|_| {
                let quota = per_cycle.min(remaining);
                remaining -= quota;
                quota
            })
            .collect()
    }

    /// Cap applied to matched binary volume, if any.
    pub fn effective_payout_cap(&self) -> Option<f64> {
        self.payout_cap.filter(|cap| *cap > 0.0)
    }
}

/// Stable member identifier: creation sequence number, root is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u32);

impl MemberId {
    pub const ROOT: MemberId = MemberId(0);

    pub fn is_root(&self) -> bool {
        self.0 == 0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("root")
        } else {
            write!(f, "user_{}", self.0)
        }
    }
}

impl FromStr for MemberId {
    type Err = String;

    /// Accepts `root`, `user_<n>` or a bare number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("root") {
            return Ok(MemberId::ROOT);
        }
        let digits = s.strip_prefix("user_").unwrap_or(s);
        digits
            .parse::<u32>()
            .map(MemberId)
            .map_err(|_| format!("invalid member id: {s}"))
    }
}

/// Slot a member occupies under its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Root,
    Left,
    Right,
    /// 1-based child index for unilevel and matrix plans
    Slot(u32),
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Root => f.write_str("root"),
            Position::Left => f.write_str("left"),
            Position::Right => f.write_str("right"),
            Position::Slot(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
