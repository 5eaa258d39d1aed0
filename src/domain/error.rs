//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::PlanType;

/// Domain errors represent configuration violations detected before a build
/// starts, plus invariant violations that indicate a defect.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("max_expected_members must be greater than 0")]
    NoMembersExpected,

    #[error("number_of_cycles must be greater than 0")]
    NoCycles,

    #[error("{plan_type} genealogy type does not accept {max_children_count} children per member: {requirement}")]
    ChildrenCountMismatch {
        plan_type: PlanType,
        max_children_count: u32,
        requirement: &'static str,
    },

    #[error("at least one product is required for simulation")]
    NoProducts,

    #[error("product '{name}' is listed more than once")]
    DuplicateProduct { name: String },

    #[error("product '{product}' has sales ratio {ratio} outside 0..=100")]
    InvalidSalesRatio { product: String, ratio: f64 },

    #[error("product sales ratios must total 100%, current total: {total:.2}%")]
    SalesRatioTotal { total: f64 },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    /// Validation errors are caused by input; everything else is a defect.
    pub fn is_validation(&self) -> bool {
        !matches!(self, DomainError::InvariantViolation(_))
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
