//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod assignor;
pub mod builder;
pub mod commission;
pub mod entities;
pub mod error;
pub mod plan;
pub mod volume;

pub use arena::{CycleVolumes, GenealogyTree, Member};
pub use assignor::ProductAssignor;
pub use builder::TreeBuilder;
pub use commission::{
    CommissionEngine, CommissionKind, CommissionPlanSummary, CommissionResult, CommissionRules,
    CommissionSubject, CustomRule, StandardRule, TriggerKind,
};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use plan::{FillOrder, PlanRule};
