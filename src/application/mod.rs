//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod commissions;
pub mod error;
pub mod error_ext;
pub mod report;
pub mod services;
pub mod simulation;
pub mod tree_view;

pub use commissions::{evaluate_commissions, CommissionReport, MemberCommissions};
pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
pub use report::{
    BinarySettlement, CycleVolume, DepthVolume, MemberRecord, SimulationResult, SimulationSummary,
    VolumeStats,
};
pub use simulation::{fresh_seed, run_simulation, run_simulation_seeded};
pub use tree_view::ToTermTree;
