//! downline: genealogy tree builder with volume aggregation and a commission engine
//!
//! Layering follows the usual direction of dependencies:
//! `domain` (pure model) <- `application` (use cases) <- `infrastructure` (I/O, wiring) <- `cli`.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
