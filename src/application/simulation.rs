//! Simulation entry points: validate, build, assign, aggregate, assemble.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};
use uuid::Builder;

use crate::application::report::SimulationResult;
use crate::application::ApplicationResult;
use crate::domain::volume;
use crate::domain::{ProductAssignor, SimulationConfig, TreeBuilder};

/// Runs one simulation drawing every random value from `rng`.
#[instrument(level = "debug", skip(config, rng), fields(plan = %config.plan_type))]
pub fn run_simulation<R: Rng>(config: &SimulationConfig, rng: &mut R) -> ApplicationResult<SimulationResult> {
    config.validate()?;
    debug!(
        members = config.max_expected_members,
        cycles = config.number_of_cycles,
        per_cycle = config.members_per_cycle(),
        "configuration valid"
    );

    let id = Builder::from_random_bytes(rng.gen()).into_uuid();
    let mut tree = TreeBuilder::new().build(config)?;
    ProductAssignor::new(&config.products).assign_all(&mut tree, rng);
    volume::aggregate(&mut tree);
    volume::verify(&tree)?;

    let result = SimulationResult::assemble(id, config, &tree);
    info!(
        id = %result.id,
        members = result.summary.total_members_generated,
        team_volume = result.root().map_or(0.0, |r| r.team_volume),
        "simulation complete"
    );
    Ok(result)
}

/// Runs a reproducible simulation: same seed and config give the same result.
pub fn run_simulation_seeded(config: &SimulationConfig, seed: u64) -> ApplicationResult<SimulationResult> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut result = run_simulation(config, &mut rng)?;
    result.seed = Some(seed);
    Ok(result)
}

/// Seed for runs where none was configured.
pub fn fresh_seed() -> u64 {
    rand::thread_rng().gen()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ApplicationError;
    use crate::domain::{DomainError, PlanType, Product};

    fn config() -> SimulationConfig {
        SimulationConfig::new(
            PlanType::Binary,
            20,
            4,
            2,
            vec![Product::new("a", 100.0, 60.0), Product::new("b", 250.0, 40.0)],
        )
    }

    #[test]
    fn given_same_seed_when_running_twice_then_results_are_equal() {
        let first = run_simulation_seeded(&config(), 99).unwrap();
        let second = run_simulation_seeded(&config(), 99).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.seed, Some(99));
    }

    #[test]
    fn given_invalid_config_when_running_then_domain_error_is_returned() {
        let mut config = config();
        config.number_of_cycles = 0;
        match run_simulation_seeded(&config, 1) {
            Err(ApplicationError::Domain(DomainError::NoCycles)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }
}
