//! Scenario loading, validation and output writing.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use rstest::rstest;
use tempfile::TempDir;

use downline::application::services::{Scenario, ScenarioService};
use downline::application::{run_simulation_seeded, ApplicationError};
use downline::config::Settings;
use downline::domain::{CommissionKind, DomainError, PlanType, ProductType, TriggerKind};
use downline::infrastructure::di::ServiceContainer;
use downline::infrastructure::traits::{FileSystem, RealFileSystem};
use downline::util::testing::sample_config;

fn resource(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/resources/scenarios")
        .join(name)
}

fn service() -> ScenarioService {
    ScenarioService::new(Arc::new(RealFileSystem))
}

/// In-memory filesystem recording writes.
#[derive(Default)]
struct MemoryFs {
    files: Mutex<BTreeMap<PathBuf, String>>,
}

impl FileSystem for MemoryFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        self.files.lock().unwrap().insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn ensure_parent(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn given_binary_scenario_when_loading_then_all_sections_parse() {
    let scenario = service().load(&resource("binary.toml")).unwrap();

    assert_eq!(scenario.seed, Some(42));
    let sim = &scenario.simulation;
    assert_eq!(sim.plan_type, PlanType::Binary);
    assert_eq!(sim.max_expected_members, 30);
    assert_eq!(sim.payout_cap, Some(1500.0));
    assert_eq!(sim.products[0].product_type, ProductType::Membership);
    assert_eq!(sim.products[1].product_type, ProductType::Retail);
    assert_relative_eq!(sim.products[1].price, 249.0);

    assert_eq!(scenario.commissions.standard[0].kind, CommissionKind::Binary);
    assert!(scenario.commissions.standard[1].enabled);
    assert_eq!(scenario.commissions.custom[0].trigger_kind, TriggerKind::Volume);
    sim.validate().unwrap();
}

#[rstest]
#[case("binary.toml", 30)]
#[case("unilevel.toml", 5)]
#[case("matrix.toml", 40)]
fn given_valid_scenarios_when_running_then_generate_expected_members(#[case] file: &str, #[case] members: usize) {
    let scenario = service().load(&resource(file)).unwrap();
    let seed = scenario.resolve_seed(None, None).unwrap_or(1);

    let result = run_simulation_seeded(&scenario.simulation, seed).unwrap();

    assert_eq!(result.summary.total_members_generated, members);
}

#[test]
fn given_invalid_ratios_when_loading_then_parses_but_fails_validation() {
    let scenario = service().load(&resource("invalid_ratios.toml")).unwrap();

    let err = scenario.simulation.validate().unwrap_err();

    assert!(matches!(err, DomainError::SalesRatioTotal { .. }));
    assert!(err.is_validation());
}

#[test]
fn given_missing_file_when_loading_then_scenario_not_found() {
    let err = service().load(Path::new("/definitely/not/here.toml")).unwrap_err();

    assert!(matches!(err, ApplicationError::ScenarioNotFound(_)));
}

#[test]
fn given_malformed_toml_when_loading_then_scenario_error_names_the_file() {
    let fs = Arc::new(MemoryFs::default());
    let path = PathBuf::from("/scenarios/broken.toml");
    fs.write(&path, "[simulation]\nplan_type = \"pyramid\"\n").unwrap();

    let err = ScenarioService::new(fs).load(&path).unwrap_err();

    match err {
        ApplicationError::Scenario { path: p, .. } => assert_eq!(p, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn given_seed_sources_when_resolving_then_cli_beats_scenario_beats_settings() {
    let mut scenario = service().load(&resource("matrix.toml")).unwrap();

    assert_eq!(scenario.resolve_seed(Some(1), Some(3)), Some(1));
    assert_eq!(scenario.resolve_seed(None, Some(3)), Some(7));
    scenario.seed = None;
    assert_eq!(scenario.resolve_seed(None, Some(3)), Some(3));
    assert_eq!(scenario.resolve_seed(None, None), None);
}

#[test]
fn given_scenario_when_rendered_then_parses_back_equal() {
    let scenario = service().load(&resource("binary.toml")).unwrap();

    let rendered = ScenarioService::render(&scenario).unwrap();

    assert_eq!(ScenarioService::parse(&rendered).unwrap(), scenario);
}

#[test]
fn given_sample_catalogue_when_rendered_then_type_and_price_survive() {
    let scenario = Scenario::new(sample_config(PlanType::Unilevel, 8, 2, 3));

    let parsed = ScenarioService::parse(&ScenarioService::render(&scenario).unwrap()).unwrap();

    let products = &parsed.simulation.products;
    assert_eq!(products[0].product_type, ProductType::Membership);
    assert_relative_eq!(products[0].price, 99.0);
    assert_eq!(products[1].product_type, ProductType::Retail);
    assert_relative_eq!(products[1].price, 249.0);
    assert_relative_eq!(products[1].business_volume, 200.0);
}

#[test]
fn given_minimal_scenario_when_parsing_then_defaults_apply() {
    let scenario: Scenario = ScenarioService::parse(
        r#"
[simulation]
plan_type = "matrix"
max_expected_members = 4
number_of_cycles = 1
max_children_count = 2

[[simulation.products]]
name = "kit"
business_volume = 10.0
sales_ratio = 100.0
"#,
    )
    .unwrap();

    assert_eq!(scenario.seed, None);
    assert!(scenario.commissions.is_empty());
    assert_eq!(scenario.simulation.payout_cap, None);
    assert_relative_eq!(scenario.simulation.products[0].price, 0.0);
}

#[test]
fn given_output_path_in_new_directory_when_writing_then_creates_parents() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("runs/2026/result.json");

    service().write_output(&out, "{}").unwrap();

    assert_eq!(std::fs::read_to_string(out).unwrap(), "{}");
}

#[test]
fn given_container_with_memory_fs_when_writing_then_scenario_service_uses_it() {
    let fs = Arc::new(MemoryFs::default());
    let container = ServiceContainer::with_deps(Settings::default(), fs.clone());

    container.scenario.write_output(Path::new("out.json"), "[]").unwrap();

    assert_eq!(fs.read_to_string(Path::new("out.json")).unwrap(), "[]");
}
