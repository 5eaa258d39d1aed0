use std::sync::Once;
use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{PlanType, Product, ProductType, SimulationConfig};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    let noisy_modules = ["rayon_core"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    // RUST_LOG wins, debug otherwise
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(module_filter)
            .with_filter(env_filter),
    );

    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// Two-product catalogue used across tests: starter membership (bv 100, 60%,
/// priced 99) and pro retail pack (bv 200, 40%, priced 249).
pub fn sample_products() -> Vec<Product> {
    vec![
        Product::new("starter", 100.0, 60.0)
            .with_type(ProductType::Membership)
            .with_price(99.0),
        Product::new("pro", 200.0, 40.0).with_price(249.0),
    ]
}

/// Valid config for `plan` with the sample catalogue.
pub fn sample_config(plan: PlanType, members: u32, cycles: u32, width: u32) -> SimulationConfig {
    SimulationConfig::new(plan, members, cycles, width, sample_products())
}
