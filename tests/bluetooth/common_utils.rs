//! Shared helpers for Bluetooth tests

use bluebridge::config::BridgeConfig;
use bluebridge::fixtures::{self, ServiceContext};
use bluebridge::simulation::Simulation;

/// A simulation with test logging enabled
pub fn start_simulation() -> Simulation {
    bluebridge::logging::init_test_logging();
    Simulation::start(&BridgeConfig::default())
}

/// A fresh simulation plus the discovered health thermometer service
pub async fn health_thermometer() -> (Simulation, ServiceContext) {
    let simulation = start_simulation();
    let context = fixtures::get_health_thermometer_service(&simulation.bridge(), &simulation.bluetooth())
        .await
        .expect("health thermometer fixture");
    (simulation, context)
}
