//! getAvailability() for every adapter state

use bluebridge::simulation::{CentralConfig, SimulatedAdapterState};
use bluebridge::BridgeError;
use pretty_assertions::assert_eq;

use super::common_utils::start_simulation;

#[tokio::test]
async fn test_powered_off_is_available() {
    let simulation = start_simulation();
    simulation
        .bridge()
        .simulate_central(CentralConfig::powered_off())
        .await
        .unwrap();
    assert!(simulation.bluetooth().get_availability().await.unwrap());
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_availability_policy_for_every_state() {
    let simulation = start_simulation();
    let bridge = simulation.bridge();
    let bluetooth = simulation.bluetooth();

    for state in SimulatedAdapterState::ALL {
        bridge.simulate_central(CentralConfig::new(state)).await.unwrap();
        let expected = state != SimulatedAdapterState::Absent;
        assert_eq!(bluetooth.get_availability().await.unwrap(), expected, "state {}", state);
    }
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_fresh_simulation_is_absent() {
    let simulation = start_simulation();
    assert!(!simulation.bluetooth().get_availability().await.unwrap());
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_same_state_twice_is_idempotent() {
    let simulation = start_simulation();
    let bridge = simulation.bridge();
    let bluetooth = simulation.bluetooth();

    for state in SimulatedAdapterState::ALL {
        bridge.simulate_central(CentralConfig::new(state)).await.unwrap();
        let once = bluetooth.get_availability().await.unwrap();
        bridge.simulate_central(CentralConfig::new(state)).await.unwrap();
        assert_eq!(bluetooth.get_availability().await.unwrap(), once);
    }
    simulation.shutdown().await.unwrap();
}

#[test]
fn test_unknown_state_rejected_at_construction() {
    let err = CentralConfig::from_state_name("powered-sideways").unwrap_err();
    assert!(matches!(err, BridgeError::Configuration(_)));
    assert_eq!(
        CentralConfig::from_state_name("powered-off").unwrap(),
        CentralConfig::powered_off()
    );
}
