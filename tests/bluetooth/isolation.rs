//! Each test case owns its simulation, and reset restores a clean one

use bluebridge::fixtures;
use bluebridge::harness::{assert_equals, assert_true, bluetooth_test};
use bluebridge::simulation::CentralConfig;
use bluebridge::RequestDeviceOptions;

use super::common_utils::start_simulation;

#[tokio::test]
async fn test_reset_restores_clean_simulation() {
    let simulation = start_simulation();
    let bridge = simulation.bridge();
    let bluetooth = simulation.bluetooth();
    fixtures::setup_health_thermometer(&bridge).await.unwrap();
    let device = bluetooth
        .request_device(RequestDeviceOptions::accept_all_devices())
        .await
        .unwrap();

    bridge.reset().await.unwrap();
    assert!(!bluetooth.get_availability().await.unwrap());

    // Handles from before the reset never resolve again
    bridge.simulate_central(CentralConfig::powered_on()).await.unwrap();
    assert!(device.gatt().connect().await.is_err());

    // The same address can be provisioned again
    fixtures::setup_health_thermometer(&bridge).await.unwrap();
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_state_does_not_leak_between_tests() {
    let first = bluetooth_test("powers on", |ctx| async move {
        ctx.bridge.simulate_central(CentralConfig::powered_on()).await?;
        assert_true(ctx.bluetooth.get_availability().await?, "powered on")
    })
    .await;
    assert!(first.passed());

    let second = bluetooth_test("starts clean", |ctx| async move {
        assert_equals(ctx.bluetooth.get_availability().await?, false, "fresh availability")
    })
    .await;
    assert!(second.passed(), "{:?}", second.outcome);
}

#[tokio::test]
async fn test_simulations_are_independent() {
    let a = start_simulation();
    let b = start_simulation();
    a.bridge().simulate_central(CentralConfig::powered_off()).await.unwrap();

    assert!(a.bluetooth().get_availability().await.unwrap());
    assert!(!b.bluetooth().get_availability().await.unwrap());

    a.shutdown().await.unwrap();
    b.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_context_event_stream_sees_connect() {
    use bluebridge::simulation::{EventFilter, EventType, SimulationEvent};
    use futures::StreamExt;

    let result = bluetooth_test("connect is published", |ctx| async move {
        let mut connects = Box::pin(ctx.event_stream(EventFilter::event_types(vec![EventType::GattConnected])));
        fixtures::get_health_thermometer_device(&ctx.bridge, &ctx.bluetooth).await?;
        assert_equals(
            connects.next().await,
            Some(SimulationEvent::GattConnected(fixtures::HEALTH_THERMOMETER_ADDRESS)),
            "first connect event",
        )
    })
    .await;
    assert!(result.passed(), "{:?}", result.outcome);
}
