//! Discovered properties match the simulated flags exactly

use bluebridge::harness::assert_properties_equal;
use bluebridge::simulation::{
    CentralConfig, CharacteristicProperties, DeviceAddress, Property, SimulationAction,
};
use bluebridge::{fixtures, RequestDeviceOptions, ScanFilter, TestCharacteristicProperties};

use super::common_utils::{health_thermometer, start_simulation};

#[tokio::test]
async fn test_concurrent_characteristics_have_expected_properties() {
    let (simulation, context) = health_thermometer().await;
    let service = &context.service;

    let (temperature_measurement, measurement_interval) = tokio::try_join!(
        service.get_characteristic("temperature_measurement"),
        service.get_characteristic("measurement_interval"),
    )
    .unwrap();

    assert_properties_equal(
        temperature_measurement.properties(),
        &TestCharacteristicProperties::new(&["indicate"]).unwrap(),
    )
    .unwrap();
    assert_properties_equal(
        measurement_interval.properties(),
        &TestCharacteristicProperties::new(&["read", "write", "indicate"]).unwrap(),
    )
    .unwrap();

    // Both are usable after the join
    assert_eq!(
        measurement_interval.read_value().await.unwrap(),
        fixtures::MEASUREMENT_INTERVAL_VALUE.to_vec()
    );
    temperature_measurement.start_notifications().await.unwrap();

    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_indicate_only_reports_every_other_flag_false() {
    let (simulation, context) = health_thermometer().await;
    let tm = context
        .service
        .get_characteristic("temperature_measurement")
        .await
        .unwrap();

    for property in Property::ALL {
        assert_eq!(
            tm.properties().has(property),
            property == Property::Indicate,
            "{}",
            property
        );
    }
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_every_single_flag_round_trips() {
    for property in Property::ALL {
        let simulation = start_simulation();
        let bridge = simulation.bridge();
        let address = "0A:0B:0C:0D:0E:0F";

        bridge.simulate_central(CentralConfig::powered_on()).await.unwrap();
        let device_address: DeviceAddress = address.parse().unwrap();
        bridge
            .simulate_preconnected_peripheral(address, Some("Battery"), &["battery_service"])
            .await
            .unwrap();
        bridge
            .simulate_service(device_address, "battery_service", SimulationAction::Add)
            .await
            .unwrap();
        bridge
            .simulate_characteristic(
                device_address,
                "battery_service",
                "battery_level",
                property.flag(),
                SimulationAction::Add,
            )
            .await
            .unwrap();

        let options = RequestDeviceOptions::new()
            .with_filter(ScanFilter::new().with_services(&["battery_service"]).unwrap());
        let device = simulation.bluetooth().request_device(options).await.unwrap();
        let server = device.gatt().connect().await.unwrap();
        let characteristic = server
            .get_primary_service("battery_service")
            .await
            .unwrap()
            .get_characteristic("battery_level")
            .await
            .unwrap();

        let expected = TestCharacteristicProperties::new(&[property.name()]).unwrap();
        assert_properties_equal(characteristic.properties(), &expected).unwrap();
        simulation.shutdown().await.unwrap();
    }
}

#[test]
fn test_partial_match_is_failure() {
    let expected = TestCharacteristicProperties::new(&["read", "write", "indicate"]).unwrap();
    let actual = CharacteristicProperties::READ | CharacteristicProperties::INDICATE;
    let err = assert_properties_equal(actual, &expected).unwrap_err();
    assert!(err.to_string().contains("write expected true got false"));
}
