//! requestDevice(), connect() and GATT discovery

use bluebridge::bluetooth::{RequestDeviceOptions, ScanFilter};
use bluebridge::fixtures::{self, HEALTH_THERMOMETER_ADDRESS, HEALTH_THERMOMETER_NAME};
use bluebridge::harness::assert_rejects;
use bluebridge::simulation::{
    CentralConfig, CharacteristicProperties, EventFilter, EventType, SimulationAction,
    SimulationEvent,
};

use super::common_utils::{health_thermometer, start_simulation};

#[tokio::test]
async fn test_request_device_by_name() {
    let simulation = start_simulation();
    fixtures::setup_health_thermometer(&simulation.bridge()).await.unwrap();

    let options = RequestDeviceOptions::new().with_filter(ScanFilter::new().with_name(HEALTH_THERMOMETER_NAME));
    let device = simulation.bluetooth().request_device(options).await.unwrap();
    assert_eq!(device.address(), HEALTH_THERMOMETER_ADDRESS);
    assert_eq!(device.name(), Some(HEALTH_THERMOMETER_NAME));
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_request_device_without_match() {
    let simulation = start_simulation();
    fixtures::setup_health_thermometer(&simulation.bridge()).await.unwrap();

    let options = RequestDeviceOptions::new()
        .with_filter(ScanFilter::new().with_services(&["heart_rate"]).unwrap());
    assert_rejects(
        simulation.bluetooth().request_device(options).await,
        "NotFoundError",
        "no matching device",
    )
    .unwrap();
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_options_are_type_errors() {
    let simulation = start_simulation();
    simulation
        .bridge()
        .simulate_central(CentralConfig::powered_on())
        .await
        .unwrap();
    assert_rejects(
        simulation.bluetooth().request_device(RequestDeviceOptions::new()).await,
        "TypeError",
        "no filters",
    )
    .unwrap();
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_gatt_requires_connection() {
    let simulation = start_simulation();
    fixtures::setup_health_thermometer(&simulation.bridge()).await.unwrap();
    let device = simulation
        .bluetooth()
        .request_device(RequestDeviceOptions::accept_all_devices())
        .await
        .unwrap();

    assert_rejects(
        device.gatt().get_primary_services(None).await,
        "NetworkError",
        "discovery before connect",
    )
    .unwrap();
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_connect_fails_when_powered_off() {
    let simulation = start_simulation();
    let bridge = simulation.bridge();
    fixtures::setup_health_thermometer(&bridge).await.unwrap();
    let device = simulation
        .bluetooth()
        .request_device(RequestDeviceOptions::accept_all_devices())
        .await
        .unwrap();

    bridge.simulate_central(CentralConfig::powered_off()).await.unwrap();
    assert_rejects(device.gatt().connect().await, "NetworkError", "connect while off").unwrap();
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_names_are_type_errors() {
    let (simulation, context) = health_thermometer().await;
    assert_rejects(
        context.service.get_characteristic("not_a_characteristic").await,
        "TypeError",
        "unknown characteristic name",
    )
    .unwrap();
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_aliases_and_uuid_strings_resolve() {
    let (simulation, context) = health_thermometer().await;
    let by_alias = context.service.get_characteristic("0x2a21").await.unwrap();
    let by_uuid = context
        .service
        .get_characteristic("00002a21-0000-1000-8000-00805f9b34fb")
        .await
        .unwrap();
    assert_eq!(by_alias.uuid(), by_uuid.uuid());
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_characteristic_is_not_found() {
    let (simulation, context) = health_thermometer().await;
    assert_rejects(
        context.service.get_characteristic("battery_level").await,
        "NotFoundError",
        "characteristic not on service",
    )
    .unwrap();
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_write_read_and_descriptors() {
    let (simulation, context) = health_thermometer().await;
    let interval = context
        .service
        .get_characteristic("measurement_interval")
        .await
        .unwrap();

    interval.write_value(&[0x3c, 0x00]).await.unwrap();
    assert_eq!(interval.read_value().await.unwrap(), vec![0x3c, 0x00]);
    assert_rejects(
        interval.write_value_without_response(&[1]).await,
        "NotSupportedError",
        "write without response",
    )
    .unwrap();

    let descriptors = interval.get_descriptors(None).await.unwrap();
    assert_eq!(descriptors.len(), 2);
    let cccd = interval
        .get_descriptor("gatt.client_characteristic_configuration")
        .await
        .unwrap();
    cccd.write_value(&[0x02, 0x00]).await.unwrap();
    assert_eq!(cccd.read_value().await.unwrap(), vec![0x02, 0x00]);

    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_notifications_publish_value_changes() {
    let (simulation, context) = health_thermometer().await;
    let mut events = simulation.subscribe(EventFilter::event_types(vec![
        EventType::CharacteristicValueChanged,
    ]));

    let tm = context
        .service
        .get_characteristic("temperature_measurement")
        .await
        .unwrap();
    tm.start_notifications().await.unwrap();
    simulation
        .bridge()
        .set_characteristic_value(
            HEALTH_THERMOMETER_ADDRESS,
            "health_thermometer",
            "temperature_measurement",
            &[0x00, 0x6e, 0x01, 0x00, 0xff],
        )
        .await
        .unwrap();

    match events.recv().await {
        Some(SimulationEvent::CharacteristicValueChanged { address, value, .. }) => {
            assert_eq!(address, HEALTH_THERMOMETER_ADDRESS);
            assert_eq!(value, vec![0x00, 0x6e, 0x01, 0x00, 0xff]);
        }
        other => panic!("unexpected event {:?}", other),
    }
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_removed_characteristic_is_invalid_state() {
    let (simulation, context) = health_thermometer().await;
    let tt = context
        .service
        .get_characteristic("temperature_type")
        .await
        .unwrap();

    simulation
        .bridge()
        .simulate_characteristic(
            HEALTH_THERMOMETER_ADDRESS,
            "health_thermometer",
            "temperature_type",
            Default::default(),
            SimulationAction::Remove,
        )
        .await
        .unwrap();
    assert_rejects(tt.read_value().await, "InvalidStateError", "read after removal").unwrap();
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_write_value_accepts_write_without_response_only() {
    let simulation = start_simulation();
    let bridge = simulation.bridge();
    let address = "0A:0B:0C:0D:0E:0F";
    bridge.simulate_central(CentralConfig::powered_on()).await.unwrap();
    bridge
        .simulate_preconnected_peripheral(address, Some("Battery"), &["battery_service"])
        .await
        .unwrap();
    let device_address = address.parse().unwrap();
    bridge
        .simulate_service(device_address, "battery_service", SimulationAction::Add)
        .await
        .unwrap();
    bridge
        .simulate_characteristic(
            device_address,
            "battery_service",
            "battery_level",
            CharacteristicProperties::WRITE_WITHOUT_RESPONSE,
            SimulationAction::Add,
        )
        .await
        .unwrap();

    let options = RequestDeviceOptions::new()
        .with_filter(ScanFilter::new().with_services(&["battery_service"]).unwrap());
    let device = simulation.bluetooth().request_device(options).await.unwrap();
    let level = device
        .gatt()
        .connect()
        .await
        .unwrap()
        .get_primary_service("battery_service")
        .await
        .unwrap()
        .get_characteristic("battery_level")
        .await
        .unwrap();

    level.write_value(&[1]).await.unwrap();
    level.write_value_without_response(&[2]).await.unwrap();
    assert_rejects(
        level.write_value_with_response(&[3]).await,
        "NotSupportedError",
        "write with response on a write-without-response characteristic",
    )
    .unwrap();
    simulation.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_accept_all_devices_skips_hidden_peripheral() {
    let simulation = start_simulation();
    let bridge = simulation.bridge();
    bridge.simulate_central(CentralConfig::powered_on()).await.unwrap();
    bridge
        .simulate_hidden_peripheral("0A:0A:0A:0A:0A:0A", Some("Hidden"))
        .await
        .unwrap();

    assert_rejects(
        simulation
            .bluetooth()
            .request_device(RequestDeviceOptions::accept_all_devices())
            .await,
        "NotFoundError",
        "only a hidden peripheral",
    )
    .unwrap();

    bridge
        .simulate_preconnected_peripheral("0B:0B:0B:0B:0B:0B", Some("Visible"), &[])
        .await
        .unwrap();
    let device = simulation
        .bluetooth()
        .request_device(RequestDeviceOptions::accept_all_devices())
        .await
        .unwrap();
    assert_eq!(device.name(), Some("Visible"));
    simulation.shutdown().await.unwrap();
}
