//! Built-in Web Bluetooth conformance scenarios

use futures::future::BoxFuture;
use futures::FutureExt;
use log::info;

use crate::error::Result;
use crate::fixtures;
use crate::harness::{
    assert_equals, assert_properties_equal, assert_rejects, assert_true, TestContext, TestHarness,
    TestReport,
};
use crate::simulation::{CentralConfig, TestCharacteristicProperties};

type ScenarioFn = fn(TestContext) -> BoxFuture<'static, Result<()>>;

/// A named test body
#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub long: bool,
    body: ScenarioFn,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("long", &self.long)
            .finish()
    }
}

impl Scenario {
    pub async fn run(&self, harness: &TestHarness) -> crate::harness::TestResult {
        let body = self.body;
        if self.long {
            harness.run_long(self.name, body).await
        } else {
            harness.run(self.name, body).await
        }
    }
}

async fn availability_powered_off(ctx: TestContext) -> Result<()> {
    ctx.bridge.simulate_central(CentralConfig::powered_off()).await?;
    let available = ctx.bluetooth.get_availability().await?;
    assert_true(available, "availability should be true")
}

async fn availability_powered_on(ctx: TestContext) -> Result<()> {
    ctx.bridge.simulate_central(CentralConfig::powered_on()).await?;
    assert_true(ctx.bluetooth.get_availability().await?, "availability should be true")
}

async fn availability_absent(ctx: TestContext) -> Result<()> {
    ctx.bridge.simulate_central(CentralConfig::absent()).await?;
    assert_equals(ctx.bluetooth.get_availability().await?, false, "availability")
}

async fn availability_idempotent(ctx: TestContext) -> Result<()> {
    ctx.bridge.simulate_central(CentralConfig::powered_off()).await?;
    let first = ctx.bluetooth.get_availability().await?;
    ctx.bridge.simulate_central(CentralConfig::powered_off()).await?;
    let second = ctx.bluetooth.get_availability().await?;
    assert_equals(second, first, "availability after repeating the same state")
}

async fn characteristic_properties(ctx: TestContext) -> Result<()> {
    let fixtures::ServiceContext { service, .. } =
        fixtures::get_health_thermometer_service(&ctx.bridge, &ctx.bluetooth).await?;

    let (temperature_measurement, measurement_interval) = tokio::try_join!(
        service.get_characteristic("temperature_measurement"),
        service.get_characteristic("measurement_interval"),
    )?;

    let tm_expected = TestCharacteristicProperties::new(&["indicate"])?;
    assert_properties_equal(temperature_measurement.properties(), &tm_expected)?;

    let mi_expected = TestCharacteristicProperties::new(&["read", "write", "indicate"])?;
    assert_properties_equal(measurement_interval.properties(), &mi_expected)?;

    // Both handles stay usable after the join
    let interval = measurement_interval.read_value().await?;
    assert_equals(
        interval,
        fixtures::MEASUREMENT_INTERVAL_VALUE.to_vec(),
        "measurement interval value",
    )?;
    assert_rejects(
        temperature_measurement.read_value().await,
        "NotSupportedError",
        "reading an indicate-only characteristic",
    )
}

async fn service_not_in_filters(ctx: TestContext) -> Result<()> {
    let device = fixtures::get_health_thermometer_device(&ctx.bridge, &ctx.bluetooth).await?;
    assert_rejects(
        device.server.get_primary_service("heart_rate").await,
        "SecurityError",
        "service outside the allowed set",
    )
}

async fn request_device_powered_off(ctx: TestContext) -> Result<()> {
    fixtures::setup_health_thermometer(&ctx.bridge).await?;
    ctx.bridge.simulate_central(CentralConfig::powered_off()).await?;
    let options = crate::bluetooth::RequestDeviceOptions::accept_all_devices();
    assert_rejects(
        ctx.bluetooth.request_device(options).await,
        "NotFoundError",
        "requestDevice() with the adapter off",
    )
}

/// Every built-in scenario, in run order
pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "getAvailability() resolves with true if the Bluetooth Low Energy is \
                   supported and the adapter is powered off",
            long: false,
            body: |ctx| availability_powered_off(ctx).boxed(),
        },
        Scenario {
            name: "getAvailability() resolves with true if the adapter is powered on",
            long: false,
            body: |ctx| availability_powered_on(ctx).boxed(),
        },
        Scenario {
            name: "getAvailability() resolves with false if the adapter is absent",
            long: false,
            body: |ctx| availability_absent(ctx).boxed(),
        },
        Scenario {
            name: "simulating the same adapter state twice leaves availability unchanged",
            long: false,
            body: |ctx| availability_idempotent(ctx).boxed(),
        },
        Scenario {
            name: "Characteristic properties of the health thermometer match the simulated flags",
            long: true,
            body: |ctx| characteristic_properties(ctx).boxed(),
        },
        Scenario {
            name: "Request for absent service without permission. Reject with SecurityError.",
            long: false,
            body: |ctx| service_not_in_filters(ctx).boxed(),
        },
        Scenario {
            name: "requestDevice() rejects with NotFoundError when the adapter is powered off",
            long: false,
            body: |ctx| request_device_powered_off(ctx).boxed(),
        },
    ]
}

/// Run scenarios whose name contains `filter` (all when `None`)
pub async fn run_all(harness: &TestHarness, filter: Option<&str>) -> TestReport {
    let mut report = TestReport::new();
    for scenario in scenarios()
        .into_iter()
        .filter(|s| filter.map_or(true, |f| s.name.contains(f)))
    {
        report.push(scenario.run(harness).await);
    }
    info!("Conformance run: {} passed, {} failed", report.passed(), report.failed());
    report
}
