//! Test harness: per-test isolation, timeouts, assertions and reporting
//!
//! Every test body gets its own `Simulation`. The body runs in a spawned task
//! under a deadline; when it finishes, fails, panics or times out the
//! simulation is reset and shut down before the next test starts.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::Stream;
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::mpsc::Receiver;
use uuid::Uuid;

use crate::bluetooth::Bluetooth;
use crate::bridge::FakeAdapterBridge;
use crate::config::{BridgeConfig, Configurable};
use crate::error::{BridgeError, Result};
use crate::logging::PerformanceLogger;
use crate::simulation::events::receiver_to_stream;
use crate::simulation::{
    CharacteristicProperties, EventBroker, EventFilter, Simulation, SimulationEvent,
    TestCharacteristicProperties,
};

/// What a test body gets to work with
#[derive(Clone)]
pub struct TestContext {
    pub bridge: FakeAdapterBridge,
    pub bluetooth: Bluetooth,
    events: EventBroker,
}

impl TestContext {
    /// Receive simulation events matching `filter` from now on
    pub fn subscribe(&self, filter: EventFilter) -> Receiver<SimulationEvent> {
        self.events.subscribe(filter).1
    }

    pub fn event_stream(&self, filter: EventFilter) -> impl Stream<Item = SimulationEvent> {
        receiver_to_stream(self.subscribe(filter))
    }
}

/// Why a test failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The simulation rejected a configuration command
    Configuration,
    /// An assertion or an API call did not produce the expected result
    Assertion,
    /// The body ran past its deadline
    Timeout,
}

impl FailureKind {
    pub fn classify(error: &BridgeError) -> Self {
        match error {
            // A vanished backend means the simulation could not be configured
            BridgeError::Configuration(_)
            | BridgeError::Config(_)
            | BridgeError::Protocol(_)
            | BridgeError::ChannelClosed => Self::Configuration,
            BridgeError::Timeout(_) => Self::Timeout,
            BridgeError::Assertion(_) | BridgeError::Bluetooth(_) | BridgeError::Io(_) => {
                Self::Assertion
            }
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration failure"),
            Self::Assertion => write!(f, "assertion failure"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub name: String,
    pub outcome: TestOutcome,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.outcome == TestOutcome::Passed
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            TestOutcome::Passed => None,
            TestOutcome::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Results of a run, in execution order
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub results: Vec<TestResult>,
}

impl Default for TestReport {
    fn default() -> Self {
        Self::new()
    }
}

impl TestReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: TestResult) {
        self.results.push(result);
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    /// One line per test plus a totals line
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            match &result.outcome {
                TestOutcome::Passed => {
                    out.push_str(&format!("PASS  {} ({} ms)\n", result.name, result.duration.as_millis()))
                }
                TestOutcome::Failed { kind, message } => out.push_str(&format!(
                    "FAIL  {} [{}] {}\n",
                    result.name, kind, message
                )),
            }
        }
        out.push_str(&format!("{} passed, {} failed\n", self.passed(), self.failed()));
        out
    }
}

/// Runs test bodies against fresh simulations
#[derive(Debug, Clone, Default)]
pub struct TestHarness {
    config: BridgeConfig,
}

impl Configurable for TestHarness {
    fn apply_config(&mut self, config: &BridgeConfig) {
        self.config = config.clone();
    }
}

impl TestHarness {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run `body` with the default timeout
    pub async fn run<F, Fut>(&self, name: &str, body: F) -> TestResult
    where
        F: FnOnce(TestContext) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.run_with_timeout(name, self.config.timeout_for(false), body)
            .await
    }

    /// Run `body` with the long timeout
    pub async fn run_long<F, Fut>(&self, name: &str, body: F) -> TestResult
    where
        F: FnOnce(TestContext) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.run_with_timeout(name, self.config.timeout_for(true), body)
            .await
    }

    pub async fn run_with_timeout<F, Fut>(&self, name: &str, timeout: Duration, body: F) -> TestResult
    where
        F: FnOnce(TestContext) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let perf = PerformanceLogger::new("harness", name);
        let simulation = Simulation::start(&self.config);
        let context = TestContext {
            bridge: simulation.bridge(),
            bluetooth: simulation.bluetooth(),
            events: simulation.events(),
        };

        let mut task = tokio::spawn(body(context));
        let outcome = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(Ok(()))) => TestOutcome::Passed,
            Ok(Ok(Err(e))) => TestOutcome::Failed {
                kind: FailureKind::classify(&e),
                message: e.to_string(),
            },
            Ok(Err(join_error)) => TestOutcome::Failed {
                kind: FailureKind::Assertion,
                message: format!("test body panicked: {}", join_error),
            },
            Err(_) => {
                task.abort();
                TestOutcome::Failed {
                    kind: FailureKind::Timeout,
                    message: BridgeError::Timeout(timeout).to_string(),
                }
            }
        };

        if let Err(e) = simulation.bridge().reset().await {
            warn!("Reset after '{}' failed: {}", name, e);
        }
        if let Err(e) = simulation.shutdown().await {
            warn!("Shutdown after '{}' failed: {}", name, e);
        }

        match &outcome {
            TestOutcome::Passed => info!("PASS {}", name),
            TestOutcome::Failed { kind, message } => error!("FAIL {} [{}]: {}", name, kind, message),
        }

        TestResult {
            name: name.to_string(),
            outcome,
            duration: perf.finish(),
        }
    }
}

/// Run one test with default settings
pub async fn bluetooth_test<F, Fut>(name: &str, body: F) -> TestResult
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    TestHarness::default().run(name, body).await
}

/// Run one test with the long timeout
pub async fn bluetooth_test_long<F, Fut>(name: &str, body: F) -> TestResult
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    TestHarness::default().run_long(name, body).await
}

// Assertions

pub fn assert_true(condition: bool, description: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(BridgeError::Assertion(format!("{}: expected true got false", description)))
    }
}

pub fn assert_equals<T>(actual: T, expected: T, description: &str) -> Result<()>
where
    T: PartialEq + fmt::Debug,
{
    if actual == expected {
        Ok(())
    } else {
        Err(BridgeError::Assertion(format!(
            "{}: expected {:?} but got {:?}",
            description, expected, actual
        )))
    }
}

/// Exact comparison over every property flag
pub fn assert_properties_equal(
    actual: CharacteristicProperties,
    expected: &TestCharacteristicProperties,
) -> Result<()> {
    let mismatches = actual.mismatches(&expected.properties());
    if mismatches.is_empty() {
        return Ok(());
    }

    let details: Vec<String> = mismatches
        .iter()
        .map(|p| format!("{} expected {} got {}", p, expected.properties().has(*p), actual.has(*p)))
        .collect();
    Err(BridgeError::Assertion(format!(
        "characteristic properties differ: {}",
        details.join(", ")
    )))
}

/// Expect `result` to be rejected with the DOMException named `expected`
pub fn assert_rejects<T: fmt::Debug>(result: Result<T>, expected: &str, description: &str) -> Result<()> {
    match result {
        Err(BridgeError::Bluetooth(e)) if e.name() == expected => Ok(()),
        Err(e) => Err(BridgeError::Assertion(format!(
            "{}: expected {} but got {}",
            description, expected, e
        ))),
        Ok(value) => Err(BridgeError::Assertion(format!(
            "{}: expected {} but resolved with {:?}",
            description, expected, value
        ))),
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BluetoothError;
    use crate::simulation::CentralConfig;

    #[test]
    fn test_classify() {
        assert_eq!(
            FailureKind::classify(&BridgeError::Configuration("x".into())),
            FailureKind::Configuration
        );
        assert_eq!(
            FailureKind::classify(&BridgeError::Bluetooth(BluetoothError::NotFound("x".into()))),
            FailureKind::Assertion
        );
        assert_eq!(
            FailureKind::classify(&BridgeError::Timeout(Duration::from_secs(1))),
            FailureKind::Timeout
        );
        assert_eq!(
            FailureKind::classify(&BridgeError::ChannelClosed),
            FailureKind::Configuration
        );
    }

    #[test]
    fn test_assert_properties_equal_lists_mismatches() {
        let expected = TestCharacteristicProperties::new(&["read", "write", "indicate"]).unwrap();
        let err = assert_properties_equal(CharacteristicProperties::INDICATE, &expected).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("read expected true got false"));
        assert!(message.contains("write expected true got false"));
        assert!(!message.contains("indicate"));

        assert!(assert_properties_equal(
            CharacteristicProperties::READ | CharacteristicProperties::WRITE | CharacteristicProperties::INDICATE,
            &expected
        )
        .is_ok());
    }

    #[test]
    fn test_assert_rejects() {
        let rejected: Result<()> = Err(BluetoothError::Security("no".into()).into());
        assert!(assert_rejects(rejected, "SecurityError", "service").is_ok());

        let wrong: Result<()> = Err(BluetoothError::Network("no".into()).into());
        assert!(assert_rejects(wrong, "SecurityError", "service").is_err());

        assert!(assert_rejects(Ok(1), "SecurityError", "service").is_err());
    }

    #[tokio::test]
    async fn test_passing_body() {
        let result = bluetooth_test("powered off is available", |ctx| async move {
            ctx.bridge.simulate_central(CentralConfig::powered_off()).await?;
            assert_true(ctx.bluetooth.get_availability().await?, "availability")
        })
        .await;
        assert!(result.passed(), "{:?}", result.outcome);
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let harness = TestHarness::default();
        let result = harness
            .run_with_timeout("sleeps", Duration::from_millis(20), |_ctx| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                assert_true(false, "deadline not enforced")
            })
            .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn test_panicking_body_is_assertion_failure() {
        let result = bluetooth_test("panics", |_ctx| async move {
            let values: Vec<u8> = Vec::new();
            assert_true(values[0] == 1, "first value")
        })
        .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Assertion));
    }

    #[test]
    fn test_report_summary() {
        let mut report = TestReport::new();
        report.push(TestResult {
            name: "a".into(),
            outcome: TestOutcome::Passed,
            duration: Duration::from_millis(3),
        });
        report.push(TestResult {
            name: "b".into(),
            outcome: TestOutcome::Failed {
                kind: FailureKind::Timeout,
                message: "late".into(),
            },
            duration: Duration::from_millis(9),
        });
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_passed());
        assert!(report.summary().ends_with("1 passed, 1 failed\n"));
    }
}
