use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::info;

use bluebridge::config::BridgeConfig;
use bluebridge::conformance;
use bluebridge::harness::TestHarness;
use bluebridge::logging;
use bluebridge::protocol::ProtocolSession;
use bluebridge::simulation::Simulation;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = load_config(&args)?;
    logging::init_logger(&config).map_err(anyhow::Error::msg)?;

    let rest = positionals(args.get(1..).unwrap_or_default());
    match rest.first().copied() {
        Some("run") => run_scenarios(&config, rest.get(1).copied()).await,
        Some("list") => {
            for scenario in conformance::scenarios() {
                println!("{}{}", scenario.name, if scenario.long { " (long)" } else { "" });
            }
            Ok(())
        }
        Some("script") => {
            let path = rest.get(1).context("script needs a file argument")?;
            run_script(&config, PathBuf::from(*path)).await
        }
        Some("config") => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("unknown command '{}'", other)
        }
        None => {
            print_usage();
            Ok(())
        }
    }
}

/// Arguments with `--config PATH` removed
fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            iter.next();
        } else {
            out.push(arg.as_str());
        }
    }
    out
}

fn load_config(args: &[String]) -> Result<BridgeConfig> {
    let config = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args.get(i + 1).context("--config needs a path")?;
            BridgeConfig::load_from_path(&PathBuf::from(path))
                .with_context(|| format!("loading config from {}", path))?
        }
        None => BridgeConfig::load().context("loading default config")?,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run_scenarios(config: &BridgeConfig, filter: Option<&str>) -> Result<()> {
    let harness = TestHarness::new(config.clone());
    let report = conformance::run_all(&harness, filter).await;
    print!("{}", report.summary());
    if !report.all_passed() {
        bail!("{} scenario(s) failed", report.failed());
    }
    Ok(())
}

/// Feed one control command per line into a fresh simulation
async fn run_script(config: &BridgeConfig, path: PathBuf) -> Result<()> {
    let script = std::fs::read_to_string(&path)
        .with_context(|| format!("reading script {}", path.display()))?;

    let simulation = Simulation::start(config);
    let session = ProtocolSession::new(simulation.bridge());
    for line in script.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')) {
        println!("{}", session.handle_message(line).await);
    }

    let available = simulation.bluetooth().get_availability().await?;
    info!("Script finished, availability: {}", available);
    simulation.shutdown().await?;
    Ok(())
}

fn print_usage() {
    println!("bluebridge - fake adapter bridge for Web Bluetooth conformance tests");
    println!("\nUsage:");
    println!("  bluebridge run [FILTER]     - Run built-in scenarios (optionally by name)");
    println!("  bluebridge list             - List built-in scenarios");
    println!("  bluebridge script FILE      - Apply a JSON control command per line");
    println!("  bluebridge config           - Print the effective configuration");
    println!("\nOptions:");
    println!("  --config PATH               - Load settings from PATH");
}
