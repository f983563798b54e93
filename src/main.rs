use anyhow::{bail, Context};
use magnetpnp::{
    init_logging, replay_gcode, EventBus, MotionChannelConfig, PnpConfig, BUILD_DATE, VERSION,
};
use magnetpnp_core::EventFilter;
use std::path::PathBuf;
use std::sync::Arc;

const USAGE: &str = "Usage: magnetpnp [--config <file>] <gcode-file>";

struct Args {
    config: Option<PathBuf>,
    gcode: PathBuf,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut config = None;
    let mut gcode = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(None);
            }
            "-V" | "--version" => {
                println!("magnetpnp {} (built {})", VERSION, BUILD_DATE);
                return Ok(None);
            }
            "-c" | "--config" => {
                let path = args.next().context("--config needs a file")?;
                config = Some(PathBuf::from(path));
            }
            other if other.starts_with('-') => bail!("Unknown option '{}'\n{}", other, USAGE),
            other => {
                if gcode.replace(PathBuf::from(other)).is_some() {
                    bail!("Only one G-code file can be replayed\n{}", USAGE);
                }
            }
        }
    }

    let gcode = gcode.with_context(|| USAGE.to_string())?;
    Ok(Some(Args { config, gcode }))
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<PnpConfig> {
    if let Some(path) = path {
        return PnpConfig::load_from_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    match PnpConfig::default_path() {
        Ok(path) if path.exists() => PnpConfig::load_from_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        _ => {
            tracing::info!("No config file found, using defaults");
            Ok(PnpConfig::default())
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logging()?;

    let Some(args) = parse_args()? else {
        return Ok(());
    };
    let config = load_config(args.config)?;
    let gcode = std::fs::read_to_string(&args.gcode)
        .with_context(|| format!("Failed to read {}", args.gcode.display()))?;

    let bus = Arc::new(EventBus::new());
    bus.subscribe(EventFilter::All, |event| {
        tracing::info!("UI <- {}", event.to_message());
    });

    let report = replay_gcode(config, &gcode, MotionChannelConfig::default(), bus)?;
    for command in &report.dispatched {
        println!("{}", command);
    }

    if let Some(fault) = &report.fault {
        bail!("Replay stopped in {} phase: {}", report.phase, fault);
    }
    if !report.is_complete() {
        bail!(
            "Replay did not finish (job {}, phase {})",
            report.job_state,
            report.phase
        );
    }

    tracing::info!(
        "Replayed {} parts ({} without tray slot), {} commands dispatched",
        report.parts,
        report.unassigned,
        report.dispatched.len()
    );
    Ok(())
}
