//! DV-Hop Network Simulator
//!
//! Runs one scenario and writes the `@STATS@` stream to stdout. Logs go to
//! stderr.
//!
//! ```text
//! dvhop-sim [--config scenario.json] [--distances FILE] [--summary FILE] [--json]
//!           [--size N] [--beacons N] [--time SECONDS] [--damage-extent N] ...
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};

use dvhop_sim::{parse_flags, Simulation, SimulationConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Default)]
struct Outputs {
    distances: Option<String>,
    summary: Option<String>,
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "dvhop=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    // `--json` is the only flag without a value.
    let json = args.iter().any(|a| a == "--json");
    let args: Vec<String> = args.into_iter().filter(|a| a != "--json").collect();

    let mut config = SimulationConfig::from_env()?;
    let mut outputs = Outputs {
        json,
        ..Default::default()
    };
    let mut overrides = Vec::new();
    for (key, value) in parse_flags(&args)? {
        match key.as_str() {
            "config" => {
                info!(path = %value, "Loading scenario");
                config = SimulationConfig::from_json_file(&value)?;
            }
            "distances" => outputs.distances = Some(value),
            "summary" => outputs.summary = Some(value),
            _ => overrides.push((key, value)),
        }
    }
    config.apply(overrides.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;

    let mut sim = Simulation::new(config)?;
    let summary = sim.run()?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if outputs.json {
        sim.log().write_json_lines(&mut out)?;
    } else {
        sim.log().write_text(&mut out)?;
    }
    out.flush()?;

    if let Some(path) = &outputs.distances {
        std::fs::write(path, sim.distance_report())?;
        info!(path = %path, "Wrote distance tables");
    }

    info!(
        localized = summary.localized,
        nodes = summary.nodes,
        beacons = summary.beacons,
        mean_error = ?summary.mean_error,
        expired = summary.expired_entries,
        disabled = summary.disabled_nodes,
        "Simulation complete"
    );
    if let Some(path) = &outputs.summary {
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(file, &summary)?;
        info!(path = %path, "Wrote summary");
    }

    Ok(())
}
