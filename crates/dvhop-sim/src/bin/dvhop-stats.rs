//! Convert a `@STATS@` text stream into CSV.
//!
//! Reads stdin and writes reception records to stdout. With
//! `--events FILE`, event records are written there too.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use dvhop_sim::{parse_flags, stats_to_csv, Error};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "dvhop=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut events_path = None;
    for (key, value) in parse_flags(&args)? {
        match key.as_str() {
            "events" => events_path = Some(value),
            other => return Err(Error::InvalidConfig(format!("unknown flag --{other}")).into()),
        }
    }

    let mut events = events_path
        .as_ref()
        .map(|path| File::create(path).map(BufWriter::new))
        .transpose()?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let counts = stats_to_csv(
        stdin.lock(),
        &mut out,
        events.as_mut().map(|w| w as &mut dyn Write),
    )?;
    out.flush()?;
    if let Some(w) = events.as_mut() {
        w.flush()?;
    }

    info!(
        receptions = counts.receptions,
        events = counts.events,
        malformed = counts.malformed,
        "Converted statistics"
    );
    Ok(())
}
