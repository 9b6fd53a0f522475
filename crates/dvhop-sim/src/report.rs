//! Statistics collection, CSV conversion and run summaries.

use std::io::{BufRead, Write};

use dvhop_protocol::{EventCode, StatsRecord, StatsSink};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Header of the per-reception CSV.
pub const RECEPTION_CSV_HEADER: &str =
    "TIME,ADDRESS,HOP_TABLE_SIZE,POSITION_X,POSITION_Y,ERROR_X,ERROR_Y";

/// Header of the event CSV.
pub const EVENT_CSV_HEADER: &str = "TIME,EVENT";

/// Every statistics record of a run, in emission order.
#[derive(Debug, Clone, Default)]
pub struct StatsLog {
    records: Vec<StatsRecord>,
}

impl StatsSink for StatsLog {
    fn emit(&mut self, record: StatsRecord) {
        self.records.push(record);
    }
}

impl StatsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[StatsRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of events with the given code.
    pub fn count_events(&self, code: EventCode) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r, StatsRecord::Event(e) if e.event == code))
            .count()
    }

    /// Write the `@STATS@` text stream, one record per line.
    pub fn write_text(&self, out: &mut impl Write) -> Result<()> {
        for record in &self.records {
            writeln!(out, "{record}")?;
        }
        Ok(())
    }

    /// Write one JSON object per line.
    pub fn write_json_lines(&self, out: &mut impl Write) -> Result<()> {
        for record in &self.records {
            serde_json::to_writer(&mut *out, record)?;
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Counts from one text-to-CSV conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsvConversion {
    pub receptions: usize,
    pub events: usize,
    /// Lines that looked like statistics but failed to parse.
    pub malformed: usize,
}

/// Convert a `@STATS@` text stream into CSV.
///
/// Reception records go to `receptions`; event records go to `events` when
/// given and are dropped otherwise. Lines that are not statistics (other
/// program output) are skipped.
pub fn stats_to_csv(
    input: impl BufRead,
    receptions: &mut impl Write,
    mut events: Option<&mut dyn Write>,
) -> Result<CsvConversion> {
    let mut counts = CsvConversion::default();
    writeln!(receptions, "{RECEPTION_CSV_HEADER}")?;
    if let Some(out) = events.as_mut() {
        writeln!(out, "{EVENT_CSV_HEADER}")?;
    }

    for (number, line) in input.lines().enumerate() {
        let line = line?;
        if !line.trim_start().starts_with("@STATS@") {
            continue;
        }
        match line.parse::<StatsRecord>() {
            Ok(StatsRecord::Reception(r)) => {
                writeln!(
                    receptions,
                    "{},{},{},{},{},{},{}",
                    r.time.as_millis(),
                    r.node,
                    r.table_size,
                    r.position.x,
                    r.position.y,
                    r.error.x,
                    r.error.y
                )?;
                counts.receptions += 1;
            }
            Ok(StatsRecord::Event(e)) => {
                if let Some(out) = events.as_mut() {
                    writeln!(out, "{},{}", e.time.as_millis(), e.event)?;
                }
                counts.events += 1;
            }
            Err(e) => {
                warn!(line = number + 1, error = %e, "Skipping malformed stats line");
                counts.malformed += 1;
            }
        }
    }
    Ok(counts)
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u64,
    pub duration_ms: u64,
    pub nodes: usize,
    pub beacons: usize,
    /// Regular nodes holding a position estimate at the end of the run.
    pub localized: usize,
    /// Mean Euclidean distance between estimate and true position.
    pub mean_error: Option<f64>,
    pub max_error: Option<f64>,
    pub receptions: usize,
    pub expired_entries: usize,
    pub disabled_nodes: usize,
}

impl RunSummary {
    /// Fill the error statistics from per-node localization errors.
    pub fn with_errors(mut self, errors: &[f64]) -> Self {
        self.localized = errors.len();
        if !errors.is_empty() {
            let sum: f64 = errors.iter().sum();
            self.mean_error = Some(sum / errors.len() as f64);
            self.max_error = errors.iter().copied().reduce(f64::max);
        }
        self
    }
}
