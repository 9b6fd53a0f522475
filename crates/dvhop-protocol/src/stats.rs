//! Observability records.
//!
//! Nodes emit one record per processed reception and one per discrete
//! event. The text form is the `@`-separated line format consumed by the
//! stats-to-CSV tooling:
//!
//! ```text
//! @STATS@TIME@1500@NODE@10.0.0.7@HOP_TABLE_SIZE@4@POSITION_X@51.2@POSITION_Y@98.7@ERROR_X@1.2@ERROR_Y@0.3@
//! @STATS@TIME@1600@EVENT@EXPIRED_ENTRY@
//! ```

use std::net::Ipv4Addr;
use std::str::FromStr;

use dvhop_geometry::Point2;
use dvhop_table::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discrete protocol events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCode {
    /// A distance table entry went stale and was removed.
    ExpiredEntry,
    /// A node was taken out of the network.
    DisabledNode,
}

impl EventCode {
    /// Code as it appears in the text stream.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ExpiredEntry => "EXPIRED_ENTRY",
            Self::DisabledNode => "DISABLED_NODE",
        }
    }
}

impl std::fmt::Display for EventCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCode {
    type Err = ParseStatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXPIRED_ENTRY" => Ok(Self::ExpiredEntry),
            "DISABLED_NODE" => Ok(Self::DisabledNode),
            other => Err(ParseStatsError::UnknownEvent(other.to_string())),
        }
    }
}

/// State of a node after processing one reception.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReceptionStats {
    /// When the reception was processed.
    pub time: Timestamp,
    /// Address of the receiving interface.
    pub node: Ipv4Addr,
    /// Number of beacons in the distance table.
    pub table_size: usize,
    /// The node's current position estimate.
    pub position: Point2,
    /// Absolute per-axis error against ground truth (zero when unknown).
    pub error: Point2,
}

/// A timestamped discrete event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStats {
    /// When the event happened.
    pub time: Timestamp,
    /// What happened.
    pub event: EventCode,
}

/// One record of the observability stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatsRecord {
    /// Per-reception statistics.
    Reception(ReceptionStats),
    /// Discrete event.
    Event(EventStats),
}

impl StatsRecord {
    /// Build an event record.
    pub fn event(time: Timestamp, event: EventCode) -> Self {
        Self::Event(EventStats { time, event })
    }

    /// Time the record refers to.
    pub fn time(&self) -> Timestamp {
        match self {
            Self::Reception(r) => r.time,
            Self::Event(e) => e.time,
        }
    }
}

impl std::fmt::Display for StatsRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reception(r) => write!(
                f,
                "@STATS@TIME@{}@NODE@{}@HOP_TABLE_SIZE@{}@POSITION_X@{}@POSITION_Y@{}@ERROR_X@{}@ERROR_Y@{}@",
                r.time.as_millis(),
                r.node,
                r.table_size,
                r.position.x,
                r.position.y,
                r.error.x,
                r.error.y
            ),
            Self::Event(e) => write!(f, "@STATS@TIME@{}@EVENT@{}@", e.time.as_millis(), e.event),
        }
    }
}

/// Errors parsing a line of the text stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseStatsError {
    /// The line is not a `@STATS@` record.
    #[error("not a stats line")]
    NotStats,

    /// A required field is absent.
    #[error("missing field {0}")]
    MissingField(&'static str),

    /// A field value failed to parse.
    #[error("invalid value {value:?} for field {field}")]
    InvalidValue { field: &'static str, value: String },

    /// Unknown event code.
    #[error("unknown event {0:?}")]
    UnknownEvent(String),
}

fn field<'a>(tokens: &[&'a str], name: &'static str) -> Result<&'a str, ParseStatsError> {
    tokens
        .chunks(2)
        .find(|pair| pair[0] == name)
        .and_then(|pair| pair.get(1).copied())
        .ok_or(ParseStatsError::MissingField(name))
}

fn parse_field<T: FromStr>(tokens: &[&str], name: &'static str) -> Result<T, ParseStatsError> {
    let raw = field(tokens, name)?;
    raw.parse().map_err(|_| ParseStatsError::InvalidValue {
        field: name,
        value: raw.to_string(),
    })
}

impl FromStr for StatsRecord {
    type Err = ParseStatsError;

    /// Parse a text line. Accepts the legacy event layout
    /// `@STATS@EVENT@TIME@<ms>@<CODE>@` as well.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let body = line.strip_prefix('@').unwrap_or(line);
        let body = body.strip_suffix('@').unwrap_or(body);
        // Interior empty tokens are kept so that keys and values stay paired.
        let tokens: Vec<&str> = body.split('@').collect();
        let Some((&"STATS", rest)) = tokens.split_first() else {
            return Err(ParseStatsError::NotStats);
        };

        if rest.first() == Some(&"EVENT") {
            // Legacy layout: EVENT TIME <ms> <CODE>
            let time = Timestamp::from_millis(parse_field(&rest[1..], "TIME")?);
            let code = rest.get(3).ok_or(ParseStatsError::MissingField("EVENT"))?;
            return Ok(Self::event(time, code.parse()?));
        }

        let time = Timestamp::from_millis(parse_field(rest, "TIME")?);
        if let Ok(code) = field(rest, "EVENT") {
            return Ok(Self::event(time, code.parse()?));
        }

        Ok(Self::Reception(ReceptionStats {
            time,
            node: parse_field(rest, "NODE")?,
            table_size: parse_field(rest, "HOP_TABLE_SIZE")?,
            position: Point2::new(parse_field(rest, "POSITION_X")?, parse_field(rest, "POSITION_Y")?),
            error: Point2::new(parse_field(rest, "ERROR_X")?, parse_field(rest, "ERROR_Y")?),
        }))
    }
}
