//! Scenario configuration.
//!
//! Values start from [`Default`] overridden by `DVHOP_*` environment
//! variables, or from a JSON scenario file instead. `--key value`
//! command-line flags are applied last.

use std::path::Path;
use std::time::Duration;

use dvhop_protocol::DvHopConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Configuration keys, as used in JSON, on the command line and (upper-cased,
/// `DVHOP_`-prefixed) in the environment.
pub const KEYS: &[&str] = &[
    "seed",
    "size",
    "beacons",
    "step",
    "time",
    "range",
    "damage_extent",
    "position_offset",
    "loss_rate",
    "hello_interval_ms",
    "expiry_ms",
    "max_jitter_ms",
    "link_delay_ms",
];

/// Configuration for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for every random draw of the run.
    pub seed: u64,

    /// Number of nodes.
    pub size: u32,

    /// Number of nodes that are beacons. Clamped into `[1, size - 1]`.
    pub beacons: u32,

    /// Grid spacing, meters.
    pub step: f64,

    /// Simulated time, seconds.
    pub time: f64,

    /// Radio range, meters. Nodes closer than this hear each other.
    pub range: f64,

    /// Number of node failures scheduled at random times.
    pub damage_extent: u32,

    /// Upper bound of the random per-axis offset between a node's grid slot
    /// and the position it reports, meters.
    pub position_offset: f64,

    /// Probability that one delivery to one receiver is lost.
    pub loss_rate: f64,

    /// Hello timer period.
    pub hello_interval_ms: u64,

    /// Distance table staleness threshold.
    pub expiry_ms: u64,

    /// Upper bound of the per-send jitter.
    pub max_jitter_ms: u32,

    /// Time from a send to its delivery at every receiver.
    pub link_delay_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            size: 50,
            beacons: 12,
            step: 50.0,
            time: 10.0,
            range: 75.0,
            damage_extent: 0,
            position_offset: 10.0,
            loss_rate: 0.0,
            hello_interval_ms: 500,
            expiry_ms: 1_500,
            max_jitter_ms: 10,
            link_delay_ms: 1,
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid value {value:?} for {key}")))
}

/// Normalize `damageExtent`, `damage-extent` and `DAMAGE_EXTENT` alike.
fn normalize_key(key: &str) -> String {
    let key = key.trim_start_matches('-');
    let camel = !key.contains('_') && key.chars().any(|c| c.is_ascii_lowercase());

    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c == '-' {
            out.push('_');
        } else if camel && c.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

impl SimulationConfig {
    /// Defaults overridden by `DVHOP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `DVHOP_<KEY>` variable name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        for key in KEYS {
            let name = format!("DVHOP_{}", key.to_ascii_uppercase());
            if let Some(value) = lookup(&name) {
                config.set(key, &value)?;
            }
        }
        Ok(config)
    }

    /// Load from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Set one value by key name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = normalize_key(key);
        match key.as_str() {
            "seed" => self.seed = parse(&key, value)?,
            "size" => self.size = parse(&key, value)?,
            "beacons" => self.beacons = parse(&key, value)?,
            "step" => self.step = parse(&key, value)?,
            "time" => self.time = parse(&key, value)?,
            "range" => self.range = parse(&key, value)?,
            "damage_extent" => self.damage_extent = parse(&key, value)?,
            "position_offset" => self.position_offset = parse(&key, value)?,
            "loss_rate" => self.loss_rate = parse(&key, value)?,
            "hello_interval_ms" => self.hello_interval_ms = parse(&key, value)?,
            "expiry_ms" => self.expiry_ms = parse(&key, value)?,
            "max_jitter_ms" => self.max_jitter_ms = parse(&key, value)?,
            "link_delay_ms" => self.link_delay_ms = parse(&key, value)?,
            _ => return Err(Error::InvalidConfig(format!("unknown key {key:?}"))),
        }
        Ok(())
    }

    /// Apply `(key, value)` overrides in order.
    pub fn apply<'a>(&mut self, overrides: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<()> {
        for (key, value) in overrides {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Check the configuration, clamping the beacon count into range.
    pub fn validate(&mut self) -> Result<()> {
        if self.size < 2 {
            return Err(Error::InvalidConfig(format!(
                "size must be at least 2, got {}",
                self.size
            )));
        }
        if self.beacons == 0 {
            warn!(beacons = self.beacons, corrected = 1, "beacons corrected to avoid an empty beacon set");
            self.beacons = 1;
        }
        if self.beacons >= self.size {
            let corrected = self.size - 1;
            warn!(beacons = self.beacons, corrected, "beacons corrected to leave at least one regular node");
            self.beacons = corrected;
        }

        let positive = [("step", self.step), ("time", self.time), ("range", self.range)];
        for (key, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!("{key} must be positive, got {value}")));
            }
        }
        if Duration::try_from_secs_f64(self.time).is_err() {
            return Err(Error::InvalidConfig(format!(
                "time is too large, got {}",
                self.time
            )));
        }
        if !self.position_offset.is_finite() || self.position_offset < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "position_offset must not be negative, got {}",
                self.position_offset
            )));
        }
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(Error::InvalidConfig(format!(
                "loss_rate must be within [0, 1], got {}",
                self.loss_rate
            )));
        }
        if self.hello_interval_ms == 0 {
            return Err(Error::InvalidConfig("hello_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// Total simulated time. Out-of-range values, which [`Self::validate`]
    /// rejects, give [`Duration::ZERO`].
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.time).unwrap_or(Duration::ZERO)
    }

    /// Per-node protocol settings.
    pub fn protocol_config(&self) -> DvHopConfig {
        DvHopConfig::default()
            .with_hello_interval(Duration::from_millis(self.hello_interval_ms))
            .with_expiry(Duration::from_millis(self.expiry_ms))
            .with_max_jitter_ms(self.max_jitter_ms)
    }
}

/// Split `--key value` and `--key=value` arguments into pairs.
pub fn parse_flags(args: &[String]) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let Some(flag) = arg.strip_prefix("--") else {
            return Err(Error::InvalidConfig(format!("unexpected argument {arg:?}")));
        };
        match flag.split_once('=') {
            Some((key, value)) => pairs.push((key.to_string(), value.to_string())),
            None => {
                let value = iter
                    .next()
                    .ok_or_else(|| Error::InvalidConfig(format!("missing value for --{flag}")))?;
                pairs.push((flag.to_string(), value.clone()));
            }
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.seed, 12345);
        assert_eq!(config.size, 50);
        assert_eq!(config.beacons, 12);
        assert_eq!(config.step, 50.0);
        assert_eq!(config.duration(), Duration::from_secs(10));
        assert_eq!(config.damage_extent, 0);
        assert_eq!(config.protocol_config(), DvHopConfig::default());
    }

    #[test]
    fn key_spellings() {
        let mut config = SimulationConfig::default();
        config.set("damageExtent", "3").unwrap();
        assert_eq!(config.damage_extent, 3);
        config.set("--loss-rate", "0.25").unwrap();
        assert_eq!(config.loss_rate, 0.25);
        config.set("MAX_JITTER_MS", "4").unwrap();
        assert_eq!(config.max_jitter_ms, 4);

        assert!(matches!(config.set("pcap", "true"), Err(Error::InvalidConfig(_))));
        assert!(matches!(config.set("size", "many"), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn environment_overrides() {
        let env: HashMap<&str, &str> =
            [("DVHOP_SIZE", "9"), ("DVHOP_SEED", "7"), ("DVHOP_TIME", "2.5")].into();
        let config = SimulationConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.size, 9);
        assert_eq!(config.seed, 7);
        assert_eq!(config.duration(), Duration::from_millis(2_500));
        assert_eq!(config.beacons, 12);
    }

    #[test]
    fn json_keeps_missing_defaults() {
        let config: SimulationConfig = serde_json::from_str(r#"{"size": 16, "range": 60.0}"#).unwrap();
        assert_eq!(config.size, 16);
        assert_eq!(config.range, 60.0);
        assert_eq!(config.beacons, 12);
    }

    #[test]
    fn json_file() {
        let path = std::env::temp_dir().join(format!("dvhop-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"seed": 99, "beacons": 3}"#).unwrap();

        let config = SimulationConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.seed, 99);
        assert_eq!(config.beacons, 3);
    }

    #[test]
    fn validate_clamps_beacons() {
        let mut config = SimulationConfig {
            size: 10,
            beacons: 0,
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.beacons, 1);

        config.beacons = 25;
        config.validate().unwrap();
        assert_eq!(config.beacons, 9);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = [
            SimulationConfig { size: 1, ..Default::default() },
            SimulationConfig { step: 0.0, ..Default::default() },
            SimulationConfig { time: f64::NAN, ..Default::default() },
            SimulationConfig { time: 1e20, ..Default::default() },
            SimulationConfig { loss_rate: 1.5, ..Default::default() },
            SimulationConfig { position_offset: -1.0, ..Default::default() },
            SimulationConfig { hello_interval_ms: 0, ..Default::default() },
        ];
        for mut config in bad {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn flags() {
        let args: Vec<String> = ["--size", "20", "--time=3", "--damageExtent", "2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let pairs = parse_flags(&args).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("size".to_string(), "20".to_string()),
                ("time".to_string(), "3".to_string()),
                ("damageExtent".to_string(), "2".to_string()),
            ]
        );

        let mut config = SimulationConfig::default();
        config
            .apply(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .unwrap();
        assert_eq!(config.size, 20);
        assert_eq!(config.damage_extent, 2);

        assert!(parse_flags(&["--size".to_string()]).is_err());
        assert!(parse_flags(&["size".to_string()]).is_err());
    }
}
