//! Protocol configuration.

use std::time::Duration;

/// UDP port DV-Hop control packets are exchanged on.
pub const DVHOP_PORT: u16 = 1234;

/// Configuration for a DV-Hop node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DvHopConfig {
    /// Period of the hello (flooding) timer.
    pub hello_interval: Duration,

    /// Distance table entries older than this are evicted.
    pub expiry: Duration,

    /// Upper bound of the per-message send jitter, in milliseconds.
    /// Each send is delayed by a uniform draw from `0..=max_jitter_ms`.
    pub max_jitter_ms: u32,

    /// IP TTL for control packets; 1 keeps reports between neighbors.
    pub ttl: u8,

    /// UDP port for control packets.
    pub port: u16,
}

impl Default for DvHopConfig {
    fn default() -> Self {
        Self {
            hello_interval: Duration::from_millis(500),
            expiry: dvhop_table::DEFAULT_EXPIRY,
            max_jitter_ms: 10,
            ttl: 1,
            port: DVHOP_PORT,
        }
    }
}

impl DvHopConfig {
    /// Set the hello interval.
    #[must_use]
    pub fn with_hello_interval(mut self, interval: Duration) -> Self {
        self.hello_interval = interval;
        self
    }

    /// Set the distance table expiry threshold.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    /// Set the maximum send jitter.
    #[must_use]
    pub fn with_max_jitter_ms(mut self, max_jitter_ms: u32) -> Self {
        self.max_jitter_ms = max_jitter_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DvHopConfig::default();
        assert_eq!(config.hello_interval, Duration::from_millis(500));
        assert_eq!(config.expiry, Duration::from_millis(1_500));
        assert_eq!(config.max_jitter_ms, 10);
        assert_eq!(config.ttl, 1);
        assert_eq!(config.port, 1234);
    }

    #[test]
    fn builders() {
        let config = DvHopConfig::default()
            .with_hello_interval(Duration::from_millis(250))
            .with_expiry(Duration::from_secs(3))
            .with_max_jitter_ms(0);

        assert_eq!(config.hello_interval, Duration::from_millis(250));
        assert_eq!(config.expiry, Duration::from_secs(3));
        assert_eq!(config.max_jitter_ms, 0);
    }
}
