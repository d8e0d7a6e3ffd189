//! Per-session counters and round-trip latency samples

use serde::Serialize;
use std::time::Duration;

/// Round-trip latency samples collected by one session
#[derive(Debug, Default, Clone)]
pub struct LatencyStats {
    pub samples: Vec<Duration>,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    pub fn record(&mut self, latency: Duration) {
        self.samples.push(latency);
    }

    /// Fold another session's samples into this one
    pub fn merge(&mut self, other: &LatencyStats) {
        self.samples.extend_from_slice(&other.samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Calculate percentile (0-100)
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted = self.samples.clone();
        sorted.sort();

        let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    pub fn p50(&self) -> Option<Duration> {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> Option<Duration> {
        self.percentile(99.0)
    }

    pub fn max(&self) -> Option<Duration> {
        self.samples.iter().max().copied()
    }

    /// Millisecond summary for reports
    pub fn summary(&self) -> LatencySummary {
        let ms = |d: Option<Duration>| d.map(|d| d.as_secs_f64() * 1000.0);
        LatencySummary {
            samples: self.samples.len(),
            p50_ms: ms(self.p50()),
            p99_ms: ms(self.p99()),
            max_ms: ms(self.max()),
        }
    }
}

/// Serializable view of a `LatencyStats`
#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub p50_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

/// What one session did over its lifetime
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Commands successfully written to the stream
    pub commands_sent: u64,
    /// Responses consumed for commands (banner excluded)
    pub responses_received: u64,
    /// Commands whose response did not arrive in time
    pub response_timeouts: u64,
    /// Chunks read from the stream by the receive task, banner included
    pub reads: u64,
    /// Whether the welcome banner was consumed
    pub banner_received: bool,
    pub latencies: LatencyStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentiles() {
        let mut stats = LatencyStats::new();
        for ms in 1..=100 {
            stats.record(Duration::from_millis(ms));
        }
        assert_eq!(stats.p50(), Some(Duration::from_millis(51)));
        assert_eq!(stats.p99(), Some(Duration::from_millis(99)));
        assert_eq!(stats.max(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_empty_stats() {
        let stats = LatencyStats::new();
        assert!(stats.p99().is_none());
        let summary = stats.summary();
        assert_eq!(summary.samples, 0);
        assert!(summary.p50_ms.is_none());
    }

    #[test]
    fn test_merge() {
        let mut a = LatencyStats::new();
        a.record(Duration::from_millis(5));
        let mut b = LatencyStats::new();
        b.record(Duration::from_millis(7));
        b.record(Duration::from_millis(9));

        a.merge(&b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.max(), Some(Duration::from_millis(9)));
    }
}
