//! Request pacing and coarse network-health tracking.
//!
//! Every upstream call goes through the pacer: it hands out inter-request
//! delays (random jitter for normal calls, linearly growing delays for
//! retries), records outcomes, and derives a coarse `NetworkTier` from the
//! rolling success rate. When the tier collapses it signals callers to stop
//! issuing requests entirely.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;

/// Pause after this many consecutive failures.
const CONSECUTIVE_FAILURE_LIMIT: u32 = 15;
/// Below this success rate (with enough samples) the pacer asks to stop.
const PAUSE_SUCCESS_RATE: f64 = 0.2;
/// Minimum sample size before the success-rate pause check applies.
const PAUSE_MIN_REQUESTS: u64 = 30;

/// Delay constants for one pacing profile.
#[derive(Debug, Clone, Copy)]
pub struct PacerConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub retry_delay: Duration,
}

impl PacerConfig {
    /// Standard profile tuned for a cooperative upstream.
    pub fn standard() -> Self {
        Self {
            min_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(1000),
            retry_delay: Duration::from_secs(2),
        }
    }

    /// Conservative profile for restrictive networks: longer delays,
    /// same algorithm.
    pub fn conservative() -> Self {
        Self {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            retry_delay: Duration::from_secs(10),
        }
    }

    /// Zero-delay profile for tests.
    pub fn instant() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
        }
    }
}

/// Coarse network-health classification from the rolling success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkTier {
    /// Success rate above 95%.
    Excellent,
    /// Above 80%.
    Good,
    /// Above 60%.
    Poor,
    /// 60% or below.
    Bad,
}

impl NetworkTier {
    /// Pure threshold function over a success rate.
    pub fn from_success_rate(rate: f64) -> Self {
        if rate > 0.95 {
            NetworkTier::Excellent
        } else if rate > 0.80 {
            NetworkTier::Good
        } else if rate > 0.60 {
            NetworkTier::Poor
        } else {
            NetworkTier::Bad
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkTier::Excellent => "excellent",
            NetworkTier::Good => "good",
            NetworkTier::Poor => "poor",
            NetworkTier::Bad => "bad",
        }
    }
}

/// Rolling request counters, reset only on pacer construction.
#[derive(Debug, Clone, Default)]
pub struct RequestMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_latency: Duration,
    pub last_success: Option<Instant>,
    pub consecutive_failures: u32,
}

impl RequestMetrics {
    /// Success fraction; 1.0 before any request (optimistic default).
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }

    /// Mean latency of successful requests.
    pub fn avg_latency(&self) -> Duration {
        if self.successful_requests == 0 {
            return Duration::ZERO;
        }
        self.total_latency / self.successful_requests as u32
    }
}

/// Tracks request outcomes and hands out inter-request delays.
#[derive(Debug)]
pub struct RequestPacer {
    config: PacerConfig,
    metrics: Mutex<RequestMetrics>,
}

impl RequestPacer {
    pub fn new(config: PacerConfig) -> Self {
        Self {
            config,
            metrics: Mutex::new(RequestMetrics::default()),
        }
    }

    /// Delay to wait before the next request.
    ///
    /// Normal calls draw uniformly from [min_delay, max_delay] to avoid
    /// synchronized request patterns. Retries grow linearly with the retry
    /// index: `retry_delay * (1 + count * 0.5)`.
    pub fn delay(&self, is_retry: bool, retry_count: u32) -> Duration {
        if is_retry {
            self.config
                .retry_delay
                .mul_f64(1.0 + retry_count as f64 * 0.5)
        } else if self.config.max_delay > self.config.min_delay {
            let span = self.config.max_delay - self.config.min_delay;
            let jitter = span.mul_f64(rand::thread_rng().gen_range(0.0..=1.0));
            self.config.min_delay + jitter
        } else {
            self.config.min_delay
        }
    }

    /// Record the outcome of one upstream request.
    pub fn record(&self, success: bool, latency: Duration) {
        let mut m = self.metrics.lock().unwrap();
        m.total_requests += 1;
        if success {
            m.successful_requests += 1;
            m.total_latency += latency;
            m.last_success = Some(Instant::now());
            m.consecutive_failures = 0;
        } else {
            m.failed_requests += 1;
            m.consecutive_failures += 1;
        }
    }

    /// Snapshot of the rolling metrics.
    pub fn metrics(&self) -> RequestMetrics {
        self.metrics.lock().unwrap().clone()
    }

    pub fn success_rate(&self) -> f64 {
        self.metrics.lock().unwrap().success_rate()
    }

    pub fn tier(&self) -> NetworkTier {
        NetworkTier::from_success_rate(self.success_rate())
    }

    /// Whether callers should stop issuing requests.
    ///
    /// True on a long consecutive-failure streak, or on a persistently low
    /// success rate once the sample is large enough to trust. The dual
    /// condition avoids over-reacting to small samples.
    pub fn should_pause(&self) -> bool {
        let m = self.metrics.lock().unwrap();
        if m.consecutive_failures > CONSECUTIVE_FAILURE_LIMIT {
            return true;
        }
        m.total_requests > PAUSE_MIN_REQUESTS && m.success_rate() < PAUSE_SUCCESS_RATE
    }
}
