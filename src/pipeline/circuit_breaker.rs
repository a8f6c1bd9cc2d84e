//! Circuit breaker for listing scans.
//!
//! Stops a sync run once too many page fetches have failed in a row, so a
//! site that is down or blocking us is not hammered for the rest of the run.
//!
//! ## Behavior
//!
//! > After **3** consecutive page-fetch failures the scan is aborted. Any
//! > successful fetch resets the counter.

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker. Default: 3
    pub max_consecutive_failures: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
        }
    }
}

/// Result of recording one fetch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerResult {
    /// Keep scanning
    Closed { consecutive_failures: u32 },
    /// Too many failures in a row - abort the scan
    Tripped { consecutive_failures: u32 },
}

/// Consecutive-failure counter for one scan.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    consecutive_failures: u32,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
        }
    }

    /// Shorthand for a breaker tripping after `threshold` failures.
    pub fn with_threshold(threshold: u32) -> Self {
        Self::with_config(CircuitBreakerConfig {
            max_consecutive_failures: threshold.max(1),
        })
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) -> CircuitBreakerResult {
        self.consecutive_failures += 1;
        self.check()
    }

    pub fn check(&self) -> CircuitBreakerResult {
        if self.consecutive_failures >= self.config.max_consecutive_failures {
            CircuitBreakerResult::Tripped {
                consecutive_failures: self.consecutive_failures,
            }
        } else {
            CircuitBreakerResult::Closed {
                consecutive_failures: self.consecutive_failures,
            }
        }
    }

    pub fn is_tripped(&self) -> bool {
        matches!(self.check(), CircuitBreakerResult::Tripped { .. })
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
