//! Healing run metrics
//!
//! Counters use atomics, the latency buffer a short critical section,
//! so many concurrent test threads can report without contention. No
//! lock is held while callers compute anything.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bound on retained latency samples.
const MAX_LATENCY_SAMPLES: usize = 4096;

/// Process-wide collector for one test run.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    attempts: AtomicU64,
    successes: AtomicU64,
    refusals: AtomicU64,
    failures: AtomicU64,
    cache_hits: AtomicU64,
    false_heals: AtomicU64,

    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    /// Accumulated cost in micro-dollars, so it fits an atomic.
    cost_micros: AtomicU64,

    latencies_ms: Mutex<Vec<u64>>,
    by_failure_kind: DashMap<String, u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refusal(&self) {
        self.refusals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, exception_kind: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self
            .by_failure_kind
            .entry(exception_kind.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_false_heal(&self) {
        self.false_heals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency_ms(&self, latency_ms: u64) {
        let mut samples = self.latencies_ms.lock();
        if samples.len() >= MAX_LATENCY_SAMPLES {
            // Drop the oldest half rather than single-shifting forever.
            samples.drain(..MAX_LATENCY_SAMPLES / 2);
        }
        samples.push(latency_ms);
    }

    pub fn record_tokens(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(completion, Ordering::Relaxed);
    }

    pub fn record_cost_micros(&self, micros: u64) {
        self.cost_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Latency percentile by sort-and-index: `ceil(p/100 * n) - 1`,
    /// clamped to `[0, n-1]`. Returns None with no samples.
    pub fn latency_percentile_ms(&self, percentile: f64) -> Option<u64> {
        let samples = self.latencies_ms.lock();
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.clone();
        drop(samples);
        sorted.sort_unstable();

        let n = sorted.len();
        let rank = (percentile / 100.0 * n as f64).ceil() as isize - 1;
        let index = rank.clamp(0, n as isize - 1) as usize;
        Some(sorted[index])
    }

    /// False-heal rate over confirmed successes, in [0, 1].
    pub fn false_heal_rate(&self) -> f64 {
        let successes = self.successes.load(Ordering::Relaxed);
        if successes == 0 {
            return 0.0;
        }
        self.false_heals.load(Ordering::Relaxed) as f64 / successes as f64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut by_failure_kind: Vec<(String, u64)> = self
            .by_failure_kind
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        by_failure_kind.sort();

        MetricsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            refusals: self.refusals.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            false_heals: self.false_heals.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            cost_micros: self.cost_micros.load(Ordering::Relaxed),
            p50_latency_ms: self.latency_percentile_ms(50.0),
            p95_latency_ms: self.latency_percentile_ms(95.0),
            by_failure_kind,
        }
    }
}

/// Point-in-time view suitable for end-of-run reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub refusals: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub false_heals: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_micros: u64,
    pub p50_latency_ms: Option<u64>,
    pub p95_latency_ms: Option<u64>,
    pub by_failure_kind: Vec<(String, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn percentile_uses_ceil_rank() {
        let metrics = MetricsCollector::new();
        for ms in [10, 20, 30, 40] {
            metrics.record_latency_ms(ms);
        }
        // ceil(0.5 * 4) - 1 = 1 -> 20
        assert_eq!(metrics.latency_percentile_ms(50.0), Some(20));
        // ceil(0.95 * 4) - 1 = 3 -> 40
        assert_eq!(metrics.latency_percentile_ms(95.0), Some(40));
        // rank below zero clamps to first sample
        assert_eq!(metrics.latency_percentile_ms(0.0), Some(10));
        assert_eq!(metrics.latency_percentile_ms(100.0), Some(40));
    }

    #[test]
    fn percentile_empty_is_none() {
        let metrics = MetricsCollector::new();
        assert_eq!(metrics.latency_percentile_ms(95.0), None);
    }

    #[test]
    fn counters_survive_concurrent_updates() {
        let metrics = Arc::new(MetricsCollector::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let metrics = Arc::clone(&metrics);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    metrics.record_attempt();
                    metrics.record_success();
                    metrics.record_failure("NoSuchElement");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.attempts, 800);
        assert_eq!(snapshot.successes, 800);
        assert_eq!(snapshot.failures, 800);
        assert_eq!(
            snapshot.by_failure_kind,
            vec![("NoSuchElement".to_string(), 800)]
        );
    }

    #[test]
    fn false_heal_rate_over_successes() {
        let metrics = MetricsCollector::new();
        assert_eq!(metrics.false_heal_rate(), 0.0);
        for _ in 0..4 {
            metrics.record_success();
        }
        metrics.record_false_heal();
        assert!((metrics.false_heal_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn latency_buffer_is_bounded() {
        let metrics = MetricsCollector::new();
        for ms in 0..(MAX_LATENCY_SAMPLES as u64 + 100) {
            metrics.record_latency_ms(ms);
        }
        let samples = metrics.latencies_ms.lock();
        assert!(samples.len() <= MAX_LATENCY_SAMPLES);
    }
}
