//! Per-statement timing and slow-query accounting.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;

/// Counters for one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryStatistic {
    pub count: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
    pub slow_count: u64,
}

impl QueryStatistic {
    #[must_use]
    pub fn average_duration(&self) -> Duration {
        average(self.total_duration, self.count)
    }
}

/// Totals across every statement seen by a [`QueryMonitor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorSnapshot {
    pub total_calls: u64,
    pub total_duration: Duration,
    pub average_duration: Duration,
    pub slow_calls: u64,
}

#[derive(Debug, Default)]
struct MonitorState {
    total_calls: u64,
    total_duration: Duration,
    slow_calls: u64,
    per_statement: HashMap<String, QueryStatistic>,
}

/// Collects execution statistics for the facades that share it.
///
/// Calls whose duration is at or above the threshold count as slow and are logged at `warn`.
#[derive(Debug)]
pub struct QueryMonitor {
    slow_threshold: Duration,
    inner: Mutex<MonitorState>,
}

impl QueryMonitor {
    #[must_use]
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            slow_threshold,
            inner: Mutex::new(MonitorState::default()),
        }
    }

    #[must_use]
    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    /// Record one call and report whether it was slow.
    pub fn record(&self, statement: &str, elapsed: Duration) -> bool {
        let label = normalize_label(statement);
        let slow = elapsed >= self.slow_threshold;
        {
            let mut state = self.lock();
            state.total_calls += 1;
            state.total_duration += elapsed;
            let stat = state.per_statement.entry(label.clone()).or_default();
            stat.count += 1;
            stat.total_duration += elapsed;
            stat.max_duration = stat.max_duration.max(elapsed);
            if slow {
                stat.slow_count += 1;
                state.slow_calls += 1;
            }
        }
        if slow {
            tracing::warn!(
                statement = %label,
                elapsed_ms = elapsed.as_millis(),
                threshold_ms = self.slow_threshold.as_millis(),
                "slow query"
            );
        }
        slow
    }

    #[must_use]
    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.lock();
        MonitorSnapshot {
            total_calls: state.total_calls,
            total_duration: state.total_duration,
            average_duration: average(state.total_duration, state.total_calls),
            slow_calls: state.slow_calls,
        }
    }

    /// Counters for one statement; whitespace differences in `statement` are ignored.
    #[must_use]
    pub fn statistic(&self, statement: &str) -> Option<QueryStatistic> {
        self.lock()
            .per_statement
            .get(&normalize_label(statement))
            .copied()
    }

    /// Every statement seen so far with its counters, slowest total first.
    #[must_use]
    pub fn statistics(&self) -> Vec<(String, QueryStatistic)> {
        let mut all: Vec<_> = self
            .lock()
            .per_statement
            .iter()
            .map(|(label, stat)| (label.clone(), *stat))
            .collect();
        all.sort_by(|a, b| b.1.total_duration.cmp(&a.1.total_duration).then_with(|| a.0.cmp(&b.0)));
        all
    }

    pub fn reset(&self) {
        *self.lock() = MonitorState::default();
    }

    // a panic while holding the lock cannot leave the counters half-written
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn average(total: Duration, count: u64) -> Duration {
    match u32::try_from(count) {
        Ok(0) => Duration::ZERO,
        Ok(n) => total / n,
        #[allow(clippy::cast_precision_loss)]
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / count as f64),
    }
}

/// Collapse runs of whitespace so the same statement from different call sites shares a key.
#[must_use]
pub fn normalize_label(statement: &str) -> String {
    statement.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_calls_are_counted_at_threshold() {
        let monitor = QueryMonitor::new(Duration::from_secs(1));
        assert!(monitor.record("SELECT 1", Duration::from_millis(1200)));
        let snap = monitor.snapshot();
        assert_eq!((snap.total_calls, snap.slow_calls), (1, 1));

        assert!(!monitor.record("SELECT 1", Duration::from_millis(500)));
        let snap = monitor.snapshot();
        assert_eq!((snap.total_calls, snap.slow_calls), (2, 1));
        assert_eq!(snap.total_duration, Duration::from_millis(1700));
        assert_eq!(snap.average_duration, Duration::from_millis(850));

        assert!(monitor.record("SELECT 2", Duration::from_secs(1)));
    }

    #[test]
    fn per_statement_keys_ignore_whitespace() {
        let monitor = QueryMonitor::new(Duration::from_secs(5));
        monitor.record("SELECT *\n  FROM users", Duration::from_millis(10));
        monitor.record("SELECT * FROM users", Duration::from_millis(30));
        let stat = monitor.statistic("SELECT *   FROM\tusers").unwrap();
        assert_eq!(stat.count, 2);
        assert_eq!(stat.max_duration, Duration::from_millis(30));
        assert_eq!(stat.average_duration(), Duration::from_millis(20));
        assert_eq!(monitor.statistics().len(), 1);

        monitor.reset();
        assert_eq!(monitor.snapshot(), MonitorSnapshot::default());
        assert!(monitor.statistic("SELECT * FROM users").is_none());
    }
}
