use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Outcome counters of a batch run.
///
/// `already_satisfied` is a subset of `successful`: pairs whose record
/// existed before the run and were not recomputed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
    pub already_satisfied: usize,
    pub records_written: usize,
    /// Dates whose benchmark series could not be loaded
    pub missing_benchmark_dates: Vec<NaiveDate>,
    /// Dates whose batch insert failed after retries
    pub persistence_failed_dates: Vec<NaiveDate>,
}

impl BatchStats {
    /// Percentage of successful pairs, rounded to one decimal
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let rate = self.successful as f64 / self.total as f64 * 100.0;
        (rate * 10.0).round() / 10.0
    }

    /// Fold another run's counters into this one
    pub fn merge(&mut self, other: BatchStats) {
        self.successful += other.successful;
        self.failed += other.failed;
        self.total += other.total;
        self.already_satisfied += other.already_satisfied;
        self.records_written += other.records_written;
        self.missing_benchmark_dates.extend(other.missing_benchmark_dates);
        self.persistence_failed_dates.extend(other.persistence_failed_dates);
    }
}
