use std::fmt;

use kobo_api::BackendError;

/// A record that could not be written.
#[derive(Debug, Clone)]
pub struct RecordFailure {
    /// Position in fetch order, from 0.
    pub position: usize,
    /// Natural key as text, `<missing>` when absent.
    pub key: String,
    pub error: BackendError,
}

/// Result of one record's insert-or-ignore.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Inserted,
    /// Natural key already present.
    Skipped,
    Failed(RecordFailure),
}

/// Counts for one run. `inserted + skipped + failed == fetched`.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub fetched: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<RecordFailure>,
}

impl LoadReport {
    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Inserted => self.inserted += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Failed(failure) => {
                self.failed += 1;
                self.failures.push(failure);
            }
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} inserted={} skipped={} failed={}",
            self.fetched, self.inserted, self.skipped, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_accumulate() {
        let mut report = LoadReport { fetched: 3, ..Default::default() };
        report.record(RecordOutcome::Inserted);
        report.record(RecordOutcome::Skipped);
        report.record(RecordOutcome::Failed(RecordFailure {
            position: 2,
            key: "9".into(),
            error: BackendError::query("boom"),
        }));
        assert_eq!((report.inserted, report.skipped, report.failed), (1, 1, 1));
        assert_eq!(report.failures[0].key, "9");
        assert_eq!(report.to_string(), "fetched=3 inserted=1 skipped=1 failed=1");
    }
}
