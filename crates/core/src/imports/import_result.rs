use serde::{Deserialize, Serialize};

use crate::constants::MAX_REPORTED_ERRORS;

/// Summary handed back to the caller after an import.
///
/// `failed` is the true number of rejected rows; `errors` only keeps the
/// first few messages (plus unmatched-exit warnings) to bound UI and log volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Accumulates per-row outcomes into an [`ImportResult`].
#[derive(Debug, Clone)]
pub struct ImportResultBuilder {
    result: ImportResult,
    max_errors: usize,
}

impl ImportResultBuilder {
    pub fn new(max_errors: usize) -> Self {
        Self {
            result: ImportResult::default(),
            max_errors,
        }
    }

    /// A row that was expected to be a trade but could not be used.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.result.failed += 1;
        self.push_message(message.into());
    }

    /// A non-fatal problem that does not count as a failed row.
    pub fn record_warning(&mut self, message: impl Into<String>) {
        self.push_message(message.into());
    }

    pub fn record_successes(&mut self, count: usize) {
        self.result.success += count;
    }

    pub fn failed(&self) -> usize {
        self.result.failed
    }

    pub fn finish(self) -> ImportResult {
        self.result
    }

    fn push_message(&mut self, message: String) {
        if self.result.errors.len() < self.max_errors {
            self.result.errors.push(message);
        }
    }
}

impl Default for ImportResultBuilder {
    fn default() -> Self {
        Self::new(MAX_REPORTED_ERRORS)
    }
}
