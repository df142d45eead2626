//! Per-instance formatting metrics

use serde::{Deserialize, Serialize};

use crate::format::{FormatOutput, FormatStatus};
use crate::types::{BridgeError, BridgeResult};

/// Counters for requests served by one instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatMetrics {
    /// Total number of requests
    pub call_count: u64,
    /// Requests whose input was already formatted
    pub unchanged_count: u64,
    /// Requests that produced new text
    pub formatted_count: u64,
    /// Requests the plugin rejected
    pub errored_count: u64,
    /// Requests that failed for any other reason
    pub failed_count: u64,
    /// Total time spent in the plugin in nanoseconds
    pub total_execution_time_ns: u64,
    /// Average time per request in nanoseconds
    pub avg_execution_time_ns: u64,
    /// Last request timestamp (unix seconds)
    pub last_execution: u64,
}

impl FormatMetrics {
    pub fn record(&mut self, duration_ns: u64, result: &BridgeResult<FormatOutput>) {
        self.call_count += 1;
        match result {
            Ok(output) if output.status == FormatStatus::Unchanged => self.unchanged_count += 1,
            Ok(_) => self.formatted_count += 1,
            Err(BridgeError::Format(_)) => self.errored_count += 1,
            Err(_) => self.failed_count += 1,
        }
        self.total_execution_time_ns += duration_ns;
        self.avg_execution_time_ns = self.total_execution_time_ns / self.call_count;
        self.last_execution = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
    }
}
