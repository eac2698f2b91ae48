//! Task result types.
//!
//! Bitstring ordering: the leftmost character is the lowest-indexed
//! measured qubit, which is how Braket reports measurement counts. For
//! example `"01"` means the first measured qubit read `0` and the second
//! read `1`.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{BraketError, BraketResult};
use crate::task::{ExecutionTask, TaskId, TaskStatus};

/// Measurement counts from a task.
///
/// Maps bitstrings to occurrence counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counts {
    counts: FxHashMap<String, u64>,
}

impl Counts {
    /// Create empty counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create counts from an iterator of (bitstring, count) pairs.
    /// Duplicate bitstrings are accumulated (summed), consistent with `insert()`.
    pub fn from_pairs(iter: impl IntoIterator<Item = (impl Into<String>, u64)>) -> Self {
        let mut counts = Self::new();
        for (k, v) in iter {
            counts.insert(k, v);
        }
        counts
    }

    /// Insert a count for a bitstring.
    pub fn insert(&mut self, bitstring: impl Into<String>, count: u64) {
        let key = bitstring.into();
        let slot = self.counts.entry(key).or_default();
        *slot = slot.saturating_add(count);
    }

    /// Get the count for a bitstring.
    pub fn get(&self, bitstring: &str) -> u64 {
        self.counts.get(bitstring).copied().unwrap_or(0)
    }

    /// Iterate over (bitstring, count) pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.counts.iter()
    }

    /// Get the total number of shots, saturating at `u64::MAX`.
    pub fn total_shots(&self) -> u64 {
        self.counts.values().fold(0u64, |acc, &c| acc.saturating_add(c))
    }

    /// Total number of shots, or `None` if the sum overflows `u64`.
    pub fn checked_total(&self) -> Option<u64> {
        self.counts.values().try_fold(0u64, |acc, &c| acc.checked_add(c))
    }

    /// Get the most frequent bitstring. Ties go to the smallest bitstring.
    pub fn most_frequent(&self) -> Option<(&String, &u64)> {
        self.sorted().into_iter().next()
    }

    /// Get probabilities for each bitstring.
    #[allow(clippy::cast_precision_loss)]
    pub fn probabilities(&self) -> FxHashMap<String, f64> {
        let total = self.total_shots() as f64;
        if total == 0.0 {
            return FxHashMap::default();
        }
        self.counts
            .iter()
            .map(|(k, &v)| (k.clone(), v as f64 / total))
            .collect()
    }

    /// Get sorted counts (by count descending, then bitstring ascending).
    pub fn sorted(&self) -> Vec<(&String, &u64)> {
        let mut items: Vec<_> = self.counts.iter().collect();
        items.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        items
    }

    /// Width shared by every bitstring, or `None` if empty or ragged.
    pub fn bit_width(&self) -> Option<usize> {
        let mut widths = self.counts.keys().map(String::len);
        let first = widths.next()?;
        widths.all(|w| w == first).then_some(first)
    }

    /// Get the number of unique bitstrings.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check if counts are empty.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<(String, u64)> for Counts {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (key, value) in iter {
            counts.insert(key, value);
        }
        counts
    }
}

/// Final outcome of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Task this result belongs to.
    pub task_id: TaskId,
    /// Terminal status of the task.
    pub status: TaskStatus,
    /// Measurement counts.
    pub counts: Counts,
    /// Qubits that were measured, in bitstring order.
    #[serde(default)]
    pub measured_qubits: Vec<u32>,
    /// Device the task ran on.
    pub device_arn: String,
    /// Number of shots executed. Equals the sum of `counts`.
    pub shots: u32,
    /// Wall time between creation and completion in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_duration_ms: Option<u64>,
    /// Additional metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl TaskResult {
    /// Create a result for a completed task.
    pub fn completed(
        task_id: TaskId,
        device_arn: impl Into<String>,
        counts: Counts,
        shots: u32,
    ) -> Self {
        Self {
            task_id,
            status: TaskStatus::Completed,
            counts,
            measured_qubits: Vec::new(),
            device_arn: device_arn.into(),
            shots,
            execution_duration_ms: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Create the result of a task that ended without measurements.
    ///
    /// Counts are empty and `shots` is zero; the requested shots and the
    /// failure reason go into `metadata`.
    pub fn unfinished(task: &ExecutionTask) -> Self {
        Self {
            task_id: task.task_id.clone(),
            status: task.status,
            counts: Counts::new(),
            measured_qubits: Vec::new(),
            device_arn: task.device_arn.clone(),
            shots: 0,
            execution_duration_ms: duration_ms(task),
            metadata: serde_json::json!({
                "requested_shots": task.shots,
                "failure_reason": task.failure_reason,
            }),
        }
    }

    /// Set the measured qubits.
    pub fn with_measured_qubits(mut self, qubits: Vec<u32>) -> Self {
        self.measured_qubits = qubits;
        self
    }

    /// Set the execution duration.
    pub fn with_execution_duration(mut self, duration_ms: u64) -> Self {
        self.execution_duration_ms = Some(duration_ms);
        self
    }

    /// Set metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Get probabilities for each bitstring.
    pub fn probabilities(&self) -> FxHashMap<String, f64> {
        self.counts.probabilities()
    }

    /// Get the most frequent measurement result with its probability.
    #[allow(clippy::cast_precision_loss)]
    pub fn most_frequent(&self) -> Option<(&String, f64)> {
        let total = self.counts.total_shots() as f64;
        if total == 0.0 {
            return None;
        }
        self.counts
            .most_frequent()
            .map(|(s, &c)| (s, c as f64 / total))
    }

    /// Check the structural invariants of a result.
    ///
    /// - counts sum exactly to `shots`
    /// - bitstrings are non-empty, binary and of equal width
    /// - only terminal statuses carry a result
    /// - a completed task executed at least one shot
    pub fn check(&self) -> BraketResult<()> {
        if !self.status.is_terminal() {
            return Err(BraketError::Validation(format!(
                "result for task {} has non-terminal status {}",
                self.task_id, self.status
            )));
        }
        let total = self.counts.checked_total().ok_or_else(|| {
            BraketError::Validation(format!("counts for task {} overflow", self.task_id))
        })?;
        if total != u64::from(self.shots) {
            return Err(BraketError::Validation(format!(
                "counts for task {} sum to {total} but shots is {}",
                self.task_id, self.shots
            )));
        }
        if self.status == TaskStatus::Completed && self.shots == 0 {
            return Err(BraketError::Validation(format!(
                "completed task {} reports zero shots",
                self.task_id
            )));
        }
        if let Some(bad) = self
            .counts
            .iter()
            .map(|(k, _)| k)
            .find(|k| k.is_empty() || !k.chars().all(|c| c == '0' || c == '1'))
        {
            return Err(BraketError::Validation(format!(
                "'{bad}' is not a measurement bitstring"
            )));
        }
        if !self.counts.is_empty() && self.counts.bit_width().is_none() {
            return Err(BraketError::Validation(
                "measurement bitstrings have different widths".into(),
            ));
        }
        Ok(())
    }
}

/// Milliseconds between creation and end of a task, if it ended.
pub(crate) fn duration_ms(task: &ExecutionTask) -> Option<u64> {
    task.ended_at
        .and_then(|end| u64::try_from((end - task.created_at).num_milliseconds()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bell_result() -> TaskResult {
        let counts = Counts::from_pairs([("00", 500), ("11", 500)]);
        TaskResult::completed("task-1".into(), "sv1", counts, 1000)
    }

    #[test]
    fn test_counts_basic() {
        let mut counts = Counts::new();
        counts.insert("00", 500);
        counts.insert("11", 500);

        assert_eq!(counts.get("00"), 500);
        assert_eq!(counts.get("11"), 500);
        assert_eq!(counts.get("01"), 0);
        assert_eq!(counts.total_shots(), 1000);
        assert_eq!(counts.bit_width(), Some(2));
    }

    #[test]
    fn test_counts_probabilities() {
        let counts = Counts::from_pairs([
            ("00".to_string(), 300),
            ("01".to_string(), 200),
            ("10".to_string(), 300),
            ("11".to_string(), 200),
        ]);

        let probs = counts.probabilities();
        assert!((probs["00"] - 0.3).abs() < 1e-10);
        assert!((probs["01"] - 0.2).abs() < 1e-10);
    }

    #[test]
    fn test_counts_most_frequent_breaks_ties() {
        let counts = Counts::from_pairs([("11", 400), ("00", 400), ("01", 200)]);
        let (most, count) = counts.most_frequent().unwrap();
        assert_eq!(most, "00");
        assert_eq!(*count, 400);
    }

    #[test]
    fn test_counts_serialize_flat() {
        let counts = Counts::from_pairs([("1", 3)]);
        assert_eq!(serde_json::to_value(&counts).unwrap(), serde_json::json!({"1": 3}));
    }

    #[test]
    fn test_task_result_check() {
        let result = bell_result();
        assert!(result.check().is_ok());
        let (_most, prob) = result.most_frequent().unwrap();
        assert!((prob - 0.5).abs() < 1e-10);

        let mut short = bell_result();
        short.shots = 999;
        assert!(matches!(short.check(), Err(BraketError::Validation(_))));

        let ragged = TaskResult::completed(
            "task-2".into(),
            "sv1",
            Counts::from_pairs([("0", 1), ("11", 1)]),
            2,
        );
        assert!(ragged.check().is_err());

        let not_binary = TaskResult::completed(
            "task-3".into(),
            "sv1",
            Counts::from_pairs([("0x", 2)]),
            2,
        );
        assert!(not_binary.check().is_err());
    }

    #[test]
    fn test_overflowing_counts_are_rejected() {
        let result = TaskResult::completed(
            "task-5".into(),
            "sv1",
            Counts::from_pairs([("0", u64::MAX), ("1", 1)]),
            1,
        );
        assert_eq!(result.counts.checked_total(), None);
        assert_eq!(result.counts.total_shots(), u64::MAX);
        assert!(matches!(
            result.check(),
            Err(BraketError::Validation(ref m)) if m.contains("overflow")
        ));
    }

    #[test]
    fn test_unfinished_result_keeps_invariant() {
        let task = ExecutionTask {
            task_id: "task-4".into(),
            status: TaskStatus::Failed,
            device_arn: "sv1".into(),
            shots: 100,
            created_at: chrono::Utc::now(),
            ended_at: None,
            failure_reason: Some("device calibration".into()),
            output_location: None,
        };
        let result = TaskResult::unfinished(&task);
        assert_eq!(result.shots, 0);
        assert!(result.counts.is_empty());
        assert!(result.check().is_ok());
        assert_eq!(result.metadata["requested_shots"], 100);
    }

    proptest::proptest! {
        #[test]
        fn prop_check_accepts_exact_sums(
            raw in proptest::collection::btree_map("[01]{3}", 1u64..10_000, 1..8)
        ) {
            let shots: u64 = raw.values().sum();
            let counts: Counts = raw.into_iter().collect();
            let shots = u32::try_from(shots).unwrap();
            let result = TaskResult::completed("task-p".into(), "sv1", counts, shots);
            proptest::prop_assert!(result.check().is_ok());
            proptest::prop_assert_eq!(result.counts.checked_total(), Some(u64::from(shots)));
        }

        #[test]
        fn prop_check_rejects_wrong_shots(
            raw in proptest::collection::btree_map("[01]{2}", 1u64..10_000, 1..4),
            delta in 1u32..100,
        ) {
            let shots = u32::try_from(raw.values().sum::<u64>()).unwrap() + delta;
            let counts: Counts = raw.into_iter().collect();
            let result = TaskResult::completed("task-p".into(), "sv1", counts, shots);
            proptest::prop_assert!(result.check().is_err());
        }
    }
}
