use std::collections::{BTreeMap, VecDeque};
use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use serde::Serialize;

/// Default number of records the ring buffer holds before the oldest
/// entries are overwritten.
pub const DEFAULT_TRACE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Debug,
    Info,
    Warn,
}

impl Display for TraceLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            TraceLevel::Debug => write!(f, "debug"),
            TraceLevel::Info => write!(f, "info"),
            TraceLevel::Warn => write!(f, "warn"),
        }
    }
}

/// A single trace emission produced by the `TRACE` family of builtins.
///
/// `timestamp` is milliseconds since the Unix epoch, captured when the
/// builtin ran. Values are rendered to strings at emission time so the
/// record is independent of later environment mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub level: TraceLevel,
    pub category: String,
    pub timestamp: i64,
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl TraceRecord {
    pub fn new(
        level: TraceLevel,
        category: String,
        values: Vec<String>,
        label: Option<String>,
    ) -> Self {
        Self {
            level,
            category,
            timestamp: chrono::Utc::now().timestamp_millis(),
            values,
            label,
        }
    }
}

impl Display for TraceRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[{}] {}", self.level, self.category)?;

        if let Some(label) = &self.label {
            write!(f, " ({})", label)?;
        }

        if !self.values.is_empty() {
            write!(f, ": {}", self.values.join(" "))?;
        }

        Ok(())
    }
}

/// Aggregate view over the records currently held in the buffer.
/// Counts reflect the live contents, not every record ever appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStats {
    pub total_entries: usize,
    pub by_level: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub buffer_size: usize,
    pub buffer_full: bool,
}

/// Fixed-capacity ring buffer of trace records.
///
/// Once capacity is reached the oldest record is dropped on each append
/// and the `full` flag is set. The flag is sticky until `clear`.
#[derive(Debug, Clone)]
pub struct TraceBuffer {
    records: VecDeque<TraceRecord>,
    capacity: usize,
    full: bool,
}

impl Default for TraceBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CAPACITY)
    }
}

impl TraceBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(DEFAULT_TRACE_CAPACITY)),
            capacity: capacity.max(1),
            full: false,
        }
    }

    pub fn append(&mut self, record: TraceRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
            self.full = true;
        }

        self.records.push_back(record);

        if self.records.len() == self.capacity {
            self.full = true;
        }
    }

    /// Renders every buffered record to its display form, oldest first.
    /// The buffer is left untouched.
    pub fn take(&self) -> Vec<String> {
        self.records.iter().map(|record| record.to_string()).collect()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn stats(&self) -> TraceStats {
        let by_level: BTreeMap<String, usize> = self
            .records
            .iter()
            .counts_by(|record| record.level.to_string())
            .into_iter()
            .collect();
        let by_category: BTreeMap<String, usize> = self
            .records
            .iter()
            .counts_by(|record| record.category.clone())
            .into_iter()
            .collect();

        TraceStats {
            total_entries: self.records.len(),
            by_level,
            by_category,
            buffer_size: self.capacity,
            buffer_full: self.full,
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.full = false;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
