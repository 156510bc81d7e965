//! Where scans get their rows from.

use std::collections::{BTreeMap, HashMap};

use gridsql_core::types::Row;

use crate::error::{ExecError, Result};

pub type PartitionId = u32;

/// Local partitions of named sources on this member.
pub trait RowSource: Send + Sync {
    /// Rows of `source` in the given partitions, partition by partition in
    /// ascending id order. An empty `partitions` slice means all partitions.
    fn scan(&self, source: &str, partitions: &[PartitionId]) -> Result<Vec<Row>>;
}

/// In-memory source: name -> partition -> rows.
#[derive(Debug, Default, Clone)]
pub struct MemoryRowSource {
    tables: HashMap<String, BTreeMap<PartitionId, Vec<Row>>>,
}

impl MemoryRowSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows to one partition of `source`, creating it if needed.
    pub fn insert(&mut self, source: &str, partition: PartitionId, rows: Vec<Row>) {
        self.tables
            .entry(source.to_string())
            .or_default()
            .entry(partition)
            .or_default()
            .extend(rows);
    }

    pub fn with_partition(mut self, source: &str, partition: PartitionId, rows: Vec<Row>) -> Self {
        self.insert(source, partition, rows);
        self
    }

    /// Partition ids of `source`, ascending.
    pub fn partitions(&self, source: &str) -> Vec<PartitionId> {
        self.tables
            .get(source)
            .map(|p| p.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl RowSource for MemoryRowSource {
    fn scan(&self, source: &str, partitions: &[PartitionId]) -> Result<Vec<Row>> {
        let table = self
            .tables
            .get(source)
            .ok_or_else(|| ExecError::UnknownSource(source.to_string()))?;
        let rows = table
            .iter()
            .filter(|(id, _)| partitions.is_empty() || partitions.contains(id))
            .flat_map(|(_, rows)| rows.iter().cloned())
            .collect();
        Ok(rows)
    }
}
