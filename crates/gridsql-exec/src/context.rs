//! Per-fragment execution context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gridsql_core::config::ExecConfig;
use gridsql_core::id::FragmentId;
use gridsql_mem::MemoryBudgetImpl;

use crate::error::{ExecError, Result};
use crate::source::{PartitionId, RowSource};

/// Cooperative cancellation flag. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ExecError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Everything a fragment needs from its environment: which partitions it
/// reads, where rows come from, how much memory it may hold, and whether it
/// has been cancelled.
#[derive(Clone)]
pub struct ExecContext {
    fragment: FragmentId,
    partitions: Vec<PartitionId>,
    source: Arc<dyn RowSource>,
    budget: MemoryBudgetImpl,
    cancel: CancellationToken,
    config: ExecConfig,
}

impl std::fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecContext")
            .field("fragment", &self.fragment)
            .field("partitions", &self.partitions)
            .field("budget", &self.budget)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ExecContext {
    /// Fresh budget of `config.mem_cap_bytes` and a fresh token. Reads every
    /// partition of the source until [`with_partitions`](Self::with_partitions)
    /// narrows it.
    pub fn new(fragment: FragmentId, source: Arc<dyn RowSource>, config: ExecConfig) -> Self {
        Self {
            fragment,
            partitions: Vec::new(),
            source,
            budget: MemoryBudgetImpl::new(config.mem_cap_bytes),
            cancel: CancellationToken::new(),
            config,
        }
    }

    pub fn with_partitions(mut self, partitions: Vec<PartitionId>) -> Self {
        self.partitions = partitions;
        self
    }

    /// Share a budget between fragments.
    pub fn with_budget(mut self, budget: MemoryBudgetImpl) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn fragment(&self) -> FragmentId {
        self.fragment
    }

    /// Empty means all partitions.
    pub fn partitions(&self) -> &[PartitionId] {
        &self.partitions
    }

    pub fn source(&self) -> &dyn RowSource {
        self.source.as_ref()
    }

    pub fn budget(&self) -> &MemoryBudgetImpl {
        &self.budget
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    #[inline]
    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }
}
