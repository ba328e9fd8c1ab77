//! Block-height listen budget.
//!
//! # Design Decisions
//! - Progress is measured in blocks, not wall time, so a stalled local process
//!   does not eat into the budget
//! - The first observed header anchors the session start

use std::time::Duration;

use crate::session::error::CorrelationError;

/// Where a session stands against its block budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetState {
    /// Still within budget; carries blocks elapsed since the start.
    Within(u64),
    /// Height has passed `start + timeout_blocks`; carries blocks elapsed.
    Exhausted(u64),
}

/// A listen budget expressed in blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutBudget {
    timeout_blocks: u64,
    start: Option<u64>,
}

impl TimeoutBudget {
    /// Convert a wall-clock budget into whole blocks of the given slot duration.
    pub fn new(budget: Duration, slot: Duration) -> Result<Self, CorrelationError> {
        let slot_ms = slot.as_millis();
        if slot_ms == 0 {
            return Err(CorrelationError::InvalidBudget(
                "slot duration must be at least 1ms".into(),
            ));
        }
        let timeout_blocks = u64::try_from(budget.as_millis() / slot_ms).map_err(|_| {
            CorrelationError::InvalidBudget(format!("{:?} is too long a budget", budget))
        })?;

        Ok(Self {
            timeout_blocks,
            start: None,
        })
    }

    /// Number of blocks the session may wait.
    pub fn timeout_blocks(&self) -> u64 {
        self.timeout_blocks
    }

    /// Height the session started at, once a header has been observed.
    pub fn start(&self) -> Option<u64> {
        self.start
    }

    /// Check a newly observed header height.
    pub fn observe(&mut self, height: u64) -> BudgetState {
        let start = *self.start.get_or_insert(height);
        let elapsed = height.saturating_sub(start);
        if elapsed > self.timeout_blocks {
            BudgetState::Exhausted(elapsed)
        } else {
            BudgetState::Within(elapsed)
        }
    }
}
