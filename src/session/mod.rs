//! Correlation sessions and their supervision.
//!
//! # Data Flow
//! ```text
//! Correlator::listen / submit_and_correlate
//!     → supervisor.rs (wall budget → block budget)
//!     → correlator.rs (scan/match loop, cancel, single teardown)
//!     → CorrelationResult or CorrelationError
//! ```
//!
//! # Design Decisions
//! - A session owns its signer order and accumulator; nothing is shared between sessions
//! - Cancellation is explicit via [`CancelToken`], shared with the dispatcher

pub mod cancel;
pub mod correlator;
pub mod error;
pub mod supervisor;

pub use cancel::CancelToken;
pub use correlator::{BatchReport, CorrelationRequest, Correlator, SessionSettings};
pub use error::CorrelationError;
pub use supervisor::{BudgetState, TimeoutBudget};
