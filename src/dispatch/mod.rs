//! Transaction submission subsystem.
//!
//! # Data Flow
//! ```text
//! SubmissionUnit[] + signer credentials (from the upstream builder)
//!     → dispatcher.rs (fee check, sign & send with explicit nonce, watch status)
//!     → SubmissionOutcome[] (one per unit, in unit order)
//! ```
//!
//! # Design Decisions
//! - Per-unit failures are values, never errors
//! - No cross-unit coordination; ordering is the matcher's job

pub mod dispatcher;
pub mod outcome;

pub use dispatcher::Dispatcher;
pub use outcome::{DispatchFailure, SubmissionOutcome, SubmissionUnit};
