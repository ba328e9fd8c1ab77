//! Event matching and ordering.
//!
//! # Data Flow
//! ```text
//! ScannedBlock
//!     → filter.rs (phase, pallet and method checks; violations)
//!     → attribution.rs (strict or fallback tier per block)
//!     → accumulator.rs (cap at requested count, order by signer)
//!     → CorrelationResult
//! ```

pub mod accumulator;
pub mod attribution;
pub mod filter;
pub mod order;

pub use accumulator::{CorrelationResult, MatchAccumulator};
pub use attribution::{BlockMatches, EventMatcher, MatchTier, MatchedEvent};
pub use filter::{EventWatch, UnexpectedEvent};
pub use order::{SignerOrder, SlotClaim};
