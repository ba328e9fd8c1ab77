//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Header poll fails:
//!     → backoff.rs (delay before the next attempt)
//!     → poller retries until the retry limit, then surfaces the error
//! ```

pub mod backoff;

pub use backoff::retry_delay;
