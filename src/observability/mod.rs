//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! dispatcher, scanner, matcher, supervisor produce:
//!     → logging.rs (structured log events, one span per session)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → test runner output (pretty or JSON)
//!     → Prometheus scrape (optional)
//! ```

pub mod logging;
pub mod metrics;

use crate::config::ObservabilityConfig;

/// Initialize logging and, when enabled, the metrics exporter.
pub fn init(config: &ObservabilityConfig) {
    if let Err(e) = logging::init(config) {
        eprintln!("tracing subscriber already installed: {}", e);
    }

    if config.metrics_enabled {
        match config.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }
}
