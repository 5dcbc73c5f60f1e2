//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! loader / reference / watch / mapping
//!     → logging.rs (subscriber setup for binaries and tests)
//!     → metrics.rs (counters and gauges through the `metrics` facade)
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing a subscriber or recorder is up to the application
//! - Metrics are cheap when no recorder is installed

pub mod logging;
pub mod metrics;
