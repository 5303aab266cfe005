//! # agentop-core
//!
//! Core library for agentop - a live monitor for local AI agent processes.
//!
//! This library provides:
//! - Domain types for agents, usage, and published snapshots
//! - Incremental JSON-lines log tailing and parsing
//! - Status inference and cost calculation
//! - Filesystem watching with a polling fallback
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Append-only agent log files are the single source of truth. A watcher
//! (or timed re-scan) reports changed files; the aggregator reads only the
//! newly appended bytes, folds the parsed records into per-agent state, and
//! publishes an immutable [`Snapshot`] for the rendering layer. Readers
//! never observe a half-updated view.
//!
//! ## Example
//!
//! ```rust,no_run
//! use agentop_core::{Monitor, MonitorOptions};
//!
//! let monitor = Monitor::start(
//!     &std::path::PathBuf::from("/home/me/.claude"),
//!     MonitorOptions::default(),
//! )
//! .expect("failed to start monitor");
//!
//! let snapshot = monitor.snapshot();
//! println!("{} agents, {}", snapshot.metrics.total_agents, snapshot.metrics.total_cost);
//! ```

// Re-export commonly used items at the crate root
pub use aggregate::{Aggregator, Monitor, MonitorOptions};
pub use config::Config;
pub use error::{Error, Result};
pub use pricing::{PriceTable, PricingTier};
pub use types::*;

// Public modules
pub mod aggregate;
pub mod config;
pub mod error;
pub mod fold;
pub mod format;
pub mod logging;
pub mod parse;
pub mod pricing;
pub mod tail;
pub mod types;
pub mod watch;
