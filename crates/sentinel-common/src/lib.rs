//! Shared types for the Ops Sentinel daemon.
//!
//! Everything the daemon crates agree on lives here: the severity keyword
//! tables, the forensic chain and resolution result types, the error
//! taxonomy, and the on-disk configuration format.

pub mod chain;
pub mod config;
pub mod error;
pub mod severity;

pub use chain::{ForensicChain, ResolutionResult};
pub use config::Config;
pub use error::{SentinelError, UpstreamError};
pub use severity::{Severity, SeverityClassifier};
