//! Ops Sentinel daemon library.
//!
//! Consumes a stream of service log lines, detects fatal events, rebuilds
//! the causal chain leading up to each one from a bounded rolling history,
//! and resolves the chain into a remediation grounded in indexed
//! documentation.
//!
//! Pipeline: queue -> [`engine::ForensicEngine`] -> [`dispatcher::ResolutionDispatcher`]
//! -> [`cleanup`], driven by a single [`monitor::Monitor`] task.

pub mod cleanup;
pub mod clients;
pub mod dispatcher;
pub mod engine;
pub mod history;
pub mod monitor;
pub mod queue;
