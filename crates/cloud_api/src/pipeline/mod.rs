//! The aggregation pipeline: cache, circuit breaker, fee policy,
//! reconciliation engine, orchestrator, and the background refresh job.

pub mod breaker;
pub mod cache;
pub mod fees;
pub mod orchestrator;
pub mod reconcile;
pub mod refresh;
