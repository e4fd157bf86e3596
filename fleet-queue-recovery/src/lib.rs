//! Fleet Queue Recovery
//!
//! Fault-recovery layer for a distributed job-execution fleet. When a worker
//! disappears unexpectedly while executing work, this layer classifies the
//! disconnect, aborts the in-flight work items and resubmits their tasks to
//! the central queue with a short quiet period so another worker can claim
//! them.

pub mod classifier;
pub mod config;
pub mod queue;
pub mod recovery;
pub mod worker;

pub use config::FleetConfig;
pub use queue::JobQueue;
pub use recovery::{AutoResubmitHandler, DisconnectHandler, RESUBMIT_QUIET_PERIOD};
pub use worker::{ExecutionSlot, Worker, WorkerSnapshot};
