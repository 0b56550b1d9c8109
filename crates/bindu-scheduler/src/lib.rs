//! # Task scheduler for the Bindu A2A runtime
//!
//! A durable FIFO of task ids awaiting worker pickup, behind one
//! [`Scheduler`] trait.
//!
//! Backends:
//! - **InMemory** (default) — a bounded tokio channel; enqueue pressure
//!   propagates to the HTTP layer as backpressure.
//! - **Redis** (feature `redis-backend`) — one list per deployment,
//!   RPUSH/BLPOP through a shared connection manager, retried with
//!   exponential backoff on transient failures.
//!
//! Delivery is at-least-once: a worker crash between dequeue and the
//! terminal storage write can leave the task parked in `working`. Workers
//! own idempotent completion and failure marking.

pub mod error;
pub mod traits;

#[cfg(feature = "in-memory")]
pub mod in_memory;

#[cfg(feature = "redis-backend")]
pub mod redis_backend;

pub use error::SchedulerError;
#[cfg(feature = "in-memory")]
pub use in_memory::{InMemoryScheduler, InMemorySchedulerConfig};
pub use traits::Scheduler;

#[cfg(feature = "redis-backend")]
pub use redis_backend::{RedisScheduler, RedisSchedulerConfig};

/// A shared, dynamically dispatched scheduler backend.
pub type BoxedScheduler = dyn Scheduler + Send + Sync;
