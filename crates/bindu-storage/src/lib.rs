//! # Task storage for the Bindu A2A runtime
//!
//! Persists tasks, contexts, message history, feedback and webhook
//! configuration behind one [`Storage`] trait, with atomic state transitions
//! enforced by a shared state machine.
//!
//! ## Quick Start
//!
//! ```rust
//! use bindu_storage::{InMemoryStorage, Storage, TaskUpdate};
//! use bindu_a2a_protocol::{Message, TaskState};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), bindu_storage::StorageError> {
//! let storage = InMemoryStorage::new();
//!
//! let task = storage
//!     .submit_task(Uuid::new_v4(), Message::user_text("hi"))
//!     .await?;
//!
//! // Transition with state machine enforcement
//! let working = storage
//!     .update_task(task.id, TaskUpdate::transition(TaskState::Working))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`Storage` trait**: task submission and atomic updates, context
//!   grouping, feedback, webhook configs
//! - **`TaskUpdate`**: append/merge mutation applied in one linearizable step
//! - **State machine**: validates every transition; terminal tasks are
//!   immutable except for feedback
//! - **Backends**: `InMemory` (default; the reference for semantics) and
//!   `Postgres` (feature `postgres`; one schema per agent DID)
//!
//! Both backends run the same conformance suite (`parity_tests`), so the
//! Postgres backend is checked against the in-memory reference.

pub mod error;
#[cfg(feature = "in-memory")]
pub mod in_memory;
pub mod schema;
pub mod state_machine;
pub mod traits;

#[cfg(feature = "postgres")]
pub mod postgres;

// Parity test suite (shared across all backends)
#[cfg(test)]
#[allow(dead_code)]
pub(crate) mod parity_tests;

pub use error::StorageError;
#[cfg(feature = "in-memory")]
pub use in_memory::{InMemoryStorage, InMemoryStorageConfig};
pub use state_machine::{is_terminal, validate_transition};
pub use traits::{Storage, TaskFilter, TaskUpdate};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresStorage, PostgresStorageConfig};

/// A shared, dynamically dispatched storage backend.
pub type BoxedStorage = dyn Storage + Send + Sync;
