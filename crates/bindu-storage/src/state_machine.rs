//! Task state machine enforcement.
//!
//! Validates transitions per the A2A task lifecycle:
//!
//! ```text
//! submitted -> working | canceled | failed | rejected
//! working -> input-required | auth-required | completed | failed | canceled
//! input-required -> working | canceled | failed
//! auth-required -> working | canceled | failed
//! completed/failed/canceled/rejected -> ERROR (terminal)
//! ```
//!
//! One deliberate extension beyond the table: a paused task
//! (`input-required`/`auth-required`) may move back to `submitted` when the
//! client replies on the same context, re-entering the queue.

use crate::error::StorageError;
use bindu_a2a_protocol::TaskState;

/// Validate a task state transition. Returns `Ok(())` if allowed.
pub fn validate_transition(from: TaskState, to: TaskState) -> Result<(), StorageError> {
    use TaskState::*;

    if from.is_terminal() {
        return Err(StorageError::TerminalState(from));
    }

    let allowed = match from {
        Submitted => matches!(to, Working | Canceled | Failed | Rejected),
        Working => matches!(to, InputRequired | AuthRequired | Completed | Failed | Canceled),
        // Resumption path: a client reply re-submits the paused task
        InputRequired | AuthRequired => matches!(to, Submitted | Working | Canceled | Failed),
        Completed | Failed | Canceled | Rejected => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(StorageError::InvalidTransition {
            current: from,
            requested: to,
        })
    }
}

/// Returns `true` if the state admits no further transitions.
pub fn is_terminal(state: TaskState) -> bool {
    state.is_terminal()
}
