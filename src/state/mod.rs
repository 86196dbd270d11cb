//! State module for tracking fetch escalation
//!
//! This module provides the explicit state machine a fetch climbs while it
//! is blocked or challenged.
//!
//! # Components
//!
//! - `LadderState`: Position on the escalation ladder and its transition function
//! - `FetchMode`: How a single attempt reaches the target
//! - `FetchOutcome`: Success, challenge or failure of one attempt
//! - `FetchAttempt`: One recorded rung of a fetch

mod ladder_state;

// Re-export main types
pub use ladder_state::{
    BlockKind, FailureReason, FetchAttempt, FetchMode, FetchOutcome, LadderContext, LadderState,
};
