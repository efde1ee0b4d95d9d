//! Internal implementation details.
//!
//! These are pub(crate) and not intended for external use.

pub(crate) mod queue_node;

pub(crate) use queue_node::{NodePtr, QueueNode};
