//! Append-only message logs with per-parent checkpoints.
//!
//! Messages attached to a parent entity are stored in the `messages` keyspace
//! under [`LogKey`](crate::key::LogKey)s, which sort chronologically within a
//! parent. A consumer tracks its position with a [`Checkpoint`] kept in the
//! `checkpoints` keyspace, one row per parent.
//!
//! Checkpoint transitions for one parent:
//!
//! ```text
//! Unset  --initialize_checkpoint (records exist)--> Set(latest)
//! Unset  --initialize_checkpoint (no records)-----> Unset
//! Set(k) --advance_checkpoint(k')-----------------> Set(k')
//! any    --purge_checkpoint-----------------------> Unset
//! ```
//!
//! Initialization deliberately skips the existing backlog: a new consumer
//! starts from the latest record, not from the beginning of history.
//!
//! Nothing here prevents two consumers from advancing the same checkpoint;
//! one consumer per parent is assumed.

mod checkpoint;
mod message;

pub use checkpoint::Checkpoint;
pub use message::{CHECKPOINT_KEYSPACE, LogRecord, MESSAGE_KEYSPACE, MessageLog, MessageStream};
