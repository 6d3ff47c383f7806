//! Reference model for model-based testing.
//!
//! The model captures who should receive which message in a room, without
//! keys, packets or a relay. It is the oracle the simulated world is checked
//! against.
//!
//! # Design Principles
//!
//! - Simplicity: the model should be obviously correct
//! - Instant delivery: every operation completes before the next one
//! - Deterministic: same inputs produce same outputs

pub mod operation;
mod world;

pub use operation::{Operation, OperationError, OperationResult, SlotId, SmallMessage};
pub use world::{ModelWorld, ObservableState};
