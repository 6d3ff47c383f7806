//! Deterministic simulation harness for Murmur.
//!
//! [`SimWorld`] runs several participants and the relay room manager in one
//! thread. Every message crosses the real packet encoding, and all
//! randomness comes from one seeded stream, so a failing run is reproduced by
//! its seed.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and the simulated
//! world, and their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_env;
pub mod world;

pub use model::{
    ModelWorld, ObservableState, Operation, OperationError, OperationResult, SlotId, SmallMessage,
};
pub use sim_env::SimEnv;
pub use world::{Delivery, Participant, SimWorld, WorldError};
