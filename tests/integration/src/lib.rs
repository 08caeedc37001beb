//! Integration test utilities
//!
//! Simulated gateway and REST servers on loopback sockets, plus payload
//! fixtures, for end-to-end tests of a [`relay::Session`].

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
