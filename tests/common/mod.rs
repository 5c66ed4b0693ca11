//! Shared test infrastructure.
//!
//! Tests should only import from this module, not from its submodules.

#![allow(dead_code)]

mod fakes;
mod fixtures;

pub use fakes::{transport_error, FakeDakara, FakeDakaraState, FakeMugen};
pub use fixtures::*;
