//! Test infrastructure for the persistence layer.
//!
//! Fixtures seed the same two-institution campus into any backend, and the
//! scenario functions in [`scenarios`] run identical checks against each one.

#![allow(dead_code)]

pub mod fixtures;
pub mod scenarios;

pub use fixtures::*;
