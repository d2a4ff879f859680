//! Test infrastructure for the enrollment engine.
//!
//! [`fixtures`] seeds a two-institution campus and builds engines over it;
//! [`fakes`] provides a store wrapper that injects commit failures and a
//! sleeper that records delays instead of waiting.

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;

pub use fakes::*;
pub use fixtures::*;
