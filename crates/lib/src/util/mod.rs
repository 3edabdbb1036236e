//! Shared utilities.
//!
//! Common utilities used across the crate including hashing, filesystem helpers and test fakes.

pub mod fs;
pub mod hash;

#[cfg(test)]
pub mod testutil;
