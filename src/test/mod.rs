//! Shared helpers for unit tests.
//!
//! The [`factories`] module builds synthetic universes and common analysis inputs so that
//! individual tests only spell out the declarations they care about.

pub mod factories;
