//! Small helpers shared across the crate.

mod dot;

pub use dot::escape_dot;
