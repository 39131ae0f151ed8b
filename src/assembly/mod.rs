//! CIL instruction model.
//!
//! Method bodies reach the analysis as sequences of [`Instruction`]s produced by an external
//! metadata backend. See [`instruction`] for the representation.

mod instruction;

pub use instruction::{Instruction, Opcode, Operand};
