//! Read-only metadata model consumed by the analysis.
//!
//! This module defines the abstractions over assemblies, types, methods, parameters and
//! instructions that the security analysis works on. Parsing the binary assembly format is
//! not part of this crate: a [`MetadataProvider`] supplies owned declarations, and the
//! [`Universe`] indexes them into an immutable snapshot.
//!
//! # Key Components
//!
//! - [`MetadataProvider`] / [`InMemoryProvider`] - Backend seam and the in-memory backend
//! - [`Universe`] - Indexed snapshot with reference resolution and hierarchy queries
//! - [`AssemblyDef`], [`TypeDef`], [`MethodDef`] - Owned declaration tree
//! - [`TypeSig`], [`MethodRef`] - Structural signatures and references
//! - [`token`] - Dense identifiers in declaration order
//!
//! # Examples
//!
//! ```rust
//! use secscope::metadata::{AssemblyDef, MethodDef, MethodRef, TypeDef, Universe};
//! use secscope::assembly::Instruction;
//!
//! let universe = Universe::new(vec![AssemblyDef::new("App").with_type(
//!     TypeDef::class("App", "Program")
//!         .with_method(MethodDef::new("Main").as_static().body(vec![
//!             Instruction::call(0, MethodRef::new("App.Program", "Helper")),
//!         ]))
//!         .with_method(MethodDef::new("Helper").as_static()),
//! )]);
//!
//! let helper = universe.resolve(&MethodRef::new("App.Program", "Helper"));
//! assert!(helper.is_some());
//! ```

/// Method declarations and flags
pub mod method;
/// The metadata backend seam
pub mod provider;
/// Structural type signatures and method references
pub mod signatures;
/// Dense identifiers for interned entities
pub mod token;
/// Type and assembly declarations
pub mod typesystem;
/// Indexed snapshot of an analysis set
pub mod universe;

pub use method::{MethodAccess, MethodDef, MethodImplOptions, MethodModifiers, Param};
pub use provider::{InMemoryProvider, MetadataProvider};
pub use signatures::{format_method_signature, MethodRef, TypeSig};
pub use token::{AssemblyId, MethodId, TypeId};
pub use typesystem::{AssemblyDef, TypeAttributes, TypeDef};
pub use universe::{
    AssemblyInfo, MethodInfo, MissKind, ResolutionMiss, SignatureCache, TypeInfo, Universe,
};
