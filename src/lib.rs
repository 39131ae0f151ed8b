// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # secscope
//!
//! Whole-program security-attribute propagation for .NET assemblies.
//!
//! Under the CLR transparency model every method is Critical, SafeCritical or transparent.
//! Transparent code may not call Critical code, an override slot and all its implementations
//! must agree on their privilege level, and SafeCritical methods form the vetted boundary
//! between the two worlds. `secscope` computes, for a set of assemblies, which methods and
//! types must be marked Critical and which SafeCritical markings are needed, and explains
//! every decision.
//!
//! ## Pipeline
//!
//! 1. A [`metadata::MetadataProvider`] loads the assemblies; a [`metadata::Universe`]
//!    indexes them in declaration order.
//! 2. [`analysis::MethodRelationMap`] derives caller, override and base graphs.
//! 3. [`analysis::IntrinsicDetector`] flags methods that need privilege on their own:
//!    platform-invoke declarations, unverifiable opcodes, unsafe signatures, critical
//!    interface implementations and internal calls.
//! 4. [`analysis::PropagationEngine`] spreads the critical requirement along call and
//!    inheritance edges to a fixed point, recording a reason for every method.
//! 5. [`descriptor::DescriptorSet`] turns the result into `SC-M` / `SSC-M` / `SC-T` lines
//!    for an injection tool and merges hand-written overrides on top.
//! 6. [`analysis::Report`] categorizes the visible API surface.
//!
//! [`analysis::Analyzer`] runs all steps.
//!
//! ## Quick Start
//!
//! ```rust
//! use secscope::prelude::*;
//!
//! let universe = Universe::new(vec![AssemblyDef::new("System.IO").with_type(
//!     TypeDef::class("System.IO", "File")
//!         .with_method(
//!             MethodDef::new("Delete")
//!                 .as_static()
//!                 .param("path", TypeSig::named("System.String"))
//!                 .body(vec![Instruction::call(
//!                     0,
//!                     MethodRef::new("System.IO.File", "DeleteFile")
//!                         .param(TypeSig::named("System.String")),
//!                 )]),
//!         )
//!         .with_method(
//!             MethodDef::new("DeleteFile")
//!                 .as_static()
//!                 .as_pinvoke()
//!                 .param("path", TypeSig::named("System.String")),
//!         ),
//! )]);
//!
//! let analysis = Analyzer::new(&universe, AnalysisConfig::new()).run()?;
//! assert_eq!(
//!     analysis.descriptors().render(),
//!     "SC-M: System.Void System.IO.File::Delete(System.String)\n\
//!      SC-M: System.Void System.IO.File::DeleteFile(System.String)\n"
//! );
//! # Ok::<(), secscope::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Only contract violations are errors: a SafeCritical method that inheritance forces
//! Critical, conflicting descriptor overrides, and malformed descriptor or configuration
//! text. Unresolvable references are collected as [`metadata::ResolutionMiss`] values and
//! logged through the `log` facade; the analysis continues without them.

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// ```rust
/// use secscope::prelude::*;
///
/// let config = AnalysisConfig::new().with_critical_type("System.Runtime.InteropServices.SafeHandle");
/// assert_eq!(config.critical_types.len(), 1);
/// ```
pub mod prelude;

/// Security analysis: relation map, intrinsic detection, propagation and reporting
pub mod analysis;

/// Instruction model of method bodies
pub mod assembly;

/// Analysis configuration and name resolution
pub mod config;

/// Security attribute descriptors with override, merge and diff support
pub mod descriptor;

/// Read-only metadata model and the provider seam
pub mod metadata;

/// Small helpers shared across the crate
pub mod utils;

/// `secscope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
///
/// # Examples
///
/// ```rust
/// use secscope::{descriptor::DescriptorSet, Result};
///
/// fn load(text: &str) -> Result<DescriptorSet> {
///     DescriptorSet::parse(text)?.normalize()
/// }
/// assert!(load("SC-M: X\n").is_ok());
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `secscope` Error type
///
/// See [`Error`] for the full list of variants.
pub use error::Error;
