//! Whole-program security analysis.
//!
//! This module decides, for a set of assemblies, which methods must carry a Critical marker
//! and which may remain SafeCritical or transparent. It builds on the indexed
//! [`crate::metadata::Universe`] and runs in a fixed pipeline:
//!
//! - [`MethodRelationMap`] - Caller, override and base graphs, derived once
//! - [`IntrinsicDetector`] - Methods that require privilege on their own
//! - [`PropagationEngine`] - Worklist propagation along call and inheritance edges
//! - [`Report`] - Per-method availability of the visible API surface
//! - [`Analyzer`] - Runs all of the above from an [`crate::config::AnalysisConfig`]
//!
//! # Usage
//!
//! ```rust
//! use secscope::analysis::Analyzer;
//! use secscope::assembly::Instruction;
//! use secscope::config::AnalysisConfig;
//! use secscope::metadata::{AssemblyDef, MethodDef, MethodRef, TypeDef, Universe};
//!
//! let universe = Universe::new(vec![AssemblyDef::new("App").with_type(
//!     TypeDef::class("App", "Io")
//!         .with_method(MethodDef::new("Write").body(vec![
//!             Instruction::call(0, MethodRef::new("App.Io", "WriteFile")),
//!         ]))
//!         .with_method(MethodDef::new("WriteFile").as_static().as_pinvoke()),
//! )]);
//!
//! let analysis = Analyzer::new(&universe, AnalysisConfig::new()).run()?;
//! let write = universe.find_method("System.Void App.Io::Write()").unwrap();
//! assert!(analysis.result().is_critical(write));
//! # Ok::<(), secscope::Error>(())
//! ```

mod analyzer;
mod intrinsic;
mod propagation;
mod relations;
mod report;

pub use analyzer::{Analysis, Analyzer};
pub use intrinsic::{IntrinsicDetector, IntrinsicFinding, IntrinsicRule};
pub use propagation::{
    ChainLink, PropagationEngine, PropagationReason, PropagationResult, PropagationStats,
};
pub use relations::{MethodRelationMap, RelationStats};
pub use report::{Report, ReportCategory, ReportEntry};
