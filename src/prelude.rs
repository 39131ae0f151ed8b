//! # secscope Prelude
//!
//! Re-exports the types needed to load a universe, configure and run an analysis, and
//! consume its descriptors and report.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all secscope operations
pub use crate::Error;

/// The result type used throughout secscope
pub use crate::Result;

// ================================================================================================
// Metadata Model
// ================================================================================================

/// Declarations and signatures
pub use crate::metadata::{
    AssemblyDef, MethodAccess, MethodDef, MethodRef, TypeAttributes, TypeDef, TypeSig,
};

/// Indexed snapshot and provider seam
pub use crate::metadata::{
    InMemoryProvider, MetadataProvider, MethodId, ResolutionMiss, TypeId, Universe,
};

/// Method bodies
pub use crate::assembly::{Instruction, Opcode, Operand};

// ================================================================================================
// Analysis
// ================================================================================================

/// Configuration
pub use crate::config::{AnalysisConfig, ResolvedConfig};

/// Pipeline and its stages
pub use crate::analysis::{
    Analysis, Analyzer, IntrinsicDetector, IntrinsicFinding, MethodRelationMap,
    PropagationEngine, PropagationReason, PropagationResult, Report, ReportCategory,
};

// ================================================================================================
// Descriptors
// ================================================================================================

/// Descriptor model
pub use crate::descriptor::{
    AttributeKind, DescriptorSet, OverrideMarker, SecurityAttributeDescriptor, TargetKind,
};
