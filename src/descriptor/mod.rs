//! Security attribute descriptors.
//!
//! A descriptor is a `(marker, kind, target, signature)` tuple telling an injection tool to
//! attach `SecurityCritical` or `SecuritySafeCritical` to a named type or method. The
//! analysis emits plain descriptors; hand-authored override files use the markers `+`, `-`
//! and `!` to adjust them, and [`DescriptorSet::merge`] applies one on top of the other.
//!
//! # Line Format
//!
//! ```text
//! # comment
//! SC-T: System.Runtime.InteropServices.SafeHandle
//! SC-M: System.Void System.IO.File::Delete(System.String)
//! SSC-M: System.String System.Environment::GetEnvironmentVariable(System.String)
//! !SSC-M: System.Void System.GC::Collect()
//! ```
//!
//! # Examples
//!
//! ```rust
//! use secscope::descriptor::{AttributeKind, DescriptorSet};
//!
//! let computed = DescriptorSet::parse("SC-M: System.Void N.T::M()\n")?;
//! let overrides = DescriptorSet::parse("!SSC-M: System.Void N.T::M()\n")?;
//!
//! let merged = computed.merge(&overrides)?;
//! assert_eq!(merged.kind_of("System.Void N.T::M()"), Some(AttributeKind::SafeCritical));
//! # Ok::<(), secscope::Error>(())
//! ```

mod attribute;
mod set;

pub use attribute::{AttributeKind, OverrideMarker, SecurityAttributeDescriptor, TargetKind};
pub use set::{DescriptorSet, DescriptorTarget, ResolvedDescriptor};
