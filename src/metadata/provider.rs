//! The seam between the analysis and a concrete metadata backend.
//!
//! The analysis never reads assembly files itself. A backend (a PE/ECMA-335 reader, a
//! serialized snapshot, a test fixture) implements [`MetadataProvider`] once and hands over
//! the owned declaration tree; everything downstream works on the indexed
//! [`crate::metadata::Universe`] built from it.

use crate::{metadata::AssemblyDef, Result};

/// Capability interface implemented once per metadata backend.
///
/// Loading is treated as a single atomic snapshot: the returned assemblies are never
/// re-read or mutated during an analysis run.
pub trait MetadataProvider {
    /// Loads every assembly in the analysis set, in a stable order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Provider`] or [`crate::Error::FileError`] if the backend cannot
    /// produce a snapshot.
    fn load(&self) -> Result<Vec<AssemblyDef>>;
}

/// A provider over assemblies that are already in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    assemblies: Vec<AssemblyDef>,
}

impl InMemoryProvider {
    /// Creates a provider serving the given assemblies
    #[must_use]
    pub fn new(assemblies: Vec<AssemblyDef>) -> Self {
        InMemoryProvider { assemblies }
    }

    /// Adds another assembly to the set
    pub fn push(&mut self, assembly: AssemblyDef) {
        self.assemblies.push(assembly);
    }
}

impl MetadataProvider for InMemoryProvider {
    fn load(&self) -> Result<Vec<AssemblyDef>> {
        Ok(self.assemblies.clone())
    }
}
