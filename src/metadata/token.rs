//! Dense identifiers for entities interned by a [`crate::metadata::Universe`].
//!
//! Identifiers are assigned in declaration order (assembly, then type in pre-order including
//! nested types, then method), so ordering by identifier is ordering by input position. Every
//! ordered collection in the analysis relies on this to produce reproducible results.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            /// Creates a new identifier from a raw index
            #[must_use]
            pub fn new(value: u32) -> Self {
                $name(value)
            }

            /// Returns the index of this identifier
            #[must_use]
            pub fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                $name(value)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identifies an assembly within a universe.
    AssemblyId,
    "A"
);

define_id!(
    /// Identifies a type (top-level or nested) within a universe.
    TypeId,
    "T"
);

define_id!(
    /// Identifies a method declaration within a universe.
    ///
    /// Two methods are the same method iff their canonical signatures are equal; the universe
    /// maps every canonical signature to exactly one `MethodId`.
    MethodId,
    "M"
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_id_index() {
        let id = MethodId::new(42);
        assert_eq!(id.index(), 42);
        assert_eq!(MethodId::from(42), id);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(MethodId(3).to_string(), "M#3");
        assert_eq!(TypeId(7).to_string(), "T#7");
        assert_eq!(format!("{:?}", AssemblyId(1)), "AssemblyId(1)");
    }

    #[test]
    fn test_id_ordering_follows_index() {
        let set: BTreeSet<MethodId> = [MethodId(5), MethodId(1), MethodId(3)].into_iter().collect();
        let ordered: Vec<u32> = set.into_iter().map(|id| id.0).collect();
        assert_eq!(ordered, vec![1, 3, 5]);
    }
}
