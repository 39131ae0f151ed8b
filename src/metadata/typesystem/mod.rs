//! Type and assembly declarations.
//!
//! [`AssemblyDef`] and [`TypeDef`] form the owned declaration tree a metadata provider hands
//! over: an assembly owns its top-level types, a type owns its methods and nested types.
//! Base types and interfaces are referenced by full name and resolved lazily through the
//! [`crate::metadata::Universe`], since they frequently live in other assemblies.
//!
//! Nested types are named `Outer/Inner`, following the convention of ECMA-335 tooling.
//!
//! # Examples
//!
//! ```rust
//! use secscope::metadata::{AssemblyDef, MethodDef, TypeAttributes, TypeDef};
//!
//! let assembly = AssemblyDef::new("System.Core").with_type(
//!     TypeDef::class("System.IO", "Pipe")
//!         .with_interface("System.IDisposable")
//!         .with_method(MethodDef::new("Dispose").as_virtual()),
//! );
//!
//! let pipe = &assembly.types[0];
//! assert_eq!(pipe.full_name(), "System.IO.Pipe");
//! assert!(pipe.flags.contains(TypeAttributes::PUBLIC));
//! ```

use bitflags::bitflags;

use crate::metadata::{method::MethodDef, signatures::MULTICAST_DELEGATE};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Type attribute flags
    pub struct TypeAttributes: u32 {
        /// Class is public scope
        const PUBLIC = 0x0000_0001;
        /// Class is nested with public visibility
        const NESTED_PUBLIC = 0x0000_0002;
        /// Class is nested with private visibility
        const NESTED_PRIVATE = 0x0000_0003;
        /// Class is nested with family visibility
        const NESTED_FAMILY = 0x0000_0004;
        /// Class is nested with assembly visibility
        const NESTED_ASSEMBLY = 0x0000_0005;
        /// Class is nested with family and assembly visibility
        const NESTED_FAM_AND_ASSEM = 0x0000_0006;
        /// Class is nested with family or assembly visibility
        const NESTED_FAM_OR_ASSEM = 0x0000_0007;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Class is abstract
        const ABSTRACT = 0x0000_0080;
        /// Class is concrete and may not be extended
        const SEALED = 0x0000_0100;
    }
}

/// Mask for the visibility bits of [`TypeAttributes`]
pub const TYPE_VISIBILITY_MASK: u32 = 0x0000_0007;

impl TypeAttributes {
    /// Returns the raw visibility value
    #[must_use]
    pub fn visibility(&self) -> u32 {
        self.bits() & TYPE_VISIBILITY_MASK
    }

    /// Returns `true` if the type can be seen outside its assembly, assuming its enclosing
    /// types (if any) can.
    #[must_use]
    pub fn is_externally_visible(&self) -> bool {
        let visibility = self.visibility();
        visibility == Self::PUBLIC.bits()
            || visibility == Self::NESTED_PUBLIC.bits()
            || visibility == Self::NESTED_FAMILY.bits()
            || visibility == Self::NESTED_FAM_OR_ASSEM.bits()
    }
}

/// A type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// Namespace, empty for nested types and the global namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Attribute flags
    pub flags: TypeAttributes,
    /// Full name of the base type, `None` for interfaces and `System.Object`
    pub base: Option<String>,
    /// Full names of directly implemented interfaces
    pub interfaces: Vec<String>,
    /// Declared methods and constructors, in declaration order
    pub methods: Vec<MethodDef>,
    /// Nested types, in declaration order
    pub nested: Vec<TypeDef>,
}

impl TypeDef {
    /// Creates a public class deriving from `System.Object`
    #[must_use]
    pub fn class(namespace: &str, name: &str) -> Self {
        TypeDef {
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: TypeAttributes::PUBLIC,
            base: Some(crate::metadata::signatures::OBJECT.to_string()),
            interfaces: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// Creates a public interface
    #[must_use]
    pub fn interface(namespace: &str, name: &str) -> Self {
        TypeDef {
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: TypeAttributes::PUBLIC | TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT,
            base: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// Replaces the attribute flags
    #[must_use]
    pub fn with_flags(mut self, flags: TypeAttributes) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the base type
    #[must_use]
    pub fn with_base(mut self, base: &str) -> Self {
        self.base = Some(base.to_string());
        self
    }

    /// Removes the base type
    #[must_use]
    pub fn without_base(mut self) -> Self {
        self.base = None;
        self
    }

    /// Adds an implemented interface
    #[must_use]
    pub fn with_interface(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    /// Adds a method
    #[must_use]
    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds a nested type
    #[must_use]
    pub fn with_nested(mut self, nested: TypeDef) -> Self {
        self.nested.push(nested);
        self
    }

    /// Returns the full name of a top-level type, `Namespace.Name`.
    ///
    /// Nested types get their `Outer/Inner` name assigned by the universe, which knows the
    /// enclosing type.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns `true` if this type is an interface
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeAttributes::INTERFACE)
    }

    /// Returns `true` if this type is a delegate
    #[must_use]
    pub fn is_delegate(&self) -> bool {
        self.base.as_deref() == Some(MULTICAST_DELEGATE)
    }
}

/// An assembly declaration: a named set of top-level types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyDef {
    /// Simple assembly name
    pub name: String,
    /// Top-level types, in declaration order
    pub types: Vec<TypeDef>,
}

impl AssemblyDef {
    /// Creates an empty assembly
    #[must_use]
    pub fn new(name: &str) -> Self {
        AssemblyDef {
            name: name.to_string(),
            types: Vec::new(),
        }
    }

    /// Adds a top-level type
    #[must_use]
    pub fn with_type(mut self, ty: TypeDef) -> Self {
        self.types.push(ty);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        assert_eq!(TypeDef::class("System", "String").full_name(), "System.String");
        assert_eq!(TypeDef::class("", "<Module>").full_name(), "<Module>");
    }

    #[test]
    fn test_visibility() {
        assert!(TypeAttributes::PUBLIC.is_externally_visible());
        assert!(TypeAttributes::NESTED_PUBLIC.is_externally_visible());
        assert!(TypeAttributes::NESTED_FAMILY.is_externally_visible());
        assert!(!TypeAttributes::NESTED_PRIVATE.is_externally_visible());
        assert!(!TypeAttributes::NESTED_ASSEMBLY.is_externally_visible());
        assert!(!TypeAttributes::empty().is_externally_visible());
        assert!((TypeAttributes::PUBLIC | TypeAttributes::SEALED).is_externally_visible());
    }

    #[test]
    fn test_kind_predicates() {
        assert!(TypeDef::interface("System", "IDisposable").is_interface());
        assert!(TypeDef::class("N", "Callback")
            .with_base(MULTICAST_DELEGATE)
            .is_delegate());
        assert!(!TypeDef::class("N", "Plain").is_delegate());
    }
}
