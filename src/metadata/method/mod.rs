//! Method declarations.
//!
//! A [`MethodDef`] is an owned, provider-agnostic view of a method: its flags, signature,
//! explicit overrides and decoded body. Methods are exclusively owned by their declaring
//! [`crate::metadata::TypeDef`].
//!
//! # Examples
//!
//! ```rust
//! use secscope::metadata::{MethodDef, TypeSig};
//!
//! let method = MethodDef::new("Read")
//!     .returns(TypeSig::named("System.Int32"))
//!     .param("buffer", TypeSig::pointer(TypeSig::named("System.Byte")))
//!     .as_virtual();
//!
//! assert!(method.is_virtual());
//! assert!(!method.is_constructor());
//! assert_eq!(method.param_types().len(), 1);
//! ```

mod types;

pub use types::{MethodAccess, MethodImplOptions, MethodModifiers};

use crate::{
    assembly::Instruction,
    metadata::{signatures::format_method_signature, MethodRef, TypeSig},
};

/// A method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: TypeSig,
}

/// A method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    /// Method name, `.ctor` / `.cctor` for constructors
    pub name: String,
    /// Accessibility
    pub access: MethodAccess,
    /// Modifier flags
    pub flags: MethodModifiers,
    /// Implementation flags
    pub impl_options: MethodImplOptions,
    /// Return type
    pub return_type: TypeSig,
    /// Parameters, in order
    pub params: Vec<Param>,
    /// Number of generic method parameters
    pub generic_arity: u32,
    /// Explicit override references (interface or virtual slot implementations)
    pub overrides: Vec<MethodRef>,
    /// Decoded body, empty for abstract, runtime and native methods
    pub instructions: Vec<Instruction>,
}

impl MethodDef {
    /// Creates a public, non-virtual instance method returning `void` with no parameters.
    #[must_use]
    pub fn new(name: &str) -> Self {
        MethodDef {
            name: name.to_string(),
            access: MethodAccess::Public,
            flags: MethodModifiers::HIDE_BY_SIG,
            impl_options: MethodImplOptions::empty(),
            return_type: TypeSig::Void,
            params: Vec::new(),
            generic_arity: 0,
            overrides: Vec::new(),
            instructions: Vec::new(),
        }
    }

    /// Creates an instance constructor with the given parameter types.
    #[must_use]
    pub fn constructor(params: &[TypeSig]) -> Self {
        let mut method = Self::new(".ctor");
        method.flags |= MethodModifiers::SPECIAL_NAME | MethodModifiers::RT_SPECIAL_NAME;
        for (i, ty) in params.iter().enumerate() {
            method.params.push(Param {
                name: format!("arg{i}"),
                ty: ty.clone(),
            });
        }
        method
    }

    /// Sets the return type
    #[must_use]
    pub fn returns(mut self, return_type: TypeSig) -> Self {
        self.return_type = return_type;
        self
    }

    /// Appends a parameter
    #[must_use]
    pub fn param(mut self, name: &str, ty: TypeSig) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            ty,
        });
        self
    }

    /// Sets the generic arity
    #[must_use]
    pub fn generic(mut self, arity: u32) -> Self {
        self.generic_arity = arity;
        self
    }

    /// Sets the accessibility
    #[must_use]
    pub fn access(mut self, access: MethodAccess) -> Self {
        self.access = access;
        self
    }

    /// Marks the method virtual
    #[must_use]
    pub fn as_virtual(mut self) -> Self {
        self.flags |= MethodModifiers::VIRTUAL;
        self
    }

    /// Marks the method abstract (and virtual)
    #[must_use]
    pub fn as_abstract(mut self) -> Self {
        self.flags |= MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT;
        self
    }

    /// Marks the method static
    #[must_use]
    pub fn as_static(mut self) -> Self {
        self.flags |= MethodModifiers::STATIC;
        self
    }

    /// Marks the method as a platform-invoke declaration
    #[must_use]
    pub fn as_pinvoke(mut self) -> Self {
        self.flags |= MethodModifiers::PINVOKE_IMPL | MethodModifiers::STATIC;
        self
    }

    /// Marks the method as implemented by the runtime (internal call)
    #[must_use]
    pub fn as_internal_call(mut self) -> Self {
        self.impl_options |= MethodImplOptions::INTERNAL_CALL;
        self
    }

    /// Adds an explicit override reference
    #[must_use]
    pub fn overriding(mut self, base: MethodRef) -> Self {
        self.overrides.push(base);
        self
    }

    /// Sets the method body
    #[must_use]
    pub fn body(mut self, instructions: Vec<Instruction>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Returns `true` for instance and static constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == ".ctor" || self.name == ".cctor"
    }

    /// Returns `true` if the method occupies a virtual slot.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MethodModifiers::VIRTUAL)
    }

    /// Returns `true` if the method is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodModifiers::STATIC)
    }

    /// Returns `true` if the method has no implementation.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(MethodModifiers::ABSTRACT)
    }

    /// Returns `true` if the method is a platform-invoke entry point.
    #[must_use]
    pub fn is_pinvoke(&self) -> bool {
        self.flags.contains(MethodModifiers::PINVOKE_IMPL)
    }

    /// Returns `true` if the method is implemented by the virtual machine and not exposed
    /// as a platform-invoke.
    #[must_use]
    pub fn is_internal_call(&self) -> bool {
        self.impl_options.contains(MethodImplOptions::INTERNAL_CALL) && !self.is_pinvoke()
    }

    /// Returns the parameter types, in order.
    #[must_use]
    pub fn param_types(&self) -> Vec<TypeSig> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    /// Returns the canonical signature of this method when declared on `declaring_type`.
    #[must_use]
    pub fn signature(&self, declaring_type: &str) -> String {
        format_method_signature(
            &self.return_type,
            declaring_type,
            &self.name,
            self.generic_arity,
            &self.param_types(),
        )
    }

    /// Returns a structural reference to this method when declared on `declaring_type`.
    #[must_use]
    pub fn reference(&self, declaring_type: &str) -> MethodRef {
        MethodRef {
            declaring_type: declaring_type.to_string(),
            name: self.name.clone(),
            return_type: self.return_type.clone(),
            params: self.param_types(),
            generic_arity: self.generic_arity,
        }
    }

    /// Returns `true` if `other` has the same name, parameter types, return type and arity.
    ///
    /// This is the structural match used to discover implicit overrides.
    #[must_use]
    pub fn matches_structurally(&self, other: &MethodDef) -> bool {
        self.name == other.name
            && self.generic_arity == other.generic_arity
            && self.return_type == other.return_type
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty == b.ty)
    }
}
