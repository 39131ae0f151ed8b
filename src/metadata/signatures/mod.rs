//! Structural type signatures and method references.
//!
//! Method identity across separately loaded assemblies is purely structural: a method is
//! identified by its canonical signature string, which is derived from the return type, the
//! declaring type, the name, the generic arity and the parameter types. Nothing in the
//! rendering depends on declaration order or on in-memory handles.
//!
//! # Canonical Format
//!
//! ```text
//! <return> <declaring type>::<name>[``<arity>](<param>,<param>,...)
//! ```
//!
//! For example `System.Void System.IO.File::Delete(System.String)` or
//! `!!0 System.Array::Empty``1()`.

use std::fmt;

/// Name of the root type all delegates derive from.
pub const MULTICAST_DELEGATE: &str = "System.MulticastDelegate";
/// Name of the native-sized integer type used by delegate constructors.
pub const INTPTR: &str = "System.IntPtr";
/// Name of the universal base type.
pub const OBJECT: &str = "System.Object";

/// A structural type signature as it appears in method signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    /// `System.Void`, only valid as a return type
    Void,
    /// A type referenced by its full name, e.g. `System.String` or `Outer/Inner`
    Named(String),
    /// An unmanaged pointer, `T*`
    Pointer(Box<TypeSig>),
    /// An unmanaged function pointer
    FnPtr,
    /// A managed reference, `T&`
    ByRef(Box<TypeSig>),
    /// A single-dimensional array, `T[]`
    Array(Box<TypeSig>),
    /// A generic instantiation, `Base<Arg, ...>`
    GenericInst(Box<TypeSig>, Vec<TypeSig>),
    /// A generic type parameter, `!n`
    Var(u32),
    /// A generic method parameter, `!!n`
    MVar(u32),
}

impl TypeSig {
    /// Creates a named type signature
    #[must_use]
    pub fn named(name: &str) -> Self {
        TypeSig::Named(name.to_string())
    }

    /// Wraps `inner` in an unmanaged pointer
    #[must_use]
    pub fn pointer(inner: TypeSig) -> Self {
        TypeSig::Pointer(Box::new(inner))
    }

    /// Wraps `inner` in a managed reference
    #[must_use]
    pub fn by_ref(inner: TypeSig) -> Self {
        TypeSig::ByRef(Box::new(inner))
    }

    /// Wraps `inner` in a single-dimensional array
    #[must_use]
    pub fn array(inner: TypeSig) -> Self {
        TypeSig::Array(Box::new(inner))
    }

    /// Returns the canonical full name of this signature.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.to_string()
    }

    /// Returns `true` if this signature is, or directly wraps, an unmanaged pointer.
    ///
    /// Managed references and arrays are looked through, so `System.Byte*&` and
    /// `System.Byte*[]` count as pointer types. Generic arguments are not inspected.
    #[must_use]
    pub fn is_unsafe_pointer(&self) -> bool {
        match self {
            TypeSig::Pointer(_) | TypeSig::FnPtr => true,
            TypeSig::ByRef(inner) | TypeSig::Array(inner) => inner.is_unsafe_pointer(),
            _ => false,
        }
    }

    /// Returns the name of the underlying named type, if any.
    ///
    /// Pointers, references, arrays and generic instantiations are stripped down to the
    /// element type. Generic parameters and `void` have no element name.
    #[must_use]
    pub fn element_name(&self) -> Option<&str> {
        match self {
            TypeSig::Named(name) => Some(name),
            TypeSig::Pointer(inner) | TypeSig::ByRef(inner) | TypeSig::Array(inner) => {
                inner.element_name()
            }
            TypeSig::GenericInst(base, _) => base.element_name(),
            _ => None,
        }
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::Void => write!(f, "System.Void"),
            TypeSig::Named(name) => write!(f, "{name}"),
            TypeSig::Pointer(inner) => write!(f, "{inner}*"),
            TypeSig::FnPtr => write!(f, "method*"),
            TypeSig::ByRef(inner) => write!(f, "{inner}&"),
            TypeSig::Array(inner) => write!(f, "{inner}[]"),
            TypeSig::GenericInst(base, args) => {
                write!(f, "{base}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
            TypeSig::Var(n) => write!(f, "!{n}"),
            TypeSig::MVar(n) => write!(f, "!!{n}"),
        }
    }
}

/// Renders the canonical signature string of a method.
///
/// This is the single source of method identity; both declarations and references go
/// through it.
#[must_use]
pub fn format_method_signature(
    return_type: &TypeSig,
    declaring_type: &str,
    name: &str,
    generic_arity: u32,
    params: &[TypeSig],
) -> String {
    let mut signature = format!("{return_type} {declaring_type}::{name}");
    if generic_arity > 0 {
        signature.push_str(&format!("``{generic_arity}"));
    }
    signature.push('(');
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            signature.push(',');
        }
        signature.push_str(&param.to_string());
    }
    signature.push(')');
    signature
}

/// A structural reference to a method, as found in instruction operands and explicit
/// override lists.
///
/// References carry no handle to a definition; they are resolved through
/// [`crate::metadata::Universe::resolve`], and resolution may legitimately fail for
/// compiler-generated array or generic constructs that have no declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Full name of the declaring type
    pub declaring_type: String,
    /// Method name
    pub name: String,
    /// Return type
    pub return_type: TypeSig,
    /// Parameter types, in order
    pub params: Vec<TypeSig>,
    /// Number of generic method parameters
    pub generic_arity: u32,
}

impl MethodRef {
    /// Creates a reference to a non-generic method returning `void` with no parameters.
    #[must_use]
    pub fn new(declaring_type: &str, name: &str) -> Self {
        MethodRef {
            declaring_type: declaring_type.to_string(),
            name: name.to_string(),
            return_type: TypeSig::Void,
            params: Vec::new(),
            generic_arity: 0,
        }
    }

    /// Sets the return type
    #[must_use]
    pub fn returns(mut self, return_type: TypeSig) -> Self {
        self.return_type = return_type;
        self
    }

    /// Appends a parameter type
    #[must_use]
    pub fn param(mut self, param: TypeSig) -> Self {
        self.params.push(param);
        self
    }

    /// Sets the generic arity
    #[must_use]
    pub fn generic(mut self, arity: u32) -> Self {
        self.generic_arity = arity;
        self
    }

    /// Returns the canonical signature of the referenced method.
    #[must_use]
    pub fn signature(&self) -> String {
        format_method_signature(
            &self.return_type,
            &self.declaring_type,
            &self.name,
            self.generic_arity,
            &self.params,
        )
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}
