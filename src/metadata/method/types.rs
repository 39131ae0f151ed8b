//! Method attribute flags and accessibility.
//!
//! # Key Types
//! - [`MethodModifiers`], [`MethodImplOptions`]: Attribute and implementation flags
//! - [`MethodAccess`]: Member accessibility

use bitflags::bitflags;
use strum::Display;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Method modifier flags
    pub struct MethodModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// Runtime should check name encoding
        const RT_SPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Method implementation options
    pub struct MethodImplOptions: u32 {
        /// Method impl is native
        const NATIVE = 0x0001;
        /// Method impl is provided by the runtime
        const RUNTIME = 0x0003;
        /// Method cannot be inlined
        const NO_INLINING = 0x0008;
        /// Method is a synchronized method
        const SYNCHRONIZED = 0x0020;
        /// Signature is exported exactly as declared
        const PRESERVE_SIG = 0x0080;
        /// Method is implemented inside the virtual machine
        const INTERNAL_CALL = 0x1000;
    }
}

/// Accessibility of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum MethodAccess {
    /// Member not referenceable
    #[strum(serialize = "compilercontrolled")]
    CompilerControlled,
    /// Accessible only by the parent type
    #[strum(serialize = "private")]
    Private,
    /// Accessible by sub-types only in this assembly
    #[strum(serialize = "famandassem")]
    FamAndAssem,
    /// Accessible by anyone in the assembly
    #[strum(serialize = "assembly")]
    Assembly,
    /// Accessible only by type and sub-types
    #[strum(serialize = "family")]
    Family,
    /// Accessible by sub-types anywhere, plus anyone in the assembly
    #[strum(serialize = "famorassem")]
    FamOrAssem,
    /// Accessible by anyone who has visibility to this scope
    #[default]
    #[strum(serialize = "public")]
    Public,
}

impl MethodAccess {
    /// Returns `true` if code outside the declaring assembly can reach the member.
    #[must_use]
    pub fn is_externally_visible(&self) -> bool {
        matches!(
            self,
            MethodAccess::Public | MethodAccess::Family | MethodAccess::FamOrAssem
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_visibility() {
        assert!(MethodAccess::Public.is_externally_visible());
        assert!(MethodAccess::Family.is_externally_visible());
        assert!(MethodAccess::FamOrAssem.is_externally_visible());
        assert!(!MethodAccess::Assembly.is_externally_visible());
        assert!(!MethodAccess::FamAndAssem.is_externally_visible());
        assert!(!MethodAccess::Private.is_externally_visible());
    }

    #[test]
    fn test_modifier_combination() {
        let flags = MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT;
        assert!(flags.contains(MethodModifiers::VIRTUAL));
        assert!(!flags.contains(MethodModifiers::STATIC));
        assert_eq!(MethodModifiers::from_bits_truncate(0x0440), flags);
    }
}
