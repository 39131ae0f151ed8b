//! CIL instruction representation as handed over by a metadata provider.
//!
//! The analysis does not decode bytecode itself. A [`crate::metadata::MetadataProvider`]
//! supplies already-decoded instructions whose method operands are structural
//! [`MethodRef`]s, and this module only models what the security analysis needs to see:
//! the opcode, its offset, and a type-safe operand.
//!
//! # Key Components
//!
//! - [`Instruction`] - A decoded instruction
//! - [`Opcode`] - The opcode, rendered with its ECMA-335 mnemonic
//! - [`Operand`] - Type-safe operand representation
//!
//! # Usage Examples
//!
//! ```rust
//! use secscope::assembly::{Instruction, Opcode};
//! use secscope::metadata::MethodRef;
//!
//! let call = Instruction::call(0, MethodRef::new("System.GC", "Collect"));
//! assert_eq!(call.mnemonic(), "call");
//! assert!(call.opcode.is_call_like());
//! assert!(Opcode::Localloc.is_unverifiable());
//! ```

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::metadata::{MethodRef, TypeSig};

/// CIL opcodes relevant to call-graph construction and verifiability.
///
/// Opcodes the analysis has no interest in are still representable so providers can hand
/// over complete bodies; their string form is the ECMA-335 mnemonic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
pub enum Opcode {
    /// `nop`
    #[strum(serialize = "nop")]
    Nop,
    /// `ldarg`
    #[strum(serialize = "ldarg")]
    Ldarg,
    /// `ldloc`
    #[strum(serialize = "ldloc")]
    Ldloc,
    /// `stloc`
    #[strum(serialize = "stloc")]
    Stloc,
    /// `ldc.i4`
    #[strum(serialize = "ldc.i4")]
    LdcI4,
    /// `ldstr`
    #[strum(serialize = "ldstr")]
    Ldstr,
    /// `ldnull`
    #[strum(serialize = "ldnull")]
    Ldnull,
    /// `ldfld`
    #[strum(serialize = "ldfld")]
    Ldfld,
    /// `stfld`
    #[strum(serialize = "stfld")]
    Stfld,
    /// `ldsfld`
    #[strum(serialize = "ldsfld")]
    Ldsfld,
    /// `stsfld`
    #[strum(serialize = "stsfld")]
    Stsfld,
    /// `ldind.i`
    #[strum(serialize = "ldind.i")]
    LdindI,
    /// `stind.i`
    #[strum(serialize = "stind.i")]
    StindI,
    /// `dup`
    #[strum(serialize = "dup")]
    Dup,
    /// `pop`
    #[strum(serialize = "pop")]
    Pop,
    /// `br`
    #[strum(serialize = "br")]
    Br,
    /// `brtrue`
    #[strum(serialize = "brtrue")]
    Brtrue,
    /// `brfalse`
    #[strum(serialize = "brfalse")]
    Brfalse,
    /// `ret`
    #[strum(serialize = "ret")]
    Ret,
    /// `throw`
    #[strum(serialize = "throw")]
    Throw,
    /// `newarr`
    #[strum(serialize = "newarr")]
    Newarr,
    /// `castclass`
    #[strum(serialize = "castclass")]
    Castclass,
    /// `isinst`
    #[strum(serialize = "isinst")]
    Isinst,
    /// `box`
    #[strum(serialize = "box")]
    BoxValue,
    /// `unbox.any`
    #[strum(serialize = "unbox.any")]
    UnboxAny,
    /// `conv.i`
    #[strum(serialize = "conv.i")]
    ConvI,
    /// `call`
    #[strum(serialize = "call")]
    Call,
    /// `callvirt`
    #[strum(serialize = "callvirt")]
    Callvirt,
    /// `newobj`
    #[strum(serialize = "newobj")]
    Newobj,
    /// `ldftn`
    #[strum(serialize = "ldftn")]
    Ldftn,
    /// `ldvirtftn`
    #[strum(serialize = "ldvirtftn")]
    Ldvirtftn,
    /// `jmp`, transfers control to another method with the current arguments
    #[strum(serialize = "jmp")]
    Jmp,
    /// `calli`, indirect call through a function pointer
    #[strum(serialize = "calli")]
    Calli,
    /// `cpblk`
    #[strum(serialize = "cpblk")]
    Cpblk,
    /// `initblk`
    #[strum(serialize = "initblk")]
    Initblk,
    /// `localloc`
    #[strum(serialize = "localloc")]
    Localloc,
    /// `arglist`
    #[strum(serialize = "arglist")]
    Arglist,
    /// `cpobj`
    #[strum(serialize = "cpobj")]
    Cpobj,
    /// `mkrefany`
    #[strum(serialize = "mkrefany")]
    Mkrefany,
    /// `no.` prefix, suppresses runtime checks
    #[strum(serialize = "no.")]
    No,
    /// `tail.` prefix
    #[strum(serialize = "tail.")]
    Tail,
}

impl Opcode {
    /// Returns `true` for opcodes that make a method body unverifiable.
    ///
    /// Any method containing one of these cannot run as transparent code.
    #[must_use]
    pub fn is_unverifiable(&self) -> bool {
        matches!(
            self,
            Opcode::No
                | Opcode::Calli
                | Opcode::Cpblk
                | Opcode::Initblk
                | Opcode::Jmp
                | Opcode::Localloc
                | Opcode::Arglist
                | Opcode::Cpobj
                | Opcode::Mkrefany
        )
    }

    /// Returns `true` for opcodes whose method operand creates a caller/callee relation.
    #[must_use]
    pub fn is_call_like(&self) -> bool {
        matches!(
            self,
            Opcode::Call
                | Opcode::Callvirt
                | Opcode::Newobj
                | Opcode::Ldftn
                | Opcode::Ldvirtftn
                | Opcode::Jmp
        )
    }
}

/// Type-safe operand of an [`Instruction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No operand present
    None,
    /// Integer immediate
    Immediate(i64),
    /// String literal
    String(String),
    /// Branch target offset
    Target(u32),
    /// Type reference
    Type(TypeSig),
    /// Method reference
    Method(MethodRef),
}

/// A single decoded CIL instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of this instruction within the method body
    pub offset: u32,
    /// The opcode
    pub opcode: Opcode,
    /// The operand data for this instruction
    pub operand: Operand,
}

impl Instruction {
    /// Creates an instruction without operand
    #[must_use]
    pub fn new(offset: u32, opcode: Opcode) -> Self {
        Instruction {
            offset,
            opcode,
            operand: Operand::None,
        }
    }

    /// Creates an instruction with the given operand
    #[must_use]
    pub fn with_operand(offset: u32, opcode: Opcode, operand: Operand) -> Self {
        Instruction {
            offset,
            opcode,
            operand,
        }
    }

    /// Creates a `call` instruction
    #[must_use]
    pub fn call(offset: u32, target: MethodRef) -> Self {
        Self::with_operand(offset, Opcode::Call, Operand::Method(target))
    }

    /// Creates a `callvirt` instruction
    #[must_use]
    pub fn callvirt(offset: u32, target: MethodRef) -> Self {
        Self::with_operand(offset, Opcode::Callvirt, Operand::Method(target))
    }

    /// Creates a `newobj` instruction
    #[must_use]
    pub fn newobj(offset: u32, constructor: MethodRef) -> Self {
        Self::with_operand(offset, Opcode::Newobj, Operand::Method(constructor))
    }

    /// Returns the mnemonic of the opcode, e.g. `"callvirt"`
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.opcode.into()
    }

    /// Returns the referenced method if this is a call-like instruction.
    #[must_use]
    pub fn method_ref(&self) -> Option<&MethodRef> {
        if !self.opcode.is_call_like() {
            return None;
        }
        match &self.operand {
            Operand::Method(reference) => Some(reference),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_mnemonics_round_trip() {
        assert_eq!(Opcode::from_str("localloc").unwrap(), Opcode::Localloc);
        assert_eq!(Opcode::from_str("no.").unwrap(), Opcode::No);
        assert_eq!(Opcode::Callvirt.to_string(), "callvirt");
        assert!(Opcode::from_str("bogus").is_err());
    }

    #[test]
    fn test_unverifiable_set() {
        let unverifiable: Vec<&'static str> = Opcode::iter()
            .filter(Opcode::is_unverifiable)
            .map(Into::into)
            .collect();
        assert_eq!(
            unverifiable,
            vec!["jmp", "calli", "cpblk", "initblk", "localloc", "arglist", "cpobj", "mkrefany", "no."]
        );
    }

    #[test]
    fn test_method_ref_only_for_call_like() {
        let target = MethodRef::new("N.T", "M");
        let call = Instruction::call(0, target.clone());
        assert_eq!(call.method_ref(), Some(&target));

        let ldstr = Instruction::with_operand(5, Opcode::Ldstr, Operand::String("x".into()));
        assert!(ldstr.method_ref().is_none());

        let calli = Instruction::new(10, Opcode::Calli);
        assert!(calli.method_ref().is_none());
        assert!(calli.opcode.is_unverifiable());
    }
}
