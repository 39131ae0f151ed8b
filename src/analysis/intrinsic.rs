//! Detection of methods that inherently require elevated privilege.
//!
//! A method is intrinsically critical if any of the following holds, listed in priority order:
//!
//! 1. It is a platform-invoke declaration
//! 2. Its body contains an unverifiable instruction
//! 3. A parameter or the return type is an unmanaged pointer or a critical type
//! 4. It implements an interface method that is already known to be critical
//! 5. It is a non-virtual internal call
//!
//! Membership is the union of all rules; the first matching rule only decides the comment.
//!
//! Detection runs in two phases. The first phase evaluates rules 1, 2, 3 and 5, which only
//! look at the method itself, and is embarrassingly parallel. The second phase evaluates rule
//! 4 to a local fixed point, so an implementer is flagged regardless of whether its interface
//! was scanned before or after it, and chains of interfaces re-declaring critical members are
//! followed.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rayon::prelude::*;
use strum::Display;

use crate::{
    analysis::MethodRelationMap,
    metadata::{
        signatures::{INTPTR, OBJECT},
        AssemblyId, MethodId, TypeId, TypeSig, Universe,
    },
};

/// The rule that flagged a method, ordered by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum IntrinsicRule {
    /// Platform-invoke declaration
    PInvoke,
    /// Unverifiable instruction in the body
    UnverifiableOpcode,
    /// Pointer or critical type in the signature
    UnsafeSignature,
    /// Implementation of a critical interface method
    CriticalInterface,
    /// Non-virtual internal call
    InternalCall,
}

/// Why a method was flagged as intrinsically critical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrinsicFinding {
    /// The highest-priority rule that matched
    pub rule: IntrinsicRule,
    /// Human-readable explanation
    pub comment: String,
}

impl IntrinsicFinding {
    /// Creates a new finding
    #[must_use]
    pub fn new(rule: IntrinsicRule, comment: impl Into<String>) -> Self {
        IntrinsicFinding {
            rule,
            comment: comment.into(),
        }
    }
}

/// Scans methods for intrinsic privilege requirements.
pub struct IntrinsicDetector<'a> {
    universe: &'a Universe,
    relations: &'a MethodRelationMap,
    critical_types: &'a BTreeSet<TypeId>,
    parallel: bool,
}

impl<'a> IntrinsicDetector<'a> {
    /// Creates a detector over `universe`.
    ///
    /// # Arguments
    ///
    /// * `universe` - The indexed analysis set
    /// * `relations` - Relation map of the same universe, used for interface implementations
    /// * `critical_types` - Types that are unconditionally critical
    #[must_use]
    pub fn new(
        universe: &'a Universe,
        relations: &'a MethodRelationMap,
        critical_types: &'a BTreeSet<TypeId>,
    ) -> Self {
        IntrinsicDetector {
            universe,
            relations,
            critical_types,
            parallel: true,
        }
    }

    /// Enables or disables the parallel first phase
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Detects intrinsically critical methods declared in `assembly`.
    ///
    /// Interface methods in other assemblies that are implemented by methods of `assembly`
    /// are evaluated as well, but only methods of `assembly` are returned.
    #[must_use]
    pub fn detect(&self, assembly: AssemblyId) -> BTreeMap<MethodId, IntrinsicFinding> {
        let methods: Vec<MethodId> = self.universe.methods_of_assembly(assembly).collect();
        let findings = self.detect_methods(&methods);
        log::debug!(
            "intrinsic: {} of {} methods in {} flagged",
            findings.len(),
            methods.len(),
            self.universe.assembly(assembly).name
        );
        findings
    }

    /// Detects intrinsically critical methods across the whole universe.
    #[must_use]
    pub fn detect_all(&self) -> BTreeMap<MethodId, IntrinsicFinding> {
        let methods: Vec<MethodId> = self.universe.methods().iter().map(|m| m.id).collect();
        let findings = self.detect_methods(&methods);
        log::debug!(
            "intrinsic: {} of {} methods flagged",
            findings.len(),
            methods.len()
        );
        findings
    }

    fn detect_methods(&self, methods: &[MethodId]) -> BTreeMap<MethodId, IntrinsicFinding> {
        let scope = self.with_interface_closure(methods);

        let mut findings: BTreeMap<MethodId, IntrinsicFinding> = if self.parallel {
            scope
                .par_iter()
                .filter_map(|&m| self.classify(m).map(|finding| (m, finding)))
                .collect()
        } else {
            scope
                .iter()
                .filter_map(|&m| self.classify(m).map(|finding| (m, finding)))
                .collect()
        };

        self.apply_interface_rule(&scope, &mut findings);

        let requested: BTreeSet<MethodId> = methods.iter().copied().collect();
        findings.retain(|m, _| requested.contains(m));
        findings
    }

    /// Extends `methods` by every interface method they implement, transitively.
    fn with_interface_closure(&self, methods: &[MethodId]) -> Vec<MethodId> {
        let mut scope: BTreeSet<MethodId> = methods.iter().copied().collect();
        let mut queue: VecDeque<MethodId> = methods.iter().copied().collect();

        while let Some(current) = queue.pop_front() {
            for base in self.relations.overrides(current) {
                if self.universe.declaring_type(base).is_interface() && scope.insert(base) {
                    queue.push_back(base);
                }
            }
        }
        scope.into_iter().collect()
    }

    /// Evaluates the rules that only depend on the method itself.
    fn classify(&self, id: MethodId) -> Option<IntrinsicFinding> {
        let def = &self.universe.method(id).def;

        if def.is_pinvoke() {
            return Some(IntrinsicFinding::new(
                IntrinsicRule::PInvoke,
                "p/invoke declaration",
            ));
        }

        if let Some(instr) = def.instructions.iter().find(|i| i.opcode.is_unverifiable()) {
            return Some(IntrinsicFinding::new(
                IntrinsicRule::UnverifiableOpcode,
                instr.mnemonic(),
            ));
        }

        if let Some(comment) = self.unsafe_signature(id) {
            return Some(IntrinsicFinding::new(IntrinsicRule::UnsafeSignature, comment));
        }

        if def.is_internal_call() && !def.is_virtual() {
            return Some(IntrinsicFinding::new(
                IntrinsicRule::InternalCall,
                "internal call",
            ));
        }

        None
    }

    /// Flags implementers of critical interface methods until nothing changes.
    fn apply_interface_rule(
        &self,
        scope: &[MethodId],
        findings: &mut BTreeMap<MethodId, IntrinsicFinding>,
    ) {
        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut changed = false;

            for &method in scope {
                if findings
                    .get(&method)
                    .is_some_and(|f| f.rule <= IntrinsicRule::CriticalInterface)
                {
                    continue;
                }

                let implemented = self.relations.overrides(method).find(|&base| {
                    self.universe.declaring_type(base).is_interface()
                        && (findings.contains_key(&base)
                            || self
                                .critical_types
                                .contains(&self.universe.method(base).declaring_type))
                });

                if let Some(base) = implemented {
                    let comment = format!(
                        "implements critical interface method {}",
                        self.universe.method(base).signature
                    );
                    findings.insert(
                        method,
                        IntrinsicFinding::new(IntrinsicRule::CriticalInterface, comment),
                    );
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }
        log::trace!("intrinsic: interface rule settled after {rounds} rounds");
    }

    /// Returns why the signature of `id` is unsafe, or `None` if it is safe.
    ///
    /// A signature is unsafe if a parameter or the return type is an unmanaged pointer or
    /// refers to a critical type. Constructors with the `(System.Object, System.IntPtr)` shape
    /// generated for delegates are exempt from the parameter check.
    #[must_use]
    pub fn unsafe_signature(&self, id: MethodId) -> Option<String> {
        let def = &self.universe.method(id).def;

        let delegate_ctor = def.is_constructor()
            && def.params.len() == 2
            && def.params[0].ty == TypeSig::named(OBJECT)
            && def.params[1].ty == TypeSig::named(INTPTR);

        if !delegate_ctor {
            for param in &def.params {
                if let Some(reason) = self.unsafe_type(&param.ty) {
                    return Some(format!(
                        "parameter '{}' has {reason} type {}",
                        param.name, param.ty
                    ));
                }
            }
        }

        self.unsafe_type(&def.return_type)
            .map(|reason| format!("return type {} is {reason}", def.return_type))
    }

    fn unsafe_type(&self, ty: &TypeSig) -> Option<&'static str> {
        if ty.is_unsafe_pointer() {
            return Some("pointer");
        }

        let critical = ty
            .element_name()
            .and_then(|name| self.universe.find_type(name))
            .is_some_and(|t| self.critical_types.contains(&t));
        critical.then_some("critical")
    }
}
