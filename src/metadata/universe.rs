//! Indexed, immutable snapshot of an analysis set.
//!
//! The [`Universe`] flattens the declaration trees of all loaded assemblies into dense tables
//! and interns every type and method. Identifiers are handed out in declaration order, so
//! iterating any ordered collection of [`MethodId`]s replays the input order. This is what
//! makes propagation results and reports reproducible across runs.
//!
//! Method identity is the canonical signature. If two declarations render to the same
//! signature (for instance the same type shipped in two assemblies), they share one
//! [`MethodId`] owned by the first declaration. Later declarations are folded into it (flags
//! unioned, bodies appended) and a warning is logged.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;

use crate::{
    metadata::{
        token::{AssemblyId, MethodId, TypeId},
        AssemblyDef, MetadataProvider, MethodDef, MethodRef, TypeAttributes, TypeDef,
    },
    Result,
};

/// Memoizes canonical signatures of method references.
///
/// The same references occur over and over in method bodies; rendering each once is enough.
/// The cache is owned by a [`Universe`] and shared by reference with parallel workers.
#[derive(Debug, Default)]
pub struct SignatureCache {
    entries: DashMap<MethodRef, String>,
}

impl SignatureCache {
    /// Creates an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical signature of `reference`, rendering it on first use.
    #[must_use]
    pub fn signature(&self, reference: &MethodRef) -> String {
        if let Some(hit) = self.entries.get(reference) {
            return hit.value().clone();
        }
        let rendered = reference.signature();
        self.entries.insert(reference.clone(), rendered.clone());
        rendered
    }

    /// Returns the number of memoized references
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been memoized yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What kind of reference could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MissKind {
    /// A call-like instruction operand
    CallTarget,
    /// An explicit override reference
    OverrideBase,
    /// A configured critical type
    CriticalType,
    /// A configured SafeCritical method
    SafeCriticalMethod,
    /// A configured ignored call
    IgnoredCall,
    /// A configured reviewed method
    ReviewedMethod,
    /// A descriptor target
    Descriptor,
}

/// A reference that could not be resolved to a declaration.
///
/// Misses are diagnostics, not errors: they are collected and logged, and the analysis
/// continues without the unresolved edge or entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionMiss {
    /// What kind of reference missed
    pub kind: MissKind,
    /// Where the reference came from (referencing method, configuration list, ...)
    pub context: String,
    /// The unresolved name or signature
    pub target: String,
}

/// An interned assembly.
#[derive(Debug, Clone)]
pub struct AssemblyInfo {
    /// Identifier
    pub id: AssemblyId,
    /// Simple name
    pub name: String,
    /// All types, including nested ones, in pre-order
    pub types: Vec<TypeId>,
}

/// An interned type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Identifier
    pub id: TypeId,
    /// Owning assembly
    pub assembly: AssemblyId,
    /// Full name, `Namespace.Name` or `Outer/Inner`
    pub full_name: String,
    /// Attribute flags
    pub flags: TypeAttributes,
    /// Full name of the base type
    pub base: Option<String>,
    /// Full names of directly implemented interfaces
    pub interfaces: Vec<String>,
    /// Declared methods
    pub methods: Vec<MethodId>,
    /// Directly nested types
    pub nested: Vec<TypeId>,
    /// Enclosing type for nested types
    pub declaring_type: Option<TypeId>,
}

impl TypeInfo {
    /// Returns `true` if this type is an interface
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeAttributes::INTERFACE)
    }

    /// Returns `true` if this type is a delegate
    #[must_use]
    pub fn is_delegate(&self) -> bool {
        self.base.as_deref() == Some(crate::metadata::signatures::MULTICAST_DELEGATE)
    }
}

/// An interned method.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// Identifier
    pub id: MethodId,
    /// Declaring type
    pub declaring_type: TypeId,
    /// Owning assembly
    pub assembly: AssemblyId,
    /// Canonical signature
    pub signature: String,
    /// The declaration
    pub def: MethodDef,
}

/// Indexed snapshot of all assemblies in one analysis run.
#[derive(Debug, Default)]
pub struct Universe {
    assemblies: Vec<AssemblyInfo>,
    types: Vec<TypeInfo>,
    methods: Vec<MethodInfo>,
    type_index: HashMap<String, TypeId>,
    method_index: HashMap<String, MethodId>,
    cache: SignatureCache,
}

impl Universe {
    /// Builds a universe from owned assembly declarations.
    #[must_use]
    pub fn new(assemblies: Vec<AssemblyDef>) -> Self {
        let mut universe = Universe::default();
        for assembly in assemblies {
            universe.intern_assembly(assembly);
        }

        log::debug!(
            "universe: {} assemblies, {} types, {} methods",
            universe.assemblies.len(),
            universe.types.len(),
            universe.methods.len()
        );
        universe
    }

    /// Loads a snapshot from `provider` and indexes it.
    ///
    /// # Errors
    ///
    /// Propagates any error of [`MetadataProvider::load`].
    pub fn from_provider(provider: &dyn MetadataProvider) -> Result<Self> {
        Ok(Self::new(provider.load()?))
    }

    fn intern_assembly(&mut self, assembly: AssemblyDef) {
        let id = AssemblyId::new(self.assemblies.len() as u32);
        self.assemblies.push(AssemblyInfo {
            id,
            name: assembly.name,
            types: Vec::new(),
        });

        for ty in assembly.types {
            let full_name = ty.full_name();
            self.intern_type(id, ty, full_name, None);
        }
    }

    fn intern_type(
        &mut self,
        assembly: AssemblyId,
        ty: TypeDef,
        full_name: String,
        declaring_type: Option<TypeId>,
    ) -> TypeId {
        let id = TypeId::new(self.types.len() as u32);
        if let Some(previous) = self.type_index.get(&full_name) {
            log::warn!("duplicate type {full_name}, lookups keep {previous}");
        } else {
            self.type_index.insert(full_name.clone(), id);
        }

        self.assemblies[assembly.index()].types.push(id);
        self.types.push(TypeInfo {
            id,
            assembly,
            full_name: full_name.clone(),
            flags: ty.flags,
            base: ty.base,
            interfaces: ty.interfaces,
            methods: Vec::new(),
            nested: Vec::new(),
            declaring_type,
        });

        for def in ty.methods {
            let signature = def.signature(&full_name);
            if let Some(&previous) = self.method_index.get(&signature) {
                log::warn!("duplicate method {signature}, merged into {previous}");
                Self::absorb(&mut self.methods[previous.index()].def, def);
                continue;
            }

            let method_id = MethodId::new(self.methods.len() as u32);
            self.method_index.insert(signature.clone(), method_id);
            self.types[id.index()].methods.push(method_id);
            self.methods.push(MethodInfo {
                id: method_id,
                declaring_type: id,
                assembly,
                signature,
                def,
            });
        }

        for nested in ty.nested {
            let nested_name = format!("{full_name}/{}", nested.name);
            let nested_id = self.intern_type(assembly, nested, nested_name, Some(id));
            self.types[id.index()].nested.push(nested_id);
        }

        id
    }

    /// Folds a redeclaration into the interned method: flags are unioned, bodies and
    /// explicit overrides are appended.
    fn absorb(target: &mut MethodDef, duplicate: MethodDef) {
        target.flags |= duplicate.flags;
        target.impl_options |= duplicate.impl_options;
        target.instructions.extend(duplicate.instructions);
        for reference in duplicate.overrides {
            if !target.overrides.contains(&reference) {
                target.overrides.push(reference);
            }
        }
    }

    /// Returns all assemblies, in load order
    #[must_use]
    pub fn assemblies(&self) -> &[AssemblyInfo] {
        &self.assemblies
    }

    /// Returns all types, in declaration order
    #[must_use]
    pub fn types(&self) -> &[TypeInfo] {
        &self.types
    }

    /// Returns all methods, in declaration order
    #[must_use]
    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    /// Returns an assembly by identifier
    #[must_use]
    pub fn assembly(&self, id: AssemblyId) -> &AssemblyInfo {
        &self.assemblies[id.index()]
    }

    /// Returns a type by identifier
    #[must_use]
    pub fn type_info(&self, id: TypeId) -> &TypeInfo {
        &self.types[id.index()]
    }

    /// Returns a method by identifier
    #[must_use]
    pub fn method(&self, id: MethodId) -> &MethodInfo {
        &self.methods[id.index()]
    }

    /// Returns the declaring type of a method
    #[must_use]
    pub fn declaring_type(&self, id: MethodId) -> &TypeInfo {
        self.type_info(self.method(id).declaring_type)
    }

    /// Returns the identifiers of all methods declared in an assembly, in declaration order.
    pub fn methods_of_assembly(&self, id: AssemblyId) -> impl Iterator<Item = MethodId> + '_ {
        self.assembly(id)
            .types
            .iter()
            .flat_map(move |&ty| self.type_info(ty).methods.iter().copied())
    }

    /// Looks up a type by full name
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<TypeId> {
        self.type_index.get(full_name).copied()
    }

    /// Looks up a method by canonical signature
    #[must_use]
    pub fn find_method(&self, signature: &str) -> Option<MethodId> {
        self.method_index.get(signature).copied()
    }

    /// Resolves a structural method reference to its declaration.
    ///
    /// Returns `None` when no declaration in the universe has the referenced signature,
    /// which is expected for runtime-provided array accessors and for references into
    /// assemblies outside the analysis set.
    #[must_use]
    pub fn resolve(&self, reference: &MethodRef) -> Option<MethodId> {
        self.find_method(&self.cache.signature(reference))
    }

    /// Returns the signature memoization cache
    #[must_use]
    pub fn signature_cache(&self) -> &SignatureCache {
        &self.cache
    }

    /// Returns the resolved base type of `id`, if it is part of the universe.
    #[must_use]
    pub fn base_type(&self, id: TypeId) -> Option<TypeId> {
        self.type_info(id)
            .base
            .as_deref()
            .and_then(|name| self.find_type(name))
    }

    /// Returns the resolvable base-type chain of `id`, nearest first, excluding `id`.
    #[must_use]
    pub fn ancestors(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut current = self.base_type(id);

        while let Some(base) = current {
            if !visited.insert(base) {
                log::warn!("cyclic base type chain at {}", self.type_info(base).full_name);
                break;
            }
            chain.push(base);
            current = self.base_type(base);
        }
        chain
    }

    /// Returns the resolvable interfaces directly implemented by `id`.
    #[must_use]
    pub fn interfaces(&self, id: TypeId) -> Vec<TypeId> {
        self.type_info(id)
            .interfaces
            .iter()
            .filter_map(|name| self.find_type(name))
            .collect()
    }

    /// Returns every interface reachable from `id` or any of its ancestors, including
    /// interfaces inherited by interfaces, in discovery order.
    #[must_use]
    pub fn all_interfaces(&self, id: TypeId) -> Vec<TypeId> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut worklist: Vec<TypeId> = Vec::new();

        for ty in std::iter::once(id).chain(self.ancestors(id)) {
            worklist.extend(self.interfaces(ty));
            while let Some(interface) = worklist.pop() {
                if interface == id || !visited.insert(interface) {
                    continue;
                }
                result.push(interface);
                worklist.extend(self.interfaces(interface).into_iter().rev());
            }
        }
        result
    }

    /// Returns `true` if the type and all its enclosing types are externally visible.
    #[must_use]
    pub fn is_type_visible(&self, id: TypeId) -> bool {
        let info = self.type_info(id);
        info.flags.is_externally_visible()
            && info
                .declaring_type
                .map_or(true, |outer| self.is_type_visible(outer))
    }

    /// Returns `true` if the method belongs to the externally visible API surface.
    #[must_use]
    pub fn is_visible(&self, id: MethodId) -> bool {
        let method = self.method(id);
        method.def.access.is_externally_visible() && self.is_type_visible(method.declaring_type)
    }

    /// Returns `DeclaringType::Name`, the key reports sort by.
    #[must_use]
    pub fn display_name(&self, id: MethodId) -> String {
        let method = self.method(id);
        format!(
            "{}::{}",
            self.type_info(method.declaring_type).full_name,
            method.def.name
        )
    }
}
