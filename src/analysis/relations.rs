//! Caller, override and base relations between methods.
//!
//! The [`MethodRelationMap`] is derived once from a [`Universe`] and queried many times by
//! the intrinsic detector and the propagation engine. It holds three graphs:
//!
//! - `callers[callee]`: methods whose body references `callee` through a call-like opcode
//! - `overridden_by[base]`: methods that override or implement `base`
//! - `overrides[derived]`: the inverse of `overridden_by`
//!
//! # Override Discovery
//!
//! For every virtual, non-constructor method the explicit override list is consulted first.
//! Afterwards the base-type chain of the declaring type and every interface reachable from it
//! or any ancestor is walked, and each visited type is searched for a structural match (same
//! name, parameter types, return type and generic arity). Implicit overrides have no
//! metadata slot reference and can only be found this way.
//!
//! The override graph may contain cycles through generic and interface diamonds; every
//! traversal over it is guarded by a visited set.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::OnceLock;

use crate::{
    config::IgnoredCalls,
    metadata::{MethodId, MethodInfo, MissKind, ResolutionMiss, Universe},
};

/// Inserts `value` into the set stored under `key`, creating the set on first use.
///
/// Returns `true` if the edge is new.
fn insert_edge(
    map: &mut BTreeMap<MethodId, BTreeSet<MethodId>>,
    key: MethodId,
    value: MethodId,
) -> bool {
    map.entry(key).or_default().insert(value)
}

/// Connected components of the undirected override graph, computed lazily.
#[derive(Debug, Default)]
struct InheritanceComponents {
    index: HashMap<MethodId, usize>,
    members: Vec<Vec<MethodId>>,
}

/// Caller and inheritance relations of all methods in a universe.
#[derive(Debug, Default)]
pub struct MethodRelationMap {
    callers: BTreeMap<MethodId, BTreeSet<MethodId>>,
    callees: BTreeMap<MethodId, BTreeSet<MethodId>>,
    overridden_by: BTreeMap<MethodId, BTreeSet<MethodId>>,
    overrides: BTreeMap<MethodId, BTreeSet<MethodId>>,
    misses: Vec<ResolutionMiss>,
    stats: RelationStats,
    components: OnceLock<InheritanceComponents>,
}

impl MethodRelationMap {
    /// Builds the relation map for every method of `universe`.
    ///
    /// Call edges listed in `ignored` are dropped. References that do not resolve to a
    /// declaration are skipped and recorded as misses.
    #[must_use]
    pub fn build(universe: &Universe, ignored: &IgnoredCalls) -> Self {
        let mut map = MethodRelationMap::default();
        map.stats.methods = universe.methods().len();

        for method in universe.methods() {
            map.scan_body(universe, method, ignored);
        }

        for method in universe.methods() {
            map.discover_overrides(universe, method);
        }

        log::debug!(
            "relations: {} call edges, {} override edges, {} unresolved calls, {} unresolved overrides, {} ignored",
            map.stats.call_edges,
            map.stats.override_edges,
            map.stats.unresolved_calls,
            map.stats.unresolved_overrides,
            map.stats.ignored_calls
        );
        map
    }

    fn scan_body(&mut self, universe: &Universe, method: &MethodInfo, ignored: &IgnoredCalls) {
        let caller = method.id;

        for instr in &method.def.instructions {
            let Some(reference) = instr.method_ref() else {
                continue;
            };

            let Some(callee) = universe.resolve(reference) else {
                log::trace!(
                    "{}: unresolved {} target {reference}",
                    method.signature,
                    instr.mnemonic()
                );
                self.stats.unresolved_calls += 1;
                self.misses.push(ResolutionMiss {
                    kind: MissKind::CallTarget,
                    context: method.signature.clone(),
                    target: reference.signature(),
                });
                continue;
            };

            if ignored.contains(&(caller, callee)) {
                self.stats.ignored_calls += 1;
                continue;
            }

            if insert_edge(&mut self.callers, callee, caller) {
                insert_edge(&mut self.callees, caller, callee);
                self.stats.call_edges += 1;
            }
        }
    }

    fn discover_overrides(&mut self, universe: &Universe, method: &MethodInfo) {
        if method.def.is_constructor() || !method.def.is_virtual() {
            return;
        }

        for reference in &method.def.overrides {
            match universe.resolve(reference) {
                Some(base) => self.link(method.id, base),
                None => {
                    self.stats.unresolved_overrides += 1;
                    self.misses.push(ResolutionMiss {
                        kind: MissKind::OverrideBase,
                        context: method.signature.clone(),
                        target: reference.signature(),
                    });
                }
            }
        }

        let declaring = method.declaring_type;
        let candidates = universe
            .ancestors(declaring)
            .into_iter()
            .chain(universe.all_interfaces(declaring));

        for candidate_type in candidates {
            for &candidate in &universe.type_info(candidate_type).methods {
                let base = universe.method(candidate);
                if base.def.is_virtual()
                    && !base.def.is_constructor()
                    && method.def.matches_structurally(&base.def)
                {
                    self.link(method.id, candidate);
                }
            }
        }
    }

    fn link(&mut self, derived: MethodId, base: MethodId) {
        if derived == base {
            return;
        }
        if insert_edge(&mut self.overridden_by, base, derived) {
            insert_edge(&mut self.overrides, derived, base);
            self.stats.override_edges += 1;
        }
    }

    /// Returns the methods whose body references `callee`, in declaration order.
    pub fn callers(&self, callee: MethodId) -> impl Iterator<Item = MethodId> + '_ {
        self.callers.get(&callee).into_iter().flatten().copied()
    }

    /// Returns the methods referenced by the body of `caller`, in declaration order.
    pub fn callees(&self, caller: MethodId) -> impl Iterator<Item = MethodId> + '_ {
        self.callees.get(&caller).into_iter().flatten().copied()
    }

    /// Returns the methods that directly override or implement `base`.
    pub fn overridden_by(&self, base: MethodId) -> impl Iterator<Item = MethodId> + '_ {
        self.overridden_by.get(&base).into_iter().flatten().copied()
    }

    /// Returns the methods directly overridden or implemented by `derived`.
    pub fn overrides(&self, derived: MethodId) -> impl Iterator<Item = MethodId> + '_ {
        self.overrides.get(&derived).into_iter().flatten().copied()
    }

    /// Returns every method in the transitive inheritance graph of `method`, excluding
    /// `method` itself.
    ///
    /// The graph is followed through `overrides` and `overridden_by` alternately until no
    /// new method is discovered, so siblings overriding a common base are included. The
    /// result is sorted in declaration order.
    #[must_use]
    pub fn inheritance_graph(&self, method: MethodId) -> Vec<MethodId> {
        let components = self.components.get_or_init(|| self.compute_components());
        components
            .index
            .get(&method)
            .map(|&component| {
                components.members[component]
                    .iter()
                    .copied()
                    .filter(|&m| m != method)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn compute_components(&self) -> InheritanceComponents {
        let mut components = InheritanceComponents::default();
        let roots: BTreeSet<MethodId> = self
            .overrides
            .keys()
            .chain(self.overridden_by.keys())
            .copied()
            .collect();

        for root in roots {
            if components.index.contains_key(&root) {
                continue;
            }

            let component = components.members.len();
            let mut members = Vec::new();
            let mut visited = HashSet::from([root]);
            let mut queue = VecDeque::from([root]);

            while let Some(current) = queue.pop_front() {
                members.push(current);
                for next in self.overrides(current).chain(self.overridden_by(current)) {
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }

            members.sort_unstable();
            for &member in &members {
                components.index.insert(member, component);
            }
            components.members.push(members);
        }

        log::debug!(
            "relations: {} inheritance components",
            components.members.len()
        );
        components
    }

    /// Returns references that could not be resolved while building the map.
    #[must_use]
    pub fn misses(&self) -> &[ResolutionMiss] {
        &self.misses
    }

    /// Returns statistics about the relation map.
    #[must_use]
    pub fn stats(&self) -> RelationStats {
        self.stats.clone()
    }
}

/// Statistics about a relation map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationStats {
    /// Number of methods scanned
    pub methods: usize,
    /// Number of distinct caller/callee edges
    pub call_edges: usize,
    /// Number of distinct derived/base edges
    pub override_edges: usize,
    /// Number of call-like operands that did not resolve
    pub unresolved_calls: usize,
    /// Number of explicit override references that did not resolve
    pub unresolved_overrides: usize,
    /// Number of call operands dropped because the pair is ignored
    pub ignored_calls: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::Instruction,
        metadata::{AssemblyDef, MethodDef, MethodRef, TypeDef, TypeSig},
        test::factories::{id, relations},
    };

    #[test]
    fn test_call_edges_and_misses() {
        let universe = Universe::new(vec![AssemblyDef::new("A").with_type(
            TypeDef::class("N", "T")
                .with_method(MethodDef::new("Caller").body(vec![
                    Instruction::call(0, MethodRef::new("N.T", "Callee")),
                    Instruction::call(5, MethodRef::new("N.T", "Callee")),
                    Instruction::call(10, MethodRef::new("System.Int32[]", "Get")),
                ]))
                .with_method(MethodDef::new("Callee")),
        )]);
        let map = relations(&universe);
        let caller = id(&universe, "System.Void N.T::Caller()");
        let callee = id(&universe, "System.Void N.T::Callee()");

        assert_eq!(map.callers(callee).collect::<Vec<_>>(), vec![caller]);
        assert_eq!(map.callees(caller).collect::<Vec<_>>(), vec![callee]);
        assert_eq!(map.stats().call_edges, 1);
        assert_eq!(map.stats().unresolved_calls, 1);
        assert_eq!(map.misses()[0].kind, MissKind::CallTarget);
        assert_eq!(map.misses()[0].target, "System.Void System.Int32[]::Get()");
    }

    #[test]
    fn test_ignored_calls_are_dropped() {
        let universe = Universe::new(vec![AssemblyDef::new("A").with_type(
            TypeDef::class("N", "T")
                .with_method(
                    MethodDef::new("Caller")
                        .body(vec![Instruction::call(0, MethodRef::new("N.T", "Callee"))]),
                )
                .with_method(MethodDef::new("Callee")),
        )]);
        let caller = id(&universe, "System.Void N.T::Caller()");
        let callee = id(&universe, "System.Void N.T::Callee()");

        let ignored: IgnoredCalls = [(caller, callee)].into_iter().collect();
        let map = MethodRelationMap::build(&universe, &ignored);
        assert_eq!(map.callers(callee).count(), 0);
        assert_eq!(map.stats().ignored_calls, 1);
    }

    #[test]
    fn test_structural_override_through_base_chain() {
        let universe = Universe::new(vec![AssemblyDef::new("A")
            .with_type(TypeDef::class("N", "Root").with_method(MethodDef::new("Run").as_virtual()))
            .with_type(TypeDef::class("N", "Middle").with_base("N.Root"))
            .with_type(
                TypeDef::class("N", "Leaf")
                    .with_base("N.Middle")
                    .with_method(MethodDef::new("Run").as_virtual())
                    .with_method(MethodDef::constructor(&[])),
            )]);
        let map = relations(&universe);
        let root = id(&universe, "System.Void N.Root::Run()");
        let leaf = id(&universe, "System.Void N.Leaf::Run()");

        assert_eq!(map.overrides(leaf).collect::<Vec<_>>(), vec![root]);
        assert_eq!(map.overridden_by(root).collect::<Vec<_>>(), vec![leaf]);
    }

    #[test]
    fn test_non_virtual_and_constructors_are_skipped() {
        let universe = Universe::new(vec![AssemblyDef::new("A")
            .with_type(
                TypeDef::class("N", "Root")
                    .with_method(MethodDef::new("Run"))
                    .with_method(MethodDef::constructor(&[]).as_virtual()),
            )
            .with_type(
                TypeDef::class("N", "Leaf")
                    .with_base("N.Root")
                    .with_method(MethodDef::new("Run").as_virtual())
                    .with_method(MethodDef::constructor(&[]).as_virtual()),
            )]);
        let map = relations(&universe);
        assert_eq!(map.stats().override_edges, 0);
    }

    #[test]
    fn test_interface_implementation_and_explicit_override() {
        let int = TypeSig::named("System.Int32");
        let universe = Universe::new(vec![AssemblyDef::new("A")
            .with_type(
                TypeDef::interface("N", "IReader")
                    .with_method(MethodDef::new("Read").returns(int.clone()).as_abstract()),
            )
            .with_type(
                TypeDef::class("N", "Reader")
                    .with_interface("N.IReader")
                    .with_method(MethodDef::new("Read").returns(int.clone()).as_virtual())
                    .with_method(
                        MethodDef::new("N.IReader.Read")
                            .returns(int.clone())
                            .as_virtual()
                            .overriding(MethodRef::new("N.IReader", "Read").returns(int.clone())),
                    ),
            )]);
        let map = relations(&universe);
        let interface = id(&universe, "System.Int32 N.IReader::Read()");
        let implicit = id(&universe, "System.Int32 N.Reader::Read()");
        let explicit = id(&universe, "System.Int32 N.Reader::N.IReader.Read()");

        assert_eq!(
            map.overridden_by(interface).collect::<Vec<_>>(),
            vec![implicit, explicit]
        );
    }

    #[test]
    fn test_unresolved_explicit_override_is_a_miss() {
        let universe = Universe::new(vec![AssemblyDef::new("A").with_type(
            TypeDef::class("N", "T").with_method(
                MethodDef::new("Dispose")
                    .as_virtual()
                    .overriding(MethodRef::new("System.IDisposable", "Dispose")),
            ),
        )]);
        let map = relations(&universe);
        assert_eq!(map.stats().unresolved_overrides, 1);
        assert_eq!(map.misses()[0].kind, MissKind::OverrideBase);
    }

    #[test]
    fn test_inheritance_graph_includes_siblings() {
        let universe = Universe::new(vec![AssemblyDef::new("A")
            .with_type(TypeDef::class("N", "Base").with_method(MethodDef::new("V").as_virtual()))
            .with_type(
                TypeDef::class("N", "Left")
                    .with_base("N.Base")
                    .with_method(MethodDef::new("V").as_virtual()),
            )
            .with_type(
                TypeDef::class("N", "Right")
                    .with_base("N.Base")
                    .with_method(MethodDef::new("V").as_virtual()),
            )
            .with_type(TypeDef::class("N", "Alone").with_method(MethodDef::new("V").as_virtual()))]);
        let map = relations(&universe);
        let base = id(&universe, "System.Void N.Base::V()");
        let left = id(&universe, "System.Void N.Left::V()");
        let right = id(&universe, "System.Void N.Right::V()");
        let alone = id(&universe, "System.Void N.Alone::V()");

        assert_eq!(map.inheritance_graph(left), vec![base, right]);
        assert_eq!(map.inheritance_graph(base), vec![left, right]);
        assert!(map.inheritance_graph(alone).is_empty());
    }

    #[test]
    fn test_inheritance_graph_terminates_on_cycles() {
        let universe = Universe::new(vec![AssemblyDef::new("A")
            .with_type(
                TypeDef::class("N", "A").with_method(
                    MethodDef::new("M").as_virtual().overriding(MethodRef::new("N.B", "M")),
                ),
            )
            .with_type(
                TypeDef::class("N", "B").with_method(
                    MethodDef::new("M").as_virtual().overriding(MethodRef::new("N.C", "M")),
                ),
            )
            .with_type(
                TypeDef::class("N", "C").with_method(
                    MethodDef::new("M").as_virtual().overriding(MethodRef::new("N.A", "M")),
                ),
            )]);
        let map = relations(&universe);
        let a = id(&universe, "System.Void N.A::M()");
        let b = id(&universe, "System.Void N.B::M()");
        let c = id(&universe, "System.Void N.C::M()");

        assert_eq!(map.stats().override_edges, 3);
        assert_eq!(map.inheritance_graph(a), vec![b, c]);
        assert_eq!(map.inheritance_graph(c), vec![a, b]);
    }
}
