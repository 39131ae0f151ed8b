//! Fixed-point propagation of the critical requirement.
//!
//! The [`PropagationEngine`] is seeded with every member of a critical type and every
//! intrinsically critical method, then drains a FIFO worklist. For each dequeued method `m`:
//!
//! - If `m` may remain SafeCritical, an inheritance-cascade reason is a fatal conflict, and a
//!   method whose only reason is its own privilege need is not expanded further.
//! - If `m` lives in a transparent type and is not SafeCritical, its entire inheritance graph
//!   becomes critical, since an override slot and all its implementations must agree.
//! - Every caller of `m` that is not SafeCritical becomes critical.
//!
//! After the worklist drains, members of critical types are removed from the result unless
//! an inheritance cascade forced them individually; the type-level marker covers the rest.
//!
//! # Determinism
//!
//! Seeds are enqueued in declaration order and all relation queries iterate in declaration
//! order, so the first reason recorded for each method is stable across runs. Reports only
//! ever use the first reason.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet, VecDeque},
    fmt::Write,
};

use crate::{
    analysis::{IntrinsicFinding, MethodRelationMap},
    config::ResolvedConfig,
    metadata::{MethodId, Universe},
    utils::escape_dot,
    Error, Result,
};

/// Why a method was found to be critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropagationReason {
    /// The method calls a critical method
    Call {
        /// The critical callee
        callee: MethodId,
    },
    /// The method shares an inheritance graph with a critical method of a transparent type
    InheritanceSibling {
        /// The critical method that caused the cascade
        via: MethodId,
    },
    /// The method is declared in a critical type
    InCriticalType,
    /// The method requires privilege itself
    RequiresPrivilege,
}

impl PropagationReason {
    /// Returns the method this reason points at, if any.
    #[must_use]
    pub fn cause(&self) -> Option<MethodId> {
        match self {
            PropagationReason::Call { callee } => Some(*callee),
            PropagationReason::InheritanceSibling { via } => Some(*via),
            PropagationReason::InCriticalType | PropagationReason::RequiresPrivilege => None,
        }
    }

    /// Returns `true` for inheritance-cascade reasons
    #[must_use]
    pub fn is_inheritance(&self) -> bool {
        matches!(self, PropagationReason::InheritanceSibling { .. })
    }
}

/// One step of an explanation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    /// The method being explained
    pub method: MethodId,
    /// Its first recorded reason
    pub reason: PropagationReason,
}

/// Statistics about a propagation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Methods enqueued during initialization
    pub seeds: usize,
    /// Methods expanded by the worklist
    pub iterations: usize,
    /// SafeCritical methods that were not expanded
    pub stopped: usize,
    /// Inheritance-cascade reasons recorded
    pub cascades: usize,
    /// Call reasons recorded
    pub calls: usize,
    /// Critical-type members removed by the final filter
    pub filtered: usize,
}

/// Mutable state owned by a single [`PropagationEngine::run`].
#[derive(Default)]
struct RunState {
    critical: BTreeSet<MethodId>,
    reasons: BTreeMap<MethodId, Vec<PropagationReason>>,
    worklist: VecDeque<MethodId>,
    processed: HashSet<MethodId>,
    stats: PropagationStats,
}

impl RunState {
    /// Appends `reason` to the history of `method` and enqueues it.
    ///
    /// Returns `true` if the reason was not recorded before.
    fn record(&mut self, method: MethodId, reason: PropagationReason) -> bool {
        let history = self.reasons.entry(method).or_default();
        if history.contains(&reason) {
            return false;
        }
        history.push(reason);
        self.worklist.push_back(method);
        true
    }
}

/// Worklist engine computing the final critical set.
pub struct PropagationEngine<'a> {
    universe: &'a Universe,
    relations: &'a MethodRelationMap,
    config: &'a ResolvedConfig,
}

impl<'a> PropagationEngine<'a> {
    /// Creates an engine over a universe, its relation map and a resolved configuration.
    #[must_use]
    pub fn new(
        universe: &'a Universe,
        relations: &'a MethodRelationMap,
        config: &'a ResolvedConfig,
    ) -> Self {
        PropagationEngine {
            universe,
            relations,
            config,
        }
    }

    /// Runs propagation to a fixed point.
    ///
    /// # Arguments
    ///
    /// * `intrinsic` - Intrinsically critical methods, as found by
    ///   [`crate::analysis::IntrinsicDetector`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::SafeCriticalConflict`] if a method allowed to remain SafeCritical
    /// shares an inheritance graph with a critical method of a transparent type.
    pub fn run(
        &self,
        intrinsic: &BTreeMap<MethodId, IntrinsicFinding>,
    ) -> Result<PropagationResult> {
        let mut state = RunState::default();

        for &ty in &self.config.critical_types {
            for &method in &self.universe.type_info(ty).methods {
                state.record(method, PropagationReason::InCriticalType);
            }
        }
        for &method in intrinsic.keys() {
            state.record(method, PropagationReason::RequiresPrivilege);
        }
        state.stats.seeds = state.worklist.len();
        log::debug!("propagation: {} seeds", state.stats.seeds);

        while let Some(method) = state.worklist.pop_front() {
            if !state.processed.insert(method) {
                continue;
            }
            state.stats.iterations += 1;
            self.expand(method, &mut state)?;
        }

        // Cascades can reach a SafeCritical method after it was processed.
        for &method in &self.config.safe_critical {
            self.check_safe_critical(method, &state)?;
        }

        let before = state.critical.len();
        let critical_types = &self.config.critical_types;
        let reasons = &state.reasons;
        state.critical.retain(|&m| {
            !critical_types.contains(&self.universe.method(m).declaring_type)
                || reasons
                    .get(&m)
                    .is_some_and(|r| r.iter().any(PropagationReason::is_inheritance))
        });
        state.stats.filtered = before - state.critical.len();

        log::debug!(
            "propagation: {} critical after {} iterations ({} cascades, {} filtered)",
            state.critical.len(),
            state.stats.iterations,
            state.stats.cascades,
            state.stats.filtered
        );

        Ok(PropagationResult {
            critical: state.critical,
            reasons: state.reasons,
            privileged: intrinsic
                .iter()
                .map(|(&m, finding)| (m, finding.comment.clone()))
                .collect(),
            stats: state.stats,
        })
    }

    fn expand(&self, method: MethodId, state: &mut RunState) -> Result<()> {
        let safe_critical = self.config.is_safe_critical(method);

        if safe_critical {
            self.check_safe_critical(method, state)?;

            let only_itself = state.reasons.get(&method).is_some_and(|reasons| {
                reasons
                    .iter()
                    .all(|r| *r == PropagationReason::RequiresPrivilege)
            });
            if only_itself {
                log::trace!(
                    "propagation: {} stays SafeCritical",
                    self.universe.method(method).signature
                );
                state.stats.stopped += 1;
                return Ok(());
            }
        }

        let declaring_type = self.universe.method(method).declaring_type;
        if !safe_critical && !self.config.is_critical_type(declaring_type) {
            for sibling in self.relations.inheritance_graph(method) {
                if state.record(sibling, PropagationReason::InheritanceSibling { via: method }) {
                    state.stats.cascades += 1;
                }
            }
        }

        for caller in self.relations.callers(method) {
            if caller == method || self.config.is_safe_critical(caller) {
                continue;
            }
            if state.record(caller, PropagationReason::Call { callee: method }) {
                state.stats.calls += 1;
            }
        }

        log::trace!(
            "propagation: {} is critical",
            self.universe.method(method).signature
        );
        state.critical.insert(method);
        Ok(())
    }

    fn check_safe_critical(&self, method: MethodId, state: &RunState) -> Result<()> {
        let via = state.reasons.get(&method).and_then(|reasons| {
            reasons.iter().find_map(|r| match r {
                PropagationReason::InheritanceSibling { via } => Some(*via),
                _ => None,
            })
        });

        match via {
            Some(via) => Err(Error::SafeCriticalConflict {
                method: self.universe.method(method).signature.clone(),
                via: self.universe.method(via).signature.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// The outcome of a propagation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationResult {
    critical: BTreeSet<MethodId>,
    reasons: BTreeMap<MethodId, Vec<PropagationReason>>,
    privileged: BTreeMap<MethodId, String>,
    stats: PropagationStats,
}

impl PropagationResult {
    /// Returns the methods that must be individually marked Critical, in declaration order.
    #[must_use]
    pub fn critical(&self) -> &BTreeSet<MethodId> {
        &self.critical
    }

    /// Returns `true` if `method` must be individually marked Critical
    #[must_use]
    pub fn is_critical(&self, method: MethodId) -> bool {
        self.critical.contains(&method)
    }

    /// Returns every reason recorded for `method`, in discovery order.
    ///
    /// Methods removed by the final filter and SafeCritical methods that were not expanded
    /// keep their history.
    #[must_use]
    pub fn reasons(&self, method: MethodId) -> &[PropagationReason] {
        self.reasons
            .get(&method)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the canonical (first) reason for `method`
    #[must_use]
    pub fn first_reason(&self, method: MethodId) -> Option<PropagationReason> {
        self.reasons(method).first().copied()
    }

    /// Returns the full reason history of all methods
    #[must_use]
    pub fn reason_graph(&self) -> &BTreeMap<MethodId, Vec<PropagationReason>> {
        &self.reasons
    }

    /// Returns statistics about the run
    #[must_use]
    pub fn stats(&self) -> &PropagationStats {
        &self.stats
    }

    /// Follows first reasons from `method` down to an intrinsic or type-level cause.
    ///
    /// The chain stops at the first revisited method, so it is finite even when call and
    /// inheritance edges form a cycle.
    #[must_use]
    pub fn explain(&self, method: MethodId) -> Vec<ChainLink> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(method);

        while let Some(m) = current {
            if !visited.insert(m) {
                break;
            }
            let Some(reason) = self.first_reason(m) else {
                break;
            };
            chain.push(ChainLink { method: m, reason });
            current = reason.cause();
        }
        chain
    }

    /// Renders the explanation chain of `method` as a single line.
    #[must_use]
    pub fn explain_string(&self, universe: &Universe, method: MethodId) -> String {
        self.explain(method)
            .iter()
            .map(|link| self.describe(universe, link))
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    fn describe(&self, universe: &Universe, link: &ChainLink) -> String {
        match link.reason {
            PropagationReason::Call { callee } => {
                format!("calls {}", universe.display_name(callee))
            }
            PropagationReason::InheritanceSibling { via } => {
                format!("same inheritance graph as {}", universe.display_name(via))
            }
            PropagationReason::InCriticalType => format!(
                "member of critical type {}",
                universe.declaring_type(link.method).full_name
            ),
            PropagationReason::RequiresPrivilege => match self.privileged.get(&link.method) {
                Some(comment) => format!("requires privilege ({comment})"),
                None => "requires privilege".to_string(),
            },
        }
    }

    /// Generates a DOT representation of the reason graph.
    ///
    /// Every method with a recorded reason is a node; critical methods are filled.
    /// Call and inheritance reasons become edges from the method to its cause.
    #[must_use]
    pub fn to_dot(&self, universe: &Universe) -> String {
        let mut dot = String::new();

        dot.push_str("digraph ReasonGraph {\n");
        dot.push_str("    label=\"Critical Propagation\";\n");
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    edge [fontname=\"Courier\", fontsize=9];\n");
        dot.push_str("    rankdir=BT;\n\n");

        for (&method, reasons) in &self.reasons {
            let style = if self.critical.contains(&method) {
                ", style=filled, fillcolor=lightcoral"
            } else if reasons.contains(&PropagationReason::RequiresPrivilege) {
                ", style=filled, fillcolor=lightyellow"
            } else {
                ""
            };
            let _ = writeln!(
                dot,
                "    \"{method}\" [label=\"{}\"{style}];",
                escape_dot(&universe.display_name(method)),
            );
        }

        dot.push('\n');

        for (&method, reasons) in &self.reasons {
            for reason in reasons {
                match reason {
                    PropagationReason::Call { callee } => {
                        let _ = writeln!(dot, "    \"{method}\" -> \"{callee}\" [label=\"call\"];");
                    }
                    PropagationReason::InheritanceSibling { via } => {
                        let _ = writeln!(
                            dot,
                            "    \"{method}\" -> \"{via}\" [label=\"inherit\", style=dashed];"
                        );
                    }
                    PropagationReason::InCriticalType | PropagationReason::RequiresPrivilege => {}
                }
            }
        }

        dot.push_str("}\n");
        dot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::IntrinsicRule,
        assembly::Instruction,
        config::AnalysisConfig,
        metadata::{AssemblyDef, MethodDef, MethodRef, TypeDef},
        test::factories::{id, relations},
    };

    fn pinvoke(methods: &[MethodId]) -> BTreeMap<MethodId, IntrinsicFinding> {
        methods
            .iter()
            .map(|&m| {
                (
                    m,
                    IntrinsicFinding::new(IntrinsicRule::PInvoke, "p/invoke declaration"),
                )
            })
            .collect()
    }

    fn chain_universe() -> Universe {
        Universe::new(vec![AssemblyDef::new("A").with_type(
            TypeDef::class("N", "T")
                .with_method(
                    MethodDef::new("Top")
                        .body(vec![Instruction::call(0, MethodRef::new("N.T", "Middle"))]),
                )
                .with_method(
                    MethodDef::new("Middle")
                        .body(vec![Instruction::call(0, MethodRef::new("N.T", "Native"))]),
                )
                .with_method(MethodDef::new("Native").as_static().as_pinvoke()),
        )])
    }

    #[test]
    fn test_call_chain_reasons() {
        let universe = chain_universe();
        let map = relations(&universe);
        let config = ResolvedConfig::default();
        let top = id(&universe, "System.Void N.T::Top()");
        let middle = id(&universe, "System.Void N.T::Middle()");
        let native = id(&universe, "System.Void N.T::Native()");

        let result = PropagationEngine::new(&universe, &map, &config)
            .run(&pinvoke(&[native]))
            .unwrap();

        assert_eq!(result.critical().iter().copied().collect::<Vec<_>>(), vec![top, middle, native]);
        assert_eq!(result.first_reason(native), Some(PropagationReason::RequiresPrivilege));
        assert_eq!(
            result.first_reason(middle),
            Some(PropagationReason::Call { callee: native })
        );
        assert_eq!(
            result.explain_string(&universe, top),
            "calls N.T::Middle -> calls N.T::Native -> requires privilege (p/invoke declaration)"
        );
        assert_eq!(result.stats().seeds, 1);
        assert_eq!(result.stats().iterations, 3);
    }

    #[test]
    fn test_safe_critical_stops_propagation() {
        let universe = chain_universe();
        let map = relations(&universe);
        let native = id(&universe, "System.Void N.T::Native()");
        let config = AnalysisConfig::new()
            .with_safe_critical("System.Void N.T::Native()")
            .resolve(&universe);

        let result = PropagationEngine::new(&universe, &map, &config)
            .run(&pinvoke(&[native]))
            .unwrap();

        assert!(result.critical().is_empty());
        assert_eq!(result.stats().stopped, 1);
        assert_eq!(result.reasons(native), &[PropagationReason::RequiresPrivilege]);
    }

    #[test]
    fn test_safe_critical_caller_is_not_escalated() {
        let universe = chain_universe();
        let map = relations(&universe);
        let native = id(&universe, "System.Void N.T::Native()");
        let top = id(&universe, "System.Void N.T::Top()");
        let config = AnalysisConfig::new()
            .with_safe_critical("System.Void N.T::Middle()")
            .resolve(&universe);

        let result = PropagationEngine::new(&universe, &map, &config)
            .run(&pinvoke(&[native]))
            .unwrap();

        assert_eq!(result.critical().iter().copied().collect::<Vec<_>>(), vec![native]);
        assert!(result.reasons(top).is_empty());
    }

    #[test]
    fn test_safe_critical_with_other_reasons_still_reaches_callers() {
        let universe = Universe::new(vec![AssemblyDef::new("A")
            .with_type(
                TypeDef::class("N", "Vault").with_method(MethodDef::new("Open").as_virtual().as_pinvoke()),
            )
            .with_type(
                TypeDef::class("N", "Leaf")
                    .with_base("N.Vault")
                    .with_method(MethodDef::new("Open").as_virtual()),
            )
            .with_type(
                TypeDef::class("N", "Client").with_method(
                    MethodDef::new("Use")
                        .body(vec![Instruction::call(0, MethodRef::new("N.Vault", "Open"))]),
                ),
            )]);
        let map = relations(&universe);
        let config = AnalysisConfig::new()
            .with_critical_type("N.Vault")
            .with_safe_critical("System.Void N.Vault::Open()")
            .resolve(&universe);
        let open = id(&universe, "System.Void N.Vault::Open()");
        let leaf = id(&universe, "System.Void N.Leaf::Open()");
        let used = id(&universe, "System.Void N.Client::Use()");

        let result = PropagationEngine::new(&universe, &map, &config)
            .run(&pinvoke(&[open]))
            .unwrap();

        assert_eq!(
            result.reasons(open),
            &[PropagationReason::InCriticalType, PropagationReason::RequiresPrivilege]
        );
        assert_eq!(result.reasons(used), &[PropagationReason::Call { callee: open }]);
        assert!(result.is_critical(used));
        assert!(result.reasons(leaf).is_empty());
        assert!(!result.is_critical(leaf));
        assert_eq!(result.stats().stopped, 0);
        assert_eq!(result.stats().cascades, 0);
    }

    #[test]
    fn test_critical_type_members_are_filtered() {
        let universe = Universe::new(vec![AssemblyDef::new("A")
            .with_type(
                TypeDef::class("N", "Vault")
                    .with_method(MethodDef::new("Open"))
                    .with_method(MethodDef::new("Close")),
            )
            .with_type(
                TypeDef::class("N", "Client").with_method(
                    MethodDef::new("Use")
                        .body(vec![Instruction::call(0, MethodRef::new("N.Vault", "Open"))]),
                ),
            )]);
        let map = relations(&universe);
        let config = AnalysisConfig::new()
            .with_critical_type("N.Vault")
            .resolve(&universe);

        let result = PropagationEngine::new(&universe, &map, &config)
            .run(&BTreeMap::new())
            .unwrap();
        let open = id(&universe, "System.Void N.Vault::Open()");
        let used = id(&universe, "System.Void N.Client::Use()");

        assert_eq!(result.critical().iter().copied().collect::<Vec<_>>(), vec![used]);
        assert_eq!(result.stats().filtered, 2);
        assert_eq!(result.first_reason(open), Some(PropagationReason::InCriticalType));
        assert_eq!(
            result.explain_string(&universe, used),
            "calls N.Vault::Open -> member of critical type N.Vault"
        );
    }

    #[test]
    fn test_cascade_keeps_critical_type_peer() {
        let universe = Universe::new(vec![AssemblyDef::new("A")
            .with_type(TypeDef::class("N", "Vault").with_method(MethodDef::new("Run").as_virtual()))
            .with_type(
                TypeDef::class("N", "Leaf")
                    .with_base("N.Vault")
                    .with_method(MethodDef::new("Run").as_virtual().as_pinvoke()),
            )]);
        let map = relations(&universe);
        let config = AnalysisConfig::new()
            .with_critical_type("N.Vault")
            .resolve(&universe);
        let base = id(&universe, "System.Void N.Vault::Run()");
        let leaf = id(&universe, "System.Void N.Leaf::Run()");

        let result = PropagationEngine::new(&universe, &map, &config)
            .run(&pinvoke(&[leaf]))
            .unwrap();

        assert!(result.is_critical(base));
        assert!(result.is_critical(leaf));
        assert_eq!(
            result.reasons(base),
            &[
                PropagationReason::InCriticalType,
                PropagationReason::InheritanceSibling { via: leaf }
            ]
        );
    }

    #[test]
    fn test_safe_critical_inheritance_conflict() {
        let universe = Universe::new(vec![AssemblyDef::new("A")
            .with_type(TypeDef::class("N", "Base").with_method(MethodDef::new("Run").as_virtual()))
            .with_type(
                TypeDef::class("N", "Leaf")
                    .with_base("N.Base")
                    .with_method(MethodDef::new("Run").as_virtual().as_pinvoke()),
            )]);
        let map = relations(&universe);
        let config = AnalysisConfig::new()
            .with_safe_critical("System.Void N.Base::Run()")
            .resolve(&universe);
        let leaf = id(&universe, "System.Void N.Leaf::Run()");

        let err = PropagationEngine::new(&universe, &map, &config)
            .run(&pinvoke(&[leaf]))
            .unwrap_err();
        match err {
            Error::SafeCriticalConflict { method, via } => {
                assert_eq!(method, "System.Void N.Base::Run()");
                assert_eq!(via, "System.Void N.Leaf::Run()");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_late_cascade_into_processed_safe_critical() {
        // The SafeCritical base is processed first and stopped; the cascade from the leaf
        // arrives after it left the worklist.
        let universe = Universe::new(vec![AssemblyDef::new("A")
            .with_type(
                TypeDef::class("N", "Base").with_method(MethodDef::new("Run").as_virtual().as_pinvoke()),
            )
            .with_type(
                TypeDef::class("N", "Leaf")
                    .with_base("N.Base")
                    .with_method(MethodDef::new("Run").as_virtual().as_pinvoke()),
            )]);
        let map = relations(&universe);
        let config = AnalysisConfig::new()
            .with_safe_critical("System.Void N.Base::Run()")
            .resolve(&universe);
        let base = id(&universe, "System.Void N.Base::Run()");
        let leaf = id(&universe, "System.Void N.Leaf::Run()");

        let err = PropagationEngine::new(&universe, &map, &config)
            .run(&pinvoke(&[base, leaf]))
            .unwrap_err();
        assert!(matches!(err, Error::SafeCriticalConflict { .. }));
    }

    #[test]
    fn test_explain_terminates_on_cycles() {
        let universe = Universe::new(vec![AssemblyDef::new("A").with_type(
            TypeDef::class("N", "T")
                .with_method(
                    MethodDef::new("Ping")
                        .body(vec![Instruction::call(0, MethodRef::new("N.T", "Pong"))]),
                )
                .with_method(MethodDef::new("Pong").body(vec![
                    Instruction::call(0, MethodRef::new("N.T", "Ping")),
                    Instruction::call(5, MethodRef::new("N.T", "Native")),
                ]))
                .with_method(MethodDef::new("Native").as_pinvoke()),
        )]);
        let map = relations(&universe);
        let config = ResolvedConfig::default();
        let native = id(&universe, "System.Void N.T::Native()");
        let ping = id(&universe, "System.Void N.T::Ping()");

        let result = PropagationEngine::new(&universe, &map, &config)
            .run(&pinvoke(&[native]))
            .unwrap();

        assert_eq!(result.critical().len(), 3);
        let chain = result.explain(ping);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[2].reason, PropagationReason::RequiresPrivilege);
    }

    #[test]
    fn test_to_dot() {
        let universe = chain_universe();
        let map = relations(&universe);
        let config = ResolvedConfig::default();
        let native = id(&universe, "System.Void N.T::Native()");

        let result = PropagationEngine::new(&universe, &map, &config)
            .run(&pinvoke(&[native]))
            .unwrap();
        let dot = result.to_dot(&universe);

        assert!(dot.starts_with("digraph ReasonGraph {"));
        assert!(dot.contains("\"M#1\" -> \"M#2\" [label=\"call\"];"));
        assert!(dot.contains("label=\"N.T::Native\", style=filled, fillcolor=lightcoral"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
