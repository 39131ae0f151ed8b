//! Analysis configuration.
//!
//! An [`AnalysisConfig`] holds the externally supplied, name-based inputs of a run: which
//! types are unconditionally critical, which methods may stay SafeCritical, which calls to
//! ignore while building the call graph, and which methods were manually reviewed. It is
//! resolved against a [`Universe`] into a [`ResolvedConfig`] of identifiers before the
//! analysis starts.
//!
//! # List Format
//!
//! Every list is plain text with one entry per line. Blank lines and lines starting with
//! `#` are skipped. Ignored calls are written as `<caller signature> => <callee signature>`.
//!
//! ```text
//! # unconditionally critical
//! System.Runtime.InteropServices.SafeHandle
//! System.Security.SecurityManager
//! ```

use std::{
    collections::{BTreeSet, HashSet},
    path::Path,
};

use crate::{
    metadata::{MethodId, MissKind, ResolutionMiss, TypeId, Universe},
    Error, Result,
};

/// Separator between caller and callee in ignored-call lists
pub const IGNORED_CALL_SEPARATOR: &str = "=>";

/// Caller/callee pairs excluded from call-graph construction.
pub type IgnoredCalls = HashSet<(MethodId, MethodId)>;

/// Name-based configuration of an analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Full names of types whose members are unconditionally critical
    pub critical_types: Vec<String>,

    /// Signatures of methods that may remain SafeCritical
    pub safe_critical: Vec<String>,

    /// (caller, callee) signature pairs ignored while building the call graph
    pub ignored_calls: Vec<(String, String)>,

    /// Signatures of methods that were manually reviewed (report only)
    pub reviewed: Vec<String>,

    /// Run the intrinsic-privilege pre-pass on the rayon thread pool
    pub parallel_detection: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            critical_types: Vec::new(),
            safe_critical: Vec::new(),
            ignored_calls: Vec::new(),
            reviewed: Vec::new(),
            parallel_detection: true,
        }
    }
}

impl AnalysisConfig {
    /// Creates an empty configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a critical type
    #[must_use]
    pub fn with_critical_type(mut self, full_name: &str) -> Self {
        self.critical_types.push(full_name.to_string());
        self
    }

    /// Adds a method that may remain SafeCritical
    #[must_use]
    pub fn with_safe_critical(mut self, signature: &str) -> Self {
        self.safe_critical.push(signature.to_string());
        self
    }

    /// Adds an ignored call
    #[must_use]
    pub fn with_ignored_call(mut self, caller: &str, callee: &str) -> Self {
        self.ignored_calls
            .push((caller.to_string(), callee.to_string()));
        self
    }

    /// Adds a reviewed method
    #[must_use]
    pub fn with_reviewed(mut self, signature: &str) -> Self {
        self.reviewed.push(signature.to_string());
        self
    }

    /// Disables parallel detection
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.parallel_detection = false;
        self
    }

    /// Parses a plain list, skipping blank lines and `#` comments.
    #[must_use]
    pub fn parse_list(text: &str) -> Vec<String> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()
    }

    /// Parses an ignored-call list of `<caller> => <callee>` lines.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedConfig`] for a non-comment line without exactly one
    /// separator or with an empty side.
    pub fn parse_ignored_calls(text: &str) -> Result<Vec<(String, String)>> {
        let mut calls = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split(IGNORED_CALL_SEPARATOR);
            let (Some(caller), Some(callee), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(Error::MalformedConfig {
                    line: index + 1,
                    message: format!("expected '<caller> {IGNORED_CALL_SEPARATOR} <callee>'"),
                });
            };

            let (caller, callee) = (caller.trim(), callee.trim());
            if caller.is_empty() || callee.is_empty() {
                return Err(Error::MalformedConfig {
                    line: index + 1,
                    message: "empty caller or callee".to_string(),
                });
            }
            calls.push((caller.to_string(), callee.to_string()));
        }
        Ok(calls)
    }

    /// Reads a plain list from a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the file cannot be read.
    pub fn read_list(path: &Path) -> Result<Vec<String>> {
        Ok(Self::parse_list(&std::fs::read_to_string(path)?))
    }

    /// Reads an ignored-call list from a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the file cannot be read, or
    /// [`Error::MalformedConfig`] if a line is malformed.
    pub fn read_ignored_calls(path: &Path) -> Result<Vec<(String, String)>> {
        Self::parse_ignored_calls(&std::fs::read_to_string(path)?)
    }

    /// Resolves every configured name against `universe`.
    ///
    /// Names that do not resolve are recorded in [`ResolvedConfig::misses`] and logged; they
    /// never abort the analysis.
    #[must_use]
    pub fn resolve(&self, universe: &Universe) -> ResolvedConfig {
        let mut misses = Vec::new();
        let mut miss = |kind: MissKind, target: &str| {
            log::warn!("unresolved {kind:?} entry: {target}");
            misses.push(ResolutionMiss {
                kind,
                context: "configuration".to_string(),
                target: target.to_string(),
            });
        };

        let mut critical_types = BTreeSet::new();
        for name in &self.critical_types {
            match universe.find_type(name) {
                Some(id) => {
                    critical_types.insert(id);
                }
                None => miss(MissKind::CriticalType, name),
            }
        }

        let mut resolve_methods = |names: &[String], kind: MissKind| {
            let mut ids = BTreeSet::new();
            for name in names {
                match universe.find_method(name) {
                    Some(id) => {
                        ids.insert(id);
                    }
                    None => miss(kind, name),
                }
            }
            ids
        };
        let safe_critical = resolve_methods(&self.safe_critical, MissKind::SafeCriticalMethod);
        let reviewed = resolve_methods(&self.reviewed, MissKind::ReviewedMethod);

        let mut ignored_calls = IgnoredCalls::new();
        for (caller, callee) in &self.ignored_calls {
            match (universe.find_method(caller), universe.find_method(callee)) {
                (Some(caller), Some(callee)) => {
                    ignored_calls.insert((caller, callee));
                }
                _ => miss(
                    MissKind::IgnoredCall,
                    &format!("{caller} {IGNORED_CALL_SEPARATOR} {callee}"),
                ),
            }
        }

        ResolvedConfig {
            critical_types,
            safe_critical,
            ignored_calls,
            reviewed,
            parallel_detection: self.parallel_detection,
            misses,
        }
    }
}

/// Identifier-based configuration, resolved against one [`Universe`].
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    /// Types whose members are unconditionally critical
    pub critical_types: BTreeSet<TypeId>,
    /// Methods that may remain SafeCritical
    pub safe_critical: BTreeSet<MethodId>,
    /// Calls excluded from the call graph
    pub ignored_calls: IgnoredCalls,
    /// Manually reviewed methods
    pub reviewed: BTreeSet<MethodId>,
    /// Run the intrinsic-privilege pre-pass in parallel
    pub parallel_detection: bool,
    /// Names that could not be resolved
    pub misses: Vec<ResolutionMiss>,
}

impl ResolvedConfig {
    /// Returns `true` if `ty` is a critical type
    #[must_use]
    pub fn is_critical_type(&self, ty: TypeId) -> bool {
        self.critical_types.contains(&ty)
    }

    /// Returns `true` if `method` may remain SafeCritical
    #[must_use]
    pub fn is_safe_critical(&self, method: MethodId) -> bool {
        self.safe_critical.contains(&method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AssemblyDef, MethodDef, TypeDef};

    #[test]
    fn test_parse_list_skips_comments() {
        let text = "# header\n\nSystem.IO.File\n   System.GC  \n#System.Skipped\n";
        assert_eq!(
            AnalysisConfig::parse_list(text),
            vec!["System.IO.File".to_string(), "System.GC".to_string()]
        );
    }

    #[test]
    fn test_parse_ignored_calls() {
        let text = "# generated\nSystem.Void A::M() => System.Void B::N()\n";
        let calls = AnalysisConfig::parse_ignored_calls(text).unwrap();
        assert_eq!(
            calls,
            vec![("System.Void A::M()".to_string(), "System.Void B::N()".to_string())]
        );
    }

    #[test]
    fn test_parse_ignored_calls_malformed() {
        let err = AnalysisConfig::parse_ignored_calls("ok => ok\nno separator here").unwrap_err();
        assert!(matches!(err, Error::MalformedConfig { line: 2, .. }));

        let err = AnalysisConfig::parse_ignored_calls(" => callee").unwrap_err();
        assert!(matches!(err, Error::MalformedConfig { line: 1, .. }));

        let err = AnalysisConfig::parse_ignored_calls("a => b => c").unwrap_err();
        assert!(matches!(err, Error::MalformedConfig { line: 1, .. }));
    }

    #[test]
    fn test_resolve_collects_misses() {
        let universe = Universe::new(vec![AssemblyDef::new("A").with_type(
            TypeDef::class("N", "T")
                .with_method(MethodDef::new("M"))
                .with_method(MethodDef::new("K")),
        )]);

        let config = AnalysisConfig::new()
            .with_critical_type("N.T")
            .with_critical_type("N.Missing")
            .with_safe_critical("System.Void N.T::M()")
            .with_ignored_call("System.Void N.T::M()", "System.Void N.T::K()")
            .with_ignored_call("System.Void N.T::M()", "System.Void N.T::Gone()")
            .with_reviewed("System.Void N.T::K()");
        let resolved = config.resolve(&universe);

        assert_eq!(resolved.critical_types.len(), 1);
        assert_eq!(resolved.safe_critical.len(), 1);
        assert_eq!(resolved.ignored_calls.len(), 1);
        assert_eq!(resolved.reviewed.len(), 1);
        assert!(resolved.parallel_detection);

        let kinds: Vec<MissKind> = resolved.misses.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MissKind::CriticalType, MissKind::IgnoredCall]);
    }

    #[test]
    fn test_default_is_parallel() {
        assert!(AnalysisConfig::default().parallel_detection);
        assert!(!AnalysisConfig::new().sequential().parallel_detection);
    }
}
