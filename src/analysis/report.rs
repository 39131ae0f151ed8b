//! Availability report over the visible API surface.
//!
//! Every externally visible method (public or protected member of a type that is visible
//! from outside its assembly) gets exactly one entry:
//!
//! | Category                    | Meaning                                                     |
//! |-----------------------------|-------------------------------------------------------------|
//! | `#available`                | Callable from transparent code                              |
//! | `#available_manualSSC`      | Callable because it is manually marked SafeCritical         |
//! | `#unavailable_notreviewed`  | Critical, with the reason chain                             |
//! | `#unavailable_butreviewed`  | Critical and manually reviewed, with the reason chain       |
//! | `#methodsignature_notsafe`  | Critical because its signature exposes unsafe types         |

use std::{collections::BTreeMap, fmt};

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::{
    analysis::{IntrinsicFinding, IntrinsicRule, PropagationResult},
    config::ResolvedConfig,
    metadata::{AssemblyId, MethodId, Universe},
};

/// Availability category of a visible method, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum ReportCategory {
    /// Callable from transparent code
    #[strum(serialize = "#available")]
    Available,
    /// Callable through a manual SafeCritical marking
    #[strum(serialize = "#available_manualSSC")]
    AvailableManualSafeCritical,
    /// Critical and not reviewed
    #[strum(serialize = "#unavailable_notreviewed")]
    UnavailableNotReviewed,
    /// Critical but reviewed
    #[strum(serialize = "#unavailable_butreviewed")]
    UnavailableButReviewed,
    /// Critical because of its signature
    #[strum(serialize = "#methodsignature_notsafe")]
    SignatureNotSafe,
}

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Category
    pub category: ReportCategory,
    /// The method
    pub method: MethodId,
    /// `DeclaringType::Name`, the sort key within a category
    pub display_name: String,
    /// Canonical signature
    pub signature: String,
    /// Reason chain for unavailable methods
    pub chain: Option<String>,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.category, self.signature)?;
        if let Some(chain) = &self.chain {
            write!(f, " {chain}")?;
        }
        Ok(())
    }
}

/// Categorized view of the visible API.
#[derive(Debug, Clone, Default)]
pub struct Report {
    entries: Vec<ReportEntry>,
    skipped: Vec<AssemblyId>,
}

impl Report {
    /// Categorizes every visible method of `universe`.
    ///
    /// Assemblies without any visible method are logged and skipped.
    #[must_use]
    pub fn build(
        universe: &Universe,
        result: &PropagationResult,
        intrinsic: &BTreeMap<MethodId, IntrinsicFinding>,
        config: &ResolvedConfig,
    ) -> Self {
        let mut report = Report::default();

        for assembly in universe.assemblies() {
            let visible: Vec<MethodId> = universe
                .methods_of_assembly(assembly.id)
                .filter(|&m| universe.is_visible(m))
                .collect();

            if visible.is_empty() {
                log::warn!("assembly {} exposes no visible API", assembly.name);
                report.skipped.push(assembly.id);
                continue;
            }

            for method in visible {
                let category = Self::categorize(universe, result, intrinsic, config, method);
                let chain = match category {
                    ReportCategory::UnavailableNotReviewed
                    | ReportCategory::UnavailableButReviewed => {
                        Some(result.explain_string(universe, method))
                    }
                    _ => None,
                };
                report.entries.push(ReportEntry {
                    category,
                    method,
                    display_name: universe.display_name(method),
                    signature: universe.method(method).signature.clone(),
                    chain,
                });
            }
        }

        report.entries.sort_by(|a, b| {
            (a.category, &a.display_name, &a.signature).cmp(&(
                b.category,
                &b.display_name,
                &b.signature,
            ))
        });

        log::debug!(
            "report: {} entries, {} assemblies skipped",
            report.entries.len(),
            report.skipped.len()
        );
        report
    }

    fn categorize(
        universe: &Universe,
        result: &PropagationResult,
        intrinsic: &BTreeMap<MethodId, IntrinsicFinding>,
        config: &ResolvedConfig,
        method: MethodId,
    ) -> ReportCategory {
        let critical = result.is_critical(method)
            || config.is_critical_type(universe.method(method).declaring_type);

        if !critical {
            if config.is_safe_critical(method) {
                return ReportCategory::AvailableManualSafeCritical;
            }
            return ReportCategory::Available;
        }

        if intrinsic
            .get(&method)
            .is_some_and(|f| f.rule == IntrinsicRule::UnsafeSignature)
        {
            ReportCategory::SignatureNotSafe
        } else if config.reviewed.contains(&method) {
            ReportCategory::UnavailableButReviewed
        } else {
            ReportCategory::UnavailableNotReviewed
        }
    }

    /// Returns all entries, sorted by category then declaring type and name
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Returns the entries of one category
    pub fn entries_in(&self, category: ReportCategory) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    /// Returns the assemblies that were skipped for lack of visible API
    #[must_use]
    pub fn skipped(&self) -> &[AssemblyId] {
        &self.skipped
    }

    /// Returns the number of entries per category, including empty ones
    #[must_use]
    pub fn counts(&self) -> BTreeMap<ReportCategory, usize> {
        let mut counts: BTreeMap<ReportCategory, usize> =
            ReportCategory::iter().map(|c| (c, 0)).collect();
        for entry in &self.entries {
            *counts.entry(entry.category).or_default() += 1;
        }
        counts
    }

    /// Renders the report, one line per entry.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }
}
