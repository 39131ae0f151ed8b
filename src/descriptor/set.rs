use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use crate::{
    analysis::{IntrinsicFinding, MethodRelationMap, PropagationResult},
    config::ResolvedConfig,
    descriptor::{AttributeKind, OverrideMarker, SecurityAttributeDescriptor, TargetKind},
    metadata::{MethodId, MissKind, ResolutionMiss, TypeId, Universe},
    Error, Result,
};

/// The member a descriptor resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorTarget {
    /// A type
    Type(TypeId),
    /// A method
    Method(MethodId),
}

/// A descriptor together with the member it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDescriptor {
    /// The descriptor
    pub descriptor: SecurityAttributeDescriptor,
    /// The resolved member
    pub target: DescriptorTarget,
}

/// An ordered collection of descriptors.
///
/// A set read from text or assembled from several sources may hold several entries for the
/// same signature, including override markers. [`DescriptorSet::normalize`] reduces it to at
/// most one plain entry per signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSet {
    entries: Vec<SecurityAttributeDescriptor>,
}

impl DescriptorSet {
    /// Creates an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses descriptor text, one descriptor per line.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDescriptor`] for the first line that does not follow the
    /// line format.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            entries.push(SecurityAttributeDescriptor::parse_line(line, index + 1)?);
        }
        Ok(DescriptorSet { entries })
    }

    /// Reads and parses a descriptor file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the file cannot be read, or
    /// [`Error::MalformedDescriptor`] if a line is malformed.
    pub fn read(path: &std::path::Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Appends a descriptor
    pub fn push(&mut self, descriptor: SecurityAttributeDescriptor) {
        self.entries.push(descriptor);
    }

    /// Returns the number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over the entries, in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, SecurityAttributeDescriptor> {
        self.entries.iter()
    }

    /// Returns the attribute kind of the first entry for `signature`.
    ///
    /// On a normalized set this is the effective kind.
    #[must_use]
    pub fn kind_of(&self, signature: &str) -> Option<AttributeKind> {
        self.entries
            .iter()
            .find(|d| d.signature == signature)
            .map(|d| d.kind)
    }

    /// Reduces the set to at most one plain descriptor per signature.
    ///
    /// Entries are grouped by signature. Without an override marker the highest-priority
    /// kind wins. With one override marker, `+K` adds `K`, `-K` removes `K` and every kind it
    /// outranks, and `!K` forces `K`. The result carries no markers and is sorted by
    /// signature, so normalizing is idempotent and independent of entry order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorConflict`] if a group holds more than one override marker.
    pub fn normalize(&self) -> Result<DescriptorSet> {
        let mut groups: BTreeMap<&str, Vec<&SecurityAttributeDescriptor>> = BTreeMap::new();
        for entry in &self.entries {
            groups.entry(entry.signature.as_str()).or_default().push(entry);
        }

        let mut entries = Vec::with_capacity(groups.len());
        for (signature, group) in groups {
            let mut overrides = group.iter().filter(|d| d.is_override());
            let marker = overrides.next();
            if overrides.next().is_some() {
                return Err(Error::DescriptorConflict {
                    signature: signature.to_string(),
                });
            }

            // Plain entries, keyed by kind; the smallest target wins for determinism.
            let mut present: BTreeMap<AttributeKind, TargetKind> = BTreeMap::new();
            for entry in group.iter().filter(|d| !d.is_override()) {
                present
                    .entry(entry.kind)
                    .and_modify(|t| *t = (*t).min(entry.target))
                    .or_insert(entry.target);
            }

            if let Some(marker) = marker {
                match marker.marker {
                    OverrideMarker::Add => {
                        present.entry(marker.kind).or_insert(marker.target);
                    }
                    OverrideMarker::Remove => {
                        present.retain(|kind, _| {
                            *kind != marker.kind && !marker.kind.outranks(*kind)
                        });
                    }
                    OverrideMarker::Force => {
                        present.clear();
                        present.insert(marker.kind, marker.target);
                    }
                    OverrideMarker::None => {}
                }
            }

            if let Some((&kind, &target)) = present.iter().next() {
                entries.push(SecurityAttributeDescriptor::new(kind, target, signature));
            }
        }

        Ok(DescriptorSet { entries })
    }

    /// Merges two sets: `normalize(self ++ other)`.
    ///
    /// Typically `self` is computed output and `other` a hand-authored override file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorConflict`] if the combined set has conflicting overrides.
    pub fn merge(&self, other: &DescriptorSet) -> Result<DescriptorSet> {
        let mut combined = self.clone();
        combined.entries.extend(other.entries.iter().cloned());
        combined.normalize()
    }

    /// Computes the override set turning `old` into `new`.
    ///
    /// Added signatures become `+`, removed ones `-`, and signatures whose kind changed `!`,
    /// so that `old.merge(&DescriptorSet::diff(old, new)?)` equals `new.normalize()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorConflict`] if either input fails to normalize.
    pub fn diff(old: &DescriptorSet, new: &DescriptorSet) -> Result<DescriptorSet> {
        let old = old.normalize()?;
        let new = new.normalize()?;

        let before: BTreeMap<&str, &SecurityAttributeDescriptor> =
            old.iter().map(|d| (d.signature.as_str(), d)).collect();
        let after: BTreeMap<&str, &SecurityAttributeDescriptor> =
            new.iter().map(|d| (d.signature.as_str(), d)).collect();
        let signatures: BTreeSet<&str> = before.keys().chain(after.keys()).copied().collect();

        let mut entries = Vec::new();
        for signature in signatures {
            let change = match (before.get(signature), after.get(signature)) {
                (None, Some(&added)) => Some(added.clone().with_marker(OverrideMarker::Add)),
                (Some(&removed), None) => Some(removed.clone().with_marker(OverrideMarker::Remove)),
                (Some(&was), Some(&now)) if was.kind != now.kind || was.target != now.target => {
                    Some(now.clone().with_marker(OverrideMarker::Force))
                }
                _ => None,
            };
            entries.extend(change);
        }

        Ok(DescriptorSet { entries })
    }

    /// Resolves every descriptor to a member of `universe`.
    ///
    /// Descriptors naming unknown members are returned as misses.
    #[must_use]
    pub fn resolve(&self, universe: &Universe) -> (Vec<ResolvedDescriptor>, Vec<ResolutionMiss>) {
        let mut resolved = Vec::new();
        let mut misses = Vec::new();

        for descriptor in &self.entries {
            let target = match descriptor.target {
                TargetKind::Type => universe
                    .find_type(&descriptor.signature)
                    .map(DescriptorTarget::Type),
                TargetKind::Method => universe
                    .find_method(&descriptor.signature)
                    .map(DescriptorTarget::Method),
            };

            match target {
                Some(target) => resolved.push(ResolvedDescriptor {
                    descriptor: descriptor.clone(),
                    target,
                }),
                None => {
                    log::warn!("descriptor target not found: {descriptor}");
                    misses.push(ResolutionMiss {
                        kind: MissKind::Descriptor,
                        context: "descriptor".to_string(),
                        target: descriptor.to_string(),
                    });
                }
            }
        }

        (resolved, misses)
    }

    /// Builds the computed descriptor set of an analysis.
    ///
    /// # Arguments
    ///
    /// * `universe` - The analyzed universe
    /// * `relations` - Its relation map
    /// * `result` - The propagation result
    /// * `intrinsic` - Intrinsically critical methods
    /// * `config` - The resolved configuration
    ///
    /// # Returns
    ///
    /// `SC-T` for each critical type, `SC-M` for each method in the propagation result, and
    /// `SSC-M` for each SafeCritical-eligible method that needs privilege itself, calls a
    /// critical method, or calls a member of a critical type. The set is normalized.
    #[must_use]
    pub fn from_result(
        universe: &Universe,
        relations: &MethodRelationMap,
        result: &PropagationResult,
        intrinsic: &BTreeMap<MethodId, IntrinsicFinding>,
        config: &ResolvedConfig,
    ) -> DescriptorSet {
        let mut entries = Vec::new();

        for &ty in &config.critical_types {
            entries.push(SecurityAttributeDescriptor::critical_type(
                &universe.type_info(ty).full_name,
            ));
        }

        for &method in result.critical() {
            entries.push(SecurityAttributeDescriptor::critical_method(
                &universe.method(method).signature,
            ));
        }

        for &method in &config.safe_critical {
            if result.is_critical(method) {
                continue;
            }
            let needs_boundary = intrinsic.contains_key(&method)
                || relations.callees(method).any(|callee| {
                    result.is_critical(callee)
                        || config.is_critical_type(universe.method(callee).declaring_type)
                });
            if needs_boundary {
                entries.push(SecurityAttributeDescriptor::safe_critical_method(
                    &universe.method(method).signature,
                ));
            }
        }

        let set = DescriptorSet { entries };
        log::debug!("descriptors: {} computed", set.len());
        set.sorted()
    }

    /// Returns a copy sorted by target, kind and signature.
    #[must_use]
    pub fn sorted(&self) -> DescriptorSet {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| {
            (a.target, a.kind, &a.signature, a.marker).cmp(&(b.target, b.kind, &b.signature, b.marker))
        });
        entries.dedup();
        DescriptorSet { entries }
    }

    /// Renders the set in the line format, sorted by target, kind and signature.
    #[must_use]
    pub fn render(&self) -> String {
        self.sorted().to_string()
    }
}

impl fmt::Display for DescriptorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

impl FromIterator<SecurityAttributeDescriptor> for DescriptorSet {
    fn from_iter<I: IntoIterator<Item = SecurityAttributeDescriptor>>(iter: I) -> Self {
        DescriptorSet {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DescriptorSet {
    type Item = &'a SecurityAttributeDescriptor;
    type IntoIter = std::slice::Iter<'a, SecurityAttributeDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
