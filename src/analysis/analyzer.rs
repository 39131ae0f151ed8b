use std::collections::BTreeMap;

use crate::{
    analysis::{
        IntrinsicDetector, IntrinsicFinding, MethodRelationMap, PropagationEngine,
        PropagationResult, Report,
    },
    config::{AnalysisConfig, ResolvedConfig},
    descriptor::DescriptorSet,
    metadata::{MethodId, ResolutionMiss, Universe},
    Result,
};

/// Runs the complete analysis pipeline over one universe.
pub struct Analyzer<'a> {
    universe: &'a Universe,
    config: AnalysisConfig,
}

impl<'a> Analyzer<'a> {
    /// Creates an analyzer for `universe` with the given configuration
    #[must_use]
    pub fn new(universe: &'a Universe, config: AnalysisConfig) -> Self {
        Analyzer { universe, config }
    }

    /// Resolves the configuration, builds the relation map, detects intrinsically critical
    /// methods, propagates, and derives descriptors and the report.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SafeCriticalConflict`] if the configuration forces a method
    /// SafeCritical that inheritance requires to be Critical.
    pub fn run(&self) -> Result<Analysis> {
        let config = self.config.resolve(self.universe);
        let relations = MethodRelationMap::build(self.universe, &config.ignored_calls);

        let intrinsic = IntrinsicDetector::new(self.universe, &relations, &config.critical_types)
            .parallel(config.parallel_detection)
            .detect_all();

        let result = PropagationEngine::new(self.universe, &relations, &config).run(&intrinsic)?;

        let descriptors =
            DescriptorSet::from_result(self.universe, &relations, &result, &intrinsic, &config);
        let report = Report::build(self.universe, &result, &intrinsic, &config);

        Ok(Analysis {
            config,
            relations,
            intrinsic,
            result,
            descriptors,
            report,
        })
    }
}

/// Everything an analysis run produced.
#[derive(Debug)]
pub struct Analysis {
    config: ResolvedConfig,
    relations: MethodRelationMap,
    intrinsic: BTreeMap<MethodId, IntrinsicFinding>,
    result: PropagationResult,
    descriptors: DescriptorSet,
    report: Report,
}

impl Analysis {
    /// Returns the resolved configuration
    #[must_use]
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Returns the relation map
    #[must_use]
    pub fn relations(&self) -> &MethodRelationMap {
        &self.relations
    }

    /// Returns the intrinsically critical methods
    #[must_use]
    pub fn intrinsic(&self) -> &BTreeMap<MethodId, IntrinsicFinding> {
        &self.intrinsic
    }

    /// Returns the propagation result
    #[must_use]
    pub fn result(&self) -> &PropagationResult {
        &self.result
    }

    /// Returns the computed descriptors
    #[must_use]
    pub fn descriptors(&self) -> &DescriptorSet {
        &self.descriptors
    }

    /// Returns the availability report
    #[must_use]
    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Returns every resolution miss of the run: configuration entries first, then call
    /// targets and override bases.
    #[must_use]
    pub fn misses(&self) -> Vec<ResolutionMiss> {
        self.config
            .misses
            .iter()
            .chain(self.relations.misses())
            .cloned()
            .collect()
    }
}
