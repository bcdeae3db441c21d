use availarr_model::{CanonicalId, SourceId};
use dashmap::{DashMap, DashSet};

use crate::availability::{ExpectedSeasons, Observation};

/// State shared by every item of one scan invocation.
#[derive(Debug, Default)]
pub(crate) struct ScanPass {
    misses: DashSet<(SourceId, String)>,
    observations: DashMap<String, Observation>,
    expected: DashMap<CanonicalId, ExpectedSeasons>,
}

impl ScanPass {
    pub fn is_miss(&self, source: &SourceId, key: &str) -> bool {
        self.misses.contains(&(source.clone(), key.to_string()))
    }

    pub fn record_miss(&self, source: &SourceId, key: &str) {
        self.misses.insert((source.clone(), key.to_string()));
    }

    pub fn expected(&self, id: CanonicalId) -> Option<ExpectedSeasons> {
        self.expected.get(&id).map(|e| e.value().clone())
    }

    pub fn remember_expected(&self, id: CanonicalId, expected: ExpectedSeasons) {
        self.expected.insert(id, expected);
    }

    /// Folds `observation` into everything seen for the title so far and
    /// returns the merged view. Call with the title's lock held.
    pub fn merge(&self, observation: Observation) -> Observation {
        let key = observation.identity.lock_key();
        let mut entry = self.observations.entry(key).or_insert_with(|| observation.clone());
        entry.merge(&observation);
        entry.value().clone()
    }
}
