//! Dependency Store
//!
//! Maps every tracked target to its per-key subscriber sets:
//!
//! ```text
//! TargetId -> (PropertyKey -> Dep)
//! ```
//!
//! Sets are created the first time a `(target, key)` pair is tracked and are
//! never evicted. Effects leave them on cleanup and on stop.

use std::collections::HashMap;

use super::subscriber::Dep;
use crate::value::{PropertyKey, TargetId};

#[derive(Debug, Default)]
pub(crate) struct DependencyStore {
    targets: HashMap<TargetId, HashMap<PropertyKey, Dep>>,
}

impl DependencyStore {
    /// Get the subscriber set for `(target, key)`, creating it on first use.
    pub(crate) fn dep_for(&mut self, target: TargetId, key: &str) -> Dep {
        let keys = self.targets.entry(target).or_default();
        if let Some(dep) = keys.get(key) {
            return dep.clone();
        }
        let dep = Dep::new();
        keys.insert(PropertyKey::from(key), dep.clone());
        dep
    }

    /// Get the subscriber set for `(target, key)` if it was ever tracked.
    pub(crate) fn get(&self, target: TargetId, key: &str) -> Option<Dep> {
        self.targets.get(&target)?.get(key).cloned()
    }

    /// Number of targets that have been tracked at least once.
    pub(crate) fn target_count(&self) -> usize {
        self.targets.len()
    }
}
