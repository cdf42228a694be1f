//! Rebuild-on-demand holder for the current relationship graph.
//!
//! # Invariants
//! - Any change notification drops the whole graph; nothing is patched.
//! - `generation` increases by one per rebuild.

use super::{build, FamilyGraph};
use crate::model::person::{PersonId, PersonRecord};
use log::debug;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct GraphCache {
    graph: Option<FamilyGraph>,
    generation: u64,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached graph, loading and building a fresh one if needed.
    ///
    /// Loader errors are returned as-is and leave the cache cold.
    pub fn get_or_try_build<E, F>(&mut self, load: F) -> Result<&FamilyGraph, E>
    where
        F: FnOnce() -> Result<Vec<PersonRecord>, E>,
    {
        let graph = match self.graph.take() {
            Some(graph) => graph,
            None => {
                let records = load()?;
                self.generation += 1;
                debug!(
                    "event=graph_cache module=graph status=rebuild generation={} records={}",
                    self.generation,
                    records.len()
                );
                build(records)
            }
        };
        Ok(self.graph.insert(graph))
    }

    /// Change notification from the record store.
    pub fn on_changed(&mut self, ids: &BTreeSet<PersonId>) {
        if ids.is_empty() {
            return;
        }
        debug!(
            "event=graph_cache module=graph status=invalidated changed={}",
            ids.len()
        );
        self.graph = None;
    }

    pub fn invalidate(&mut self) {
        self.graph = None;
    }

    pub fn is_warm(&self) -> bool {
        self.graph.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::GraphCache;
    use crate::model::person::{PersonId, PersonRecord};
    use std::collections::BTreeSet;

    #[test]
    fn builds_once_until_a_change_arrives() {
        let mut cache = GraphCache::new();
        let mut loads = 0;
        for _ in 0..3 {
            let graph = cache
                .get_or_try_build(|| {
                    loads += 1;
                    Ok::<_, ()>(vec![PersonRecord::new("a")])
                })
                .unwrap();
            assert_eq!(graph.node_count(), 1);
        }
        assert_eq!(loads, 1);

        cache.on_changed(&BTreeSet::from([PersonId::new("a")]));
        assert!(!cache.is_warm());
        cache
            .get_or_try_build(|| Ok::<_, ()>(Vec::new()))
            .unwrap();
        assert_eq!(cache.generation(), 2);
    }

    #[test]
    fn loader_error_leaves_cache_cold() {
        let mut cache = GraphCache::new();
        let result = cache.get_or_try_build(|| Err::<Vec<PersonRecord>, _>("store offline"));
        assert_eq!(result.unwrap_err(), "store offline");
        assert!(!cache.is_warm());
        assert_eq!(cache.generation(), 0);
    }
}
