//! Bulk-operation cache invalidation.
//!
//! A bulk statement bypasses the first-level session cache entirely, so every
//! second-level region holding state for the target entity (and for
//! collections it owns) must be invalidated. The executor emits a
//! [`RegionInvalidation`]; [`schedule_invalidation`] decides inline-vs-deferred
//! dispatch from the session's action-queue capability.

use ahash::AHashSet;
use tracing::debug;

use crate::metadata::EntityTopology;
use crate::session::SqlSession;

/// The set of cache regions affected by one bulk statement.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionInvalidation {
    regions: Vec<String>,
}

impl RegionInvalidation {
    /// Entity region plus every owned collection region, deduplicated,
    /// in declaration order.
    pub fn for_entity(topology: &EntityTopology) -> Self {
        let mut seen = AHashSet::new();
        let mut regions = Vec::new();
        for region in std::iter::once(topology.entity_region()).chain(topology.collection_regions())
        {
            if seen.insert(region.to_string()) {
                regions.push(region.to_string());
            }
        }
        Self { regions }
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }
}

/// Deferred invalidation queued on the session for post-transaction
/// completion.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperationAction {
    invalidation: RegionInvalidation,
}

impl BulkOperationAction {
    pub fn new(invalidation: RegionInvalidation) -> Self {
        Self { invalidation }
    }

    pub fn invalidation(&self) -> &RegionInvalidation {
        &self.invalidation
    }
}

/// Dispatch an invalidation: queued when the session runs an action queue
/// (transactional), inline otherwise.
pub fn schedule_invalidation(session: &mut dyn SqlSession, invalidation: RegionInvalidation) {
    if session.supports_action_queue() {
        debug!(regions = ?invalidation.regions(), "queueing bulk-operation cache invalidation");
        session.add_action(BulkOperationAction::new(invalidation));
    } else {
        debug!(regions = ?invalidation.regions(), "invalidating cache regions inline");
        for region in invalidation.regions() {
            session.invalidate_region(region);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{CollectionTable, EntityTopology, IdColumn, TableMapping};
    use crate::session::RecordingSession;

    fn topology() -> EntityTopology {
        EntityTopology::new(
            "Person",
            vec![IdColumn::bigint("id")],
            vec![TableMapping::new("person", &["id"])],
        )
        .unwrap()
        .with_collection_table(CollectionTable::new(
            "Person.aliases",
            "person_aliases",
            &["person_id"],
        ))
    }

    #[test]
    fn inline_dispatch_outside_transaction() {
        let mut session = RecordingSession::new();
        schedule_invalidation(&mut session, RegionInvalidation::for_entity(&topology()));
        assert_eq!(session.invalidated, vec!["Person", "Person.aliases"]);
        assert!(session.actions.is_empty());
    }

    #[test]
    fn deferred_dispatch_inside_transaction() {
        let mut session = RecordingSession::transactional();
        schedule_invalidation(&mut session, RegionInvalidation::for_entity(&topology()));
        assert!(session.invalidated.is_empty());
        assert_eq!(session.actions.len(), 1);

        session.after_transaction_completion();
        assert_eq!(session.invalidated, vec!["Person", "Person.aliases"]);
        assert!(session.actions.is_empty());
    }

    #[test]
    fn regions_are_deduplicated() {
        let topo = EntityTopology::new(
            "Dup",
            vec![IdColumn::bigint("id")],
            vec![TableMapping::new("dup", &["id"])],
        )
        .unwrap()
        .with_collection_table(CollectionTable::new("Dup", "dup_items", &["dup_id"]));
        let invalidation = RegionInvalidation::for_entity(&topo);
        assert_eq!(invalidation.regions(), ["Dup"]);
    }
}
