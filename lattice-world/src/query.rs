//! Per-owner visible-set computation.

use lattice_utils::{ChunkId, EntityId, OwnerId};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::entity::{Entity, Visibility};
use crate::error::WorldError;
use crate::world::World;

/// Default cap on entities returned from a single query; the packer
/// queries with this limit.
pub const MAX_QUERY_ENTITIES: usize = 16_384;

/// Hard ceiling on a query's effective result size. Segment value counts
/// are `u16` on the wire, so nothing larger could be packed anyway.
pub(crate) const QUERY_HARD_CAP: usize = u16::MAX as usize;

/// A visibility query's outcome.
///
/// The order of `visible` reflects entity-table iteration and is not
/// stable across runs; owned entities come first.
#[derive(Debug, Default, Clone)]
pub struct QueryResult {
    /// The entities the owner should currently see.
    pub visible: Vec<EntityId>,
    /// Whether the limit cut the result short.
    pub truncated: bool,
}

impl World {
    /// Computes the set of entities `owner` should see this tick.
    ///
    /// The owner's own entities are always included and extend the
    /// effective limit by their count, so `limit` caps the rest. Rules,
    /// in order of precedence for every other entity:
    ///
    /// 1. Dimension: only entities in a dimension the owner has an owned
    ///    entity in are ever visible.
    /// 2. A per-owner visibility override, when set.
    /// 3. The entity's global visibility.
    /// 4. Otherwise, chunk radius: the entity occupies a chunk some
    ///    observer of this owner reaches in the entity's dimension.
    pub fn query(&self, owner: OwnerId, limit: usize) -> Result<QueryResult, WorldError> {
        if owner < 0 {
            return Err(WorldError::InvalidOwner);
        }

        let mut visible = Vec::new();
        let mut owned = FxHashSet::default();
        let mut open_dimensions = FxHashSet::default();
        let mut reach: FxHashMap<i32, FxHashSet<ChunkId>> = FxHashMap::default();

        for (&id, entity) in &self.entities {
            if !entity.owned_by(owner) {
                continue;
            }
            owned.insert(id);
            visible.push(id);
            open_dimensions.insert(entity.dimension);
            if entity.observed_radius > 0 {
                let chunks = reach.entry(entity.dimension).or_default();
                for &chunk in entity.chunk_slots() {
                    self.grid.radius_chunks(chunk, entity.observed_radius, chunks);
                }
            }
        }

        let effective = limit
            .min(QUERY_HARD_CAP)
            .saturating_add(owned.len())
            .min(QUERY_HARD_CAP);
        let mut truncated = false;
        for (&id, entity) in &self.entities {
            if owned.contains(&id) {
                continue;
            }
            if !visible_to(entity, owner, &open_dimensions, &reach) {
                continue;
            }
            if visible.len() >= effective {
                truncated = true;
                break;
            }
            visible.push(id);
        }

        Ok(QueryResult { visible, truncated })
    }
}

/// Applies the non-owned visibility rules for one entity.
fn visible_to(
    entity: &Entity,
    owner: OwnerId,
    open_dimensions: &FxHashSet<i32>,
    reach: &FxHashMap<i32, FxHashSet<ChunkId>>,
) -> bool {
    match entity.visibility_override(owner) {
        Some(Visibility::Never) => return false,
        Some(Visibility::Always) => return open_dimensions.contains(&entity.dimension),
        Some(Visibility::Default) | None => {}
    }
    match entity.visibility {
        Visibility::Never => return false,
        Visibility::Always => return open_dimensions.contains(&entity.dimension),
        Visibility::Default => {}
    }
    let Some(chunks) = reach.get(&entity.dimension) else {
        return false;
    };
    entity.chunk_slots().iter().any(|chunk| chunks.contains(chunk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkOrigin, WorldConfig};

    /// A 4x4x4 world with a chunk size of 10 and a centered origin.
    fn world_with_observer(owner: OwnerId) -> (World, EntityId) {
        let mut world = World::new(WorldConfig::uniform(4, 10.0, ChunkOrigin::Middle));
        world.track(1).unwrap();
        world.owner_set(1, owner).unwrap();
        let chunk = world.grid().chunk_at(0.0, 0.0, 0.0);
        world.chunk_set(1, chunk).unwrap();
        world.radius_set(1, 1).unwrap();
        (world, 1)
    }

    #[test]
    fn owner_sees_its_own_entities_unconditionally() {
        let mut world = World::new(WorldConfig::default());
        world.track(1).unwrap();
        world.owner_set(1, 100).unwrap();
        // No chunk, global Never, and still visible to its owner.
        world.visibility_global_set(1, Visibility::Never).unwrap();

        let result = world.query(100, 64).unwrap();
        assert_eq!(result.visible, vec![1]);
        assert!(!result.truncated);
    }

    #[test]
    fn radius_pulls_in_nearby_entities_only() {
        let (mut world, _) = world_with_observer(100);
        world.track(2).unwrap();
        world
            .chunk_set(2, world.grid().chunk_at(5.0, 0.0, 0.0))
            .unwrap();
        world.track(3).unwrap();
        world
            .chunk_set(3, world.grid().chunk_at(-20.0, -20.0, -20.0))
            .unwrap();

        let mut visible = world.query(100, 64).unwrap().visible;
        visible.sort_unstable();
        assert_eq!(visible, vec![1, 2]);
    }

    #[test]
    fn unplaced_observer_contributes_no_reach() {
        let mut world = World::new(WorldConfig::uniform(4, 10.0, ChunkOrigin::Middle));
        world.track(1).unwrap();
        world.owner_set(1, 100).unwrap();
        world.radius_set(1, 1).unwrap();
        world.track(2).unwrap();
        world
            .chunk_set(2, world.grid().chunk_at(0.0, 0.0, 0.0))
            .unwrap();

        assert_eq!(world.query(100, 64).unwrap().visible, vec![1]);
    }

    #[test]
    fn global_always_and_never_override_radius() {
        let (mut world, _) = world_with_observer(100);
        // Far outside the radius, globally Always.
        world.track(2).unwrap();
        world
            .chunk_set(2, world.grid().chunk_at(-20.0, -20.0, -20.0))
            .unwrap();
        world.visibility_global_set(2, Visibility::Always).unwrap();
        // Right next door, globally Never.
        world.track(3).unwrap();
        world
            .chunk_set(3, world.grid().chunk_at(5.0, 0.0, 0.0))
            .unwrap();
        world.visibility_global_set(3, Visibility::Never).unwrap();

        let mut visible = world.query(100, 64).unwrap().visible;
        visible.sort_unstable();
        assert_eq!(visible, vec![1, 2]);
    }

    #[test]
    fn per_owner_override_beats_global_and_is_scoped_to_its_owner() {
        let (mut world, _) = world_with_observer(100);
        let (far_x, far_y, far_z) = (-20.0, -20.0, -20.0);
        world.track(2).unwrap();
        world
            .chunk_set(2, world.grid().chunk_at(far_x, far_y, far_z))
            .unwrap();

        // Second owner with its own observer.
        world.track(9).unwrap();
        world.owner_set(9, 200).unwrap();
        world
            .chunk_set(9, world.grid().chunk_at(0.0, 0.0, 0.0))
            .unwrap();
        world.radius_set(9, 1).unwrap();

        world.visibility_owner_set(2, 100, Visibility::Always).unwrap();
        let mut visible = world.query(100, 64).unwrap().visible;
        visible.sort_unstable();
        assert_eq!(visible, vec![1, 2]);
        let visible_to_200 = world.query(200, 64).unwrap().visible;
        assert!(!visible_to_200.contains(&2));

        // Per-owner Never wins over global Always.
        world.visibility_global_set(2, Visibility::Always).unwrap();
        world.visibility_owner_set(2, 100, Visibility::Never).unwrap();
        assert!(!world.query(100, 64).unwrap().visible.contains(&2));
        assert!(world.query(200, 64).unwrap().visible.contains(&2));
    }

    #[test]
    fn dimension_dominates_always_visibility() {
        let (mut world, _) = world_with_observer(100);
        world.track(2).unwrap();
        world
            .chunk_set(2, world.grid().chunk_at(0.0, 0.0, 0.0))
            .unwrap();
        world.dimension_set(2, 5).unwrap();
        world.visibility_global_set(2, Visibility::Always).unwrap();

        assert_eq!(world.query(100, 64).unwrap().visible, vec![1]);
    }

    #[test]
    fn entities_in_different_dimensions_are_mutually_invisible() {
        let mut world = World::new(WorldConfig::uniform(4, 10.0, ChunkOrigin::Middle));
        let origin = world.grid().chunk_at(0.0, 0.0, 0.0);
        for (id, owner, dimension) in [(1, 100, 0), (2, 200, 5)] {
            world.track(id).unwrap();
            world.owner_set(id, owner).unwrap();
            world.chunk_set(id, origin).unwrap();
            world.radius_set(id, 1).unwrap();
            world.dimension_set(id, dimension).unwrap();
        }

        assert_eq!(world.query(100, 64).unwrap().visible, vec![1]);
        assert_eq!(world.query(200, 64).unwrap().visible, vec![2]);
    }

    #[test]
    fn limit_caps_non_owned_results_and_reports_truncation() {
        let (mut world, _) = world_with_observer(100);
        let chunk = world.grid().chunk_at(0.0, 0.0, 0.0);
        for id in 10..20 {
            world.track(id).unwrap();
            world.chunk_set(id, chunk).unwrap();
        }

        let result = world.query(100, 4).unwrap();
        // One owned entity plus four others.
        assert_eq!(result.visible.len(), 5);
        assert!(result.truncated);

        let result = world.query(100, 64).unwrap();
        assert_eq!(result.visible.len(), 11);
        assert!(!result.truncated);
    }

    #[test]
    fn negative_owner_is_refused() {
        let world = World::new(WorldConfig::default());
        assert!(matches!(
            world.query(-3, 64),
            Err(WorldError::InvalidOwner)
        ));
    }
}
