//! The world container: configuration, entity table, owner snapshots,
//! event handlers, and the token generator.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::num::NonZeroU16;

use lattice_utils::random::Xoroshiro;
use lattice_utils::{CHUNK_INVALID, ChunkId, EntityId, OWNER_INVALID, OwnerId, Ownership};
use rustc_hash::FxHashMap;

use crate::chunk::ChunkGrid;
use crate::config::WorldConfig;
use crate::entity::{Entity, EntityFlags, MAX_CHUNKS_PER_ENTITY, Visibility};
use crate::error::WorldError;
use crate::events::{
    EventTable, ReadEvent, ReadHandler, ReadKind, WriteEvent, WriteHandler, WriteKind,
};

/// An owner's last-sent snapshot: the entities the owner currently
/// believes it sees. The `bool` is the retain mark used during a write
/// pass and carries no meaning between passes.
pub(crate) type Snapshot = FxHashMap<EntityId, bool>;

/// A replication world: the full state one host needs to decide, per
/// owner, what to send and how to apply what it receives.
///
/// All operations are synchronous and run on the caller's thread; a world
/// never locks, blocks, or spawns. Worlds are independent of one another.
pub struct World {
    config: WorldConfig,
    pub(crate) grid: ChunkGrid,
    pub(crate) entities: FxHashMap<EntityId, Entity>,
    pub(crate) snapshots: FxHashMap<OwnerId, Snapshot>,
    pub(crate) events: EventTable,
    pub(crate) rng: Xoroshiro,
    userdata: Option<Box<dyn Any + Send>>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    /// Creates a world from a configuration. Degenerate configuration
    /// values are clamped, see [`WorldConfig`].
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        let config = config.sanitized();
        let grid = ChunkGrid::new(&config);
        let rng = Xoroshiro::from_seed(config.seed);
        Self {
            config,
            grid,
            entities: FxHashMap::default(),
            snapshots: FxHashMap::default(),
            events: EventTable::default(),
            rng,
            userdata: None,
        }
    }

    /// The configuration the world was built from (after sanitizing).
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The world's chunk grid.
    #[must_use]
    pub fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    // --- lifecycle ------------------------------------------------------

    /// Starts tracking a new local entity with default attributes: no
    /// chunks, unowned, dimension 0, not an observer.
    pub fn track(&mut self, id: EntityId) -> Result<(), WorldError> {
        if id < 0 {
            return Err(WorldError::InvalidEntity);
        }
        match self.entities.entry(id) {
            Entry::Occupied(slot) => Err(if slot.get().is_foreign() {
                WorldError::ForeignEntity
            } else {
                WorldError::AlreadyTracked
            }),
            Entry::Vacant(slot) => {
                slot.insert(Entity::new());
                log::debug!("tracked entity {id}");
                Ok(())
            }
        }
    }

    /// Stops tracking a local entity.
    ///
    /// Foreign entities are refused; they leave through an inbound REMOVE
    /// or not at all. If the entity was its owner's last owned entity, the
    /// owner's snapshot is dropped with it.
    pub fn untrack(&mut self, id: EntityId) -> Result<(), WorldError> {
        if id < 0 {
            return Err(WorldError::InvalidEntity);
        }
        match self.entities.get(&id) {
            None => Err(WorldError::Untracked),
            Some(entity) if entity.is_foreign() => Err(WorldError::ForeignEntity),
            Some(_) => {
                self.untrack_inner(id);
                Ok(())
            }
        }
    }

    /// Removes the record and tears down owner state that depended on it.
    pub(crate) fn untrack_inner(&mut self, id: EntityId) {
        let Some(entity) = self.entities.remove(&id) else {
            return;
        };
        if let Some(claim) = entity.ownership {
            self.release_owner_if_last(claim.owner);
        }
        log::debug!("untracked entity {id}");
    }

    fn release_owner_if_last(&mut self, owner: OwnerId) {
        let still_owned = self.entities.values().any(|entity| entity.owned_by(owner));
        if !still_owned && self.snapshots.remove(&owner).is_some() {
            log::debug!("owner {owner} lost its last entity, snapshot dropped");
        }
    }

    /// Whether an entity with this id is tracked (local or foreign).
    #[must_use]
    pub fn is_tracked(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Whether this id names a foreign entity.
    #[must_use]
    pub fn is_foreign(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(Entity::is_foreign)
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entities are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    // --- ownership ------------------------------------------------------

    /// Assigns or clears an entity's owner.
    ///
    /// Every assignment that leaves the entity owned mints a fresh token,
    /// distinct from the previous one, and flags the entity so the next
    /// write to the new owner carries an OWNER notification. A first-time
    /// owner gets an empty snapshot table.
    pub fn owner_set(&mut self, id: EntityId, owner: OwnerId) -> Result<(), WorldError> {
        if id < 0 {
            return Err(WorldError::InvalidEntity);
        }
        if owner < 0 && owner != OWNER_INVALID {
            return Err(WorldError::InvalidOwner);
        }
        let previous = {
            let entity = self.entities.get(&id).ok_or(WorldError::Untracked)?;
            if entity.is_foreign() {
                return Err(WorldError::ForeignEntity);
            }
            entity.ownership.map(|claim| claim.token)
        };

        if owner == OWNER_INVALID {
            let entity = self.entities.get_mut(&id).expect("checked above");
            entity.ownership = None;
            entity.flags.remove(EntityFlags::OWNER_UPDATED);
            log::debug!("entity {id} released");
            return Ok(());
        }

        let token = self.rng.next_token(previous);
        self.assign_owner(id, owner, token);
        log::debug!("entity {id} owned by {owner}");
        Ok(())
    }

    /// Ownership bookkeeping shared by `owner_set` and inbound OWNER
    /// values: store the claim, flag the pending notification, make sure
    /// the owner has a snapshot table.
    pub(crate) fn assign_owner(&mut self, id: EntityId, owner: OwnerId, token: NonZeroU16) {
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        entity.ownership = Some(Ownership::new(owner, token));
        entity.flags.insert(EntityFlags::OWNER_UPDATED);
        self.snapshots.entry(owner).or_default();
    }

    /// The entity's owner, or [`OWNER_INVALID`] when unowned.
    pub fn owner_get(&self, id: EntityId) -> Result<OwnerId, WorldError> {
        Ok(self.entity(id)?.owner().unwrap_or(OWNER_INVALID))
    }

    // --- placement ------------------------------------------------------

    /// Places the entity in a single chunk, clearing any other slots.
    /// [`CHUNK_INVALID`] clears placement entirely.
    pub fn chunk_set(&mut self, id: EntityId, chunk: ChunkId) -> Result<(), WorldError> {
        if chunk == CHUNK_INVALID {
            self.entity_mut(id)?.set_chunks(&[]);
            return Ok(());
        }
        if !self.grid.contains(chunk) {
            return Err(WorldError::InvalidChunk);
        }
        self.entity_mut(id)?.set_chunks(&[chunk]);
        Ok(())
    }

    /// The entity's primary chunk, or [`CHUNK_INVALID`] when unplaced.
    pub fn chunk_get(&self, id: EntityId) -> Result<ChunkId, WorldError> {
        Ok(self.entity(id)?.chunks[0])
    }

    /// Places the entity across up to [`MAX_CHUNKS_PER_ENTITY`] chunks;
    /// slot 0 is the primary location. Unused slots are cleared.
    pub fn chunk_array_set(&mut self, id: EntityId, chunks: &[ChunkId]) -> Result<(), WorldError> {
        if chunks.len() > MAX_CHUNKS_PER_ENTITY
            || chunks.iter().any(|&chunk| !self.grid.contains(chunk))
        {
            return Err(WorldError::InvalidChunk);
        }
        self.entity_mut(id)?.set_chunks(chunks);
        Ok(())
    }

    /// The chunks the entity currently occupies.
    pub fn chunk_array_get(&self, id: EntityId) -> Result<&[ChunkId], WorldError> {
        Ok(self.entity(id)?.chunk_slots())
    }

    // --- attributes -----------------------------------------------------

    /// Moves the entity to a dimension. Entities in different dimensions
    /// never see each other.
    pub fn dimension_set(&mut self, id: EntityId, dimension: i32) -> Result<(), WorldError> {
        self.entity_mut(id)?.dimension = dimension;
        Ok(())
    }

    /// The entity's dimension.
    pub fn dimension_get(&self, id: EntityId) -> Result<i32, WorldError> {
        Ok(self.entity(id)?.dimension)
    }

    /// Sets the observer radius. A positive radius on an owned, placed
    /// entity makes its owner see everything within that chunk distance.
    pub fn radius_set(&mut self, id: EntityId, radius: i8) -> Result<(), WorldError> {
        self.entity_mut(id)?.observed_radius = radius;
        Ok(())
    }

    /// The entity's observer radius.
    pub fn radius_get(&self, id: EntityId) -> Result<i8, WorldError> {
        Ok(self.entity(id)?.observed_radius)
    }

    /// Sets the entity's global visibility rule.
    pub fn visibility_global_set(
        &mut self,
        id: EntityId,
        visibility: Visibility,
    ) -> Result<(), WorldError> {
        self.entity_mut(id)?.visibility = visibility;
        Ok(())
    }

    /// The entity's global visibility rule.
    pub fn visibility_global_get(&self, id: EntityId) -> Result<Visibility, WorldError> {
        Ok(self.entity(id)?.visibility)
    }

    /// Sets a per-owner visibility override, which beats the global rule.
    ///
    /// Refused with [`WorldError::VisibilityIgnored`] for the entity's own
    /// owner: owners always see their entities. `Default` erases the
    /// override.
    pub fn visibility_owner_set(
        &mut self,
        id: EntityId,
        owner: OwnerId,
        visibility: Visibility,
    ) -> Result<(), WorldError> {
        if owner < 0 {
            return Err(WorldError::InvalidOwner);
        }
        let entity = self.entity_mut(id)?;
        if entity.owned_by(owner) {
            return Err(WorldError::VisibilityIgnored);
        }
        entity.set_visibility_override(owner, visibility);
        Ok(())
    }

    /// The per-owner visibility override, `Default` when none is set.
    pub fn visibility_owner_get(
        &self,
        id: EntityId,
        owner: OwnerId,
    ) -> Result<Visibility, WorldError> {
        Ok(self
            .entity(id)?
            .visibility_override(owner)
            .unwrap_or_default())
    }

    // --- userdata -------------------------------------------------------

    /// Attaches opaque data to the world, returning the previous value.
    pub fn set_userdata(&mut self, data: Box<dyn Any + Send>) -> Option<Box<dyn Any + Send>> {
        self.userdata.replace(data)
    }

    /// The world's opaque data.
    #[must_use]
    pub fn userdata(&self) -> Option<&(dyn Any + Send)> {
        self.userdata.as_deref()
    }

    /// The world's opaque data, mutably.
    #[must_use]
    pub fn userdata_mut(&mut self) -> Option<&mut (dyn Any + Send)> {
        self.userdata.as_deref_mut()
    }

    /// Attaches opaque data to an entity, returning the previous value.
    pub fn entity_userdata_set(
        &mut self,
        id: EntityId,
        data: Box<dyn Any + Send>,
    ) -> Result<Option<Box<dyn Any + Send>>, WorldError> {
        Ok(self.entity_mut(id)?.userdata.replace(data))
    }

    /// An entity's opaque data.
    pub fn entity_userdata(&self, id: EntityId) -> Result<Option<&(dyn Any + Send)>, WorldError> {
        Ok(self.entity(id)?.userdata.as_deref())
    }

    /// An entity's opaque data, mutably.
    pub fn entity_userdata_mut(
        &mut self,
        id: EntityId,
    ) -> Result<Option<&mut (dyn Any + Send)>, WorldError> {
        Ok(self.entity_mut(id)?.userdata.as_deref_mut())
    }

    // --- iteration ------------------------------------------------------

    /// Iterates all tracked entity ids, in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Iterates the entities occupying `chunk`.
    pub fn entities_in_chunk(&self, chunk: ChunkId) -> impl Iterator<Item = EntityId> + '_ {
        self.entities
            .iter()
            .filter(move |(_, entity)| entity.chunk_slots().contains(&chunk))
            .map(|(&id, _)| id)
    }

    /// Iterates the entities owned by `owner`.
    pub fn entities_owned_by(&self, owner: OwnerId) -> impl Iterator<Item = EntityId> + '_ {
        self.entities
            .iter()
            .filter(move |(_, entity)| entity.owned_by(owner))
            .map(|(&id, _)| id)
    }

    // --- handlers -------------------------------------------------------

    /// Installs the handler for a write-side event kind.
    ///
    /// Returns the handler it replaced, if any.
    pub fn on_write(
        &mut self,
        kind: WriteKind,
        handler: impl FnMut(WriteEvent<'_>) -> Option<usize> + Send + 'static,
    ) -> Option<WriteHandler> {
        self.events.set_write(kind, Box::new(handler))
    }

    /// Removes the handler for a write-side event kind.
    ///
    /// Returns the removed handler; `None` means there was nothing to
    /// remove.
    pub fn clear_write(&mut self, kind: WriteKind) -> Option<WriteHandler> {
        self.events.clear_write(kind)
    }

    /// Installs the handler for a read-side event kind.
    ///
    /// Returns the handler it replaced, if any.
    pub fn on_read(
        &mut self,
        kind: ReadKind,
        handler: impl FnMut(ReadEvent<'_>) + Send + 'static,
    ) -> Option<ReadHandler> {
        self.events.set_read(kind, Box::new(handler))
    }

    /// Removes the handler for a read-side event kind.
    ///
    /// Returns the removed handler; `None` means there was nothing to
    /// remove.
    pub fn clear_read(&mut self, kind: ReadKind) -> Option<ReadHandler> {
        self.events.clear_read(kind)
    }

    // --- internal accessors ---------------------------------------------

    pub(crate) fn entity(&self, id: EntityId) -> Result<&Entity, WorldError> {
        if id < 0 {
            return Err(WorldError::InvalidEntity);
        }
        self.entities.get(&id).ok_or(WorldError::Untracked)
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, WorldError> {
        if id < 0 {
            return Err(WorldError::InvalidEntity);
        }
        self.entities.get_mut(&id).ok_or(WorldError::Untracked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_world() -> World {
        World::new(WorldConfig::uniform(4, 10.0, crate::ChunkOrigin::Middle))
    }

    #[test]
    fn track_rejects_duplicates_and_negative_ids() {
        let mut world = small_world();
        assert_eq!(world.track(-1), Err(WorldError::InvalidEntity));
        assert_eq!(world.track(1), Ok(()));
        assert_eq!(world.track(1), Err(WorldError::AlreadyTracked));
        assert!(world.is_tracked(1));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn untrack_rejects_missing_entities() {
        let mut world = small_world();
        assert_eq!(world.untrack(5), Err(WorldError::Untracked));
        world.track(5).unwrap();
        assert_eq!(world.untrack(5), Ok(()));
        assert!(!world.is_tracked(5));
    }

    #[test]
    fn owner_set_mints_fresh_tokens() {
        let mut world = small_world();
        world.track(1).unwrap();

        world.owner_set(1, 100).unwrap();
        let first = world.entities[&1].ownership.unwrap();
        assert_eq!(first.owner, 100);

        world.owner_set(1, 200).unwrap();
        let second = world.entities[&1].ownership.unwrap();
        assert_eq!(second.owner, 200);
        assert_ne!(first.token, second.token);

        // Re-assigning the same owner still rolls the generation.
        world.owner_set(1, 200).unwrap();
        let third = world.entities[&1].ownership.unwrap();
        assert_ne!(second.token, third.token);
    }

    #[test]
    fn owner_set_creates_and_releases_snapshots() {
        let mut world = small_world();
        world.track(1).unwrap();
        world.track(2).unwrap();

        world.owner_set(1, 7).unwrap();
        world.owner_set(2, 7).unwrap();
        assert!(world.snapshots.contains_key(&7));

        world.untrack(1).unwrap();
        assert!(world.snapshots.contains_key(&7), "still owns entity 2");
        world.untrack(2).unwrap();
        assert!(!world.snapshots.contains_key(&7));
    }

    #[test]
    fn owner_clear_removes_the_claim() {
        let mut world = small_world();
        world.track(1).unwrap();
        world.owner_set(1, 9).unwrap();
        world.owner_set(1, OWNER_INVALID).unwrap();
        assert_eq!(world.owner_get(1), Ok(OWNER_INVALID));
        assert_eq!(world.owner_set(1, -5), Err(WorldError::InvalidOwner));
    }

    #[test]
    fn chunk_set_validates_against_the_grid() {
        let mut world = small_world();
        world.track(1).unwrap();

        let chunk = world.grid().chunk_at(0.0, 0.0, 0.0);
        world.chunk_set(1, chunk).unwrap();
        assert_eq!(world.chunk_get(1), Ok(chunk));

        assert_eq!(world.chunk_set(1, 9999), Err(WorldError::InvalidChunk));
        world.chunk_set(1, CHUNK_INVALID).unwrap();
        assert_eq!(world.chunk_get(1), Ok(CHUNK_INVALID));
    }

    #[test]
    fn chunk_array_clears_unused_slots() {
        let mut world = small_world();
        world.track(1).unwrap();
        let a = world.grid().chunk_id(0, 0, 0);
        let b = world.grid().chunk_id(1, 0, 0);

        world.chunk_array_set(1, &[a, b]).unwrap();
        assert_eq!(world.chunk_array_get(1), Ok(&[a, b][..]));

        world.chunk_array_set(1, &[b]).unwrap();
        assert_eq!(world.chunk_array_get(1), Ok(&[b][..]));

        let too_many = [a; MAX_CHUNKS_PER_ENTITY + 1];
        assert_eq!(
            world.chunk_array_set(1, &too_many),
            Err(WorldError::InvalidChunk)
        );
    }

    #[test]
    fn visibility_override_for_own_owner_is_ignored() {
        let mut world = small_world();
        world.track(1).unwrap();
        world.owner_set(1, 3).unwrap();

        assert_eq!(
            world.visibility_owner_set(1, 3, Visibility::Never),
            Err(WorldError::VisibilityIgnored)
        );
        world.visibility_owner_set(1, 4, Visibility::Never).unwrap();
        assert_eq!(world.visibility_owner_get(1, 4), Ok(Visibility::Never));
        assert_eq!(world.visibility_owner_get(1, 5), Ok(Visibility::Default));
    }

    #[test]
    fn iteration_helpers() {
        let mut world = small_world();
        world.track(1).unwrap();
        world.track(2).unwrap();
        world.track(3).unwrap();
        world.owner_set(2, 50).unwrap();
        let chunk = world.grid().chunk_id(0, 0, 0);
        world.chunk_set(3, chunk).unwrap();

        assert_eq!(world.entities().count(), 3);
        assert_eq!(world.entities_owned_by(50).collect::<Vec<_>>(), vec![2]);
        assert_eq!(world.entities_in_chunk(chunk).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn entity_userdata_roundtrip() {
        let mut world = small_world();
        world.track(1).unwrap();
        world.entity_userdata_set(1, Box::new(42_u32)).unwrap();
        let data = world.entity_userdata(1).unwrap().unwrap();
        assert_eq!(data.downcast_ref::<u32>(), Some(&42));
    }
}
