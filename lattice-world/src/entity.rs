//! The tracked entity record.

use std::any::Any;

use bitflags::bitflags;
use lattice_utils::{CHUNK_INVALID, ChunkId, OwnerId, Ownership};
use rustc_hash::FxHashMap;

/// Maximum number of chunks a single entity can occupy at once.
pub const MAX_CHUNKS_PER_ENTITY: usize = 8;

/// Entity state bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EntityFlags(u8);

bitflags! {
    impl EntityFlags: u8 {
        /// Learned from a remote buffer; authoritative elsewhere.
        const FOREIGN = 1;
        /// Ownership changed and the new owner was not yet notified.
        const OWNER_UPDATED = 1 << 1;
    }
}

/// How an entity resolves visibility for an owner.
///
/// A per-owner setting, when present, overrides the entity's global one;
/// either beats the chunk-radius rule. Dimension membership dominates all
/// of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Fall through to the next rule in line.
    #[default]
    Default,
    /// Hidden, regardless of chunk placement.
    Never,
    /// Shown, regardless of chunk placement.
    Always,
}

/// One tracked entity. Hosts reach these through the
/// [`World`](crate::World) operation surface only.
pub(crate) struct Entity {
    pub ownership: Option<Ownership>,
    pub chunks: [ChunkId; MAX_CHUNKS_PER_ENTITY],
    pub dimension: i32,
    pub observed_radius: i8,
    pub visibility: Visibility,
    /// Per-owner overrides; most entities never have any, so the map is
    /// not allocated until the first one is set.
    pub visibility_overrides: Option<Box<FxHashMap<OwnerId, Visibility>>>,
    pub flags: EntityFlags,
    pub userdata: Option<Box<dyn Any + Send>>,
}

impl Default for Entity {
    fn default() -> Self {
        Self {
            ownership: None,
            chunks: [CHUNK_INVALID; MAX_CHUNKS_PER_ENTITY],
            dimension: 0,
            observed_radius: 0,
            visibility: Visibility::Default,
            visibility_overrides: None,
            flags: EntityFlags::empty(),
            userdata: None,
        }
    }
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    /// The valid prefix of the chunk array. Empty means the entity is
    /// placed nowhere and participates in no queries.
    pub fn chunk_slots(&self) -> &[ChunkId] {
        let len = self
            .chunks
            .iter()
            .position(|&chunk| chunk == CHUNK_INVALID)
            .unwrap_or(MAX_CHUNKS_PER_ENTITY);
        &self.chunks[..len]
    }

    /// Replaces the chunk array, clearing unused slots to the sentinel.
    pub fn set_chunks(&mut self, list: &[ChunkId]) {
        debug_assert!(list.len() <= MAX_CHUNKS_PER_ENTITY);
        self.chunks = [CHUNK_INVALID; MAX_CHUNKS_PER_ENTITY];
        self.chunks[..list.len()].copy_from_slice(list);
    }

    pub fn is_foreign(&self) -> bool {
        self.flags.contains(EntityFlags::FOREIGN)
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.ownership.map(|claim| claim.owner)
    }

    pub fn owned_by(&self, owner: OwnerId) -> bool {
        self.owner() == Some(owner)
    }

    /// The per-owner override for `owner`, if one is set.
    pub fn visibility_override(&self, owner: OwnerId) -> Option<Visibility> {
        self.visibility_overrides
            .as_ref()
            .and_then(|map| map.get(&owner))
            .copied()
    }

    /// Sets or clears the per-owner override for `owner`. `Default` erases
    /// the entry; an emptied map is deallocated.
    pub fn set_visibility_override(&mut self, owner: OwnerId, visibility: Visibility) {
        if visibility == Visibility::Default {
            if let Some(map) = &mut self.visibility_overrides {
                map.remove(&owner);
                if map.is_empty() {
                    self.visibility_overrides = None;
                }
            }
            return;
        }
        self.visibility_overrides
            .get_or_insert_default()
            .insert(owner, visibility);
    }
}
