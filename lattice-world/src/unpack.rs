//! The read pass: applying a received buffer to local state.

use std::any::Any;
use std::num::NonZeroU16;

use lattice_protocol::{SegmentKind, SegmentReader};
use lattice_utils::{EntityId, OwnerId};

use crate::entity::{Entity, EntityFlags};
use crate::error::WorldError;
use crate::events::{ReadEvent, ReadKind};
use crate::world::World;

impl World {
    /// Applies a buffer authored by the peer `owner`.
    ///
    /// Segments are processed in the order they appear; each value either
    /// mutates local state and dispatches its read event, or dispatches
    /// the matching error event and changes nothing. Framing corruption
    /// aborts with [`WorldError::Read`] before any value of the offending
    /// segment is dispatched.
    ///
    /// Returns the residual: bytes carried by well-framed segments of
    /// unknown kind, zero for fully understood buffers.
    pub fn read(
        &mut self,
        owner: OwnerId,
        buf: &[u8],
        mut userdata: Option<&mut (dyn Any + Send)>,
    ) -> Result<usize, WorldError> {
        if owner < 0 {
            return Err(WorldError::InvalidOwner);
        }

        let mut reader = SegmentReader::new(buf);
        while let Some(segment) = reader.next_segment()? {
            for value in segment.values() {
                let id = value.entity_id as EntityId;
                match segment.kind {
                    SegmentKind::Create => {
                        self.apply_create(id, owner, value.payload, &mut userdata);
                    }
                    SegmentKind::Update => {
                        self.apply_update(id, owner, value.token, value.payload, &mut userdata);
                    }
                    SegmentKind::Remove => {
                        self.apply_remove(id, owner, value.payload, &mut userdata);
                    }
                    SegmentKind::Owner => {
                        self.apply_owner(id, owner, value.token, value.payload, &mut userdata);
                    }
                }
            }
        }
        let residual = reader.residual();
        if residual > 0 {
            log::trace!("read from {owner}: {residual} residual byte(s)");
        }
        Ok(residual)
    }

    /// Tracks a foreign entity, or reports why it could not.
    fn apply_create(
        &mut self,
        id: EntityId,
        owner: OwnerId,
        payload: &[u8],
        userdata: &mut Option<&mut (dyn Any + Send)>,
    ) {
        let kind = if id < 0 || self.entities.contains_key(&id) {
            ReadKind::ErrorCreate
        } else {
            let mut entity = Entity::new();
            entity.flags.insert(EntityFlags::FOREIGN);
            self.entities.insert(id, entity);
            log::debug!("tracked foreign entity {id} from {owner}");
            ReadKind::Create
        };
        self.dispatch(kind, id, owner, payload, userdata);
    }

    /// Accepts an update for a foreign entity, or for a local entity the
    /// sender still owns under the token generation it carries.
    fn apply_update(
        &mut self,
        id: EntityId,
        owner: OwnerId,
        token: u16,
        payload: &[u8],
        userdata: &mut Option<&mut (dyn Any + Send)>,
    ) {
        let accepted = match self.entities.get(&id) {
            Some(entity) if entity.is_foreign() => true,
            Some(entity) => entity
                .ownership
                .is_some_and(|claim| claim.owner == owner && claim.token_bits() == token),
            None => false,
        };
        let kind = if accepted {
            ReadKind::Update
        } else {
            ReadKind::ErrorUpdate
        };
        self.dispatch(kind, id, owner, payload, userdata);
    }

    /// Removes a foreign entity; the callback sees it while it still
    /// exists.
    fn apply_remove(
        &mut self,
        id: EntityId,
        owner: OwnerId,
        payload: &[u8],
        userdata: &mut Option<&mut (dyn Any + Send)>,
    ) {
        if self.is_foreign(id) {
            self.dispatch(ReadKind::Remove, id, owner, payload, userdata);
            self.untrack_inner(id);
        } else {
            self.dispatch(ReadKind::ErrorRemove, id, owner, payload, userdata);
        }
    }

    /// Applies an ownership grant: the entity is now owned, locally, by
    /// the peer this buffer was addressed to, under the carried token.
    ///
    /// The foreign flag is cleared around the shared ownership
    /// bookkeeping so it runs the same path as a local `owner_set`, then
    /// restored; authority over the entity still lives with the sender.
    fn apply_owner(
        &mut self,
        id: EntityId,
        owner: OwnerId,
        token: u16,
        payload: &[u8],
        userdata: &mut Option<&mut (dyn Any + Send)>,
    ) {
        let foreign = self.is_foreign(id);
        let kind = match NonZeroU16::new(token) {
            Some(token) if foreign => {
                if let Some(entity) = self.entities.get_mut(&id) {
                    entity.flags.remove(EntityFlags::FOREIGN);
                }
                self.assign_owner(id, owner, token);
                if let Some(entity) = self.entities.get_mut(&id) {
                    // The grant came from the wire; nobody is left to notify.
                    entity.flags.remove(EntityFlags::OWNER_UPDATED);
                    entity.flags.insert(EntityFlags::FOREIGN);
                }
                log::debug!("entity {id} granted to {owner}");
                ReadKind::Owner
            }
            _ => ReadKind::ErrorOwner,
        };
        self.dispatch(kind, id, owner, payload, userdata);
    }

    fn dispatch(
        &mut self,
        kind: ReadKind,
        entity_id: EntityId,
        owner_id: OwnerId,
        payload: &[u8],
        userdata: &mut Option<&mut (dyn Any + Send)>,
    ) {
        self.events.dispatch_read(ReadEvent {
            kind,
            entity_id,
            owner_id,
            payload,
            userdata: userdata.as_mut().map(|data| &mut **data),
        });
    }
}
