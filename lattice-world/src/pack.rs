//! The write pass: per-owner snapshot diff, emitted as wire segments.

use std::any::Any;

use lattice_protocol::{MAX_PAYLOAD_LEN, SegmentKind, SegmentWriter};
use lattice_utils::{EntityId, OwnerId};
use smallvec::SmallVec;

use crate::entity::EntityFlags;
use crate::error::WorldError;
use crate::events::{EventTable, WriteEvent, WriteKind};
use crate::query::MAX_QUERY_ENTITIES;
use crate::world::{Snapshot, World};

/// The outcome of a write pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Bytes emitted into the caller's buffer.
    pub written: usize,
    /// Extra bytes a retry would have needed to admit everything; zero
    /// when the buffer held the complete update.
    pub shortfall: usize,
}

/// What happened to one candidate value.
enum Produced {
    /// Emitted into the buffer.
    Emitted,
    /// Did not fit; its size was counted into the shortfall.
    Withheld,
    /// The handler withheld it deliberately.
    Rejected,
}

impl World {
    /// Packs everything `owner` should learn this tick into `buf`.
    ///
    /// Emits up to four segments in the fixed order CREATE, UPDATE,
    /// REMOVE, OWNER; empty segments are omitted. The owner's snapshot is
    /// replaced at the end, so anything that did not make it out (withheld
    /// by a handler, or squeezed out by the buffer) is retried on the next
    /// write. A non-zero [`WriteReport::shortfall`] tells the caller how
    /// many extra bytes that retry would have needed.
    pub fn write(
        &mut self,
        owner: OwnerId,
        buf: &mut [u8],
        mut userdata: Option<&mut (dyn Any + Send)>,
    ) -> Result<WriteReport, WorldError> {
        let visible = self.query(owner, MAX_QUERY_ENTITIES)?.visible;
        let mut previous = self.snapshots.remove(&owner).unwrap_or_default();
        let mut next = Snapshot::default();
        let mut notified: SmallVec<[EntityId; 16]> = SmallVec::new();

        let Self {
            ref entities,
            ref mut events,
            ..
        } = *self;
        let mut writer = SegmentWriter::new(buf);

        // CREATE: visible, unseen, locally authored.
        writer.open(SegmentKind::Create);
        for &id in &visible {
            let Some(entity) = entities.get(&id) else {
                continue;
            };
            if entity.is_foreign() || previous.contains_key(&id) {
                continue;
            }
            if let Produced::Emitted = produce(
                &mut writer,
                events,
                WriteKind::Create,
                id,
                owner,
                0,
                &mut userdata,
            ) {
                next.insert(id, false);
            }
        }
        writer.close();

        // UPDATE: visible and either already seen or foreign. Seen
        // entities are marked retained so the remove pass skips them.
        writer.open(SegmentKind::Update);
        for &id in &visible {
            let Some(entity) = entities.get(&id) else {
                continue;
            };
            match previous.get_mut(&id) {
                Some(retained) => *retained = true,
                None if !entity.is_foreign() => continue,
                None => {}
            }
            let token = if entity.is_foreign() {
                entity.ownership.map_or(0, |claim| claim.token_bits())
            } else {
                0
            };
            produce(
                &mut writer,
                events,
                WriteKind::Update,
                id,
                owner,
                token,
                &mut userdata,
            );
            // Whatever the outcome, the entity stays in view.
            next.insert(id, false);
        }
        writer.close();

        // REMOVE: seen before, no longer visible, locally authored. A
        // value that stays behind keeps its snapshot entry and is
        // retried.
        writer.open(SegmentKind::Remove);
        for (&id, &retained) in &previous {
            if retained || entities.get(&id).is_some_and(|entity| entity.is_foreign()) {
                continue;
            }
            match produce(
                &mut writer,
                events,
                WriteKind::Remove,
                id,
                owner,
                0,
                &mut userdata,
            ) {
                Produced::Emitted => {}
                Produced::Withheld | Produced::Rejected => {
                    next.insert(id, false);
                }
            }
        }
        writer.close();

        // OWNER: newly owned by this owner and already part of the new
        // snapshot; carries the fresh token. Emitted last so the grant is
        // observed after any final update from the former owner.
        writer.open(SegmentKind::Owner);
        for &id in &visible {
            let Some(entity) = entities.get(&id) else {
                continue;
            };
            if !entity.owned_by(owner)
                || !entity.flags.contains(EntityFlags::OWNER_UPDATED)
                || !next.contains_key(&id)
            {
                continue;
            }
            let token = entity.ownership.map_or(0, |claim| claim.token_bits());
            if let Produced::Emitted = produce(
                &mut writer,
                events,
                WriteKind::Owner,
                id,
                owner,
                token,
                &mut userdata,
            ) {
                notified.push(id);
            }
        }
        writer.close();

        let (written, shortfall) = writer.finish();

        // The grant is on the wire; the flag has served its purpose.
        for id in notified {
            if let Some(entity) = self.entities.get_mut(&id) {
                entity.flags.remove(EntityFlags::OWNER_UPDATED);
            }
        }
        self.snapshots.insert(owner, next);

        log::trace!("write to {owner}: {written} byte(s), shortfall {shortfall}");
        Ok(WriteReport { written, shortfall })
    }
}

/// Runs the handler for one candidate and commits the value if it fits.
fn produce(
    writer: &mut SegmentWriter<'_>,
    events: &mut EventTable,
    kind: WriteKind,
    id: EntityId,
    owner: OwnerId,
    token: u16,
    userdata: &mut Option<&mut (dyn Any + Send)>,
) -> Produced {
    let payload_len = match events.write_handler(kind) {
        Some(handler) => {
            let event = WriteEvent {
                kind,
                entity_id: id,
                owner_id: owner,
                buffer: writer.payload_slice(),
                userdata: userdata.as_mut().map(|data| &mut **data),
            };
            match handler(event) {
                Some(len) => len,
                None => return Produced::Rejected,
            }
        }
        None => 0,
    };

    if payload_len > MAX_PAYLOAD_LEN {
        log::warn!("{kind:?} payload for entity {id} exceeds {MAX_PAYLOAD_LEN} bytes, dropped");
        return Produced::Rejected;
    }
    if writer.commit(id as u64, token, payload_len) {
        Produced::Emitted
    } else {
        Produced::Withheld
    }
}
