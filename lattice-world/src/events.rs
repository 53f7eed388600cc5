//! Event kinds, descriptors, and the per-world handler table.
//!
//! Handlers are the only place payload bytes are produced or consumed; the
//! engine treats them as opaque. Handlers receive an event descriptor, not
//! the world: re-entering the world from inside `write`/`read` is thereby
//! impossible rather than merely forbidden.

use std::any::Any;

use lattice_utils::{EntityId, OwnerId};

/// The write-side event kinds, one per outgoing segment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    /// An entity enters the target owner's view.
    Create,
    /// An entity already in view is refreshed.
    Update,
    /// An entity leaves the target owner's view.
    Remove,
    /// The target owner is granted ownership of an entity.
    Owner,
}

impl WriteKind {
    pub(crate) const COUNT: usize = 4;

    pub(crate) fn index(self) -> usize {
        match self {
            WriteKind::Create => 0,
            WriteKind::Update => 1,
            WriteKind::Remove => 2,
            WriteKind::Owner => 3,
        }
    }
}

/// The read-side event kinds: one per accepted inbound operation plus the
/// error cases dispatched when a value is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadKind {
    /// A foreign entity was created locally.
    Create,
    /// An inbound update was accepted.
    Update,
    /// A foreign entity was removed locally.
    Remove,
    /// An ownership grant was applied locally.
    Owner,
    /// A create failed (the id already exists or is invalid).
    ErrorCreate,
    /// An update was refused (unknown entity, wrong owner, stale token).
    ErrorUpdate,
    /// A remove was refused (unknown or non-foreign entity).
    ErrorRemove,
    /// An ownership grant was refused (unknown or non-foreign entity).
    ErrorOwner,
}

impl ReadKind {
    pub(crate) const COUNT: usize = 8;

    pub(crate) fn index(self) -> usize {
        match self {
            ReadKind::Create => 0,
            ReadKind::Update => 1,
            ReadKind::Remove => 2,
            ReadKind::Owner => 3,
            ReadKind::ErrorCreate => 4,
            ReadKind::ErrorUpdate => 5,
            ReadKind::ErrorRemove => 6,
            ReadKind::ErrorOwner => 7,
        }
    }
}

/// A write-side event: the packer asking the host to produce the payload
/// for one entity.
pub struct WriteEvent<'a> {
    /// Which segment the value is for.
    pub kind: WriteKind,
    /// The entity being packed.
    pub entity_id: EntityId,
    /// The owner the buffer is being written for.
    pub owner_id: OwnerId,
    /// Payload destination. May be empty when the output buffer is full;
    /// returning the needed size anyway feeds the shortfall estimate.
    pub buffer: &'a mut [u8],
    /// The userdata passed to `write`, if any.
    pub userdata: Option<&'a mut (dyn Any + Send)>,
}

/// A read-side event: one inbound value, accepted or refused.
pub struct ReadEvent<'a> {
    /// What happened.
    pub kind: ReadKind,
    /// The entity the value concerns.
    pub entity_id: EntityId,
    /// The peer that authored the buffer.
    pub owner_id: OwnerId,
    /// The value's opaque payload.
    pub payload: &'a [u8],
    /// The userdata passed to `read`, if any.
    pub userdata: Option<&'a mut (dyn Any + Send)>,
}

/// Produces payload bytes for a write-side event.
///
/// Return `Some(n)` with `n <= buffer.len()` after writing `n` bytes into
/// the event's buffer; `Some(n)` with `n > buffer.len()` to request `n`
/// bytes on a future write (the value is withheld and counted into the
/// shortfall); or `None` to withhold the entity from this segment.
pub type WriteHandler = Box<dyn FnMut(WriteEvent<'_>) -> Option<usize> + Send>;

/// Consumes a read-side event. The return value of inbound handling is
/// ignored by the engine.
pub type ReadHandler = Box<dyn FnMut(ReadEvent<'_>) + Send>;

/// One optional handler per event kind.
pub(crate) struct EventTable {
    write: [Option<WriteHandler>; WriteKind::COUNT],
    read: [Option<ReadHandler>; ReadKind::COUNT],
}

impl Default for EventTable {
    fn default() -> Self {
        Self {
            write: [None, None, None, None],
            read: [None, None, None, None, None, None, None, None],
        }
    }
}

impl EventTable {
    pub fn set_write(&mut self, kind: WriteKind, handler: WriteHandler) -> Option<WriteHandler> {
        self.write[kind.index()].replace(handler)
    }

    pub fn clear_write(&mut self, kind: WriteKind) -> Option<WriteHandler> {
        self.write[kind.index()].take()
    }

    pub fn write_handler(&mut self, kind: WriteKind) -> Option<&mut WriteHandler> {
        self.write[kind.index()].as_mut()
    }

    pub fn set_read(&mut self, kind: ReadKind, handler: ReadHandler) -> Option<ReadHandler> {
        self.read[kind.index()].replace(handler)
    }

    pub fn clear_read(&mut self, kind: ReadKind) -> Option<ReadHandler> {
        self.read[kind.index()].take()
    }

    /// Invokes the handler for `event.kind`, if one is installed.
    pub fn dispatch_read(&mut self, event: ReadEvent<'_>) {
        if let Some(handler) = self.read[event.kind.index()].as_mut() {
            handler(event);
        }
    }
}
