//! Identifier types shared across the engine.

use std::num::NonZeroU16;

/// A tracked entity's identifier. Ids below zero are never valid.
///
/// On the wire an entity id travels as a `u64`; the signed form exists so
/// hosts can reserve negative ranges for their own bookkeeping.
pub type EntityId = i64;

/// A network peer identifier. [`OWNER_INVALID`] means "unowned".
pub type OwnerId = i64;

/// A packed chunk identifier produced by a world's chunk grid.
///
/// Valid ids lie in `[0, X * Y * Z)` for the configured grid extents;
/// everything else is [`CHUNK_INVALID`].
pub type ChunkId = i64;

/// Sentinel owner id: the entity is unowned.
pub const OWNER_INVALID: OwnerId = -1;

/// Sentinel chunk id: no placement. Terminates an entity's chunk array.
pub const CHUNK_INVALID: ChunkId = -1;

/// An entity's ownership claim: the owning peer plus the generation token
/// proving that updates were authored under this ownership.
///
/// The token is non-zero by construction, so "token is zero" and "entity is
/// unowned" are the same state: `Option<Ownership>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    /// The owning peer.
    pub owner: OwnerId,
    /// The current ownership generation token.
    pub token: NonZeroU16,
}

impl Ownership {
    /// Creates a claim for `owner` under the generation `token`.
    #[must_use]
    pub const fn new(owner: OwnerId, token: NonZeroU16) -> Self {
        Self { owner, token }
    }

    /// The token in its wire representation.
    #[must_use]
    #[inline]
    pub const fn token_bits(&self) -> u16 {
        self.token.get()
    }
}
