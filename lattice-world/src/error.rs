//! World operation errors.

use lattice_protocol::ReadError;
use thiserror::Error;

/// Errors returned by [`World`](crate::World) operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// The owner id is negative.
    #[error("invalid owner id")]
    InvalidOwner,
    /// The chunk id does not address a chunk of this world's grid, or a
    /// chunk list exceeds the per-entity capacity.
    #[error("invalid chunk id")]
    InvalidChunk,
    /// The entity id is negative.
    #[error("invalid entity id")]
    InvalidEntity,
    /// The entity is foreign: it is authored by a remote peer and cannot
    /// be untracked or re-owned locally.
    #[error("entity is foreign")]
    ForeignEntity,
    /// No entity with this id is tracked.
    #[error("entity is not tracked")]
    Untracked,
    /// An entity with this id is already tracked locally.
    #[error("entity is already tracked")]
    AlreadyTracked,
    /// Owners always see their own entities; the override was not stored.
    #[error("visibility override ignored for the entity's own owner")]
    VisibilityIgnored,
    /// A received buffer's framing is corrupt.
    #[error(transparent)]
    Read(#[from] ReadError),
}
