//! Shared primitives for the lattice replication engine: identifier types,
//! the little-endian codec traits the wire format is built on, and the
//! per-world random number generator used to mint ownership tokens.

pub mod random;
pub mod serial;
pub mod types;

pub use types::CHUNK_INVALID;
pub use types::ChunkId;
pub use types::EntityId;
pub use types::OWNER_INVALID;
pub use types::OwnerId;
pub use types::Ownership;
