//! Server-authoritative world replication.
//!
//! A [`World`] tracks entities in a chunked 3D grid and, per *owner* (a
//! network peer), computes what that owner should see, diffs it against
//! the owner's last-sent snapshot, and packs the difference into a compact
//! binary buffer of CREATE/UPDATE/REMOVE/OWNER operations. The symmetric
//! [`World::read`] applies such a buffer on the receiving side,
//! maintaining *foreign* entities whose authority lives elsewhere.
//!
//! The engine owns neither transport nor simulation: buffers go in and out
//! as byte slices, and per-entity payloads are produced and consumed by
//! host-registered handlers.
//!
//! # Example
//!
//! ```
//! use lattice_world::{ChunkOrigin, World, WorldConfig, WriteKind};
//!
//! let mut server = World::new(WorldConfig::uniform(16, 16.0, ChunkOrigin::Middle));
//! server.track(7)?;
//! server.owner_set(7, 1)?;
//! let chunk = server.grid().chunk_at(0.0, 0.0, 0.0);
//! server.chunk_set(7, chunk)?;
//! server.radius_set(7, 2)?;
//!
//! // Payload layout is the host's business; here it is four zero bytes.
//! server.on_write(WriteKind::Create, |event| {
//!     event.buffer[..4].fill(0);
//!     Some(4)
//! });
//!
//! let mut buf = [0_u8; 1024];
//! let report = server.write(1, &mut buf, None)?;
//! assert_eq!(report.shortfall, 0);
//!
//! // The peer applies the same bytes symmetrically.
//! let mut client = World::new(WorldConfig::uniform(16, 16.0, ChunkOrigin::Middle));
//! client.read(1, &buf[..report.written], None)?;
//! assert!(client.is_foreign(7));
//! # Ok::<(), lattice_world::WorldError>(())
//! ```

pub mod chunk;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod pack;
pub mod query;
pub mod unpack;
mod world;

pub use chunk::ChunkGrid;
pub use config::ChunkOrigin;
pub use config::WorldConfig;
pub use entity::MAX_CHUNKS_PER_ENTITY;
pub use entity::Visibility;
pub use error::WorldError;
pub use events::ReadEvent;
pub use events::ReadHandler;
pub use events::ReadKind;
pub use events::WriteEvent;
pub use events::WriteHandler;
pub use events::WriteKind;
pub use pack::WriteReport;
pub use query::MAX_QUERY_ENTITIES;
pub use query::QueryResult;
pub use world::World;

pub use lattice_utils::CHUNK_INVALID;
pub use lattice_utils::ChunkId;
pub use lattice_utils::EntityId;
pub use lattice_utils::OWNER_INVALID;
pub use lattice_utils::OwnerId;
