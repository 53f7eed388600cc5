//! World configuration.

use serde::Deserialize;

/// Where the coordinate origin sits along one grid axis.
///
/// The grid itself is always `[0, extent)` internally; the origin decides
/// which user-facing chunk coordinates land inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkOrigin {
    /// Coordinate 0 is the first chunk; negative coordinates are off-grid.
    Begin,
    /// Coordinate 0 sits in the middle of the axis.
    #[default]
    Middle,
    /// Coordinate -1 is the last chunk; non-negative coordinates are
    /// off-grid.
    End,
}

impl ChunkOrigin {
    /// The bias added to a user coordinate to index the grid.
    pub(crate) fn bias(self, extent: u16) -> i32 {
        match self {
            ChunkOrigin::Begin => 0,
            ChunkOrigin::Middle => i32::from(extent) / 2,
            ChunkOrigin::End => i32::from(extent),
        }
    }
}

/// Configuration a [`World`](crate::World) is built from.
///
/// Every field has a default, so hosts can deserialize partial documents.
/// Values are sanitized on world creation: chunk counts are raised to at
/// least 1 and non-finite or non-positive chunk sizes fall back to the
/// default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Chunks per axis.
    pub chunk_count: [u16; 3],
    /// Chunk edge length per axis, in world units.
    pub chunk_size: [f64; 3],
    /// Per-axis placement of the coordinate origin.
    pub origin: [ChunkOrigin; 3],
    /// Seed for the world's token generator.
    pub seed: u64,
}

const DEFAULT_CHUNK_COUNT: u16 = 256;
const DEFAULT_CHUNK_SIZE: f64 = 16.0;

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_count: [DEFAULT_CHUNK_COUNT; 3],
            chunk_size: [DEFAULT_CHUNK_SIZE; 3],
            origin: [ChunkOrigin::Middle; 3],
            seed: 0,
        }
    }
}

impl WorldConfig {
    /// Uniform counts, sizes and origins on all three axes.
    #[must_use]
    pub fn uniform(chunk_count: u16, chunk_size: f64, origin: ChunkOrigin) -> Self {
        Self {
            chunk_count: [chunk_count; 3],
            chunk_size: [chunk_size; 3],
            origin: [origin; 3],
            ..Self::default()
        }
    }

    pub(crate) fn sanitized(mut self) -> Self {
        for count in &mut self.chunk_count {
            if *count == 0 {
                *count = 1;
            }
        }
        for size in &mut self.chunk_size {
            if !size.is_finite() || *size <= 0.0 {
                *size = DEFAULT_CHUNK_SIZE;
            }
        }
        self
    }
}
