//! The chunk grid: id packing, real-space mapping, radius expansion.

use lattice_utils::{CHUNK_INVALID, ChunkId};
use rustc_hash::FxHashSet;

use crate::config::WorldConfig;

/// The packed chunk-id space of one world.
///
/// A chunk id encodes `(cx, cy, cz)` as
/// `id = (cz * Y * Z) + (cy * Y) + cx` after each axis has been biased by
/// its origin offset; the mapping is kept bit-for-bit compatible with the
/// wire peers' grids, so both sides must be configured identically.
#[derive(Debug, Clone)]
pub struct ChunkGrid {
    count: [i64; 3],
    size: [f64; 3],
    bias: [i64; 3],
}

impl ChunkGrid {
    pub(crate) fn new(config: &WorldConfig) -> Self {
        Self {
            count: config.chunk_count.map(i64::from),
            size: config.chunk_size,
            bias: [
                i64::from(config.origin[0].bias(config.chunk_count[0])),
                i64::from(config.origin[1].bias(config.chunk_count[1])),
                i64::from(config.origin[2].bias(config.chunk_count[2])),
            ],
        }
    }

    /// Total number of addressable chunks.
    #[must_use]
    pub fn capacity(&self) -> i64 {
        self.count[0] * self.count[1] * self.count[2]
    }

    /// One past the largest id the packing can produce. On non-cubic grids
    /// this exceeds [`ChunkGrid::capacity`]; the id space has holes there.
    fn id_bound(&self) -> i64 {
        let plane = self.count[1] * self.count[2];
        (self.count[2] - 1) * plane + (self.count[1] - 1) * self.count[1] + self.count[0]
    }

    /// Packs chunk coordinates into a chunk id.
    ///
    /// Coordinates outside the configured grid yield [`CHUNK_INVALID`].
    #[must_use]
    pub fn chunk_id(&self, cx: i32, cy: i32, cz: i32) -> ChunkId {
        let x = i64::from(cx) + self.bias[0];
        let y = i64::from(cy) + self.bias[1];
        let z = i64::from(cz) + self.bias[2];
        if x < 0 || x >= self.count[0] || y < 0 || y >= self.count[1] || z < 0 || z >= self.count[2]
        {
            return CHUNK_INVALID;
        }
        (z * self.count[1] * self.count[2]) + (y * self.count[1]) + x
    }

    /// Unpacks a chunk id back into chunk coordinates.
    ///
    /// Returns `None` for ids no coordinate triple of this grid packs to.
    #[must_use]
    pub fn chunk_coords(&self, id: ChunkId) -> Option<(i32, i32, i32)> {
        if id < 0 || id >= self.id_bound() {
            return None;
        }
        let plane = self.count[1] * self.count[2];
        let z = id / plane;
        let rest = id - z * plane;
        let y = rest / self.count[1];
        let x = rest - y * self.count[1];
        let coords = (
            (x - self.bias[0]) as i32,
            (y - self.bias[1]) as i32,
            (z - self.bias[2]) as i32,
        );
        // On grids whose X extent exceeds Y the packing is not surjective;
        // only ids that pack back are real chunks.
        (self.chunk_id(coords.0, coords.1, coords.2) == id).then_some(coords)
    }

    /// Whether `id` addresses a chunk of this grid.
    #[must_use]
    pub fn contains(&self, id: ChunkId) -> bool {
        self.chunk_coords(id).is_some()
    }

    /// The chunk containing a real-space position.
    #[must_use]
    pub fn chunk_at(&self, x: f64, y: f64, z: f64) -> ChunkId {
        self.chunk_id(
            (x / self.size[0]).floor() as i32,
            (y / self.size[1]).floor() as i32,
            (z / self.size[2]).floor() as i32,
        )
    }

    /// Collects every chunk whose center lies within Euclidean chunk
    /// distance `radius` of `center`, discarding off-grid chunks.
    pub fn radius_chunks(&self, center: ChunkId, radius: i8, out: &mut FxHashSet<ChunkId>) {
        let Some((cx, cy, cz)) = self.chunk_coords(center) else {
            return;
        };
        let r = i32::from(radius.max(0));
        let r_sq = r * r;
        for dz in -r..=r {
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx * dx + dy * dy + dz * dz > r_sq {
                        continue;
                    }
                    let id = self.chunk_id(cx + dx, cy + dy, cz + dz);
                    if id != CHUNK_INVALID {
                        out.insert(id);
                    }
                }
            }
        }
    }
}
