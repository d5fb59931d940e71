//! Shared grid topology (indices and uvs) keyed by resolution.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use rustc_hash::FxHashMap;

/// Index and uv buffers of a `(resolution + 1)²` vertex grid.
///
/// Identical for every chunk of the same resolution, so one copy is kept per
/// resolution in a process-wide cache and chunks hold weak references.
#[derive(Debug, PartialEq)]
pub struct GridTopology {
    resolution: u32,
    indices: Vec<u32>,
    uvs: Vec<[f32; 2]>,
}

fn cache() -> &'static Mutex<FxHashMap<u32, Arc<GridTopology>>> {
    static CACHE: OnceLock<Mutex<FxHashMap<u32, Arc<GridTopology>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(FxHashMap::default()))
}

impl GridTopology {
    #[must_use]
    pub fn new(resolution: u32) -> Self {
        let side = resolution + 1;
        let mut indices = Vec::with_capacity((resolution * resolution * 6) as usize);
        for j in 0..resolution {
            for i in 0..resolution {
                let sw = j * side + i;
                let se = sw + 1;
                let nw = sw + side;
                let ne = nw + 1;
                indices.extend_from_slice(&[sw, se, ne, sw, ne, nw]);
            }
        }
        let uvs = (0..side)
            .flat_map(|j| (0..side).map(move |i| (i, j)))
            .map(|(i, j)| [i as f32 / resolution as f32, j as f32 / resolution as f32])
            .collect();
        Self {
            resolution,
            indices,
            uvs,
        }
    }

    /// The cached topology for `resolution`, built on first request.
    ///
    /// A poisoned cache lock is recovered: entries are immutable once
    /// inserted.
    pub fn shared(resolution: u32) -> Arc<GridTopology> {
        let mut map = cache().lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            map.entry(resolution)
                .or_insert_with(|| Arc::new(GridTopology::new(resolution))),
        )
    }

    #[must_use]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[must_use]
    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.uvs
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.uvs.len()
    }

    /// Row-major index of vertex `(i, j)`.
    #[inline]
    #[must_use]
    pub fn vertex_index(&self, i: u32, j: u32) -> usize {
        (j * (self.resolution + 1) + i) as usize
    }
}
