//! The scene-side handle chunks are attached to.

use rustc_hash::FxHashMap;

use crate::chunk::{Chunk, ChunkId};

/// Host scene group that owns chunk meshes while they are active.
pub trait RenderGroup {
    /// Add a chunk's mesh to the group, hidden.
    fn attach(&mut self, chunk: &Chunk);

    /// Remove a chunk and release whatever the group holds for it.
    fn detach(&mut self, id: ChunkId);

    /// Show or hide an attached chunk.
    fn set_visible(&mut self, id: ChunkId, visible: bool);

    /// New geometry and maps are available for an attached chunk.
    fn upload(&mut self, chunk: &Chunk);

    /// Build the chunk's render program on first draw. Returns false when the
    /// program failed to build.
    fn build_program(&mut self, chunk: &Chunk) -> bool;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Entry {
    visible: bool,
    uploads: u32,
}

/// Bookkeeping-only group for headless runs and tests.
#[derive(Debug, Default)]
pub struct HeadlessRenderGroup {
    entries: FxHashMap<ChunkId, Entry>,
    programs_built: usize,
    fail_programs: bool,
}

impl HeadlessRenderGroup {
    /// Empty group whose programs always build.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `build_program` call fails.
    pub fn with_failing_programs() -> Self {
        Self {
            fail_programs: true,
            ..Self::default()
        }
    }

    /// Make later `build_program` calls fail or succeed.
    pub fn set_fail_programs(&mut self, fail: bool) {
        self.fail_programs = fail;
    }

    /// Attached and not yet detached.
    pub fn is_attached(&self, id: ChunkId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Attached and shown.
    pub fn is_visible(&self, id: ChunkId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.visible)
    }

    /// Chunks currently attached.
    pub fn attached_count(&self) -> usize {
        self.entries.len()
    }

    /// Attached chunks currently shown.
    pub fn visible_count(&self) -> usize {
        self.entries.values().filter(|e| e.visible).count()
    }

    /// Uploads received by `id` since it was attached.
    pub fn uploads(&self, id: ChunkId) -> u32 {
        self.entries.get(&id).map_or(0, |e| e.uploads)
    }

    /// Successful `build_program` calls.
    pub fn programs_built(&self) -> usize {
        self.programs_built
    }
}

impl RenderGroup for HeadlessRenderGroup {
    fn attach(&mut self, chunk: &Chunk) {
        self.entries.insert(chunk.id(), Entry::default());
    }

    fn detach(&mut self, id: ChunkId) {
        self.entries.remove(&id);
    }

    fn set_visible(&mut self, id: ChunkId, visible: bool) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.visible = visible;
        }
    }

    fn upload(&mut self, chunk: &Chunk) {
        if let Some(entry) = self.entries.get_mut(&chunk.id()) {
            entry.uploads += 1;
        }
    }

    fn build_program(&mut self, _chunk: &Chunk) -> bool {
        self.programs_built += 1;
        !self.fail_programs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkVariant;

    #[test]
    fn test_attach_hidden_then_reveal() {
        let mut group = HeadlessRenderGroup::new();
        let chunk = Chunk::new(ChunkId(3), ChunkVariant::Standard);
        group.attach(&chunk);
        assert!(group.is_attached(ChunkId(3)));
        assert!(!group.is_visible(ChunkId(3)));
        group.set_visible(ChunkId(3), true);
        assert_eq!(group.visible_count(), 1);
        group.upload(&chunk);
        assert_eq!(group.uploads(ChunkId(3)), 1);
        group.detach(ChunkId(3));
        assert_eq!(group.attached_count(), 0);
        group.set_visible(ChunkId(3), true);
        assert_eq!(group.visible_count(), 0);
    }

    #[test]
    fn test_failing_programs() {
        let chunk = Chunk::new(ChunkId(1), ChunkVariant::Standard);
        let mut group = HeadlessRenderGroup::with_failing_programs();
        assert!(!group.build_program(&chunk));
        group.set_fail_programs(false);
        assert!(group.build_program(&chunk));
        assert_eq!(group.programs_built(), 2);
    }
}
