//! Chunk pooling, background geometry dispatch and staged reveal.
//!
//! A reconfiguration batch moves chunks through three queues: geometry jobs
//! in flight, chunks awaiting maps, and chunks ready to show. Chunks
//! superseded by the batch wait in the recycle queue. [`ChunkManager::update`]
//! commits the batch only once every job has returned and every map is
//! built, so new chunks appear and old ones vanish in the same frame.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lithos_config::ManagerConfig;
use lithos_terrain::{GridTopology, HeightField, MapGenerator, MapRequest};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::chunk::{Chunk, ChunkId, ChunkKey, ChunkVariant};
use crate::render_group::RenderGroup;
use crate::worker::{GeometryJob, JobId, WorkerPool};

/// Manager tuning taken from [`ManagerConfig`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ManagerSettings {
    /// A job running longer than this is resubmitted or failed.
    pub job_timeout: Duration,
    /// Resubmissions allowed before a chunk is failed.
    pub max_job_retries: u32,
    /// Bake displacement into positions and drop height maps.
    pub static_export: bool,
}

impl From<&ManagerConfig> for ManagerSettings {
    fn from(config: &ManagerConfig) -> Self {
        Self {
            job_timeout: Duration::from_millis(config.job_timeout_ms),
            max_job_retries: config.max_job_retries,
            static_export: config.static_export,
        }
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self::from(&ManagerConfig::default())
    }
}

struct PendingJob {
    chunk: ChunkId,
    job: GeometryJob,
    submitted: Instant,
    attempts: u32,
}

/// Owns every chunk object and stages its way from allocation to reveal.
///
/// Runs on the main thread; only geometry jobs leave it, through `W`.
pub struct ChunkManager<W: WorkerPool, G: RenderGroup> {
    worker: W,
    group: G,
    generator: Box<dyn MapGenerator>,
    field: Arc<HeightField>,
    settings: ManagerSettings,
    variant: ChunkVariant,

    chunks: FxHashMap<ChunkId, Chunk>,
    /// LIFO free lists indexed by [`ChunkVariant::index`].
    pools: [Vec<ChunkId>; 2],
    jobs: FxHashMap<JobId, PendingJob>,

    awaiting_maps: VecDeque<ChunkId>,
    ready_to_show: Vec<ChunkId>,
    pending_recycle: Vec<ChunkId>,
    /// Membership of `pending_recycle`.
    recycling: FxHashSet<ChunkId>,
    failed: Vec<ChunkKey>,

    next_chunk: u64,
    constructed: usize,
}

impl<W: WorkerPool, G: RenderGroup> ChunkManager<W, G> {
    /// Manager with empty pools and queues.
    pub fn new(
        worker: W,
        group: G,
        generator: Box<dyn MapGenerator>,
        field: Arc<HeightField>,
        settings: ManagerSettings,
        variant: ChunkVariant,
    ) -> Self {
        Self {
            worker,
            group,
            generator,
            field,
            settings,
            variant,
            chunks: FxHashMap::default(),
            pools: [Vec::new(), Vec::new()],
            jobs: FxHashMap::default(),
            awaiting_maps: VecDeque::new(),
            ready_to_show: Vec::new(),
            pending_recycle: Vec::new(),
            recycling: FxHashSet::default(),
            failed: Vec::new(),
            next_chunk: 0,
            constructed: 0,
        }
    }

    /// Take a chunk for `key`, pooled if one is free, and start building
    /// its geometry in the background. The chunk stays hidden until the
    /// batch is committed.
    pub fn allocate_chunk(&mut self, key: ChunkKey, request: MapRequest) -> ChunkId {
        let pooled = self.pools[key.variant.index()].pop();
        let id = match pooled {
            Some(id) => id,
            None => {
                let id = ChunkId(self.next_chunk);
                self.next_chunk += 1;
                self.constructed += 1;
                self.chunks.insert(id, Chunk::new(id, key.variant));
                id
            }
        };

        let topology = GridTopology::shared(request.resolution);
        let job = GeometryJob {
            request: request.clone(),
        };
        if let Some(chunk) = self.chunks.get_mut(&id) {
            chunk.configure(key, request, &topology);
            self.group.attach(chunk);
            self.group.set_visible(id, false);
        }

        tracing::debug!(chunk = id.0, address = %key.address, pooled = pooled.is_some(), "Allocated chunk");
        self.submit(id, job, 0);
        id
    }

    fn submit(&mut self, chunk: ChunkId, job: GeometryJob, attempts: u32) {
        let job_id = self.worker.submit(job.clone());
        self.jobs.insert(
            job_id,
            PendingJob {
                chunk,
                job,
                submitted: Instant::now(),
                attempts,
            },
        );
    }

    /// Queue a chunk for recycling at the next commit. A recycled chunk
    /// still waiting for maps is skipped by [`Self::update_maps`] and never
    /// revealed.
    pub fn recycle_chunk(&mut self, id: ChunkId) {
        if !self.chunks.contains_key(&id) || !self.recycling.insert(id) {
            return;
        }
        self.pending_recycle.push(id);
    }

    fn is_recycling(&self, id: ChunkId) -> bool {
        self.recycling.contains(&id)
    }

    /// Write finished geometry into chunks and handle failed or stuck jobs.
    pub fn poll_jobs(&mut self) {
        for output in self.worker.drain_completed() {
            let Some(pending) = self.jobs.remove(&output.id) else {
                tracing::trace!(job = output.id.0, "Ignoring result of superseded job");
                continue;
            };
            match output.result {
                Ok(geometry) => {
                    let recycling = self.is_recycling(pending.chunk);
                    if let Some(chunk) = self.chunks.get_mut(&pending.chunk) {
                        chunk.set_geometry(geometry);
                        if !recycling {
                            self.awaiting_maps.push_back(pending.chunk);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(chunk = pending.chunk.0, error = %e, "Geometry job failed");
                    self.retry_or_fail(pending);
                }
            }
        }

        let now = Instant::now();
        let expired: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(_, p)| now.duration_since(p.submitted) > self.settings.job_timeout)
            .map(|(&id, _)| id)
            .collect();
        for id in expired {
            if let Some(pending) = self.jobs.remove(&id) {
                tracing::warn!(
                    chunk = pending.chunk.0,
                    job = id.0,
                    timeout_ms = self.settings.job_timeout.as_millis() as u64,
                    "Geometry job timed out"
                );
                self.retry_or_fail(pending);
            }
        }
    }

    fn retry_or_fail(&mut self, pending: PendingJob) {
        if pending.attempts < self.settings.max_job_retries && !self.is_recycling(pending.chunk) {
            tracing::debug!(chunk = pending.chunk.0, attempt = pending.attempts + 1, "Resubmitting geometry job");
            self.submit(pending.chunk, pending.job, pending.attempts + 1);
        } else {
            self.fail_chunk(pending.chunk);
        }
    }

    fn fail_chunk(&mut self, id: ChunkId) {
        if self.is_recycling(id) {
            return;
        }
        if let Some(key) = self.chunks.get(&id).and_then(|c| c.key().copied()) {
            tracing::warn!(chunk = id.0, address = %key.address, "Dropping chunk from batch");
            self.failed.push(key);
        }
        self.recycle_chunk(id);
    }

    /// Keys of chunks that failed since the last call. Their chunks are
    /// already queued for recycling.
    pub fn take_failed(&mut self) -> Vec<ChunkKey> {
        std::mem::take(&mut self.failed)
    }

    /// Build maps for chunks whose geometry has arrived until `deadline`
    /// passes. At least one chunk is processed per call when any is waiting.
    ///
    /// Returns the number of chunks processed.
    pub fn update_maps(&mut self, deadline: Instant) -> usize {
        self.poll_jobs();

        let mut processed = 0;
        while let Some(id) = self.awaiting_maps.pop_front() {
            if self.is_recycling(id) {
                continue;
            }
            let Some(request) = self.chunks.get(&id).and_then(|c| c.request().cloned()) else {
                continue;
            };
            match self.generator.generate(&request) {
                Ok(maps) => {
                    if let Some(chunk) = self.chunks.get_mut(&id) {
                        chunk.set_maps(maps);
                        if self.settings.static_export {
                            chunk.bake_static(&self.field);
                        }
                        self.group.upload(chunk);
                        self.ready_to_show.push(id);
                    }
                }
                Err(e) => {
                    tracing::warn!(chunk = id.0, error = %e, "Map generation failed");
                    self.fail_chunk(id);
                }
            }
            processed += 1;
            if Instant::now() > deadline {
                break;
            }
        }

        if processed > 0 {
            tracing::trace!(processed, remaining = self.awaiting_maps.len(), "Built chunk maps");
        }
        processed
    }

    /// Commit the current batch: recycle superseded chunks, then reveal the
    /// new ones. Does nothing while jobs are in flight or maps are pending.
    ///
    /// Returns true when a batch was committed.
    pub fn update(&mut self) -> bool {
        self.poll_jobs();
        if self.is_updating() || self.is_waiting_on_maps() {
            return false;
        }
        if self.ready_to_show.is_empty() && self.pending_recycle.is_empty() {
            return false;
        }

        let recycling = std::mem::take(&mut self.recycling);
        self.ready_to_show.retain(|id| !recycling.contains(id));

        let mut pooled = 0;
        let mut disposed = 0;
        for id in std::mem::take(&mut self.pending_recycle) {
            self.group.set_visible(id, false);
            self.group.detach(id);
            let poolable = self
                .chunks
                .get(&id)
                .is_some_and(|c| c.is_poolable() && c.variant() == self.variant);
            if poolable {
                if let Some(chunk) = self.chunks.get_mut(&id) {
                    chunk.clear_content();
                }
                self.pools[self.variant.index()].push(id);
                pooled += 1;
            } else if let Some(mut chunk) = self.chunks.remove(&id) {
                chunk.dispose();
                disposed += 1;
            }
        }

        let revealed = self.ready_to_show.len();
        for id in std::mem::take(&mut self.ready_to_show) {
            let Some(chunk) = self.chunks.get_mut(&id) else {
                continue;
            };
            if chunk.begin_compile() {
                let ok = self.group.build_program(chunk);
                chunk.finish_compile(ok);
                if !ok {
                    tracing::warn!(chunk = id.0, "Chunk program failed to build");
                }
            }
            chunk.set_visible(true);
            self.group.set_visible(id, true);
        }
        self.awaiting_maps.clear();

        tracing::debug!(revealed, pooled, disposed, "Committed chunk batch");
        true
    }

    /// Geometry jobs are in flight.
    pub fn is_updating(&self) -> bool {
        !self.jobs.is_empty()
    }

    /// Chunks have geometry but no maps yet.
    pub fn is_waiting_on_maps(&self) -> bool {
        !self.awaiting_maps.is_empty()
    }

    /// A batch has been started and not yet committed.
    pub fn is_busy(&self) -> bool {
        self.is_updating()
            || self.is_waiting_on_maps()
            || !self.ready_to_show.is_empty()
            || !self.pending_recycle.is_empty()
    }

    /// Variant recycled chunks are pooled under.
    pub fn variant(&self) -> ChunkVariant {
        self.variant
    }

    /// Switch the variant new chunks are pooled under. Pooled chunks of the
    /// old variant are disposed.
    pub fn set_variant(&mut self, variant: ChunkVariant) {
        if variant == self.variant {
            return;
        }
        let old = std::mem::take(&mut self.pools[self.variant.index()]);
        for id in old {
            if let Some(mut chunk) = self.chunks.remove(&id) {
                chunk.dispose();
            }
        }
        self.variant = variant;
    }

    /// Dispose every chunk and forget all queued work.
    pub fn dispose(&mut self) {
        for (id, mut chunk) in self.chunks.drain() {
            self.group.detach(id);
            chunk.dispose();
        }
        for pool in &mut self.pools {
            pool.clear();
        }
        self.jobs.clear();
        self.awaiting_maps.clear();
        self.ready_to_show.clear();
        self.pending_recycle.clear();
        self.recycling.clear();
        self.failed.clear();
    }

    /// Live chunk by id, pooled or not.
    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(&id)
    }

    /// All live chunks in no particular order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.chunks.values()
    }

    /// Chunks waiting in any pool.
    pub fn pooled_count(&self) -> usize {
        self.pools.iter().map(Vec::len).sum()
    }

    /// Chunk objects constructed since creation.
    pub fn constructed_count(&self) -> usize {
        self.constructed
    }

    /// Chunks not yet disposed.
    pub fn live_count(&self) -> usize {
        self.chunks.len()
    }

    /// Height field used for static bakes.
    pub fn field(&self) -> &Arc<HeightField> {
        &self.field
    }

    /// The render group chunks are attached to.
    pub fn group(&self) -> &G {
        &self.group
    }

    /// Mutable render group, for drawing.
    pub fn group_mut(&mut self) -> &mut G {
        &mut self.group
    }

    /// The worker pool running geometry jobs.
    pub fn worker(&self) -> &W {
        &self.worker
    }
}
