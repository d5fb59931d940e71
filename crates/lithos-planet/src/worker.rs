//! Background geometry jobs.
//!
//! The manager submits a [`GeometryJob`] and gets a [`JobId`] back
//! immediately; results are collected once per tick with
//! [`WorkerPool::drain_completed`] on the main thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use lithos_terrain::MapRequest;

use crate::error::GeometryError;
use crate::geometry::{ChunkGeometry, build_geometry};

/// Everything needed to build one patch's vertices, owned so it can cross
/// threads.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryJob {
    /// Patch whose vertices are built.
    pub request: MapRequest,
}

impl GeometryJob {
    /// Build the stitched vertex grid.
    pub fn run(&self) -> Result<ChunkGeometry, GeometryError> {
        build_geometry(&self.request)
    }
}

/// Handle returned by [`WorkerPool::submit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

/// A finished job.
#[derive(Debug)]
pub struct JobOutput {
    /// Handle the job was submitted under.
    pub id: JobId,
    /// Geometry, or why it could not be built.
    pub result: Result<ChunkGeometry, GeometryError>,
}

/// Submit/drain service running geometry jobs off the main thread.
pub trait WorkerPool {
    /// Queue `job`; its result is returned by a later drain.
    fn submit(&mut self, job: GeometryJob) -> JobId;

    /// Results finished since the last call.
    fn drain_completed(&mut self) -> Vec<JobOutput>;

    /// Jobs submitted but not yet drained.
    fn in_flight(&self) -> usize;
}

/// Runs each job during `submit`; results wait for the next drain.
#[derive(Debug, Default)]
pub struct InlineWorkerPool {
    next_id: u64,
    completed: Vec<JobOutput>,
}

impl InlineWorkerPool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkerPool for InlineWorkerPool {
    fn submit(&mut self, job: GeometryJob) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;
        self.completed.push(JobOutput {
            id,
            result: job.run(),
        });
        id
    }

    fn drain_completed(&mut self) -> Vec<JobOutput> {
        std::mem::take(&mut self.completed)
    }

    fn in_flight(&self) -> usize {
        self.completed.len()
    }
}

/// Fixed set of OS threads fed through a channel.
pub struct ThreadWorkerPool {
    job_sender: Option<crossbeam_channel::Sender<(JobId, GeometryJob)>>,
    result_receiver: crossbeam_channel::Receiver<JobOutput>,
    worker_handles: Vec<JoinHandle<()>>,
    in_flight: Arc<AtomicUsize>,
    /// Results of jobs run on the caller because no worker was available.
    inline_results: Vec<JobOutput>,
    next_id: u64,
}

impl ThreadWorkerPool {
    /// Spawn `threads` workers; zero picks one less than the CPU count.
    pub fn new(threads: usize) -> Self {
        let count = if threads == 0 {
            num_cpus::get().saturating_sub(1).max(1)
        } else {
            threads
        };

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<(JobId, GeometryJob)>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let rx = job_rx.clone();
            let tx = result_tx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("lithos-geometry-{i}"))
                .spawn(move || {
                    while let Ok((id, job)) = rx.recv() {
                        let result = job.run();
                        if tx.send(JobOutput { id, result }).is_err() {
                            break;
                        }
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => tracing::warn!(error = %e, "Failed to spawn geometry worker"),
            }
        }
        tracing::info!(workers = handles.len(), "Geometry worker pool started");

        Self {
            job_sender: Some(job_tx),
            result_receiver: result_rx,
            worker_handles: handles,
            in_flight,
            inline_results: Vec::new(),
            next_id: 0,
        }
    }

    /// Worker threads still running.
    pub fn worker_count(&self) -> usize {
        self.worker_handles.len()
    }

    /// Close the job channel and join every worker.
    pub fn shutdown(&mut self) {
        self.job_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl WorkerPool for ThreadWorkerPool {
    fn submit(&mut self, job: GeometryJob) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;
        self.in_flight.fetch_add(1, Ordering::Relaxed);

        let sent = match &self.job_sender {
            Some(sender) if !self.worker_handles.is_empty() => {
                sender.send((id, job)).map_err(|e| e.into_inner().1)
            }
            _ => Err(job),
        };
        if let Err(job) = sent {
            tracing::warn!(job = id.0, "No geometry worker available, running inline");
            self.inline_results.push(JobOutput {
                id,
                result: job.run(),
            });
        }
        id
    }

    fn drain_completed(&mut self) -> Vec<JobOutput> {
        let mut results = std::mem::take(&mut self.inline_results);
        results.extend(self.result_receiver.try_iter());
        self.in_flight.fetch_sub(results.len(), Ordering::Relaxed);
        results
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }
}

impl Drop for ThreadWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
