//! Background CPU sort worker.
//!
//! One dedicated thread owns a pair of `IndexedDistance` buffers and runs the
//! radix sort for the latest request it has not seen before:
//!
//! ```text
//! request_sort ──▶ [1-slot mailbox] ──▶ worker thread ──▶ [1-slot results] ──▶ renderer
//!                   (latest wins)        Idle ⇄ Sorting     (drop & replace)       │
//!                                              ▲                                   │
//!                                              └──────────── recycle ◀─────────────┘
//! ```
//!
//! Submitting never blocks. A sort always runs to completion; a newer request
//! supersedes its result rather than interrupting it.

use crate::config::SortConfig;
use crate::core::{model_view, view_depth, IndexedDistance, SplatCloud, SplatPosition};
use crate::error::SortError;
use crate::sort::channel::{overwrite_channel, OverwriteSender};
use crate::sort::radix::{radix_sort, SortedIn};
use crate::sort::request::{SortRequest, SortResult};
use crossbeam_channel::{Receiver, Sender};
use nalgebra::Matrix4;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// What the worker thread is doing right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Sorting,
}

/// Snapshot of the worker's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Sorts run to completion and published
    pub sorts_completed: usize,
    /// Requests dropped as duplicates or overwritten before being picked up
    pub requests_coalesced: usize,
    /// Zero-count requests ignored
    pub requests_empty: usize,
    /// Published results evicted unread by a newer one
    pub results_dropped: usize,
    /// Result buffers allocated because none were free
    pub buffers_allocated: usize,
}

#[derive(Default)]
struct Counters {
    sorting: AtomicBool,
    sorts_completed: AtomicUsize,
    requests_coalesced: AtomicUsize,
    requests_empty: AtomicUsize,
    results_dropped: AtomicUsize,
    buffers_allocated: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle to a running sort worker. Dropping it stops and joins the thread.
pub struct SortWorker {
    requests: Option<OverwriteSender<SortRequest>>,
    results: Receiver<SortResult>,
    recycle: Sender<Vec<IndexedDistance>>,
    counters: Arc<Counters>,
    capacity: usize,
    cloud_len: usize,
    handle: Option<JoinHandle<()>>,
}

impl SortWorker {
    /// Start a worker sorting `cloud`.
    ///
    /// The buffers are sized to `config.capacity`, or to the cloud when the
    /// configured capacity is 0.
    ///
    /// # Panics
    /// If the resolved capacity is 0 or smaller than the cloud.
    pub fn spawn<S: SplatPosition>(
        cloud: SplatCloud<S>,
        config: &SortConfig,
    ) -> Result<Self, SortError> {
        config.validate()?;
        let capacity = if config.capacity == 0 {
            cloud.len()
        } else {
            config.capacity
        };
        assert!(capacity > 0, "a sort worker needs a non-zero capacity");
        assert!(
            capacity >= cloud.len(),
            "sort worker capacity {} is smaller than the cloud ({} splats)",
            capacity,
            cloud.len()
        );

        let (request_tx, request_rx) = overwrite_channel();
        let (result_tx, result_rx) = overwrite_channel();
        let (recycle_tx, recycle_rx) = crossbeam_channel::unbounded();
        let counters = Arc::new(Counters::default());
        let cloud_len = cloud.len();

        let sort_loop = SortLoop {
            cloud,
            reversed: config.reversed,
            buffers: SortBuffers::new(capacity),
            spare: Vec::new(),
            requests: request_rx,
            results: result_tx,
            recycled: recycle_rx,
            last_request: None,
            counters: Arc::clone(&counters),
        };

        let handle = std::thread::Builder::new()
            .name("splat-sort".to_string())
            .spawn(move || sort_loop.run())
            .map_err(|e| SortError::Spawn(e.to_string()))?;

        log::info!(
            "Sort worker started: {} splats, capacity {}",
            cloud_len,
            capacity
        );

        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            recycle: recycle_tx,
            counters,
            capacity,
            cloud_len,
            handle: Some(handle),
        })
    }

    /// Ask for the cloud to be sorted as seen from `camera`.
    pub fn request_sort(&self, camera: Matrix4<f32>, model: Matrix4<f32>, count: usize) {
        self.submit(SortRequest::new(camera, model, count));
    }

    /// Queue `request`, replacing any request the worker has not picked up.
    ///
    /// # Panics
    /// If `request.count` exceeds the cloud.
    pub fn submit(&self, request: SortRequest) {
        assert!(
            request.count <= self.cloud_len,
            "cannot sort {} splats from a cloud of {}",
            request.count,
            self.cloud_len
        );
        if let Some(requests) = &self.requests {
            if requests.send_replace(request).is_some() {
                Counters::bump(&self.counters.requests_coalesced);
            }
        }
    }

    /// The result channel, for callers that want to `select!` on it.
    pub fn results(&self) -> &Receiver<SortResult> {
        &self.results
    }

    pub fn try_recv(&self) -> Option<SortResult> {
        self.results.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<SortResult> {
        self.results.recv_timeout(timeout).ok()
    }

    /// Hand a result's buffer back for reuse.
    pub fn recycle(&self, result: SortResult) {
        // The worker only disappears when `self` is dropped.
        let _ = self.recycle.send(result.into_buffer());
    }

    pub fn state(&self) -> WorkerState {
        if self.counters.sorting.load(Ordering::Acquire) {
            WorkerState::Sorting
        } else {
            WorkerState::Idle
        }
    }

    pub fn stats(&self) -> WorkerStats {
        let c = &self.counters;
        WorkerStats {
            sorts_completed: c.sorts_completed.load(Ordering::Relaxed),
            requests_coalesced: c.requests_coalesced.load(Ordering::Relaxed),
            requests_empty: c.requests_empty.load(Ordering::Relaxed),
            results_dropped: c.results_dropped.load(Ordering::Relaxed),
            buffers_allocated: c.buffers_allocated.load(Ordering::Relaxed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for SortWorker {
    fn drop(&mut self) {
        // Closing the mailbox ends the worker's receive loop.
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Sort worker thread panicked");
            }
        }
    }
}

/// Sort `cloud` once on the calling thread, with freshly allocated buffers.
///
/// Returns None for an empty request or a singular camera transform.
pub fn sort_once<S: SplatPosition>(
    cloud: &SplatCloud<S>,
    request: SortRequest,
    reversed: bool,
) -> Option<SortResult> {
    if request.is_empty() {
        return None;
    }
    let mut buffers = SortBuffers::new(request.count);
    buffers.sort(cloud, &request, reversed)?;
    Some(SortResult::new(request, buffers.current))
}

/// The current/temporary pair a sorter ping-pongs between.
struct SortBuffers {
    current: Vec<IndexedDistance>,
    temporary: Vec<IndexedDistance>,
}

impl SortBuffers {
    fn new(capacity: usize) -> Self {
        Self {
            current: vec![IndexedDistance::default(); capacity],
            temporary: vec![IndexedDistance::default(); capacity],
        }
    }

    fn capacity(&self) -> usize {
        self.current.len()
    }

    /// Fill `current[..count]` with view depths and sort it.
    ///
    /// Returns None if the camera transform has no inverse.
    fn sort<S: SplatPosition>(
        &mut self,
        cloud: &SplatCloud<S>,
        request: &SortRequest,
        reversed: bool,
    ) -> Option<()> {
        let count = request.count;
        assert!(
            count <= self.capacity() && count <= self.temporary.len(),
            "cannot sort {} splats into buffers of {}",
            count,
            self.capacity()
        );
        assert!(
            count <= cloud.len(),
            "cannot sort {} splats from a cloud of {}",
            count,
            cloud.len()
        );

        let model_view = model_view(&request.camera, &request.model)?;
        let sign = if reversed { -1.0 } else { 1.0 };
        for (index, (entry, splat)) in self.current[..count]
            .iter_mut()
            .zip(cloud.splats())
            .enumerate()
        {
            let distance = sign * view_depth(&model_view, &splat.position());
            *entry = IndexedDistance::new(index as u32, distance);
        }

        if radix_sort(&mut self.current[..count], &mut self.temporary[..count]) == SortedIn::Scratch
        {
            std::mem::swap(&mut self.current, &mut self.temporary);
        }
        Some(())
    }
}

/// State owned by the worker thread.
struct SortLoop<S> {
    cloud: SplatCloud<S>,
    reversed: bool,
    buffers: SortBuffers,
    spare: Vec<Vec<IndexedDistance>>,
    requests: Receiver<SortRequest>,
    results: OverwriteSender<SortResult>,
    recycled: Receiver<Vec<IndexedDistance>>,
    last_request: Option<SortRequest>,
    counters: Arc<Counters>,
}

impl<S: SplatPosition> SortLoop<S> {
    fn run(mut self) {
        while let Ok(mut request) = self.requests.recv() {
            // Anything that arrived while we were waiting supersedes `request`.
            for newer in self.requests.try_iter() {
                Counters::bump(&self.counters.requests_coalesced);
                request = newer;
            }

            if self.last_request == Some(request) {
                log::trace!("Dropping duplicate sort request");
                Counters::bump(&self.counters.requests_coalesced);
                continue;
            }
            self.last_request = Some(request);

            if request.is_empty() {
                log::debug!("Ignoring sort request for zero splats");
                Counters::bump(&self.counters.requests_empty);
                continue;
            }

            self.counters.sorting.store(true, Ordering::Release);
            let start = Instant::now();
            let sorted = self.buffers.sort(&self.cloud, &request, self.reversed);
            if sorted.is_some() {
                let buffer = self.take_published_buffer();
                log::debug!(
                    "Sorted {} splats in {:.2} ms",
                    request.count,
                    start.elapsed().as_secs_f64() * 1000.0
                );
                self.publish(SortResult::new(request, buffer));
            } else {
                log::warn!("Skipping sort: camera transform is not invertible");
            }
            self.counters.sorting.store(false, Ordering::Release);
        }
        log::debug!("Sort worker shutting down");
    }

    /// Move the freshly sorted buffer out, refilling `current` from the spares.
    fn take_published_buffer(&mut self) -> Vec<IndexedDistance> {
        let capacity = self.buffers.capacity();
        for buffer in self.recycled.try_iter() {
            if buffer.len() == capacity {
                self.spare.push(buffer);
            } else {
                log::warn!(
                    "Discarding recycled buffer of {} entries (expected {})",
                    buffer.len(),
                    capacity
                );
            }
        }
        let replacement = self.spare.pop().unwrap_or_else(|| {
            Counters::bump(&self.counters.buffers_allocated);
            log::trace!("Allocating result buffer ({} entries)", capacity);
            vec![IndexedDistance::default(); capacity]
        });
        std::mem::replace(&mut self.buffers.current, replacement)
    }

    fn publish(&mut self, result: SortResult) {
        Counters::bump(&self.counters.sorts_completed);
        if let Some(stale) = self.results.send_replace(result) {
            log::trace!("Replacing unread sort result");
            Counters::bump(&self.counters.results_dropped);
            self.spare.push(stale.into_buffer());
        }
    }
}
