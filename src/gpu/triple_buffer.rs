//! Triple-buffered CPU → GPU handoff.
//!
//! Three interchangeable slots move between four places:
//!
//! ```text
//!            cpu_work                 gpu_work              GpuWork::complete
//!   free ───────────▶ cpu_ready ───────────────▶ gpu_in_flight ─────────────▶ free
//!          (writing)     │ evicted by a newer cpu_work
//!                        └──────────────────────────────────────────────────▶ free
//! ```
//!
//! A slot's value is owned by exactly one party at a time: the pool, the
//! `cpu_work` closure, or the `GpuWork` handle. The CPU therefore cannot
//! touch a slot the GPU is reading, and the GPU handle cannot see a slot the
//! CPU is writing. The handle gives the value back when the fence fires,
//! which with wgpu is `Queue::on_submitted_work_done`.
//!
//! The pool mutex only guards the moves between sets. It is released while
//! the caller's closure runs and is never held across GPU completion.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Number of slots in the pool.
pub const POOL_SIZE: usize = 3;

struct Slot<T> {
    id: usize,
    value: T,
}

struct Pool<T> {
    free: Vec<Slot<T>>,
    cpu_writing: usize,
    cpu_ready: Option<Slot<T>>,
    /// Ids only; the values live in the outstanding `GpuWork` handles.
    gpu_in_flight: Vec<usize>,
}

impl<T> Pool<T> {
    fn check(&self) {
        debug_assert!(self.free.len() <= POOL_SIZE);
        debug_assert!(self.gpu_in_flight.len() <= 1);
        debug_assert_eq!(
            self.free.len()
                + self.cpu_writing
                + usize::from(self.cpu_ready.is_some())
                + self.gpu_in_flight.len(),
            POOL_SIZE
        );
    }
}

/// How many slots sit in each set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolOccupancy {
    pub free: usize,
    pub cpu_writing: usize,
    pub cpu_ready: usize,
    pub gpu_in_flight: usize,
}

impl PoolOccupancy {
    pub fn total(&self) -> usize {
        self.free + self.cpu_writing + self.cpu_ready + self.gpu_in_flight
    }
}

/// Which slot ids sit in each set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub free: Vec<usize>,
    pub cpu_ready: Option<usize>,
    pub gpu_in_flight: Vec<usize>,
}

struct Shared<T> {
    pool: Mutex<Pool<T>>,
    signaled: AtomicU64,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Pool<T>> {
        // Every panic below fires before the sets are touched, and user code
        // never runs under the lock, so a poisoned pool is still consistent.
        self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, slot: Slot<T>) {
        let mut pool = self.lock();
        pool.gpu_in_flight.retain(|&id| id != slot.id);
        let id = slot.id;
        pool.free.push(slot);
        pool.check();
        drop(pool);
        let value = self.signaled.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!("Fence {} signaled, slot {} released", value, id);
    }
}

/// A slot handed to the GPU.
///
/// Owns the slot's value until the GPU is done with it. `complete` (or
/// dropping the handle) is the fence signal that returns the slot to the
/// free set.
pub struct GpuWork<T> {
    id: usize,
    slot: Option<Slot<T>>,
    shared: Arc<Shared<T>>,
}

impl<T> GpuWork<T> {
    /// Id of the slot in flight (0..POOL_SIZE).
    pub fn slot(&self) -> usize {
        self.id
    }

    pub fn value(&self) -> &T {
        match &self.slot {
            Some(slot) => &slot.value,
            None => unreachable!("GpuWork used after completion"),
        }
    }

    pub fn value_mut(&mut self) -> &mut T {
        match &mut self.slot {
            Some(slot) => &mut slot.value,
            None => unreachable!("GpuWork used after completion"),
        }
    }

    /// The GPU finished reading: return the slot to the free set.
    pub fn complete(mut self) {
        if let Some(slot) = self.slot.take() {
            self.shared.release(slot);
        }
    }
}

#[cfg(feature = "gpu")]
impl<T: Send + 'static> GpuWork<T> {
    /// Release the slot once everything submitted to `queue` so far is done.
    ///
    /// Call right after `queue.submit` for the commands that read `value`.
    pub fn signal_after_submission(self, queue: &wgpu::Queue) {
        queue.on_submitted_work_done(move || self.complete());
    }
}

impl<T> Drop for GpuWork<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.shared.release(slot);
        }
    }
}

/// Fixed pool of three slots shared between a CPU producer and the GPU.
pub struct TripleBufferManager<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> TripleBufferManager<T> {
    /// Three slots, each a clone of `initial`.
    pub fn new(initial: T) -> Self {
        Self::from_slots([initial.clone(), initial.clone(), initial])
    }
}

impl<T> TripleBufferManager<T> {
    /// Three distinct slot values (e.g. three GPU buffers).
    pub fn from_slots(values: [T; POOL_SIZE]) -> Self {
        let free = values
            .into_iter()
            .enumerate()
            .map(|(id, value)| Slot { id, value })
            .collect();
        let shared = Arc::new(Shared {
            pool: Mutex::new(Pool {
                free,
                cpu_writing: 0,
                cpu_ready: None,
                gpu_in_flight: Vec::with_capacity(1),
            }),
            signaled: AtomicU64::new(0),
        });
        Self { shared }
    }

    /// Fill a free slot on the CPU and mark it ready for the GPU.
    ///
    /// A slot that was ready but never picked up goes back to the free set;
    /// only the newest CPU result matters. If `work` panics the slot goes back
    /// to the free set before the panic continues.
    ///
    /// # Panics
    /// If no slot is free: the pool is too small for the access pattern.
    pub fn cpu_work<R>(&self, work: impl FnOnce(&mut T) -> R) -> R {
        let mut slot = {
            let mut pool = self.shared.lock();
            let Some(slot) = pool.free.pop() else {
                panic!("TripleBufferManager: no free slots");
            };
            pool.cpu_writing += 1;
            slot
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&mut slot.value)));

        let mut pool = self.shared.lock();
        pool.cpu_writing -= 1;
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                log::warn!("Slot {} returned after a panic during CPU work", slot.id);
                pool.free.push(slot);
                pool.check();
                drop(pool);
                panic::resume_unwind(payload);
            }
        };
        if let Some(evicted) = pool.cpu_ready.take() {
            log::trace!("Slot {} superseded before reaching the GPU", evicted.id);
            pool.free.push(evicted);
        }
        pool.cpu_ready = Some(slot);
        pool.check();
        result
    }

    /// Move the ready slot to the GPU.
    ///
    /// # Panics
    /// If nothing is ready, or the GPU still holds the previous slot.
    pub fn gpu_work(&self) -> GpuWork<T> {
        let mut pool = self.shared.lock();
        if let Some(busy) = pool.gpu_in_flight.first() {
            panic!("TripleBufferManager: slot {} is still in flight", busy);
        }
        let Some(slot) = pool.cpu_ready.take() else {
            panic!("TripleBufferManager: no slot ready for the GPU");
        };
        pool.gpu_in_flight.push(slot.id);
        pool.check();
        GpuWork {
            id: slot.id,
            slot: Some(slot),
            shared: Arc::clone(&self.shared),
        }
    }

    /// True if the GPU still holds a slot.
    pub fn is_gpu_busy(&self) -> bool {
        !self.shared.lock().gpu_in_flight.is_empty()
    }

    /// True if a CPU-filled slot is waiting for the GPU.
    pub fn has_cpu_ready(&self) -> bool {
        self.shared.lock().cpu_ready.is_some()
    }

    pub fn occupancy(&self) -> PoolOccupancy {
        let pool = self.shared.lock();
        PoolOccupancy {
            free: pool.free.len(),
            cpu_writing: pool.cpu_writing,
            cpu_ready: usize::from(pool.cpu_ready.is_some()),
            gpu_in_flight: pool.gpu_in_flight.len(),
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let pool = self.shared.lock();
        PoolSnapshot {
            free: pool.free.iter().map(|s| s.id).collect(),
            cpu_ready: pool.cpu_ready.as_ref().map(|s| s.id),
            gpu_in_flight: pool.gpu_in_flight.clone(),
        }
    }

    /// How many times a fence has fired (one per completed `GpuWork`).
    pub fn signaled_value(&self) -> u64 {
        self.shared.signaled.load(Ordering::Acquire)
    }
}
