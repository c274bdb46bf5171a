//! Slot conservation and CPU/GPU exclusion for the triple buffer.

use rand::{Rng, SeedableRng};
use splat_sort::gpu::{PoolSnapshot, POOL_SIZE};
use splat_sort::TripleBufferManager;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

fn assert_partition(snapshot: &PoolSnapshot) {
    let mut ids: Vec<usize> = snapshot.free.clone();
    ids.extend(snapshot.cpu_ready);
    ids.extend(&snapshot.gpu_in_flight);

    let unique: HashSet<usize> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len(), "slot in two sets: {:?}", snapshot);
    assert_eq!(unique, (0..POOL_SIZE).collect::<HashSet<_>>(), "slot missing: {:?}", snapshot);
    assert!(snapshot.gpu_in_flight.len() <= 1);
}

#[test]
fn test_random_operation_sequence_conserves_slots() {
    let manager = TripleBufferManager::from_slots([0usize, 1, 2]);
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let mut in_flight = None;

    for step in 0..2_000 {
        match rng.gen_range(0..3) {
            0 => {
                manager.cpu_work(|slot| {
                    let snapshot = manager.snapshot();
                    assert!(
                        !snapshot.gpu_in_flight.contains(slot),
                        "step {}: CPU writing slot {} the GPU holds",
                        step,
                        slot
                    );
                    assert_ne!(snapshot.cpu_ready, Some(*slot));
                    assert!(!snapshot.free.contains(slot));
                    assert_eq!(manager.occupancy().cpu_writing, 1);
                });
            }
            1 => {
                if manager.has_cpu_ready() && !manager.is_gpu_busy() {
                    let work = manager.gpu_work();
                    assert_eq!(work.slot(), *work.value());
                    in_flight = Some(work);
                }
            }
            _ => {
                if let Some(work) = in_flight.take() {
                    work.complete();
                }
            }
        }

        assert_partition(&manager.snapshot());
        let occupancy = manager.occupancy();
        assert_eq!(occupancy.total(), POOL_SIZE);
        assert_eq!(occupancy.cpu_writing, 0);
    }
}

#[test]
fn test_newest_cpu_result_reaches_gpu() {
    let manager = TripleBufferManager::new(0u64);

    manager.cpu_work(|v| *v = 1);
    manager.cpu_work(|v| *v = 2);
    assert_eq!(manager.occupancy().free, 2);

    let work = manager.gpu_work();
    assert_eq!(*work.value(), 2);
    assert!(!manager.has_cpu_ready());
    work.complete();
    assert_eq!(manager.occupancy().free, POOL_SIZE);
}

#[test]
fn test_cpu_keeps_producing_while_gpu_busy() {
    let manager = TripleBufferManager::from_slots([0usize, 1, 2]);

    manager.cpu_work(|_| ());
    let work = manager.gpu_work();

    for _ in 0..10 {
        manager.cpu_work(|slot| assert_ne!(*slot, work.slot()));
        assert!(manager.is_gpu_busy());
    }
    work.complete();
    assert!(!manager.is_gpu_busy());
    assert!(manager.has_cpu_ready());
}

#[test]
fn test_fence_signaled_from_another_thread() {
    let manager = TripleBufferManager::new(vec![0u8; 16]);

    for frame in 0..50u8 {
        manager.cpu_work(|buffer| buffer.fill(frame));
        let work = manager.gpu_work();
        assert!(work.value().iter().all(|&b| b == frame));

        let callback = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_micros(100));
            work.complete();
        });
        callback.join().unwrap();

        assert!(!manager.is_gpu_busy());
        assert_partition(&manager.snapshot());
    }
    assert_eq!(manager.signaled_value(), 50);
}

#[test]
fn test_gpu_side_writes_land_in_the_slot() {
    let manager = TripleBufferManager::new(vec![0u8; 4]);

    manager.cpu_work(|buffer| buffer.fill(1));
    let mut work = manager.gpu_work();
    let slot = work.slot();
    work.value_mut().fill(9);
    work.complete();

    // Cycle until the same slot comes back to the CPU.
    let mut seen = None;
    for _ in 0..POOL_SIZE {
        let contents = manager.cpu_work(|buffer| buffer.clone());
        let work = manager.gpu_work();
        if work.slot() == slot {
            seen = Some(contents);
        }
        work.complete();
    }
    let contents = seen.expect("slot never returned to the CPU");
    assert_eq!(contents, vec![9, 9, 9, 9]);
}

#[test]
fn test_gpu_work_does_not_need_clone() {
    struct Resource(u32);

    let manager = TripleBufferManager::from_slots([Resource(0), Resource(1), Resource(2)]);
    manager.cpu_work(|r| r.0 += 10);
    let work = manager.gpu_work();
    assert_eq!(work.value().0, work.slot() as u32 + 10);
}

#[test]
fn test_panicking_cpu_work_returns_slot() {
    let manager = TripleBufferManager::new(0u32);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        manager.cpu_work(|_| panic!("write failed"));
    }));
    assert!(outcome.is_err());

    let occupancy = manager.occupancy();
    assert_eq!(occupancy.free, POOL_SIZE);
    assert_eq!(occupancy.cpu_writing, 0);
    assert_partition(&manager.snapshot());

    // All three slots are still usable.
    manager.cpu_work(|v| *v = 1);
    let _in_flight = manager.gpu_work();
    manager.cpu_work(|v| *v = 2);
    manager.cpu_work(|v| *v = 3);
    assert_eq!(manager.occupancy().total(), POOL_SIZE);
}

#[test]
#[should_panic(expected = "no slot ready for the GPU")]
fn test_gpu_work_without_ready_slot_panics() {
    let manager = TripleBufferManager::new(0u32);
    let _ = manager.gpu_work();
}

#[test]
#[should_panic(expected = "still in flight")]
fn test_second_gpu_work_before_fence_panics() {
    let manager = TripleBufferManager::new(0u32);
    manager.cpu_work(|_| ());
    let _first = manager.gpu_work();
    manager.cpu_work(|_| ());
    let _ = manager.gpu_work();
}
