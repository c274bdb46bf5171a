//! LSD radix sort over 8-bit digits.
//!
//! Each pass is a stable counting sort:
//! 1. Histogram the digit at `shift` (256 buckets)
//! 2. Exclusive prefix sum → first output slot of every bucket
//! 3. Scatter in input order, so equal digits keep their relative order
//!
//! Four passes cover a 32-bit key. The passes ping-pong between the caller's
//! two buffers; `radix_sort` reports which one ends up holding the result.

use crate::core::IndexedDistance;
use crate::sort::key::key_digit;

/// Bits per digit.
pub const RADIX_BITS: u32 = 8;

/// Buckets per pass (2^RADIX_BITS).
pub const NUM_BUCKETS: usize = 1 << RADIX_BITS;

/// Passes for a 32-bit key.
pub const NUM_PASSES: u32 = 32 / RADIX_BITS;

/// A value sortable by a 32-bit key, one byte at a time.
pub trait RadixKey {
    /// The byte of the transformed key starting at bit `shift`.
    fn key(&self, shift: u32) -> u8;
}

impl RadixKey for IndexedDistance {
    #[inline]
    fn key(&self, shift: u32) -> u8 {
        key_digit(self.distance, shift)
    }
}

impl RadixKey for u32 {
    #[inline]
    fn key(&self, shift: u32) -> u8 {
        (*self >> shift) as u8
    }
}

/// Which of the two buffers passed to `radix_sort` holds the sorted data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortedIn {
    Input,
    Scratch,
}

/// Count occurrences of each digit value at `shift`.
pub fn histogram<T: RadixKey>(input: &[T], shift: u32) -> [u32; NUM_BUCKETS] {
    let mut counts = [0u32; NUM_BUCKETS];
    for value in input {
        counts[value.key(shift) as usize] += 1;
    }
    counts
}

/// Turn bucket counts into bucket start offsets, in place.
///
/// offset[0] = 0, offset[i] = offset[i-1] + count[i-1]
pub fn prefix_sum_exclusive(counts: &mut [u32; NUM_BUCKETS]) {
    let mut sum = 0u32;
    for count in counts.iter_mut() {
        let c = *count;
        *count = sum;
        sum += c;
    }
}

/// Stable scatter of `input` into `output` by the digit at `shift`.
///
/// `offsets` must come from `prefix_sum_exclusive` over the same input; it is
/// consumed (every bucket ends at its exclusive end).
pub fn scatter<T: RadixKey + Copy>(
    input: &[T],
    offsets: &mut [u32; NUM_BUCKETS],
    shift: u32,
    output: &mut [T],
) {
    for value in input {
        let bucket = value.key(shift) as usize;
        let slot = offsets[bucket] as usize;
        output[slot] = *value;
        offsets[bucket] += 1;
    }
}

/// One stable counting-sort pass from `input` into `output[..input.len()]`.
pub fn counting_sort<T: RadixKey + Copy>(input: &[T], shift: u32, output: &mut [T]) {
    let mut offsets = histogram(input, shift);
    prefix_sum_exclusive(&mut offsets);
    scatter(input, &mut offsets, shift, &mut output[..input.len()]);
}

/// Sort `input` by key, using `scratch` as the ping-pong buffer.
///
/// Only the first `input.len()` elements of `scratch` are touched. The
/// returned `SortedIn` names the buffer holding the sorted sequence.
///
/// # Panics
/// If `scratch.len() < input.len()`. That is a sizing bug in the caller, not
/// a data problem.
pub fn radix_sort<T: RadixKey + Copy>(input: &mut [T], scratch: &mut [T]) -> SortedIn {
    assert!(
        scratch.len() >= input.len(),
        "radix_sort: scratch holds {} elements but input has {}",
        scratch.len(),
        input.len()
    );
    let n = input.len();
    let scratch = &mut scratch[..n];

    let mut sorted_in = SortedIn::Input;
    for pass in 0..NUM_PASSES {
        let shift = pass * RADIX_BITS;
        match sorted_in {
            SortedIn::Input => counting_sort(input, shift, scratch),
            SortedIn::Scratch => counting_sort(scratch, shift, input),
        }
        sorted_in = match sorted_in {
            SortedIn::Input => SortedIn::Scratch,
            SortedIn::Scratch => SortedIn::Input,
        };
    }
    sorted_in
}

/// `radix_sort`, then copy back so `input` always holds the result.
pub fn radix_sort_in_place<T: RadixKey + Copy>(input: &mut [T], scratch: &mut [T]) {
    if radix_sort(input, scratch) == SortedIn::Scratch {
        input.copy_from_slice(&scratch[..input.len()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_sum_exclusive() {
        let mut counts = [0u32; NUM_BUCKETS];
        counts[0] = 2;
        counts[1] = 3;
        counts[255] = 1;
        prefix_sum_exclusive(&mut counts);
        assert_eq!(counts[0], 0);
        assert_eq!(counts[1], 2);
        assert_eq!(counts[2], 5);
        assert_eq!(counts[255], 5);
    }

    #[test]
    fn test_histogram_counts_low_byte() {
        let values = [0x0000_0101u32, 0x0000_0201, 0x0000_0002];
        let h = histogram(&values, 0);
        assert_eq!(h[1], 2);
        assert_eq!(h[2], 1);
        assert_eq!(h.iter().sum::<u32>(), 3);
    }

    #[test]
    fn test_even_pass_count_ends_in_input() {
        let mut data = vec![5u32, 3, 9, 1];
        let mut scratch = vec![0u32; 4];
        assert_eq!(radix_sort(&mut data, &mut scratch), SortedIn::Input);
        assert_eq!(data, vec![1, 3, 5, 9]);
    }

    #[test]
    fn test_sort_u32_full_width() {
        let mut data = vec![u32::MAX, 0, 0x8000_0000, 0x00FF_FFFF, 42, 0x0100_0000];
        let mut expected = data.clone();
        expected.sort_unstable();
        let mut scratch = vec![0u32; data.len()];
        radix_sort_in_place(&mut data, &mut scratch);
        assert_eq!(data, expected);
    }

    #[test]
    fn test_sort_distances_with_negatives() {
        let mut data: Vec<IndexedDistance> = [2.5f32, -1.0, 0.0, -7.25, 1.0]
            .iter()
            .enumerate()
            .map(|(i, &d)| IndexedDistance::new(i as u32, d))
            .collect();
        let mut scratch = vec![IndexedDistance::default(); data.len()];
        radix_sort_in_place(&mut data, &mut scratch);
        let order: Vec<u32> = data.iter().map(|e| e.index).collect();
        assert_eq!(order, vec![3, 1, 2, 4, 0]);
    }

    #[test]
    fn test_larger_scratch_is_fine() {
        let mut data = vec![3u32, 2, 1];
        let mut scratch = vec![0u32; 16];
        radix_sort_in_place(&mut data, &mut scratch);
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_input() {
        let mut data: Vec<u32> = vec![];
        let mut scratch: Vec<u32> = vec![];
        radix_sort_in_place(&mut data, &mut scratch);
        assert!(data.is_empty());
    }

    #[test]
    #[should_panic(expected = "scratch holds 2 elements but input has 3")]
    fn test_short_scratch_panics() {
        let mut data = vec![3u32, 2, 1];
        let mut scratch = vec![0u32; 2];
        radix_sort(&mut data, &mut scratch);
    }
}
