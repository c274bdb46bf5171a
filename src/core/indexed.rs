//! The `{index, distance}` pair the sorter produces and the renderer binds.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// One element of a sorted permutation.
///
/// Layout matches the shader-side struct (`u32` then `f32`, 8 bytes) so a
/// sorted buffer uploads with `bytemuck::cast_slice` and no repacking.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct IndexedDistance {
    /// Index of the splat in its cloud
    pub index: u32,

    /// View-space depth used as the sort key
    pub distance: f32,
}

impl IndexedDistance {
    pub fn new(index: u32, distance: f32) -> Self {
        Self { index, distance }
    }
}

/// Extract just the draw-order permutation.
pub fn permutation(entries: &[IndexedDistance]) -> Vec<u32> {
    entries.iter().map(|e| e.index).collect()
}
