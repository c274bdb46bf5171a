//! GPU-side uniform and storage layouts.
//!
//! All `#[repr(C)]` + `bytemuck::Pod`, padded to WGSL's 16-byte uniform rules.

use nalgebra::{Matrix4, Vector3};

/// Splat position as stored in the positions buffer (x, y, z, pad).
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PositionGPU {
    pub position: [f32; 4],
}

impl PositionGPU {
    pub fn from_position(p: &Vector3<f32>) -> Self {
        Self {
            position: [p.x, p.y, p.z, 1.0],
        }
    }
}

/// Uniforms for the distance pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DistanceParams {
    /// Column-major, matching WGSL's `mat4x4<f32>`
    pub model_view: [[f32; 4]; 4],
    pub count: u32,
    /// 1.0 for near-to-far, -1.0 for far-to-near
    pub sign: f32,
    pub pad: [u32; 2],
}

impl DistanceParams {
    pub fn new(model_view: &Matrix4<f32>, count: u32, reversed: bool) -> Self {
        Self {
            model_view: (*model_view).into(),
            count,
            sign: if reversed { -1.0 } else { 1.0 },
            pad: [0; 2],
        }
    }
}

/// Uniforms for one bitonic compare-and-swap dispatch.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SortParams {
    pub count: u32,
    /// Half the size of the block being merged
    pub group_width: u32,
    /// 2 * group_width - 1
    pub group_height: u32,
    /// 0 for the flip step, >0 for disperse steps
    pub step_index: u32,
}

impl SortParams {
    pub fn new(count: u32, stage: u32, step: u32) -> Self {
        let group_width = 1u32 << (stage - step);
        Self {
            count,
            group_width,
            group_height: 2 * group_width - 1,
            step_index: step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<PositionGPU>(), 16);
        assert_eq!(std::mem::size_of::<DistanceParams>(), 80);
        assert_eq!(std::mem::size_of::<SortParams>(), 16);
    }

    #[test]
    fn test_model_view_is_column_major() {
        let mv = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        let params = DistanceParams::new(&mv, 4, false);
        // Translation lives in the last column.
        assert_eq!(params.model_view[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(params.sign, 1.0);
        assert_eq!(DistanceParams::new(&mv, 4, true).sign, -1.0);
    }

    #[test]
    fn test_sort_params_flip_then_disperse() {
        // Stage 2 merges blocks of 8: flip over 8, then disperse 2 and 1.
        assert_eq!(SortParams::new(8, 2, 0).group_width, 4);
        assert_eq!(SortParams::new(8, 2, 0).group_height, 7);
        assert_eq!(SortParams::new(8, 2, 1).group_width, 2);
        assert_eq!(SortParams::new(8, 2, 2).group_width, 1);
        assert_eq!(SortParams::new(8, 2, 2).group_height, 1);
    }
}
