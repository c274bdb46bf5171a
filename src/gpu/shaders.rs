//! WGSL shader modules.
//!
//! - Distance pass: view-space depth per splat, identity index order
//! - Bitonic pass: one compare-and-swap step over the index buffer

use wgpu::{Device, ShaderModule};

/// Threads per workgroup for both passes.
pub const WORKGROUP_SIZE: u32 = 256;

/// Input: positions. Output: distances[i] and indices[i] = i.
pub const DISTANCE_SHADER: &str = r#"
struct Params {
    model_view: mat4x4<f32>,
    count: u32,
    sign: f32,
    pad0: u32,
    pad1: u32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read> positions: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read_write> distances: array<f32>;
@group(0) @binding(3) var<storage, read_write> indices: array<u32>;

@compute @workgroup_size(256)
fn compute_distances(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= params.count) {
        return;
    }
    let p = params.model_view * vec4<f32>(positions[i].xyz, 1.0);
    distances[i] = params.sign * p.z;
    indices[i] = i;
}
"#;

/// Ascending bitonic network with flip/disperse steps.
///
/// Each thread owns one pair. Pairs whose right element lies past `count`
/// are skipped, which behaves like padding with +inf, so non-power-of-two
/// counts sort correctly.
pub const BITONIC_SHADER: &str = r#"
struct SortParams {
    count: u32,
    group_width: u32,
    group_height: u32,
    step_index: u32,
}

@group(0) @binding(0) var<uniform> params: SortParams;
@group(0) @binding(1) var<storage, read> distances: array<f32>;
@group(0) @binding(2) var<storage, read_write> indices: array<u32>;

@compute @workgroup_size(256)
fn bitonic_sort(@builtin(global_invocation_id) gid: vec3<u32>) {
    let index = gid.x;
    let h = index & (params.group_width - 1u);
    let left = h + (params.group_height + 1u) * (index / params.group_width);
    var step = (params.group_height + 1u) / 2u;
    if (params.step_index == 0u) {
        step = params.group_height - 2u * h;
    }
    let right = left + step;
    if (right >= params.count) {
        return;
    }

    let a = indices[left];
    let b = indices[right];
    if (distances[a] > distances[b]) {
        indices[left] = b;
        indices[right] = a;
    }
}
"#;

pub fn create_distance_shader(device: &Device) -> ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Distance Shader"),
        source: wgpu::ShaderSource::Wgsl(DISTANCE_SHADER.into()),
    })
}

pub fn create_bitonic_shader(device: &Device) -> ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Bitonic Sort Shader"),
        source: wgpu::ShaderSource::Wgsl(BITONIC_SHADER.into()),
    })
}
