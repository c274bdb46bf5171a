//! View-space depth math shared by the CPU and GPU sorters.

use nalgebra::{Matrix4, Vector3, Vector4};

/// Compose the model-view transform: `inverse(camera) * model`.
///
/// `camera` is the camera's world transform (camera → world), so its inverse
/// is the view matrix. Returns None if `camera` is singular.
pub fn model_view(camera: &Matrix4<f32>, model: &Matrix4<f32>) -> Option<Matrix4<f32>> {
    camera.try_inverse().map(|view| view * model)
}

/// View-space depth of a model-space point.
///
/// depth = (model_view · [x, y, z, 1]).z
#[inline]
pub fn view_depth(model_view: &Matrix4<f32>, position: &Vector3<f32>) -> f32 {
    let p = model_view * Vector4::new(position.x, position.y, position.z, 1.0);
    p.z
}
