//! Splat records and the cloud container the sorter reads from.
//!
//! A splat is parameterized by:
//! - Position (the only attribute the sorter reads)
//! - Colour (RGBA, 8-bit)
//! - Scale (log-space, as stored by training tools)
//! - Rotation (unit quaternion)

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Anything with a world-space position can be depth sorted.
///
/// The renderer's splat layout is opaque to the sorting pipeline; it only
/// ever asks for positions.
pub trait SplatPosition: Send + Sync + 'static {
    fn position(&self) -> Vector3<f32>;
}

impl SplatPosition for Vector3<f32> {
    fn position(&self) -> Vector3<f32> {
        *self
    }
}

/// A single Gaussian splat as handed over by the loader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Splat {
    /// Position (mean μ) in model space
    pub position: Vector3<f32>,

    /// Log-space scale (actual scale = exp(scale))
    pub scale: Vector3<f32>,

    /// Rotation as unit quaternion
    pub rotation: UnitQuaternion<f32>,

    /// Linear RGBA, 0-255
    pub color: [u8; 4],
}

impl Splat {
    /// Create a new splat with given parameters.
    pub fn new(
        position: Vector3<f32>,
        scale: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        color: [u8; 4],
    ) -> Self {
        Self {
            position,
            scale,
            rotation,
            color,
        }
    }

    /// A unit-sized white splat at `position`.
    pub fn at(position: Vector3<f32>) -> Self {
        Self::new(
            position,
            Vector3::zeros(),
            UnitQuaternion::identity(),
            [255, 255, 255, 255],
        )
    }
}

impl SplatPosition for Splat {
    fn position(&self) -> Vector3<f32> {
        self.position
    }
}

/// Immutable, shareable collection of splats.
///
/// Cloning is cheap (the storage is reference counted), so the same cloud can
/// be handed to the sort worker thread and to the renderer.
#[derive(Debug)]
pub struct SplatCloud<S> {
    splats: Arc<[S]>,
}

impl<S> Clone for SplatCloud<S> {
    fn clone(&self) -> Self {
        Self {
            splats: Arc::clone(&self.splats),
        }
    }
}

impl<S: SplatPosition> SplatCloud<S> {
    pub fn new(splats: Vec<S>) -> Self {
        Self {
            splats: splats.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.splats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splats.is_empty()
    }

    pub fn splats(&self) -> &[S] {
        &self.splats
    }

    /// Positions only, in element order.
    pub fn positions(&self) -> impl Iterator<Item = Vector3<f32>> + '_ {
        self.splats.iter().map(SplatPosition::position)
    }
}

impl<S: SplatPosition> From<Vec<S>> for SplatCloud<S> {
    fn from(splats: Vec<S>) -> Self {
        Self::new(splats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_clone_shares_storage() {
        let cloud = SplatCloud::new(vec![
            Splat::at(Vector3::new(0.0, 0.0, 1.0)),
            Splat::at(Vector3::new(0.0, 0.0, 2.0)),
        ]);
        let other = cloud.clone();

        assert_eq!(other.len(), 2);
        assert!(std::ptr::eq(cloud.splats().as_ptr(), other.splats().as_ptr()));
    }

    #[test]
    fn test_positions_follow_element_order() {
        let cloud: SplatCloud<Vector3<f32>> =
            vec![Vector3::new(1.0, 2.0, 3.0), Vector3::new(-1.0, 0.0, 5.0)].into();
        let z: Vec<f32> = cloud.positions().map(|p| p.z).collect();
        assert_eq!(z, vec![3.0, 5.0]);
    }
}
