//! Sort requests and results.

use crate::core::{permutation, IndexedDistance};
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

/// "Sort the cloud as seen from this camera/model pair, for `count` elements."
///
/// Equality is structural; the worker drops a request equal to the one it
/// saw last.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SortRequest {
    /// Camera world transform (camera → world)
    pub camera: Matrix4<f32>,

    /// Model world transform (model → world)
    pub model: Matrix4<f32>,

    /// Number of leading elements of the cloud to sort
    pub count: usize,
}

impl SortRequest {
    pub fn new(camera: Matrix4<f32>, model: Matrix4<f32>, count: usize) -> Self {
        Self {
            camera,
            model,
            count,
        }
    }

    /// Identity camera and model: distance is the model-space z.
    pub fn identity(count: usize) -> Self {
        Self::new(Matrix4::identity(), Matrix4::identity(), count)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// A completed sort.
///
/// Owns its buffer. Hand it back with `SortWorker::recycle` once the renderer
/// is done with it to spare the worker an allocation.
#[derive(Debug)]
pub struct SortResult {
    pub request: SortRequest,
    pub(crate) buffer: Vec<IndexedDistance>,
}

impl SortResult {
    pub(crate) fn new(request: SortRequest, buffer: Vec<IndexedDistance>) -> Self {
        debug_assert!(request.count <= buffer.len());
        Self { request, buffer }
    }

    /// The sorted entries, `request.count` long.
    pub fn indices(&self) -> &[IndexedDistance] {
        &self.buffer[..self.request.count]
    }

    /// Just the draw-order permutation.
    pub fn permutation(&self) -> Vec<u32> {
        permutation(self.indices())
    }

    /// Raw bytes of the sorted entries, ready for a GPU upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.indices())
    }

    /// Give up the backing buffer (full capacity, not just `count`).
    pub fn into_buffer(self) -> Vec<IndexedDistance> {
        self.buffer
    }
}
