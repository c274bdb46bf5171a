//! # splat-sort: depth ordering for Gaussian splat clouds
//!
//! Splats have to be blended in depth order, and that order changes every
//! time the camera moves. This crate keeps a fresh order available without
//! stalling the render loop.
//!
//! ## Architecture
//!
//! - `core`: Splat records, clouds, `IndexedDistance`, view-depth math
//! - `sort`: Key transform, radix sort, requests, and the background worker
//! - `gpu`: Triple-buffered CPU → GPU handoff, and (feature `gpu`) the wgpu
//!   bitonic backend
//! - `config`: `SortConfig` and backend selection
//!
//! ## Typical loop
//!
//! ```no_run
//! use nalgebra::{Matrix4, Vector3};
//! use splat_sort::{SortConfig, SortWorker, SplatCloud};
//!
//! let cloud: SplatCloud<Vector3<f32>> = vec![Vector3::new(0.0, 0.0, 1.0)].into();
//! let worker = SortWorker::spawn(cloud.clone(), &SortConfig::default()).unwrap();
//!
//! // Every frame:
//! worker.request_sort(Matrix4::identity(), Matrix4::identity(), cloud.len());
//! if let Some(result) = worker.try_recv() {
//!     // upload result.as_bytes(), then hand the buffer back
//!     worker.recycle(result);
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod gpu;
pub mod sort;

// Re-export commonly used types at crate root for convenience
pub use config::{SortConfig, SortMethod};
pub use crate::core::{IndexedDistance, Splat, SplatCloud, SplatPosition};
pub use error::SortError;
pub use gpu::{SortThrottle, TripleBufferManager};
pub use sort::{radix_sort, sort_key, SortRequest, SortResult, SortWorker, SortedIn};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
