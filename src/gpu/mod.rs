//! GPU side of the pipeline.
//!
//! Always available:
//! - `triple_buffer` - fence-released slot pool for CPU → GPU handoff
//! - `throttle` - sort-every-Nth-frame policy
//!
//! Only with --features gpu (wgpu):
//! - `context` - device/queue initialization
//! - `buffers` - buffer creation and readback
//! - `types` - uniform layouts
//! - `shaders` - WGSL distance and bitonic kernels
//! - `sort` - `BitonicSorter` and `GpuSplatSorter`

pub mod throttle;
pub mod triple_buffer;

#[cfg(feature = "gpu")]
mod buffers;
#[cfg(feature = "gpu")]
mod context;
#[cfg(feature = "gpu")]
mod shaders;
#[cfg(feature = "gpu")]
mod sort;
#[cfg(feature = "gpu")]
mod types;

pub use throttle::SortThrottle;
pub use triple_buffer::{GpuWork, PoolOccupancy, PoolSnapshot, TripleBufferManager, POOL_SIZE};

#[cfg(feature = "gpu")]
pub use buffers::{create_buffer, create_buffer_init, read_buffer, read_buffer_blocking};
#[cfg(feature = "gpu")]
pub use context::GpuContext;
#[cfg(feature = "gpu")]
pub use sort::{num_stages, BitonicSorter, GpuSplatSorter};
#[cfg(feature = "gpu")]
pub use types::{DistanceParams, PositionGPU, SortParams};
