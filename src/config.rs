//! Sorter configuration.
//!
//! Everything has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! { "capacity": 500000, "method": "auto", "gpu_sort_rate": 2 }
//! ```

use crate::error::SortError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which backend produces the draw order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMethod {
    /// Radix sort on the background worker thread
    CpuRadix,
    /// Bitonic network on the GPU timeline
    GpuBitonic,
    /// GPU once the cloud reaches `gpu_threshold` elements, CPU below that
    Auto,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Number of elements the sorter's buffers are sized for
    pub capacity: usize,

    /// Emit far-to-near instead of near-to-far
    pub reversed: bool,

    pub method: SortMethod,

    /// Element count at which `Auto` switches to the GPU backend
    pub gpu_threshold: usize,

    /// GPU backend sorts every Nth frame (1 = every frame)
    pub gpu_sort_rate: u32,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            reversed: false,
            method: SortMethod::CpuRadix,
            gpu_threshold: 1 << 20,
            gpu_sort_rate: 1,
        }
    }
}

impl SortConfig {
    /// Config sized for `capacity` elements, defaults elsewhere.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, SortError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SortError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), SortError> {
        if self.capacity > u32::MAX as usize {
            return Err(SortError::InvalidConfig(format!(
                "capacity {} does not fit a u32 index",
                self.capacity
            )));
        }
        if self.gpu_sort_rate == 0 {
            return Err(SortError::InvalidConfig(
                "gpu_sort_rate must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve `Auto` for a cloud of `count` elements.
    ///
    /// Without the `gpu` feature `Auto` always resolves to the CPU.
    pub fn resolve_method(&self, count: usize) -> SortMethod {
        match self.method {
            SortMethod::Auto if cfg!(feature = "gpu") && count >= self.gpu_threshold => {
                SortMethod::GpuBitonic
            }
            SortMethod::Auto => SortMethod::CpuRadix,
            method => method,
        }
    }
}
