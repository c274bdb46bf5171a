//! CPU depth sorting.
//!
//! - `key` - float distance → order-preserving `u32`
//! - `radix` - 4-pass LSD radix sort with explicit result-buffer reporting
//! - `request` - `SortRequest` / `SortResult`
//! - `channel` - single-slot latest-wins channel
//! - `worker` - background thread tying it together

pub mod channel;
pub mod key;
pub mod radix;
pub mod request;
pub mod worker;

pub use key::{key_digit, sort_key};
pub use radix::{radix_sort, radix_sort_in_place, RadixKey, SortedIn};
pub use request::{SortRequest, SortResult};
pub use worker::{sort_once, SortWorker, WorkerState, WorkerStats};
