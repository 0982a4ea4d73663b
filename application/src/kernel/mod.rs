//! Kernel client core: pending-request futures and the raw client that
//! routes protocol messages to them.

pub mod future;
pub mod raw_client;

pub use future::{FutureOptions, FutureOutcome, FutureState, KernelFuture};
pub use raw_client::{RawKernelClient, RawKernelOptions};
