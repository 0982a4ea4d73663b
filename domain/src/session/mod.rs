//! Session-facing state.
//!
//! - [`status::SessionStatus`]: the externally visible six-valued status
//!   and the folding rule from [`KernelStatus`](crate::KernelStatus)
//! - [`busy::BusyCounters`]: per-session busy-status record keyed by
//!   [`busy::BusyReason`]

pub mod busy;
pub mod status;
