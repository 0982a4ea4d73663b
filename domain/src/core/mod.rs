//! Core domain concepts shared across all subdomains.
//!
//! - [`error::KernelError`]: the error kind carried by kernel futures and
//!   session operations

pub mod error;
