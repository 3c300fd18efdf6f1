// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `RunBackend` trait and the `SchedulerBackend`
//!   the runtime uses in production, and which tests replace with a fake.
//! - [`process`] runs external tools for the `command` transform.

pub mod backend;
pub mod process;

pub use backend::{RunBackend, SchedulerBackend};
