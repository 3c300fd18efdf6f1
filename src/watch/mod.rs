// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling `[[watch]]` path / exclude globs per subscription.
//! - Wiring up a cross-platform filesystem watcher (`notify`) on the static
//!   roots of those globs.
//! - Debouncing bursts of events into one trigger per task, or one reload
//!   signal for subscriptions that only refresh connected pages.
//!
//! It does **not** know about the task graph; it only turns filesystem
//! changes into task-level triggers. Overlap between runs of the same task
//! is prevented by the engine core.

pub mod debounce;
pub mod event_handler;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use debounce::{Debouncer, DEFAULT_WINDOW};
pub use event_handler::run_event_loop;
pub use patterns::{
    compile_subscriptions, reloads_for_path, tasks_for_path, CompiledSubscription, WatchSubscription,
};
pub use watcher::{spawn_watcher, WatcherHandle};
