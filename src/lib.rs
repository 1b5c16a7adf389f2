#![deny(missing_docs)]
//! `taskpool` is a task-based worker pool written in Rust.
//!
//! A [`WorkerPool`] spawns a fixed number of worker threads at construction
//! and hands them tasks through a shared, lock-free queue. The queue end is
//! itself public: the thread that created the pool, or any other thread
//! holding a [`QueueHandle`], can pull tasks with
//! [`try_take`](WorkerPool::try_take) and execute them in place rather than
//! sit idle while the workers catch up.

mod error;
mod pool;

pub use error::Error;
pub use pool::{QueueHandle, Task, WorkerPool};

/// Alias for `Result` with the crate error type [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
