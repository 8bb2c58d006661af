//! Local working-copy access for revflow.
//!
//! The git module exposes a cloneable [`worker::GitHandle`] facade over a
//! background `std::thread` that owns the `git2::Repository` for its lifetime.
//! The repository is not `Sync`, so it never leaves that thread; callers send
//! jobs over a crossbeam channel and await the reply.
pub mod types;
pub mod worker;

pub use worker::{spawn_git_worker, GitHandle};
