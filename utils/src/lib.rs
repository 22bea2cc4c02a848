//! Shared infrastructure utilities for the Infinite Craft client.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)
//! - **`paths`**: `~` and `${VAR}` expansion for user-supplied paths

pub mod atomic_write;
pub mod paths;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, ParentDirSyncPolicy, atomic_write,
    atomic_write_with_options,
};
pub use paths::{expand_env_vars, expand_path};
