//! Log tailing for kubedeck
//!
//! This crate drives one pod/container log view at a time: a bounded
//! initial fetch, then interval polling appended to a shared text buffer.

mod buffer;
mod fetch;
mod tail;

pub use buffer::{TAIL_HEADER, TailBuffer};
pub use fetch::{KubeLogFetcher, LogFetchError, LogFetcher};
pub use tail::{
    LogTailController, MAX_INITIAL_LINES, MAX_POLL_LINES, POLL_INTERVAL, TailHandle, TailOptions,
    TailState,
};

// Re-export types used in our public API
pub use kubedeck_types::LogTarget;
