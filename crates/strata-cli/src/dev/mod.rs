//! Watch mode: file watching and incremental rebuilds against one cache.

pub mod session;
pub mod watcher;

pub use session::{ChunkChanges, WatchSession};
pub use watcher::{FileChange, FileWatcher, next_batch};
