//! Storage abstractions for the file server.
//!
//! - `FileStore`: the SD-card style interface the server drives
//! - `MemoryFileStore`: in-memory tree, also the target of disk images
//! - `HostDirStore`: a directory on the host filesystem

mod file_store;
mod host_dir_store;
mod memory_store;

pub use file_store::{components, to_8_3, DirectoryEntry, FileStore};
pub use host_dir_store::{HostDirStore, HostHandle};
pub use memory_store::{MemoryFileStore, MemoryHandle};
