//! In-memory file store implementation.

use std::collections::BTreeMap;

use super::file_store::{components, to_8_3, DirectoryEntry, FileStore};
use crate::error::{DflatError, DflatResult};

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Directory,
}

/// Open handle into a `MemoryFileStore`.
#[derive(Debug)]
pub struct MemoryHandle {
    key: String,
    name: String,
    is_directory: bool,
    writable: bool,
    pos: usize,
}

/// Simple in-memory tree of files and directories.
///
/// Keys are normalized paths without a leading separator (`GAMES/ELITE.BIN`);
/// the root directory is implicit.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileStore {
    nodes: BTreeMap<String, Node>,
}

/// Normalize a path to its store key.
fn key_of(path: &str) -> String {
    components(path).map(to_8_3).collect::<Vec<_>>().join("/")
}

fn parent_of(key: &str) -> &str {
    key.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

fn name_of(key: &str) -> &str {
    key.rsplit_once('/').map(|(_, name)| name).unwrap_or(key)
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial files (parent directories are created).
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let mut store = Self::new();
        for (path, data) in files {
            store.add_file(path.as_ref(), data);
        }
        store
    }

    /// Add a file, creating parent directories as needed.
    pub fn add_file(&mut self, path: &str, data: impl Into<Vec<u8>>) {
        let key = key_of(path);
        self.add_dir(parent_of(&key));
        self.nodes.insert(key, Node::File(data.into()));
    }

    /// Add a directory and any missing parents.
    pub fn add_dir(&mut self, path: &str) {
        let mut key = String::new();
        for part in components(path) {
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(&to_8_3(part));
            self.nodes.entry(key.clone()).or_insert(Node::Directory);
        }
    }

    /// Contents of a file, if present.
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        match self.nodes.get(&key_of(path)) {
            Some(Node::File(data)) => Some(data),
            _ => None,
        }
    }

    /// Whether `path` names a directory (the root always does).
    pub fn is_dir(&self, path: &str) -> bool {
        let key = key_of(path);
        key.is_empty() || matches!(self.nodes.get(&key), Some(Node::Directory))
    }

    /// Number of files and directories held.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FileStore for MemoryFileStore {
    type Handle = MemoryHandle;
    type Listing = std::vec::IntoIter<DirectoryEntry>;

    fn open_read(&mut self, path: &str) -> DflatResult<MemoryHandle> {
        let key = key_of(path);
        let is_directory = if key.is_empty() {
            true
        } else {
            match self.nodes.get(&key) {
                Some(Node::File(_)) => false,
                Some(Node::Directory) => true,
                None => return Err(DflatError::FileNotFound(path.to_string())),
            }
        };
        Ok(MemoryHandle {
            name: if key.is_empty() {
                "/".to_string()
            } else {
                name_of(&key).to_string()
            },
            key,
            is_directory,
            writable: false,
            pos: 0,
        })
    }

    fn open_write(&mut self, path: &str) -> DflatResult<MemoryHandle> {
        let key = key_of(path);
        if self.is_dir(path) {
            return Err(DflatError::IsADirectory(path.to_string()));
        }
        if !self.is_dir(parent_of(&key)) {
            return Err(DflatError::NotADirectory(parent_of(&key).to_string()));
        }
        self.nodes.insert(key.clone(), Node::File(Vec::new()));
        Ok(MemoryHandle {
            name: name_of(&key).to_string(),
            key,
            is_directory: false,
            writable: true,
            pos: 0,
        })
    }

    fn read_byte(&mut self, handle: &mut MemoryHandle) -> DflatResult<Option<u8>> {
        match self.nodes.get(&handle.key) {
            Some(Node::File(data)) => {
                let byte = data.get(handle.pos).copied();
                if byte.is_some() {
                    handle.pos += 1;
                }
                Ok(byte)
            }
            Some(Node::Directory) => Err(DflatError::IsADirectory(handle.key.clone())),
            None => Err(DflatError::InvalidHandle),
        }
    }

    fn write_byte(&mut self, handle: &mut MemoryHandle, byte: u8) -> DflatResult<()> {
        if !handle.writable {
            return Err(DflatError::InvalidHandle);
        }
        match self.nodes.get_mut(&handle.key) {
            Some(Node::File(data)) => {
                data.push(byte);
                handle.pos += 1;
                Ok(())
            }
            _ => Err(DflatError::InvalidHandle),
        }
    }

    fn close(&mut self, _handle: MemoryHandle) -> DflatResult<()> {
        Ok(())
    }

    fn handle_name(&self, handle: &MemoryHandle) -> String {
        handle.name.clone()
    }

    fn handle_is_directory(&self, handle: &MemoryHandle) -> bool {
        handle.is_directory
    }

    fn exists(&self, path: &str) -> bool {
        let key = key_of(path);
        key.is_empty() || self.nodes.contains_key(&key)
    }

    fn remove(&mut self, path: &str) -> DflatResult<()> {
        let key = key_of(path);
        match self.nodes.get(&key) {
            Some(Node::File(_)) => {
                self.nodes.remove(&key);
                Ok(())
            }
            Some(Node::Directory) => Err(DflatError::IsADirectory(path.to_string())),
            None if key.is_empty() => Err(DflatError::IsADirectory(path.to_string())),
            None => Err(DflatError::FileNotFound(path.to_string())),
        }
    }

    fn list_directory(&mut self, path: &str) -> DflatResult<Self::Listing> {
        if !self.is_dir(path) {
            return Err(DflatError::NotADirectory(path.to_string()));
        }
        let dir = key_of(path);
        let entries: Vec<DirectoryEntry> = self
            .nodes
            .iter()
            .filter(|(key, _)| parent_of(key) == dir)
            .map(|(key, node)| match node {
                Node::File(data) => DirectoryEntry::file(name_of(key), data.len() as u64),
                Node::Directory => DirectoryEntry::directory(name_of(key)),
            })
            .collect();
        Ok(entries.into_iter())
    }
}
