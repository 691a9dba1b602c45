//! File store backed by a directory on the host filesystem.
//!
//! Stands in for the SD card when the server runs on a desktop. Every path
//! component goes through `to_8_3`, both for lookup (matched against the
//! short form of existing names) and for creation, so the host never sees
//! `..` or separators smuggled in a filename.

use std::collections::HashSet;
use std::fs::{self, DirEntry, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::file_store::{components, to_8_3, DirectoryEntry, FileStore};
use crate::error::{DflatError, DflatResult};

/// Open handle into a `HostDirStore`.
pub struct HostHandle {
    name: String,
    kind: HostHandleKind,
}

enum HostHandleKind {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
    Directory,
}

/// Serves the contents of one host directory.
pub struct HostDirStore {
    root: PathBuf,
}

impl HostDirStore {
    /// Serve `root`, which must be an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> DflatResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(DflatError::NotADirectory(root.display().to_string()));
        }
        Ok(Self { root })
    }

    /// Every entry in `dir` with a short name unique within it.
    ///
    /// Names that already are short names keep them. Other names take
    /// their folded form if it is free, else a `~N` alias the way FAT
    /// generates them, in host name order.
    fn short_names(dir: &Path) -> DflatResult<Vec<(String, DirEntry)>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let long = entry.file_name().to_string_lossy().into_owned();
            let short = to_8_3(&long);
            entries.push((long == short, short, entry));
        }
        entries.sort_by(|a, b| {
            b.0.cmp(&a.0).then_with(|| a.2.file_name().cmp(&b.2.file_name()))
        });

        let mut taken = HashSet::new();
        let mut named = Vec::with_capacity(entries.len());
        for (_, short, entry) in entries {
            let mut unique = short.clone();
            let mut n = 1;
            while !taken.insert(unique.clone()) {
                unique = alias(&short, n);
                n += 1;
            }
            named.push((unique, entry));
        }
        Ok(named)
    }

    /// Find the host entry in `dir` whose short name matches `short`.
    fn find_entry(dir: &Path, short: &str) -> Option<PathBuf> {
        Self::short_names(dir)
            .ok()?
            .into_iter()
            .find(|(name, _)| name == short)
            .map(|(_, entry)| entry.path())
    }

    /// Resolve a protocol path to a host path.
    ///
    /// Components that do not exist yet resolve to their short name, so the
    /// result is also the path to create.
    fn resolve(&self, path: &str) -> PathBuf {
        let mut host = self.root.clone();
        for part in components(path) {
            let short = to_8_3(part);
            host = match Self::find_entry(&host, &short) {
                Some(found) => found,
                None => host.join(short),
            };
        }
        host
    }

    fn short_name(&self, host: &Path) -> String {
        if host == self.root {
            return "/".to_string();
        }
        let listed = host
            .parent()
            .and_then(|dir| Self::short_names(dir).ok())
            .and_then(|names| {
                names
                    .into_iter()
                    .find(|(_, entry)| entry.path() == host)
                    .map(|(name, _)| name)
            });
        match listed {
            Some(name) => name,
            // Not created yet
            None => host
                .file_name()
                .map(|n| to_8_3(&n.to_string_lossy()))
                .unwrap_or_else(|| "/".to_string()),
        }
    }
}

/// `LONGNAME.TXT`, 1 -> `LONGNA~1.TXT`.
fn alias(short: &str, n: usize) -> String {
    let tail = format!("~{}", n);
    let (name, ext) = match short.split_once('.') {
        Some((name, ext)) => (name, Some(ext)),
        None => (short, None),
    };
    let keep = 8usize.saturating_sub(tail.len()).min(name.len());
    let base = format!("{}{}", &name[..keep], tail);
    match ext {
        Some(ext) => format!("{}.{}", base, ext),
        None => base,
    }
}

impl FileStore for HostDirStore {
    type Handle = HostHandle;
    type Listing = std::vec::IntoIter<DirectoryEntry>;

    fn open_read(&mut self, path: &str) -> DflatResult<HostHandle> {
        let host = self.resolve(path);
        if !host.exists() {
            return Err(DflatError::FileNotFound(path.to_string()));
        }
        let name = self.short_name(&host);
        let kind = if host.is_dir() {
            HostHandleKind::Directory
        } else {
            HostHandleKind::Reader(BufReader::new(File::open(&host)?))
        };
        Ok(HostHandle { name, kind })
    }

    fn open_write(&mut self, path: &str) -> DflatResult<HostHandle> {
        let host = self.resolve(path);
        if host.is_dir() {
            return Err(DflatError::IsADirectory(path.to_string()));
        }
        match host.parent() {
            Some(parent) if parent.is_dir() => {}
            _ => return Err(DflatError::NotADirectory(path.to_string())),
        }
        let name = self.short_name(&host);
        let file = File::create(&host)?;
        Ok(HostHandle {
            name,
            kind: HostHandleKind::Writer(BufWriter::new(file)),
        })
    }

    fn read_byte(&mut self, handle: &mut HostHandle) -> DflatResult<Option<u8>> {
        match &mut handle.kind {
            HostHandleKind::Reader(reader) => {
                let mut buf = [0u8; 1];
                match reader.read(&mut buf)? {
                    0 => Ok(None),
                    _ => Ok(Some(buf[0])),
                }
            }
            HostHandleKind::Directory => Err(DflatError::IsADirectory(handle.name.clone())),
            HostHandleKind::Writer(_) => Err(DflatError::InvalidHandle),
        }
    }

    fn write_byte(&mut self, handle: &mut HostHandle, byte: u8) -> DflatResult<()> {
        match &mut handle.kind {
            HostHandleKind::Writer(writer) => {
                writer.write_all(&[byte])?;
                Ok(())
            }
            _ => Err(DflatError::InvalidHandle),
        }
    }

    fn close(&mut self, handle: HostHandle) -> DflatResult<()> {
        if let HostHandleKind::Writer(mut writer) = handle.kind {
            writer.flush()?;
        }
        Ok(())
    }

    fn handle_name(&self, handle: &HostHandle) -> String {
        handle.name.clone()
    }

    fn handle_is_directory(&self, handle: &HostHandle) -> bool {
        matches!(handle.kind, HostHandleKind::Directory)
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn remove(&mut self, path: &str) -> DflatResult<()> {
        let host = self.resolve(path);
        if host.is_dir() {
            return Err(DflatError::IsADirectory(path.to_string()));
        }
        if !host.exists() {
            return Err(DflatError::FileNotFound(path.to_string()));
        }
        fs::remove_file(host)?;
        Ok(())
    }

    fn list_directory(&mut self, path: &str) -> DflatResult<Self::Listing> {
        let host = self.resolve(path);
        if !host.is_dir() {
            return Err(DflatError::NotADirectory(path.to_string()));
        }
        let mut entries = Vec::new();
        for (name, entry) in Self::short_names(&host)? {
            let meta = entry.metadata()?;
            if meta.is_dir() {
                entries.push(DirectoryEntry::directory(name));
            } else {
                entries.push(DirectoryEntry::file(name, meta.len()));
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, HostDirStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HostDirStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(HostDirStore::new(dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_write_then_read() {
        let (dir, mut store) = scratch();
        let mut handle = store.open_write("/HELLO.BAS").unwrap();
        for &b in b"10 PRINT" {
            store.write_byte(&mut handle, b).unwrap();
        }
        store.close(handle).unwrap();
        assert_eq!(fs::read(dir.path().join("HELLO.BAS")).unwrap(), b"10 PRINT");

        let mut handle = store.open_read("/hello.bas").unwrap();
        assert_eq!(store.read_byte(&mut handle).unwrap(), Some(b'1'));
        assert_eq!(store.handle_name(&handle), "HELLO.BAS");
    }

    #[test]
    fn test_lookup_by_short_name() {
        let (dir, mut store) = scratch();
        fs::write(dir.path().join("readme.txt"), b"hi").unwrap();
        assert!(store.exists("/README.TXT"));
        let mut handle = store.open_read("/README.TXT").unwrap();
        assert_eq!(store.read_byte(&mut handle).unwrap(), Some(b'h'));
        assert_eq!(store.read_byte(&mut handle).unwrap(), Some(b'i'));
        assert_eq!(store.read_byte(&mut handle).unwrap(), None);
    }

    #[test]
    fn test_dot_dot_stays_inside_root() {
        let (dir, mut store) = scratch();
        let handle = store.open_write("..").unwrap();
        store.close(handle).unwrap();
        assert!(dir.path().join("_").is_file());
        assert!(store.open_write("/../ESCAPE").is_err());
    }

    #[test]
    fn test_remove() {
        let (dir, mut store) = scratch();
        fs::write(dir.path().join("OLD.TXT"), b"x").unwrap();
        store.remove("/OLD.TXT").unwrap();
        assert!(!dir.path().join("OLD.TXT").exists());
        assert!(matches!(store.remove("/OLD.TXT"), Err(DflatError::FileNotFound(_))));
    }

    #[test]
    fn test_list_directory() {
        let (dir, mut store) = scratch();
        fs::write(dir.path().join("b.txt"), vec![0u8; 2048]).unwrap();
        fs::write(dir.path().join("a.txt"), vec![0u8; 10]).unwrap();
        fs::create_dir(dir.path().join("games")).unwrap();

        let entries: Vec<DirectoryEntry> = store.list_directory("/").unwrap().collect();
        assert_eq!(
            entries,
            vec![
                DirectoryEntry::file("A.TXT", 10),
                DirectoryEntry::file("B.TXT", 2048),
                DirectoryEntry::directory("GAMES"),
            ]
        );
    }

    #[test]
    fn test_open_directory() {
        let (dir, mut store) = scratch();
        fs::create_dir(dir.path().join("Games")).unwrap();
        let handle = store.open_read("/GAMES").unwrap();
        assert!(store.handle_is_directory(&handle));
        assert_eq!(store.handle_name(&handle), "GAMES");
    }

    #[test]
    fn test_alias() {
        assert_eq!(alias("LONGNAME.TXT", 1), "LONGNA~1.TXT");
        assert_eq!(alias("AB.C", 2), "AB~2.C");
        assert_eq!(alias("DIRECTOR", 12), "DIREC~12");
    }

    #[test]
    fn test_folded_names_stay_distinct() {
        let (dir, mut store) = scratch();
        fs::write(dir.path().join("longname1.txt"), b"one").unwrap();
        fs::write(dir.path().join("longname2.txt"), b"two").unwrap();

        let names: Vec<String> = store.list_directory("/").unwrap().map(|e| e.name).collect();
        assert_eq!(names, vec!["LONGNAME.TXT", "LONGNA~1.TXT"]);

        let mut handle = store.open_read("/LONGNAME.TXT").unwrap();
        assert_eq!(store.read_byte(&mut handle).unwrap(), Some(b'o'));
        assert_eq!(store.handle_name(&handle), "LONGNAME.TXT");

        let mut handle = store.open_read("/LONGNA~1.TXT").unwrap();
        assert_eq!(store.read_byte(&mut handle).unwrap(), Some(b't'));
        assert_eq!(store.handle_name(&handle), "LONGNA~1.TXT");
    }

    #[test]
    fn test_exact_short_name_wins() {
        let (dir, mut store) = scratch();
        fs::write(dir.path().join("Readme.txt"), b"long").unwrap();
        fs::write(dir.path().join("README.TXT"), b"short").unwrap();

        let mut handle = store.open_read("/README.TXT").unwrap();
        assert_eq!(store.read_byte(&mut handle).unwrap(), Some(b's'));
        let names: Vec<String> = store.list_directory("/").unwrap().map(|e| e.name).collect();
        assert_eq!(names, vec!["README.TXT", "README~1.TXT"]);
    }
}
