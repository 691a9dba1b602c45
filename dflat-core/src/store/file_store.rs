//! FileStore trait - the storage the server exposes to the host.

use crate::error::DflatResult;

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Short (8.3) name.
    pub name: String,
    /// Size in bytes, 0 for directories.
    pub size: u64,
    pub is_directory: bool,
}

impl DirectoryEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            is_directory: false,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            is_directory: true,
        }
    }
}

/// Backing storage for the file server, modelled on an SD card library.
///
/// Paths are `/`-separated; repeated separators collapse and each component
/// is matched through its 8.3 short name, so lookups are case-insensitive.
/// At most one handle is open at a time from the server's side, but
/// implementations must not rely on that.
pub trait FileStore: Send {
    /// Open file or directory.
    type Handle: Send;
    /// Lazy directory listing, closed on drop.
    type Listing: Iterator<Item = DirectoryEntry>;

    /// Open an existing file or directory for reading.
    fn open_read(&mut self, path: &str) -> DflatResult<Self::Handle>;

    /// Create (or truncate) a file for writing.
    fn open_write(&mut self, path: &str) -> DflatResult<Self::Handle>;

    /// Next byte of a read handle, `None` at end of file.
    fn read_byte(&mut self, handle: &mut Self::Handle) -> DflatResult<Option<u8>>;

    /// Append a byte to a write handle.
    fn write_byte(&mut self, handle: &mut Self::Handle, byte: u8) -> DflatResult<()>;

    /// Close a handle, flushing anything pending.
    fn close(&mut self, handle: Self::Handle) -> DflatResult<()>;

    /// Short name of the opened entry.
    fn handle_name(&self, handle: &Self::Handle) -> String;

    /// Whether the handle refers to a directory.
    fn handle_is_directory(&self, handle: &Self::Handle) -> bool;

    /// Check if a file or directory exists.
    fn exists(&self, path: &str) -> bool;

    /// Remove a file.
    fn remove(&mut self, path: &str) -> DflatResult<()>;

    /// List a directory.
    fn list_directory(&mut self, path: &str) -> DflatResult<Self::Listing>;
}

/// Split a path into non-empty components.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Convert a filename to its FAT 8.3 short form.
///
/// - Uppercases everything
/// - Truncates name to 8 chars, extension to 3 chars
/// - Removes characters a short name cannot hold
///
/// # Examples
/// ```
/// use dflat_core::to_8_3;
/// assert_eq!(to_8_3("hello.txt"), "HELLO.TXT");
/// assert_eq!(to_8_3("VeryLongName.extension"), "VERYLONG.EXT");
/// assert_eq!(to_8_3("noext"), "NOEXT");
/// ```
pub fn to_8_3(filename: &str) -> String {
    let upper = filename.to_uppercase();
    let (name, ext) = match upper.rfind('.') {
        Some(pos) => (&upper[..pos], &upper[pos + 1..]),
        None => (upper.as_str(), ""),
    };

    // Valid short name characters: A-Z, 0-9, $ % ' - _ @ ~ ` ! ( ) { } ^ # &
    fn clean(s: &str) -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric() || "$%'-_@~`!(){}^#&".contains(*c))
            .collect()
    }

    let clean_name: String = clean(name).chars().take(8).collect();
    let clean_ext: String = clean(ext).chars().take(3).collect();

    // Name must be at least 1 char
    let final_name = if clean_name.is_empty() {
        "_".to_string()
    } else {
        clean_name
    };

    if clean_ext.is_empty() {
        final_name
    } else {
        format!("{}.{}", final_name, clean_ext)
    }
}
