//! Current directory tracking and filename accumulation.

use crate::error::{DflatError, DflatResult};
use crate::protocol::{NUL, ROOT_MARKER, SEPARATOR};

/// The server's notion of the current directory.
///
/// Only ever extended by one directory at a time or reset to root; the
/// host has no way to ask for the parent directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTracker {
    current: String,
}

impl PathTracker {
    /// Start in `start`, which need not be the root.
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            current: start.into(),
        }
    }

    /// Current directory, always ending in a separator.
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Go back to the root directory.
    pub fn reset(&mut self) {
        self.current.clear();
        self.current.push(SEPARATOR);
    }

    /// Enter a subdirectory of the current one.
    pub fn descend(&mut self, name: &str) {
        self.current.push_str(name);
        self.current.push(SEPARATOR);
    }

    /// Fully-qualified path: plain concatenation, no normalization.
    pub fn resolve(&self, filename: &str) -> String {
        format!("{}{}", self.current, filename)
    }
}

impl Default for PathTracker {
    fn default() -> Self {
        Self::new("/")
    }
}

/// Bounded buffer a nul-terminated filename is read into.
#[derive(Debug, Clone)]
pub struct FilenameBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl FilenameBuffer {
    /// `capacity` counts the terminating nul.
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Append a received byte. Returns true once the nul arrives.
    pub fn push(&mut self, byte: u8) -> DflatResult<bool> {
        if byte == NUL {
            return Ok(true);
        }
        if self.bytes.len() + 1 >= self.capacity {
            return Err(DflatError::BufferOverrun {
                capacity: self.capacity,
            });
        }
        self.bytes.push(byte);
        Ok(false)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The host asked for the root directory: `/` or an empty name.
    pub fn is_root_marker(&self) -> bool {
        self.bytes.is_empty() || self.bytes == ROOT_MARKER
    }

    /// Filename as text; the host character set is ASCII.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_descend_and_reset() {
        let mut path = PathTracker::default();
        assert_eq!(path.current(), "/");

        path.descend("GAMES");
        path.descend("ARCADE");
        assert_eq!(path.current(), "/GAMES/ARCADE/");

        path.reset();
        assert_eq!(path.current(), "/");
    }

    #[test]
    fn test_reset_from_start_directory_goes_to_root() {
        let mut path = PathTracker::new("/GAMES/");
        assert_eq!(path.resolve("ELITE.BIN"), "/GAMES/ELITE.BIN");
        path.reset();
        assert_eq!(path.current(), "/");
    }

    #[test]
    fn test_resolve_is_concatenation() {
        let mut path = PathTracker::default();
        assert_eq!(path.resolve("A.TXT"), "/A.TXT");
        assert_eq!(path.resolve("/"), "//");
        path.descend("SUBDIR");
        assert_eq!(path.resolve("A.TXT"), "/SUBDIR/A.TXT");
    }

    #[test]
    fn test_filename_accumulates_until_nul() {
        let mut name = FilenameBuffer::new(16);
        for &b in b"A.TXT" {
            assert!(!name.push(b).unwrap());
        }
        assert!(name.push(0).unwrap());
        assert_eq!(name.to_string_lossy(), "A.TXT");
    }

    #[test]
    fn test_filename_overrun() {
        let mut name = FilenameBuffer::new(4);
        assert!(!name.push(b'A').unwrap());
        assert!(!name.push(b'B').unwrap());
        assert!(!name.push(b'C').unwrap());
        assert!(matches!(
            name.push(b'D'),
            Err(DflatError::BufferOverrun { capacity: 4 })
        ));
        // A nul still fits
        assert!(name.push(0).unwrap());
    }

    #[test]
    fn test_root_marker() {
        let mut name = FilenameBuffer::new(8);
        name.push(b'/').unwrap();
        assert!(name.is_root_marker());
        name.clear();
        assert!(name.is_root_marker());
        assert_eq!(name.to_string_lossy(), "");
        name.push(b'A').unwrap();
        assert!(!name.is_root_marker());
    }
}
