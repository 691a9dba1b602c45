//! Catalog emulation.
//!
//! Opening a directory returns a fake catalog so the host's own load
//! routine accepts it. Layout (269 bytes):
//! - Byte 0: `$` marker
//! - Bytes 1-9: header filler (`X`)
//! - Byte 10: nul, an empty embedded filename
//! - Bytes 11-12: block number 0x0000
//! - Bytes 13-268: one 256 byte block of CR
//!
//! Listings render each entry as a 13 column name and a 5 column size,
//! both left-justified, followed by a space. No line breaks: the host
//! wraps at its screen width.

use crate::store::DirectoryEntry;

use super::{CR, NUL};

/// First byte of a catalog.
pub const CATALOG_MARKER: u8 = b'$';

/// Header filler byte and count.
pub const HEADER_FILLER: u8 = b'X';
pub const HEADER_FILLER_LEN: usize = 9;

/// Catalog data block size.
pub const BLOCK_SIZE: usize = 256;

/// Total bytes sent for a directory open.
pub const DIRECTORY_OPEN_LEN: usize = 1 + HEADER_FILLER_LEN + 1 + 2 + BLOCK_SIZE;

/// Listing column widths.
pub const NAME_WIDTH: usize = 13;
pub const SIZE_WIDTH: usize = 5;

/// The byte stream sent when the host opens a directory.
pub fn directory_open_bytes() -> Vec<u8> {
    let mut bytes = Vec::with_capacity(DIRECTORY_OPEN_LEN);
    bytes.push(CATALOG_MARKER);
    bytes.extend(std::iter::repeat(HEADER_FILLER).take(HEADER_FILLER_LEN));
    bytes.push(NUL);
    bytes.extend_from_slice(&[0x00, 0x00]);
    bytes.extend(std::iter::repeat(CR).take(BLOCK_SIZE));
    bytes
}

/// One listing entry as transmitted.
pub fn format_entry(entry: &DirectoryEntry) -> String {
    format!(
        "{:<name$}{:<size$} ",
        entry.name,
        entry.size,
        name = NAME_WIDTH,
        size = SIZE_WIDTH
    )
}
