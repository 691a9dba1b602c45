//! Disk images loaded from ZIP archives.
//!
//! A disk image is a ZIP file whose tree becomes the served card contents.
//! Directory entries are kept; nested paths become subdirectories. Names
//! are folded to 8.3 the same way the card would show them.

use std::io::{Read, Seek};
use std::path::Path;

use log::debug;
use zip::ZipArchive;

use crate::error::{DflatError, DflatResult};
use crate::store::MemoryFileStore;

/// Load a disk image from ZIP data.
pub fn load_image<R: Read + Seek>(reader: R) -> DflatResult<MemoryFileStore> {
    let mut archive = ZipArchive::new(reader).map_err(DflatError::Zip)?;
    let mut store = MemoryFileStore::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(DflatError::Zip)?;
        let name = file.name().to_string();

        if file.is_dir() {
            store.add_dir(&name);
            continue;
        }

        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        debug!("image: {} ({} bytes)", name, content.len());
        store.add_file(&name, content);
    }

    Ok(store)
}

/// Load a disk image from a file path.
pub fn load_image_from_path(path: &Path) -> DflatResult<MemoryFileStore> {
    let file = std::fs::File::open(path)?;
    load_image(std::io::BufReader::new(file))
}
