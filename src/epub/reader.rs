use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;

use tracing::debug;
use zip::{CompressionMethod, DateTime, ZipArchive};

use crate::error::{Error, Result};

/// One entry of the source archive, remembered so the archive can be rebuilt
/// with the same layout.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Name as stored in the archive (`/`-separated).
    pub name: String,
    pub is_dir: bool,
    pub compression: CompressionMethod,
    pub last_modified: Option<DateTime>,
    pub unix_mode: Option<u32>,
}

/// Extract every entry of an EPUB file into `dest`.
///
/// Returns the entries in archive order. Entries whose names would land
/// outside `dest` are rejected.
pub fn extract_epub<P: AsRef<Path>>(path: P, dest: &Path) -> Result<Vec<ArchiveEntry>> {
    let file = File::open(path)?;
    extract_epub_from_reader(file, dest)
}

/// Extract from any [`Read`] + [`Seek`] source.
pub fn extract_epub_from_reader<R: Read + Seek>(
    reader: R,
    dest: &Path,
) -> Result<Vec<ArchiveEntry>> {
    let mut archive = ZipArchive::new(reader)?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();
        let relative = file
            .enclosed_name()
            .ok_or_else(|| Error::archive(format!("unsafe entry name in archive: {name}")))?;
        let target = dest.join(relative);

        if file.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut file, &mut out)?;
        }

        debug!(entry = %name, "extracted");
        entries.push(ArchiveEntry {
            name,
            is_dir: file.is_dir(),
            compression: file.compression(),
            last_modified: file.last_modified(),
            unix_mode: file.unix_mode(),
        });
    }

    Ok(entries)
}
