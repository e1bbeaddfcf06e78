use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::reader::ArchiveEntry;
use crate::error::Result;

/// Rebuild an EPUB at `output` from the files under `src_dir`.
///
/// Entries are written in the order given, each with its original
/// compression method and timestamp; `mimetype` always comes first and is
/// stored uncompressed. The archive is assembled next to `output` and only
/// renamed into place once complete.
pub fn repack_epub(entries: &[ArchiveEntry], src_dir: &Path, output: &Path) -> Result<()> {
    let mut partial = output.as_os_str().to_owned();
    partial.push(".part");
    let partial = std::path::PathBuf::from(partial);

    let result = File::create(&partial)
        .map_err(Into::into)
        .and_then(|file| repack_epub_to_writer(entries, src_dir, file));

    match result {
        Ok(()) => {
            std::fs::rename(&partial, output)?;
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            Err(e)
        }
    }
}

/// Write the rebuilt archive to any [`Write`] + [`Seek`] destination.
pub fn repack_epub_to_writer<W: Write + Seek>(
    entries: &[ArchiveEntry],
    src_dir: &Path,
    writer: W,
) -> Result<()> {
    let mut zip = ZipWriter::new(writer);

    let mimetype = entries.iter().filter(|e| e.name == "mimetype");
    let rest = entries.iter().filter(|e| e.name != "mimetype");

    for entry in mimetype.chain(rest) {
        let options = entry_options(entry);
        if entry.is_dir {
            zip.add_directory(entry.name.trim_end_matches('/'), options)?;
            continue;
        }
        zip.start_file(entry.name.as_str(), options)?;
        let mut file = File::open(src_dir.join(&entry.name))?;
        io::copy(&mut file, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}

fn entry_options(entry: &ArchiveEntry) -> SimpleFileOptions {
    // Only the methods enabled in our zip build can be written back
    let method = match entry.compression {
        _ if entry.name == "mimetype" => CompressionMethod::Stored,
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    };

    let mut options = SimpleFileOptions::default().compression_method(method);
    if let Some(modified) = entry.last_modified {
        options = options.last_modified_time(modified);
    }
    if let Some(mode) = entry.unix_mode {
        options = options.unix_permissions(mode);
    }
    options
}
