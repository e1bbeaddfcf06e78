use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::reader::{ArchiveEntry, extract_epub};
use super::writer::repack_epub;
use crate::error::{Error, Result};
use crate::store::DirStore;

/// Where and how an archive is unpacked.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Parent of the working directory. Defaults to `$TMPDIR/pagefix`.
    pub work_root: Option<PathBuf>,
    /// Leave the working directory behind when the session ends.
    pub keep_workdir: bool,
}

/// An EPUB unpacked into a working directory.
///
/// The directory is named after the archive's base name, cleared when the
/// session opens, and removed when the session is dropped, whether or not
/// the run succeeded.
#[derive(Debug)]
pub struct Session {
    source: PathBuf,
    workdir: PathBuf,
    entries: Vec<ArchiveEntry>,
    keep_workdir: bool,
}

impl Session {
    /// Unpack `epub` into a fresh working directory.
    pub fn open(epub: &Path, options: &SessionOptions) -> Result<Self> {
        let stem = epub
            .file_stem()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::archive(format!("not a file path: {}", epub.display())))?;
        let root = options
            .work_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("pagefix"));
        let workdir = root.join(stem);

        if workdir.exists() {
            debug!(path = %workdir.display(), "clearing stale working directory");
            std::fs::remove_dir_all(&workdir).map_err(|e| {
                Error::Archive(format!("cannot clear {}: {e}", workdir.display()))
            })?;
        }
        std::fs::create_dir_all(&workdir).map_err(|e| {
            Error::Archive(format!("cannot create {}: {e}", workdir.display()))
        })?;

        // From here on, Drop owns cleanup of the directory
        let mut session = Session {
            source: epub.to_path_buf(),
            workdir,
            entries: Vec::new(),
            keep_workdir: options.keep_workdir,
        };

        session.entries = extract_epub(epub, &session.workdir)
            .map_err(|e| Error::Archive(format!("{}: {e}", epub.display())))?;
        debug!(
            entries = session.entries.len(),
            path = %session.workdir.display(),
            "archive extracted"
        );

        Ok(session)
    }

    /// The archive this session was opened from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Entries of the source archive, in archive order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// A store over the extracted files.
    pub fn store(&self) -> DirStore {
        DirStore::new(&self.workdir)
    }

    /// Write the (possibly modified) working tree to `output`.
    pub fn repack(&self, output: &Path) -> Result<()> {
        if output == self.source {
            return Err(Error::archive(format!(
                "refusing to overwrite the source archive {}",
                output.display()
            )));
        }
        repack_epub(&self.entries, &self.workdir, output)
            .map_err(|e| Error::Archive(format!("{}: {e}", output.display())))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.keep_workdir {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.workdir) {
            warn!(path = %self.workdir.display(), error = %e, "failed to remove working directory");
        }
    }
}

/// `<dir>/<stem>_fixed.epub` for an input `<dir>/<stem>.epub`.
pub fn fixed_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}_fixed.epub"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn write_epub(path: &Path) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        zip.start_file("mimetype", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        zip.start_file("OEBPS/ch1.xhtml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<html/>").unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_fixed_output_path() {
        assert_eq!(
            fixed_output_path(Path::new("/books/Agnes Grey.epub")),
            PathBuf::from("/books/Agnes Grey_fixed.epub")
        );
        assert_eq!(
            fixed_output_path(Path::new("book.epub")),
            PathBuf::from("book_fixed.epub")
        );
    }

    #[test]
    fn test_session_workdir_is_deterministic_and_removed() {
        let dir = TempDir::new().unwrap();
        let epub = dir.path().join("novel.epub");
        write_epub(&epub);
        let options = SessionOptions {
            work_root: Some(dir.path().join("work")),
            keep_workdir: false,
        };

        let workdir = {
            let session = Session::open(&epub, &options).unwrap();
            assert_eq!(session.workdir(), dir.path().join("work/novel"));
            assert!(session.workdir().join("OEBPS/ch1.xhtml").exists());
            assert_eq!(session.entries().len(), 2);
            session.workdir().to_path_buf()
        };
        assert!(!workdir.exists());
    }

    #[test]
    fn test_session_clears_stale_workdir() {
        let dir = TempDir::new().unwrap();
        let epub = dir.path().join("novel.epub");
        write_epub(&epub);
        let stale = dir.path().join("work/novel/leftover.txt");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "old").unwrap();

        let options = SessionOptions {
            work_root: Some(dir.path().join("work")),
            keep_workdir: true,
        };
        let session = Session::open(&epub, &options).unwrap();
        assert!(!stale.exists());
        let workdir = session.workdir().to_path_buf();
        drop(session);
        assert!(workdir.exists(), "keep_workdir leaves the directory");
    }

    #[test]
    fn test_session_open_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let epub = dir.path().join("broken.epub");
        std::fs::write(&epub, b"definitely not a zip").unwrap();
        let options = SessionOptions {
            work_root: Some(dir.path().join("work")),
            keep_workdir: false,
        };

        let err = Session::open(&epub, &options).unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
        assert!(!dir.path().join("work/broken").exists());
    }

    #[test]
    fn test_repack_refuses_source() {
        let dir = TempDir::new().unwrap();
        let epub = dir.path().join("novel.epub");
        write_epub(&epub);
        let options = SessionOptions {
            work_root: Some(dir.path().join("work")),
            keep_workdir: false,
        };
        let session = Session::open(&epub, &options).unwrap();
        assert!(matches!(session.repack(&epub), Err(Error::Archive(_))));
    }
}
