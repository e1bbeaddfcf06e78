//! End-to-end tests: build small EPUBs on disk, fix them, read the result back.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use pagefix::{Error, GapMatch, Options, SessionOptions, fix_epub, fixed_output_path};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

fn chapter(paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<p>{p}</p>\n"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Chapter</title></head>
<body>
{body}</body>
</html>"#
    )
}

fn opf(ids: &[&str], spine: &[&str]) -> String {
    let items: String = ids
        .iter()
        .map(|id| format!(r#"<item id="{id}" href="text/{id}.xhtml" media-type="application/xhtml+xml"/>"#))
        .collect();
    let refs: String = spine
        .iter()
        .map(|id| format!(r#"<itemref idref="{id}"/>"#))
        .collect();
    format!(
        r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Test</dc:title></metadata>
  <manifest>{items}</manifest>
  <spine>{refs}</spine>
</package>"#
    )
}

/// Write an EPUB with the given chapters (id, paragraphs) in spine order.
fn build_epub(dir: &Path, name: &str, chapters: &[(&str, &[&str])], spine: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = ZipWriter::new(file);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.start_file("META-INF/container.xml", deflated).unwrap();
    zip.write_all(CONTAINER.as_bytes()).unwrap();

    let ids: Vec<&str> = chapters.iter().map(|(id, _)| *id).collect();
    zip.start_file("OEBPS/content.opf", deflated).unwrap();
    zip.write_all(opf(&ids, spine).as_bytes()).unwrap();

    for (id, paragraphs) in chapters {
        zip.start_file(format!("OEBPS/text/{id}.xhtml"), deflated)
            .unwrap();
        zip.write_all(chapter(paragraphs).as_bytes()).unwrap();
    }
    zip.start_file("OEBPS/style.css", deflated).unwrap();
    zip.write_all(b"p { margin: 0 }").unwrap();
    zip.finish().unwrap();
    path
}

fn read_entry(epub: &Path, name: &str) -> String {
    let mut archive = ZipArchive::new(std::fs::File::open(epub).unwrap()).unwrap();
    let mut content = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    content
}

fn session_options(dir: &Path) -> SessionOptions {
    SessionOptions {
        work_root: Some(dir.join("work")),
        keep_workdir: false,
    }
}

#[test]
fn test_fix_removes_page_numbers_and_writes_fixed_copy() {
    let dir = TempDir::new().unwrap();
    let input = build_epub(
        dir.path(),
        "book.epub",
        &[("c1", &["Hello", "5"]), ("c2", &["World", "7"])],
        &["c1", "c2"],
    );
    let original = std::fs::read(&input).unwrap();

    let report = fix_epub(&input, None, &Options::default(), &session_options(dir.path())).unwrap();

    assert_eq!(report.documents, 2);
    assert_eq!(report.page_numbers_removed, 2);
    assert_eq!(report.gap_numbers_erased, 0);
    assert_eq!(report.last_page_number, 7);

    let output = dir.path().join("book_fixed.epub");
    assert_eq!(fixed_output_path(&input), output);
    let c1 = read_entry(&output, "OEBPS/text/c1.xhtml");
    assert!(c1.contains("<p>Hello</p>"));
    assert!(!c1.contains("<p>5</p>"));
    let c2 = read_entry(&output, "OEBPS/text/c2.xhtml");
    assert!(!c2.contains("<p>7</p>"));

    // Source untouched, working directory gone
    assert_eq!(std::fs::read(&input).unwrap(), original);
    assert!(!dir.path().join("work/book").exists());
}

#[test]
fn test_output_keeps_entry_order_and_unmodified_bytes() {
    let dir = TempDir::new().unwrap();
    let input = build_epub(
        dir.path(),
        "book.epub",
        &[("c1", &["1"]), ("c2", &["no page numbers"])],
        &["c1", "c2"],
    );

    let output = dir.path().join("out.epub");
    fix_epub(
        &input,
        Some(&output),
        &Options::default(),
        &session_options(dir.path()),
    )
    .unwrap();

    let names = |p: &Path| -> Vec<String> {
        let archive = ZipArchive::new(std::fs::File::open(p).unwrap()).unwrap();
        archive.file_names().map(str::to_string).collect()
    };
    let mut source_archive = ZipArchive::new(std::fs::File::open(&input).unwrap()).unwrap();
    let source_order: Vec<String> = (0..source_archive.len())
        .map(|i| source_archive.by_index(i).unwrap().name().to_string())
        .collect();
    let mut out_archive = ZipArchive::new(std::fs::File::open(&output).unwrap()).unwrap();
    let out_order: Vec<String> = (0..out_archive.len())
        .map(|i| out_archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(out_order, source_order);
    assert_eq!(names(&output).len(), names(&input).len());

    assert_eq!(
        out_archive.by_name("mimetype").unwrap().compression(),
        CompressionMethod::Stored
    );
    assert_eq!(
        read_entry(&output, "OEBPS/text/c2.xhtml"),
        read_entry(&input, "OEBPS/text/c2.xhtml")
    );
    assert_eq!(
        read_entry(&output, "OEBPS/style.css"),
        "p { margin: 0 }"
    );
}

#[test]
fn test_gap_number_in_earlier_chapter_is_erased() {
    let dir = TempDir::new().unwrap();
    let input = build_epub(
        dir.path(),
        "gap.epub",
        &[("c1", &["Text 6 here", "5"]), ("c2", &["8"])],
        &["c1", "c2"],
    );

    let report = fix_epub(&input, None, &Options::default(), &session_options(dir.path())).unwrap();
    assert_eq!(report.gap_numbers_erased, 1);

    let c1 = read_entry(&dir.path().join("gap_fixed.epub"), "OEBPS/text/c1.xhtml");
    assert!(c1.contains("<p>Text  here</p>"), "{c1}");
}

#[test]
fn test_spine_order_not_manifest_order() {
    let dir = TempDir::new().unwrap();
    // Manifest lists c1 first, spine reads c2 first: "5" then "9" from c1
    let input = build_epub(
        dir.path(),
        "order.epub",
        &[("c1", &["page 7 text", "9"]), ("c2", &["5"])],
        &["c2", "c1"],
    );

    let report = fix_epub(&input, None, &Options::default(), &session_options(dir.path())).unwrap();
    assert_eq!(report.last_page_number, 9);
    let c1 = read_entry(&dir.path().join("order_fixed.epub"), "OEBPS/text/c1.xhtml");
    assert!(c1.contains("<p>page  text</p>"), "{c1}");
}

#[test]
fn test_substring_mode() {
    let dir = TempDir::new().unwrap();
    let input = build_epub(
        dir.path(),
        "legacy.epub",
        &[("c1", &["5", "Text 6 here", "8"])],
        &["c1"],
    );
    let options = Options {
        gap_match: GapMatch::Substring,
    };

    fix_epub(&input, None, &options, &session_options(dir.path())).unwrap();
    let c1 = read_entry(&dir.path().join("legacy_fixed.epub"), "OEBPS/text/c1.xhtml");
    assert!(c1.contains("<p>Texthere</p>"), "{c1}");
}

#[test]
fn test_dangling_spine_reference_aborts() {
    let dir = TempDir::new().unwrap();
    let input = build_epub(
        dir.path(),
        "broken.epub",
        &[("c1", &["1"])],
        &["c1", "missing"],
    );
    let original = std::fs::read(&input).unwrap();

    let err = fix_epub(&input, None, &Options::default(), &session_options(dir.path())).unwrap_err();
    assert!(matches!(err, Error::Structure(ref m) if m.contains("missing")));

    assert!(!dir.path().join("broken_fixed.epub").exists());
    assert!(!dir.path().join("work/broken").exists());
    assert_eq!(std::fs::read(&input).unwrap(), original);
}

#[test]
fn test_corrupt_archive_is_archive_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("junk.epub");
    std::fs::write(&input, b"PK but not really").unwrap();

    let err = fix_epub(&input, None, &Options::default(), &session_options(dir.path())).unwrap_err();
    assert!(matches!(err, Error::Archive(_)));
    assert!(!dir.path().join("junk_fixed.epub").exists());
}

#[test]
fn test_fixing_twice_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = build_epub(
        dir.path(),
        "twice.epub",
        &[("c1", &["a 2 b", "1", "3", "12a"])],
        &["c1"],
    );
    fix_epub(&input, None, &Options::default(), &session_options(dir.path())).unwrap();

    let first = dir.path().join("twice_fixed.epub");
    let second_out = dir.path().join("twice_again.epub");
    let report = fix_epub(
        &first,
        Some(&second_out),
        &Options::default(),
        &session_options(dir.path()),
    )
    .unwrap();

    assert_eq!(report.page_numbers_removed, 0);
    assert_eq!(report.gap_numbers_erased, 0);
    assert_eq!(report.documents_modified, 0);
    assert_eq!(
        read_entry(&first, "OEBPS/text/c1.xhtml"),
        read_entry(&second_out, "OEBPS/text/c1.xhtml")
    );
}
