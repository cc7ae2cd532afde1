use std::fs;

use polka::{Batch, BatchSummary};
use tempfile::tempdir;

const VALID_FB2: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<FictionBook>
  <description>
    <title-info>
      <book-title>Valid</book-title>
      <author><first-name>A</first-name><last-name>B</last-name></author>
    </title-info>
  </description>
  <body><section><p>text</p></section></body>
</FictionBook>"#;

#[test]
fn test_batch_mirrors_directory_structure() {
    let source_root = tempdir().unwrap();
    let target_root = tempdir().unwrap();

    let source = source_root.path().join("library");
    fs::create_dir_all(source.join("series/volume1")).unwrap();
    fs::write(source.join("top.fb2"), VALID_FB2).unwrap();
    fs::write(source.join("series/volume1/deep.fb2"), VALID_FB2).unwrap();

    let batch = Batch::new(&source, Some(target_root.path().to_path_buf())).unwrap();
    let summary = batch.run().unwrap();

    assert_eq!(summary.converted, 2);
    assert_eq!(summary.failed, 0);

    let target = target_root.path().join("library");
    assert!(target.join("top.epub").is_file());
    assert!(target.join("series/volume1/deep.epub").is_file());
}

#[test]
fn test_batch_copies_epub_and_ignores_other_files() {
    let source_root = tempdir().unwrap();
    let target_root = tempdir().unwrap();

    let source = source_root.path().join("books");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("ready.epub"), b"epub bytes").unwrap();
    fs::write(source.join("notes.txt"), b"not a book").unwrap();

    let batch = Batch::new(&source, Some(target_root.path().to_path_buf())).unwrap();
    let summary = batch.run().unwrap();

    assert_eq!(
        summary,
        BatchSummary {
            converted: 0,
            copied: 1,
            failed: 0
        }
    );

    let target = target_root.path().join("books");
    assert_eq!(fs::read(target.join("ready.epub")).unwrap(), b"epub bytes");
    assert!(!target.join("notes.txt").exists());
}

#[test]
fn test_failing_file_does_not_abort_batch() {
    let source_root = tempdir().unwrap();
    let target_root = tempdir().unwrap();

    let source = source_root.path().join("mixed");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("broken.fb2"), "<FictionBook><body></FictionBook>").unwrap();
    fs::write(source.join("good.epub"), b"epub bytes").unwrap();
    fs::write(source.join("also-good.fb2"), VALID_FB2).unwrap();

    let batch = Batch::new(&source, Some(target_root.path().to_path_buf())).unwrap();
    let summary = batch.run().unwrap();

    assert_eq!(summary.converted, 1);
    assert_eq!(summary.copied, 1);
    assert_eq!(summary.failed, 1);

    let target = target_root.path().join("mixed");
    assert!(target.join("good.epub").is_file());
    assert!(target.join("also-good.epub").is_file());
    assert!(!target.join("broken.epub").exists());
}

#[test]
fn test_rerun_produces_identical_output() {
    let source_root = tempdir().unwrap();
    let target_root = tempdir().unwrap();

    let source = source_root.path().join("stable");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("book.fb2"), VALID_FB2).unwrap();

    let batch = Batch::new(&source, Some(target_root.path().to_path_buf())).unwrap();
    batch.run().unwrap();
    let first = fs::read(target_root.path().join("stable/book.epub")).unwrap();

    batch.run().unwrap();
    let second = fs::read(target_root.path().join("stable/book.epub")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_target_dir_includes_source_basename() {
    let source_root = tempdir().unwrap();
    let target_root = tempdir().unwrap();

    let source = source_root.path().join("shelf");
    fs::create_dir_all(&source).unwrap();

    let batch = Batch::new(&source, Some(target_root.path().to_path_buf())).unwrap();
    assert_eq!(batch.target_dir(), target_root.path().join("shelf"));
    assert!(batch.target_dir().is_dir());
}
