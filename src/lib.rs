//! # polka
//!
//! Batch converter that turns FB2 ebooks into EPUB, mirroring a library
//! directory tree. Files that are already EPUB are copied through unchanged;
//! everything else is left alone.
//!
//! ## Quick Start
//!
//! ```no_run
//! use polka::{convert_file, Batch};
//!
//! // Convert a single file
//! convert_file("book.fb2", "book.epub").unwrap();
//!
//! // Convert a whole library into ~/Documents/Converted_Books/library
//! let batch = Batch::new("library", None).unwrap();
//! let summary = batch.run().unwrap();
//! println!("{} converted, {} failed", summary.converted, summary.failed);
//! ```
//!
//! ## Pipeline
//!
//! A conversion is a single pass: [`fb2::parse_fb2`] turns the source XML
//! into a typed [`fb2::Fb2Document`] (metadata, body sections, decoded
//! images), [`convert::build_book`] assembles the output [`Book`], and
//! [`epub::write_epub`] serializes it as a zip package. Embedded `<binary>`
//! images land under `images/` inside the package; images referenced by
//! relative path next to the source file are packaged under their original
//! paths.

pub mod batch;
pub mod book;
pub mod convert;
pub mod epub;
pub mod error;
pub mod fb2;
pub(crate) mod util;

pub use batch::{Batch, BatchSummary};
pub use book::{Book, Metadata, Resource, TocEntry};
pub use convert::convert_file;
pub use epub::{write_epub, write_epub_to_writer};
pub use error::{Error, Result};
pub use fb2::{parse_fb2, Fb2Document};
