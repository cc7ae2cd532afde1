//! Error types for polka operations.

use thiserror::Error;

/// Errors that can occur while converting a single book or setting up a batch.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid FB2: {0}")]
    InvalidFb2(String),
}

impl Error {
    /// Whether this failure originates in the source document's text rather
    /// than the surrounding filesystem. Batch processing dumps a snippet of
    /// the offending source for these.
    pub fn is_source_error(&self) -> bool {
        matches!(self, Error::Xml(_) | Error::InvalidFb2(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
