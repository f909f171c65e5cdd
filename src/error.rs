//! Error types for the inline preview rewriter

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, RewriteError>;

/// Errors surfaced to the caller of the rewriter
///
/// Image-level problems never show up here: a missing preview or a failing
/// collaborator degrades to leaving the element untouched.
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("XML parsing error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("Event received after the document was finished")]
    DocumentFinished,
}

/// Errors raised by an [`ImageDataProvider`](crate::preview::ImageDataProvider)
#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Source image unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Encoding failed: {0}")]
    EncodeFailed(String),
}

/// Errors raised by a [`CapabilityOracle`](crate::capability::CapabilityOracle)
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("User agent could not be classified: {0}")]
    Unclassified(String),
}
