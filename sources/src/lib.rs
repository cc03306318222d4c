//!
//! Sources describe where campaign input data lives remotely and where it goes locally.
//!
//! A [`Source`] uses the same template machinery as task definitions: its remote URL,
//! optional filename patterns and destination directory may all contain placeholders,
//! and [`Source::resolve`] expands them into concrete [`RemoteLocalPair`]s.
//! Whether a pair actually needs to be transferred is decided by
//! [`Source::needs_fetch`], according to the source's [`MaxAge`].

use std::path::PathBuf;

/// Source definitions and their resolution
mod source;
pub use source::{MaxAge, Source};

/// Concrete remote/local transfer pairs
mod pair;
pub use pair::RemoteLocalPair;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Template(#[from] params::Error),
    #[error("Invalid url \"{0}\": {1}")]
    InvalidUrl(String, url::ParseError),
    #[error("Maximum age must not be negative, got {0}")]
    NegativeMaxAge(f64),
    #[error("Unable to read metadata of {0:?}: {1}")]
    Metadata(PathBuf, std::io::Error),
}
