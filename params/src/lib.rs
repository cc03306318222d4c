//!
//! Parameter domains and argument templates.
//!
//! A task is declared once as a template of arguments plus a set of named parameter
//! domains. This crate turns that pair into concrete argument sets:
//! 1. [`permutations`] enumerates every combination of parameter values.
//! 2. [`resolve`] keeps only the parameters the template actually mentions,
//!    then formats one copy of the template per permutation.
//!
//! Templates are plain [`Value`] trees; string leaves may contain placeholders
//! like `{station}`, `{date.gpsweek}` or `{date.doy:03d}`.

/// Dynamically-typed argument and parameter values
mod value;
pub use value::{Mapping, Value};

/// Calendar dates with GNSS-specific attributes
mod date;
pub use date::GpsDate;

/// Parameter domains and the permutation engine
mod domain;
pub use domain::{permutations, ParameterDomain, Permutation};

/// Placeholder scanning and string formatting
mod format;
pub use format::{format_str, placeholder_names};

/// Substituting permutations into templates
mod resolve;
pub use resolve::{referenced, resolve, resolve_mapping, substitute};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Parameter \"{0}\" is defined more than once")]
    DuplicateParameter(String),
    #[error("Parameter domain has too many permutations to enumerate")]
    TooManyPermutations,
    #[error("Template references parameter \"{0}\", which is not defined")]
    MissingParameter(String),
    #[error("Value of \"{0}\" has no attribute \"{1}\"")]
    MissingAttribute(String, String),
    #[error("Unbalanced braces in template string \"{0}\"")]
    MalformedTemplate(String),
    #[error("Invalid format spec \"{0}\"")]
    InvalidFormatSpec(String),
    #[error("Format spec \"{0}\" can't be applied to a {1} value")]
    IncompatibleFormat(String, &'static str),
    #[error("Missing argument \"{0}\"")]
    MissingArgument(String),
    #[error("Argument \"{0}\" should be a {1}, got {2}")]
    WrongArgumentType(String, &'static str, &'static str),
}
