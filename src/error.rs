//! The error surface returned by every fallible public entry point.

use crate::ItemId;
use std::path::PathBuf;

/// The single error type returned by [`crate::TraceLoader::load_file`] and,
/// wrapped with file/line context, by the item loader.
///
/// Mirrors the five error kinds in the error-handling design one-to-one;
/// every variant is fatal to the current load, none are recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{}:{line}: malformed record: {text:?}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        text: String,
    },

    #[error("{}:{line}: reference to unknown item ({id})", file.display())]
    MissingReference {
        file: PathBuf,
        line: usize,
        id: ItemId,
    },

    #[error("{}:{line}: expected `true` or `false`, found {value:?}", file.display())]
    InvalidBoolean {
        file: PathBuf,
        line: usize,
        value: String,
    },

    #[error("{}:{line}: unrecognized type tag {tag:?}", file.display())]
    InvalidType {
        file: PathBuf,
        line: usize,
        tag: String,
    },

    #[error("{}:{line}: empty record (neither a representation, patch start, nor patch end)", file.display())]
    EmptyRecord { file: PathBuf, line: usize },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
