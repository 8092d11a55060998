//! Error and result types returned from the generator.

use std::{fmt::Display, path::PathBuf};

use thiserror::Error;

/// The main result type which is passed by the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The main error type which is passed by the library inside the custom
/// [`Result`] type.
///
/// Every variant is fatal for a generation run: nothing is written to disk
/// once one of these has been produced.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The sentinel that marks the public API region is missing from the
    /// header.
    #[error("sentinel `{sentinel}` was not found in the header")]
    SentinelNotFound {
        /// The sentinel that was searched for.
        sentinel: String,
    },
    /// A declaration started with the export marker but does not follow the
    /// supported grammar.
    #[error("line {line}: {reason}\n  --> {text}")]
    Parse {
        /// Header line on which the declaration starts (1-based).
        line: usize,
        /// The offending declaration, flattened to a single line.
        text: String,
        /// What the parser expected.
        reason: String,
    },
    /// Two exported declarations share a name.
    #[error("line {line}: `{name}` is already declared on line {first_line}")]
    DuplicateName {
        /// The duplicated function name.
        name: String,
        /// Line of the first declaration.
        first_line: usize,
        /// Line of the duplicate.
        line: usize,
    },
    /// Reading or writing a file failed.
    #[error("failed to access `{}`: {source}", path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file could not be parsed.
    #[error("invalid configuration in `{}`: {source}", path.display())]
    Config {
        /// The configuration file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: toml::de::Error,
    },
    /// Generated artifacts on disk differ from what the header produces.
    #[error("generated artifacts are out of date: {}", DisplayPaths(.paths))]
    Stale {
        /// Artifacts that are missing or differ.
        paths: Vec<PathBuf>,
    },
    /// Formatting into the output buffer failed.
    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

struct DisplayPaths<'a>(&'a [PathBuf]);

impl Display for DisplayPaths<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", path.display())?;
        }
        Ok(())
    }
}
