//! Errors raised while loading a native module.

use std::path::PathBuf;

use thiserror::Error;

/// Result type returned by the loader.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Loading a module failed. The module is not registered.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The shared library could not be opened.
    #[error("failed to open native module `{}`", path.display())]
    Open {
        /// Library path.
        path: PathBuf,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },
    /// A required entry point is not exported.
    #[error("native module `{}` does not export `{symbol}`", path.display())]
    MissingSymbol {
        /// Library path.
        path: PathBuf,
        /// Name of the missing symbol.
        symbol: String,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },
    /// The module was generated from a different revision of the header.
    #[error(
        "native module `{}` was built against a different API (host fingerprint 0x{expected:016x})",
        path.display()
    )]
    FingerprintMismatch {
        /// Library path.
        path: PathBuf,
        /// Fingerprint of the host's table.
        expected: u64,
    },
    /// Loading the module asked for the same module again.
    #[error("native module `{}` requested itself while loading", path.display())]
    RecursiveLoad {
        /// Library path.
        path: PathBuf,
    },
    /// The initializer returned a code outside the known statuses.
    #[error("native module `{}` returned unexpected status {status}", path.display())]
    UnexpectedStatus {
        /// Library path.
        path: PathBuf,
        /// Raw status code.
        status: i32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message() {
        let err = Error::FingerprintMismatch {
            path: "mod.so".into(),
            expected: 0xab,
        };
        assert_eq!(
            err.to_string(),
            "native module `mod.so` was built against a different API (host fingerprint 0x00000000000000ab)"
        );
    }
}
