#![doc = include_str!("../README.md")]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]

pub mod compose;
pub mod config;
pub mod emit;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod scanner;
pub mod signature;

use tracing::info;

pub use compose::{Artifact, ArtifactKind, Artifacts, Sections, WriteSummary};
pub use config::{GeneratorConfig, Naming};
pub use error::{Error, Result};
pub use signature::{ApiFunctionSignature, Parameter, SignatureSet};

/// `pknative` version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Scans `header` for the configured sentinel and parses every exported
/// declaration after it.
///
/// # Errors
///
/// Returns an error if the sentinel is missing, a declaration is malformed
/// or two declarations share a name.
pub fn parse_header(header: &str, config: &GeneratorConfig) -> Result<SignatureSet> {
    let region = scanner::scan(header, &config.sentinel)?;
    parser::parse_region(&region, &config.naming)
}

/// Reads the configured header and parses it.
///
/// # Errors
///
/// Returns an error if the header cannot be read or fails to parse.
pub fn load_signatures(config: &GeneratorConfig) -> Result<SignatureSet> {
    let path = config.header_path();
    let header = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
    parse_header(&header, config)
}

/// Result of a successful [`generate`] run.
#[derive(Debug, Clone)]
pub struct Generated {
    /// The signatures both artifacts were generated from.
    pub signatures: SignatureSet,
    /// The rendered artifacts.
    pub artifacts: Artifacts,
    /// Which artifacts were rewritten.
    pub summary: WriteSummary,
}

/// Parses the header and writes both artifacts.
///
/// Nothing is written unless the whole header parses.
///
/// # Errors
///
/// Returns an error if parsing fails or an artifact cannot be written.
pub fn generate(config: &GeneratorConfig) -> Result<Generated> {
    let signatures = load_signatures(config)?;
    let artifacts = Artifacts::render(config, &signatures)?;
    let summary = artifacts.write()?;
    let fingerprint = format!("{:016x}", signatures.fingerprint());
    info!(
        functions = signatures.len(),
        fingerprint = %fingerprint,
        "generated native api"
    );
    Ok(Generated {
        signatures,
        artifacts,
        summary,
    })
}

/// Verifies that the artifacts on disk match the header.
///
/// # Errors
///
/// Returns [`Error::Stale`] if an artifact is missing or outdated, or any
/// error [`load_signatures`] can return.
pub fn check(config: &GeneratorConfig) -> Result<()> {
    let signatures = load_signatures(config)?;
    Artifacts::render(config, &signatures)?.check()
}
