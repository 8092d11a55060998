//! # `pknative` CLI
//!
//! Generates the pocketlang native API artifacts from the public header. Use
//! `pknative --help` for more information.

fn main() -> pknative_cli::CrateResult {
    pknative_cli::run()
}
