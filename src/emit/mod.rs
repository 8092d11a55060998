//! Emitters turning a [`SignatureSet`] into C source.
//!
//! Each emitter renders one block of an artifact. They all walk the same
//! signature set in the same order, which is what keeps the table layout seen
//! by the plugin identical to the one built by the host.

pub mod builder;
pub mod forwarder;
pub mod initializer;
pub mod loader;
pub mod table;

use std::fmt::{Error as FmtError, Result as FmtResult};

pub use builder::HostBuilder;
pub use forwarder::Forwarders;
pub use initializer::PluginInitializer;
pub use loader::LoaderSymbols;
pub use table::{ApiConstants, FnTypedefs, TableType};

use crate::{config::Naming, signature::SignatureSet};

/// Implemented on every block that can be rendered into an artifact.
pub trait Emit {
    /// Renders the block into a new string.
    ///
    /// # Errors
    ///
    /// Returns an error if there was an error writing into the string.
    fn to_source(&self) -> Result<String, FmtError> {
        let mut buf = String::new();
        self.emit(&mut buf)?;
        Ok(buf)
    }

    /// Renders the block, appending to `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if there was an error writing into the buffer.
    fn emit(&self, buf: &mut String) -> FmtResult;
}

/// Everything an emitter needs: the conventions and the ordered signatures.
#[derive(Debug, Clone, Copy)]
pub struct Api<'a> {
    /// Identifier conventions.
    pub naming: &'a Naming,
    /// Exported functions in declaration order.
    pub signatures: &'a SignatureSet,
    /// Fingerprint of [`Self::signatures`].
    pub fingerprint: u64,
}

impl<'a> Api<'a> {
    /// Bundles `naming` and `signatures`, computing the fingerprint once.
    #[must_use]
    pub fn new(naming: &'a Naming, signatures: &'a SignatureSet) -> Self {
        Self {
            naming,
            signatures,
            fingerprint: signatures.fingerprint(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::signature::{ApiFunctionSignature, Parameter, SignatureSet};

    /// Two small signatures covering void/non-void and empty/non-empty
    /// parameter lists.
    pub fn sample() -> SignatureSet {
        SignatureSet::try_from(vec![
            ApiFunctionSignature {
                name: "pkNewConfiguration".into(),
                parameters: vec![],
                return_type: "PkConfiguration".into(),
                line: 1,
            },
            ApiFunctionSignature {
                name: "pkSetGlobal".into(),
                parameters: vec![Parameter::new("vm", "PKVM*"), Parameter::new("val", "int")],
                return_type: "void".into(),
                line: 2,
            },
        ])
        .unwrap()
    }
}
