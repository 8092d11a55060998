//! Function-pointer typedefs, the dispatch table struct and the constants
//! shared by both artifacts.

use std::fmt::{Result as FmtResult, Write};

use super::{Api, Emit};

/// One `typedef <ret> (*<name>_t)(<types>);` per signature.
pub struct FnTypedefs<'a>(pub Api<'a>);

impl Emit for FnTypedefs<'_> {
    fn emit(&self, buf: &mut String) -> FmtResult {
        let Api {
            naming, signatures, ..
        } = self.0;
        for signature in signatures {
            writeln!(
                buf,
                "typedef {} (*{})({});",
                signature.return_type,
                naming.typedef_name(&signature.name),
                signature.type_list()
            )?;
        }
        writeln!(buf)
    }
}

/// The dispatch table: one pointer field per signature, in order.
pub struct TableType<'a>(pub Api<'a>);

impl Emit for TableType<'_> {
    fn emit(&self, buf: &mut String) -> FmtResult {
        let Api {
            naming, signatures, ..
        } = self.0;
        writeln!(buf, "typedef struct {{")?;
        for signature in signatures {
            writeln!(
                buf,
                "  {} {};",
                naming.typedef_name(&signature.name),
                naming.field_name(&signature.name)
            )?;
        }
        writeln!(buf, "}} {};", naming.table_type)?;
        writeln!(buf)
    }
}

/// Fingerprint of the table layout and the status codes returned by the
/// plugin initializer.
pub struct ApiConstants<'a>(pub Api<'a>);

impl Emit for ApiConstants<'_> {
    fn emit(&self, buf: &mut String) -> FmtResult {
        let naming = self.0.naming;
        writeln!(
            buf,
            "#define {} 0x{:016x}ULL",
            naming.define("NATIVE_API_FINGERPRINT"),
            self.0.fingerprint
        )?;
        writeln!(buf, "#define {} 0", naming.define("API_INIT_OK"))?;
        writeln!(buf, "#define {} 1", naming.define("API_INIT_ALREADY"))?;
        writeln!(buf, "#define {} (-1)", naming.define("API_INIT_MISMATCH"))?;
        writeln!(buf)
    }
}
