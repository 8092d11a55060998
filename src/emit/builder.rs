//! Host-only function filling a table with the addresses of the statically
//! linked implementations.

use std::fmt::{Result as FmtResult, Write};

use super::{Api, Emit};

/// `<Table> pkMakeNativeAPI(void)`, guarded by the implement flag so it is
/// only compiled into the host binary.
pub struct HostBuilder<'a>(pub Api<'a>);

impl Emit for HostBuilder<'_> {
    fn emit(&self, buf: &mut String) -> FmtResult {
        let Api {
            naming, signatures, ..
        } = self.0;

        writeln!(buf, "#ifdef {}", naming.implement_flag)?;
        writeln!(buf)?;
        writeln!(buf, "{} {}(void) {{", naming.table_type, naming.make_api_fn)?;
        writeln!(buf)?;
        writeln!(buf, "  {} api;", naming.table_type)?;
        writeln!(buf)?;
        for signature in signatures {
            writeln!(
                buf,
                "  api.{} = {};",
                naming.field_name(&signature.name),
                signature.name
            )?;
        }
        writeln!(buf)?;
        writeln!(buf, "  return api;")?;
        writeln!(buf, "}}")?;
        writeln!(buf)?;
        writeln!(buf, "#endif // {}", naming.implement_flag)
    }
}
