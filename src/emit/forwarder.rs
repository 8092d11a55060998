//! Forwarders: functions carrying the host function's exact name and
//! signature whose only statement calls through the plugin's table.

use std::fmt::{Result as FmtResult, Write};

use super::{Api, Emit};

/// All forwarders, separated by a blank line.
pub struct Forwarders<'a>(pub Api<'a>);

impl Emit for Forwarders<'_> {
    fn emit(&self, buf: &mut String) -> FmtResult {
        let Api {
            naming, signatures, ..
        } = self.0;
        for (i, signature) in signatures.iter().enumerate() {
            if i > 0 {
                writeln!(buf)?;
            }
            let return_ = if signature.returns_void() { "" } else { "return " };
            writeln!(
                buf,
                "{} {}({}) {{",
                signature.return_type,
                signature.name,
                signature.parameter_list()
            )?;
            writeln!(
                buf,
                "  {return_}{}.{}({});",
                naming.table_instance,
                naming.field_name(&signature.name),
                signature.argument_list()
            )?;
            writeln!(buf, "}}")?;
        }
        Ok(())
    }
}
