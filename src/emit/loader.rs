//! Symbol names and function types the host's module loader resolves in a
//! plugin.

use std::fmt::{Result as FmtResult, Write};

use super::{Api, Emit};

/// Name constants and typedefs for the plugin entry points.
pub struct LoaderSymbols<'a>(pub Api<'a>);

impl Emit for LoaderSymbols<'_> {
    fn emit(&self, buf: &mut String) -> FmtResult {
        let naming = self.0.naming;

        writeln!(buf, "#define {} \"{}\"", naming.define("API_INIT_FN_NAME"), naming.init_fn)?;
        writeln!(
            buf,
            "#define {} \"{}\"",
            naming.define("EXPORT_FN_NAME"),
            naming.export_module_fn
        )?;
        writeln!(
            buf,
            "#define {} \"{}\"",
            naming.define("CLEANUP_FN_NAME"),
            naming.cleanup_module_fn
        )?;
        writeln!(buf)?;
        writeln!(
            buf,
            "typedef int (*{}Fn)({}*, unsigned long long);",
            naming.init_fn, naming.table_type
        )?;
        writeln!(
            buf,
            "typedef {}* (*{}Fn)({}*);",
            naming.handle_type, naming.export_module_fn, naming.vm_type
        )?;
        writeln!(
            buf,
            "typedef void (*{}Fn)({}*);",
            naming.cleanup_module_fn, naming.vm_type
        )?;
        writeln!(buf)
    }
}
