//! The plugin's table instance and the exported function the host calls once
//! after loading the plugin.
//!
//! The initializer refuses a table whose fingerprint differs from the one
//! the plugin was generated with, and only accepts the first table it is
//! handed.

use std::fmt::{Result as FmtResult, Write};

use super::{Api, Emit};

/// `static <Table> <instance>;` plus the exported initializer.
pub struct PluginInitializer<'a>(pub Api<'a>);

impl Emit for PluginInitializer<'_> {
    fn emit(&self, buf: &mut String) -> FmtResult {
        let Api {
            naming, signatures, ..
        } = self.0;
        let instance = &naming.table_instance;

        writeln!(buf, "static {} {instance};", naming.table_type)?;
        writeln!(buf, "static int {instance}_initialized = 0;")?;
        writeln!(buf)?;
        writeln!(
            buf,
            "{} int {}({}* api, unsigned long long fingerprint) {{",
            naming.export_macro, naming.init_fn, naming.table_type
        )?;
        writeln!(
            buf,
            "  if (fingerprint != {}) return {};",
            naming.define("NATIVE_API_FINGERPRINT"),
            naming.define("API_INIT_MISMATCH")
        )?;
        writeln!(
            buf,
            "  if ({instance}_initialized) return {};",
            naming.define("API_INIT_ALREADY")
        )?;
        for signature in signatures {
            let field = naming.field_name(&signature.name);
            writeln!(buf, "  {instance}.{field} = api->{field};")?;
        }
        writeln!(buf, "  {instance}_initialized = 1;")?;
        writeln!(buf, "  return {};", naming.define("API_INIT_OK"))?;
        writeln!(buf, "}}")?;
        writeln!(buf)
    }
}
