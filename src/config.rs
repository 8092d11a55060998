//! Generator configuration.
//!
//! Every path and naming convention used by the generator lives here rather
//! than in globals, so a run is fully described by one [`GeneratorConfig`].
//! The defaults reproduce the pocketlang source tree layout; a
//! `pknative.toml` file may override any subset of the fields:
//!
//! ```toml
//! header = "include/host.h"
//! sentinel = "HOST PUBLIC API"
//!
//! [naming]
//! export_marker = "HOST_API"
//! table_type = "HostNativeApi"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Name of the configuration file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "pknative.toml";

/// Paths and conventions for a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Project root. Relative paths below are resolved against it.
    #[serde(skip)]
    pub root: PathBuf,
    /// The host's public header.
    pub header: PathBuf,
    /// Destination of the artifact compiled into plugins.
    pub plugin_out: PathBuf,
    /// Destination of the artifact compiled into the host.
    pub host_out: PathBuf,
    /// Marks the start of the exported API region in the header.
    pub sentinel: String,
    /// Lines of the copyright comment opening both artifacts.
    pub copyright: Vec<String>,
    /// Identifier conventions for the emitted code.
    pub naming: Naming,
}

/// Identifier conventions used by the emitters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Naming {
    /// Keyword that starts every exported declaration.
    pub export_marker: String,
    /// Appended to a function name to form its function-pointer typedef.
    pub typedef_suffix: String,
    /// Appended to a function name to form its table field.
    pub field_suffix: String,
    /// Name of the dispatch table struct type.
    pub table_type: String,
    /// Name of the plugin's process-local table instance.
    pub table_instance: String,
    /// Exported initializer a loader calls with the host table.
    pub init_fn: String,
    /// Host function building a table from the real implementations.
    pub make_api_fn: String,
    /// Module entry point every plugin exports.
    pub export_module_fn: String,
    /// Module teardown every plugin may export.
    pub cleanup_module_fn: String,
    /// Visibility macro placed in front of the exported initializer.
    pub export_macro: String,
    /// Preprocessor flag guarding the host table builder.
    pub implement_flag: String,
    /// Prefix of the emitted preprocessor constants.
    pub define_prefix: String,
    /// Header included by both artifacts.
    pub include: String,
    /// Guard that skips the include in amalgamated host builds.
    pub amalgamated_guard: String,
    /// VM type passed to the module entry points.
    pub vm_type: String,
    /// Handle type returned by the module entry point.
    pub handle_type: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            header: PathBuf::from("src/include/pocketlang.h"),
            plugin_out: PathBuf::from("tests/native/dl/pknative.c"),
            host_out: PathBuf::from("src/libs/gen/nativeapi.h"),
            sentinel: "POCKETLANG PUBLIC API".into(),
            copyright: vec![
                "Copyright (c) 2020-2022 Thakee Nathees".into(),
                "Copyright (c) 2021-2022 Pocketlang Contributors".into(),
                "Distributed Under The MIT License".into(),
            ],
            naming: Naming::default(),
        }
    }
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            export_marker: "PK_PUBLIC".into(),
            typedef_suffix: "_t".into(),
            field_suffix: "_ptr".into(),
            table_type: "PkNativeApi".into(),
            table_instance: "pk_api".into(),
            init_fn: "pkInitApi".into(),
            make_api_fn: "pkMakeNativeAPI".into(),
            export_module_fn: "pkExportModule".into(),
            cleanup_module_fn: "pkCleanupModule".into(),
            export_macro: "PK_EXPORT".into(),
            implement_flag: "PK_DL_IMPLEMENT".into(),
            define_prefix: "PK".into(),
            include: "pocketlang.h".into(),
            amalgamated_guard: "PK_AMALGAMATED".into(),
            vm_type: "PKVM".into(),
            handle_type: "PkHandle".into(),
        }
    }
}

impl GeneratorConfig {
    /// Default configuration rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Loads `pknative.toml` from `root` if it exists, otherwise returns the
    /// defaults rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn discover(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path, root)
        } else {
            Ok(Self::with_root(root))
        }
    }

    /// Loads the configuration file at `path`, rooting relative paths at
    /// `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this structure.
    pub fn load(path: &Path, root: impl Into<PathBuf>) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut config = Self::from_toml(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        config.root = root.into();
        Ok(config)
    }

    /// Parses a configuration from TOML text. Missing fields take their
    /// default values.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or unknown keys.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Absolute (root-joined) path of the input header.
    #[must_use]
    pub fn header_path(&self) -> PathBuf {
        self.root.join(&self.header)
    }

    /// Absolute (root-joined) path of the plugin artifact.
    #[must_use]
    pub fn plugin_path(&self) -> PathBuf {
        self.root.join(&self.plugin_out)
    }

    /// Absolute (root-joined) path of the host artifact.
    #[must_use]
    pub fn host_path(&self) -> PathBuf {
        self.root.join(&self.host_out)
    }
}

impl Naming {
    /// Function-pointer typedef name for `function`.
    #[must_use]
    pub fn typedef_name(&self, function: &str) -> String {
        format!("{function}{}", self.typedef_suffix)
    }

    /// Table field name for `function`.
    #[must_use]
    pub fn field_name(&self, function: &str) -> String {
        format!("{function}{}", self.field_suffix)
    }

    /// Name of a preprocessor constant, e.g. `PK_NATIVE_API_FINGERPRINT`.
    #[must_use]
    pub fn define(&self, suffix: &str) -> String {
        if self.define_prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{suffix}", self.define_prefix)
        }
    }
}
