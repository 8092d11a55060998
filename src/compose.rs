//! Assembles the emitted blocks into the two artifacts and writes them.
//!
//! Both artifacts are rendered in memory from the same [`SignatureSet`]
//! before anything touches the disk. Writing goes through temporary sibling
//! files that are renamed into place only once every temporary file has been
//! written. If a rename fails, the artifacts already replaced get their
//! previous content back, so a failed run never leaves one fresh and one
//! stale artifact behind.

use std::{
    fmt::{Result as FmtResult, Write as _},
    fs::{self, File},
    io::Write as _,
    path::{Path, PathBuf},
};

use bitflags::bitflags;
use tracing::{debug, info, warn};

use crate::{
    config::GeneratorConfig,
    emit::{
        Api, ApiConstants, Emit, FnTypedefs, Forwarders, HostBuilder, LoaderSymbols,
        PluginInitializer, TableType,
    },
    error::{Error, Result},
    signature::SignatureSet,
};

bitflags! {
    /// Blocks an artifact is made of. Blocks are always emitted in the
    /// order the flags are declared in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Sections: u8 {
        /// Function-pointer typedefs.
        const TYPEDEFS = 1;
        /// The dispatch table struct.
        const TABLE = 1 << 1;
        /// Fingerprint and initializer status codes.
        const CONSTANTS = 1 << 2;
        /// Entry point names and function types for the loader.
        const LOADER_SYMBOLS = 1 << 3;
        /// Table instance and exported initializer.
        const INITIALIZER = 1 << 4;
        /// Forwarder functions.
        const FORWARDERS = 1 << 5;
        /// Guarded host table builder.
        const BUILDER = 1 << 6;

        /// Everything compiled into a plugin.
        const PLUGIN = Self::TYPEDEFS.bits()
            | Self::TABLE.bits()
            | Self::CONSTANTS.bits()
            | Self::INITIALIZER.bits()
            | Self::FORWARDERS.bits();
        /// Everything compiled into the host.
        const HOST = Self::TYPEDEFS.bits()
            | Self::TABLE.bits()
            | Self::CONSTANTS.bits()
            | Self::LOADER_SYMBOLS.bits()
            | Self::BUILDER.bits();
    }
}

/// Which side of the plugin boundary an artifact is compiled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Compiled into a dynamically loaded module.
    Plugin,
    /// Compiled into the host binary.
    Host,
}

impl ArtifactKind {
    /// Blocks making up this artifact.
    #[must_use]
    pub fn sections(self) -> Sections {
        match self {
            Self::Plugin => Sections::PLUGIN,
            Self::Host => Sections::HOST,
        }
    }
}

/// A rendered artifact and its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Which side this artifact is compiled into.
    pub kind: ArtifactKind,
    /// Destination as configured, relative to the project root.
    pub display_path: PathBuf,
    /// Destination joined with the project root.
    pub path: PathBuf,
    /// Rendered source.
    pub source: String,
}

/// The plugin and host artifacts of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// Artifact compiled into plugins.
    pub plugin: Artifact,
    /// Artifact compiled into the host.
    pub host: Artifact,
}

/// Outcome of [`Artifacts::write`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// Artifacts whose content changed and were replaced.
    pub written: Vec<PathBuf>,
    /// Artifacts already up to date, left untouched.
    pub unchanged: Vec<PathBuf>,
}

/// Renders the "generated" banner with the include lines for `kind`.
fn banner(config: &GeneratorConfig, kind: ArtifactKind, buf: &mut String) -> FmtResult {
    let naming = &config.naming;
    writeln!(buf, "/*")?;
    for line in &config.copyright {
        writeln!(buf, " *  {line}")?;
    }
    writeln!(buf, " */")?;
    writeln!(buf)?;
    match kind {
        ArtifactKind::Plugin => {
            writeln!(buf, "#include <{}>", naming.include)?;
        }
        ArtifactKind::Host => {
            writeln!(buf, "#ifndef {}", naming.amalgamated_guard)?;
            writeln!(buf, "#include <{}>", naming.include)?;
            writeln!(buf, "#endif")?;
            writeln!(buf)?;
        }
    }
    writeln!(buf)?;
    writeln!(buf, "// !! THIS FILE IS GENERATED DO NOT EDIT !!")?;
    writeln!(buf)
}

/// Renders the artifact of `kind` for `signatures`.
///
/// # Errors
///
/// Returns an error if formatting into the buffer fails.
pub fn render(
    config: &GeneratorConfig,
    signatures: &SignatureSet,
    kind: ArtifactKind,
) -> Result<String> {
    let api = Api::new(&config.naming, signatures);
    let sections = kind.sections();
    let mut buf = String::new();

    banner(config, kind, &mut buf)?;
    let blocks: [(Sections, &dyn Emit); 7] = [
        (Sections::TYPEDEFS, &FnTypedefs(api)),
        (Sections::TABLE, &TableType(api)),
        (Sections::CONSTANTS, &ApiConstants(api)),
        (Sections::LOADER_SYMBOLS, &LoaderSymbols(api)),
        (Sections::INITIALIZER, &PluginInitializer(api)),
        (Sections::FORWARDERS, &Forwarders(api)),
        (Sections::BUILDER, &HostBuilder(api)),
    ];
    for (section, block) in blocks {
        if sections.contains(section) {
            block.emit(&mut buf)?;
        }
    }
    Ok(buf)
}

impl Artifacts {
    /// Renders both artifacts from one signature set.
    ///
    /// # Errors
    ///
    /// Returns an error if formatting fails.
    pub fn render(config: &GeneratorConfig, signatures: &SignatureSet) -> Result<Self> {
        Ok(Self {
            plugin: Artifact {
                kind: ArtifactKind::Plugin,
                display_path: config.plugin_out.clone(),
                path: config.plugin_path(),
                source: render(config, signatures, ArtifactKind::Plugin)?,
            },
            host: Artifact {
                kind: ArtifactKind::Host,
                display_path: config.host_out.clone(),
                path: config.host_path(),
                source: render(config, signatures, ArtifactKind::Host)?,
            },
        })
    }

    /// Both artifacts, plugin first.
    #[must_use]
    pub fn all(&self) -> [&Artifact; 2] {
        [&self.plugin, &self.host]
    }

    /// Artifacts whose file is missing or differs from the rendered source.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing artifact cannot be read.
    pub fn stale(&self) -> Result<Vec<&Artifact>> {
        let mut stale = Vec::new();
        for artifact in self.all() {
            if !artifact.is_current()? {
                stale.push(artifact);
            }
        }
        Ok(stale)
    }

    /// Fails with [`Error::Stale`] unless both artifacts on disk match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stale`] listing every out-of-date artifact, or an
    /// I/O error if an artifact cannot be read.
    pub fn check(&self) -> Result<()> {
        let stale = self.stale()?;
        if stale.is_empty() {
            return Ok(());
        }
        Err(Error::Stale {
            paths: stale.into_iter().map(|a| a.display_path.clone()).collect(),
        })
    }

    /// Writes every out-of-date artifact.
    ///
    /// All changed artifacts are first written to temporary files next to
    /// their destination; only when all of them were written successfully
    /// are they renamed into place. On failure the temporary files are
    /// removed and every destination holds what it held before.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory, temporary file or rename fails.
    pub fn write(&self) -> Result<WriteSummary> {
        let mut summary = WriteSummary::default();
        let mut pending = Vec::new();

        for artifact in self.all() {
            let staged = artifact
                .is_current()
                .and_then(|current| (!current).then(|| artifact.write_temp()).transpose());
            match staged {
                Ok(Some(temp)) => pending.push((artifact, temp)),
                Ok(None) => {
                    debug!(path = %artifact.path.display(), "artifact is up to date");
                    summary.unchanged.push(artifact.display_path.clone());
                }
                Err(e) => {
                    remove_temps(pending.iter().map(|(_, temp)| temp));
                    return Err(e);
                }
            }
        }

        let renames: Vec<_> = pending
            .iter()
            .map(|(artifact, temp)| (temp.clone(), artifact.path.clone()))
            .collect();
        commit(&renames)?;
        for (artifact, _) in pending {
            info!(path = %artifact.path.display(), "wrote {:?} artifact", artifact.kind);
            summary.written.push(artifact.display_path.clone());
        }

        Ok(summary)
    }
}

impl Artifact {
    /// Whether the file on disk already holds exactly this source.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn is_current(&self) -> Result<bool> {
        match fs::read(&self.path) {
            Ok(existing) => Ok(existing == self.source.as_bytes()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        sibling(&self.path, "tmp")
    }

    fn write_temp(&self) -> Result<PathBuf> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let temp = self.temp_path();
        let result = File::create(&temp).and_then(|mut file| {
            file.write_all(self.source.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = result {
            let _ = fs::remove_file(&temp);
            return Err(Error::io(&temp, e));
        }
        Ok(temp)
    }
}

/// `<path>.<tag>.<pid>`, next to `path`.
fn sibling(path: &Path, tag: &str) -> PathBuf {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy())
        .unwrap_or_default();
    path.with_extension(format!("{extension}.{tag}.{}", std::process::id()))
}

/// Renames every `(temp, dest)` pair into place. If one rename fails, the
/// destinations replaced before it are restored and the remaining
/// temporary files removed.
fn commit(renames: &[(PathBuf, PathBuf)]) -> Result<()> {
    let mut replaced: Vec<(&Path, Option<PathBuf>)> = Vec::new();

    for (i, (temp, dest)) in renames.iter().enumerate() {
        let step = backup(dest).and_then(|backup| match fs::rename(temp, dest) {
            Ok(()) => Ok(backup),
            Err(e) => {
                if let Some(backup) = backup {
                    remove_temp(&backup);
                }
                Err(e)
            }
        });
        match step {
            Ok(backup) => replaced.push((dest.as_path(), backup)),
            Err(e) => {
                restore(&replaced);
                remove_temps(renames[i..].iter().map(|(temp, _)| temp));
                return Err(Error::io(dest, e));
            }
        }
    }

    for backup in replaced.into_iter().filter_map(|(_, backup)| backup) {
        remove_temp(&backup);
    }
    Ok(())
}

/// Links the current content of `dest` to a backup sibling. `None` if
/// `dest` does not exist yet.
fn backup(dest: &Path) -> std::io::Result<Option<PathBuf>> {
    if !dest.exists() {
        return Ok(None);
    }
    let backup = sibling(dest, "bak");
    let _ = fs::remove_file(&backup);
    fs::hard_link(dest, &backup).or_else(|_| fs::copy(dest, &backup).map(|_| ()))?;
    Ok(Some(backup))
}

fn restore(replaced: &[(&Path, Option<PathBuf>)]) {
    for (dest, backup) in replaced.iter().rev() {
        let restored = match backup {
            Some(backup) => fs::rename(backup, dest),
            None => fs::remove_file(dest),
        };
        if let Err(e) = restored {
            warn!(path = %dest.display(), "failed to restore artifact: {e}");
        }
    }
}

fn remove_temps<'a>(temps: impl Iterator<Item = &'a PathBuf>) {
    for temp in temps {
        remove_temp(temp);
    }
}

fn remove_temp(temp: &Path) {
    if let Err(e) = fs::remove_file(temp) {
        debug!(path = %temp.display(), "failed to remove temporary file: {e}");
    }
}
