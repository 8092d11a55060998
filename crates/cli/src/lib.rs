#![doc = include_str!("../README.md")]

use anyhow::{Context, Result as AResult, bail};
use clap::{Parser, Subcommand};
use pknative::{Error, GeneratorConfig, config::CONFIG_FILE_NAME};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use std::{ffi::OsStr, path::PathBuf};

/// Environment variable read for the log filter, e.g. `PKNATIVE_LOG=debug`.
pub const LOG_ENV: &str = "PKNATIVE_LOG";

/// Result type returned from the [`run`] function.
pub type CrateResult = AResult<()>;

/// Runs the CLI application. Returns nothing in a result on success.
///
/// # Errors
///
/// Returns an error if the application fails to run.
pub fn run() -> CrateResult {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Args::parse_from(std::env::args()).handle()
}

#[derive(Parser)]
#[clap(
    about = "Generates the pocketlang native API surface for dynamically loaded modules.",
    version = env!("CARGO_PKG_VERSION")
)]
struct Args {
    #[clap(flatten)]
    paths: Paths,
    /// What to do. Defaults to `generate`.
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Generates the plugin and host artifacts from the header.
    ///
    /// Artifacts whose content would not change are left untouched so build
    /// systems do not rebuild them.
    Generate,
    /// Exits with an error if either artifact is missing or out of date.
    Check,
    /// Prints the exported functions parsed from the header.
    List(List),
    /// Regenerates the artifacts whenever the header or the configuration
    /// file changes.
    Watch(Watch),
}

#[derive(Parser)]
struct Paths {
    /// Project root the configured paths are relative to. Defaults to the
    /// current directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Configuration file. Defaults to `pknative.toml` in the project root
    /// when it exists.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the header to read.
    #[arg(long, global = true)]
    header: Option<PathBuf>,
    /// Overrides the plugin artifact destination.
    #[arg(long, global = true)]
    plugin_out: Option<PathBuf>,
    /// Overrides the host artifact destination.
    #[arg(long, global = true)]
    host_out: Option<PathBuf>,
}

#[derive(Parser)]
struct List {
    /// Prints JSON instead of C prototypes.
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct Watch {
    /// Milliseconds to wait for further changes before regenerating.
    #[arg(long, default_value_t = 500)]
    debounce: u64,
}

impl Args {
    pub fn handle(self) -> CrateResult {
        let Self { paths, command } = self;
        match command.unwrap_or(Command::Generate) {
            Command::Generate => generate(&paths.config()?),
            Command::Check => check(&paths.config()?),
            Command::List(list) => list.handle(&paths.config()?),
            Command::Watch(watch) => watch.handle(&paths),
        }
    }
}

impl Paths {
    /// Resolves the configuration: file (explicit or discovered) first, then
    /// command line overrides.
    fn config(&self) -> AResult<GeneratorConfig> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("Failed to get current directory")?,
        };
        let mut config = match &self.config {
            Some(path) => GeneratorConfig::load(path, root)?,
            None => GeneratorConfig::discover(root)?,
        };

        if let Some(header) = &self.header {
            config.header.clone_from(header);
        }
        if let Some(plugin_out) = &self.plugin_out {
            config.plugin_out.clone_from(plugin_out);
        }
        if let Some(host_out) = &self.host_out {
            config.host_out.clone_from(host_out);
        }
        Ok(config)
    }
}

fn generate(config: &GeneratorConfig) -> CrateResult {
    let generated = pknative::generate(config)
        .with_context(|| format!("Failed to generate from `{}`", config.header.display()))?;
    for artifact in generated.artifacts.all() {
        println!("Generated: {}", artifact.display_path.display());
    }
    Ok(())
}

fn check(config: &GeneratorConfig) -> CrateResult {
    match pknative::check(config) {
        Ok(()) => {
            println!("Native API artifacts are up to date.");
            Ok(())
        }
        Err(e @ Error::Stale { .. }) => bail!("{e}, run `pknative generate` to update them"),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to check `{}`", config.header.display()))
        }
    }
}

impl List {
    pub fn handle(self, config: &GeneratorConfig) -> CrateResult {
        let signatures = pknative::load_signatures(config)
            .with_context(|| format!("Failed to parse `{}`", config.header.display()))?;

        if self.json {
            let listing = serde_json::json!({
                "fingerprint": format!("0x{:016x}", signatures.fingerprint()),
                "functions": signatures,
            });
            let text = serde_json::to_string_pretty(&listing)
                .with_context(|| "Failed to serialize the function list")?;
            println!("{text}");
        } else {
            for signature in &signatures {
                println!("{signature}");
            }
        }
        Ok(())
    }
}

impl Watch {
    pub fn handle(self, paths: &Paths) -> CrateResult {
        use notify::RecursiveMode;
        use notify_debouncer_full::new_debouncer;
        use std::{
            sync::{
                Arc,
                atomic::{AtomicBool, Ordering},
                mpsc::{RecvTimeoutError, channel},
            },
            time::Duration,
        };

        let mut config = paths.config()?;
        Self::regenerate(&config);

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
        })
        .context("Failed to set Ctrl+C handler")?;

        let (tx, rx) = channel();
        let mut debouncer = new_debouncer(Duration::from_millis(self.debounce), None, tx)
            .context("Failed to create file watcher")?;

        // Editors often replace the file instead of writing it in place, so
        // the directories are watched rather than the files themselves.
        for dir in Self::watch_dirs(&config) {
            debouncer
                .watch(&dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {}", dir.display()))?;
        }

        info!(
            header = %config.header_path().display(),
            "watching for changes, press Ctrl+C to stop"
        );

        while running.load(Ordering::SeqCst) {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    if !Self::is_relevant_event(&events, &config) {
                        continue;
                    }
                    info!("change detected, regenerating");
                    match paths.config() {
                        Ok(reloaded) => config = reloaded,
                        Err(e) => {
                            error!("{e:#}");
                            continue;
                        }
                    }
                    Self::regenerate(&config);
                }
                Ok(Err(errors)) => {
                    for e in errors {
                        warn!("watch error: {e}");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    bail!("File watcher channel disconnected");
                }
            }
        }

        info!("shutting down");
        Ok(())
    }

    /// Regenerates, reporting failures without stopping the watch loop.
    fn regenerate(config: &GeneratorConfig) {
        match pknative::generate(config) {
            Ok(generated) if generated.summary.written.is_empty() => {
                info!("artifacts are up to date");
            }
            Ok(generated) => {
                for path in &generated.summary.written {
                    println!("Generated: {}", path.display());
                }
            }
            Err(e) => {
                error!("{e}");
                info!("waiting for changes");
            }
        }
    }

    fn watch_dirs(config: &GeneratorConfig) -> Vec<PathBuf> {
        let mut dirs = vec![config.root.clone()];
        let header = config.header_path();
        if let Some(parent) = header.parent() {
            if !dirs.iter().any(|dir| dir == parent) {
                dirs.push(parent.to_path_buf());
            }
        }
        dirs
    }

    fn is_relevant_event(
        events: &[notify_debouncer_full::DebouncedEvent],
        config: &GeneratorConfig,
    ) -> bool {
        let header = config.header_path();
        let header_name = header.file_name();
        events
            .iter()
            .filter(|event| !event.kind.is_access())
            .any(|event| {
                event.paths.iter().any(|path: &PathBuf| {
                    let name = path.file_name();
                    name == header_name || name == Some(OsStr::new(CONFIG_FILE_NAME))
                })
            })
    }
}
