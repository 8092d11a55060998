//! Host-side loader for native modules generated with `pknative`.
//!
//! Loading a module opens the shared library, resolves its entry points and
//! hands it the host's dispatch table through `pkInitApi` together with the
//! host's fingerprint. A module generated from a different header revision
//! refuses the table and fails to load with
//! [`Error::FingerprintMismatch`] instead of calling through a table with a
//! different layout.
//!
//! ```no_run
//! use pknative_dl::{NativeApi, SymbolNames, load_once};
//!
//! # fn host_table() -> *mut NativeApi { std::ptr::null_mut() }
//! # const PK_NATIVE_API_FINGERPRINT: u64 = 0;
//! let module = unsafe {
//!     load_once(
//!         "modules/libmath.so",
//!         &SymbolNames::default(),
//!         host_table(),
//!         PK_NATIVE_API_FINGERPRINT,
//!     )
//! }?;
//! # Ok::<(), pknative_dl::Error>(())
//! ```

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]

pub mod abi;
pub mod error;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    thread::{self, ThreadId},
    time::Duration,
};

use libloading::Library;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use pknative::Naming;
use tracing::{debug, info};

pub use abi::{Handle, InitStatus, NativeApi, Vm};
use abi::{CleanupModuleFn, ExportModuleFn, InitApiFn};
pub use error::{Error, Result};

/// Modules loaded through [`load_once`], keyed by canonical path.
static MODULES: Lazy<Mutex<HashMap<PathBuf, Arc<NativeModule>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Paths currently being loaded, with the thread loading them.
static LOADING: Lazy<Mutex<HashMap<PathBuf, ThreadId>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Removes a path from [`LOADING`] on drop, whether the load succeeded or not.
struct LoadingGuard(PathBuf);

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        LOADING.lock().remove(&self.0);
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        /// Opens with `RTLD_NOW` so unresolved symbols fail the load instead
        /// of the first call.
        unsafe fn open_library(path: &Path) -> Result<Library, libloading::Error> {
            use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};
            unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL) }.map(Library::from)
        }
    } else {
        unsafe fn open_library(path: &Path) -> Result<Library, libloading::Error> {
            unsafe { Library::new(path) }
        }
    }
}

/// Names of the entry points resolved in a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolNames {
    /// Initializer receiving the host table.
    pub init: String,
    /// Module entry point.
    pub export: String,
    /// Optional teardown.
    pub cleanup: String,
}

impl From<&Naming> for SymbolNames {
    fn from(naming: &Naming) -> Self {
        Self {
            init: naming.init_fn.clone(),
            export: naming.export_module_fn.clone(),
            cleanup: naming.cleanup_module_fn.clone(),
        }
    }
}

impl Default for SymbolNames {
    fn default() -> Self {
        Self::from(&Naming::default())
    }
}

/// A loaded module that accepted the host table.
#[derive(Debug)]
pub struct NativeModule {
    path: PathBuf,
    status: InitStatus,
    export: ExportModuleFn,
    cleanup: Option<CleanupModuleFn>,
    _library: Library,
}

impl NativeModule {
    /// Opens the module at `path` and runs its initializer with `api` and
    /// `fingerprint`.
    ///
    /// # Safety
    ///
    /// `path` must name a module generated with `pknative`, and `api` must
    /// point to a table built by the host's `pkMakeNativeAPI` that outlives
    /// the module. Opening a library runs its static initializers.
    ///
    /// # Errors
    ///
    /// Fails if the library cannot be opened, lacks the initializer or
    /// module entry point, or rejects the table.
    pub unsafe fn load(
        path: impl Into<PathBuf>,
        names: &SymbolNames,
        api: *mut NativeApi,
        fingerprint: u64,
    ) -> Result<Self> {
        let path = path.into();
        let library = unsafe { open_library(&path) }.map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;

        let init: InitApiFn = unsafe { symbol(&library, &path, &names.init) }?;
        let export: ExportModuleFn = unsafe { symbol(&library, &path, &names.export) }?;
        let cleanup = unsafe { symbol::<CleanupModuleFn>(&library, &path, &names.cleanup) }.ok();
        if cleanup.is_none() {
            debug!(
                path = %path.display(),
                symbol = %names.cleanup,
                "module has no cleanup function"
            );
        }

        let code = unsafe { init(api, fingerprint) };
        let status = match InitStatus::from_code(code) {
            Some(InitStatus::Mismatch) => {
                return Err(Error::FingerprintMismatch {
                    path,
                    expected: fingerprint,
                });
            }
            Some(status) => status,
            None => return Err(Error::UnexpectedStatus { path, status: code }),
        };

        info!(path = %path.display(), ?status, "loaded native module");
        Ok(Self {
            path,
            status,
            export,
            cleanup,
            _library: library,
        })
    }

    /// Path the module was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// What the initializer reported.
    #[must_use]
    pub fn status(&self) -> InitStatus {
        self.status
    }

    /// Whether the module exports a cleanup function.
    #[must_use]
    pub fn has_cleanup(&self) -> bool {
        self.cleanup.is_some()
    }

    /// Calls the module entry point.
    ///
    /// # Safety
    ///
    /// `vm` must be a live VM of the host that supplied the table.
    pub unsafe fn export_module(&self, vm: *mut Vm) -> *mut Handle {
        unsafe { (self.export)(vm) }
    }

    /// Calls the module's cleanup function if it has one.
    ///
    /// # Safety
    ///
    /// `vm` must be the VM the module was exported into.
    pub unsafe fn cleanup(&self, vm: *mut Vm) {
        if let Some(cleanup) = self.cleanup {
            unsafe { cleanup(vm) };
        }
    }
}

unsafe fn symbol<T: Copy>(library: &Library, path: &Path, name: &str) -> Result<T> {
    unsafe { library.get::<T>(name.as_bytes()) }
        .map(|symbol| *symbol)
        .map_err(|source| Error::MissingSymbol {
            path: path.to_path_buf(),
            symbol: name.to_string(),
            source,
        })
}

/// Loads the module at `path` once per process.
///
/// Later calls for the same file return the module loaded first without
/// running its initializer again. Failed loads are not remembered. No lock
/// is held while the library is opened or initialized, so module code may
/// load other modules. A thread asking for a module another thread is still
/// loading waits for that load to finish.
///
/// # Safety
///
/// Same requirements as [`NativeModule::load`].
///
/// # Errors
///
/// Returns any error [`NativeModule::load`] can return, or
/// [`Error::RecursiveLoad`] if loading the module requests the same module
/// again.
pub unsafe fn load_once(
    path: impl Into<PathBuf>,
    names: &SymbolNames,
    api: *mut NativeApi,
    fingerprint: u64,
) -> Result<Arc<NativeModule>> {
    let path = path.into();
    let key = std::fs::canonicalize(&path).unwrap_or(path);
    register_with(key, |key| unsafe {
        NativeModule::load(key, names, api, fingerprint)
    })
}

/// Returns the registered module for `key`, or runs `load` without holding
/// the registry lock and registers what it returns.
fn register_with(
    key: PathBuf,
    load: impl FnOnce(&Path) -> Result<NativeModule>,
) -> Result<Arc<NativeModule>> {
    let current = thread::current().id();
    loop {
        if let Some(module) = MODULES.lock().get(&key) {
            debug!(path = %key.display(), "native module already loaded");
            return Ok(Arc::clone(module));
        }

        let mut loading = LOADING.lock();
        match loading.get(&key).copied() {
            Some(owner) if owner == current => {
                return Err(Error::RecursiveLoad { path: key });
            }
            Some(_) => {
                drop(loading);
                thread::sleep(Duration::from_millis(10));
            }
            None => {
                loading.insert(key.clone(), current);
                break;
            }
        }
    }
    let _guard = LoadingGuard(key.clone());

    // Another thread may have finished between the cache check and marking.
    if let Some(module) = MODULES.lock().get(&key) {
        return Ok(Arc::clone(module));
    }

    let module = Arc::new(load(&key)?);
    MODULES.lock().insert(key, Arc::clone(&module));
    Ok(module)
}

/// Removes a module from the registry. The library stays open until the
/// last [`Arc`] to it is dropped.
pub fn forget(path: &Path) -> Option<Arc<NativeModule>> {
    let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    MODULES.lock().remove(&key)
}

/// Paths of the modules currently registered, sorted.
#[must_use]
pub fn loaded_modules() -> Vec<PathBuf> {
    let mut paths: Vec<_> = MODULES.lock().keys().cloned().collect();
    paths.sort();
    paths
}
