//! ABI shared between the host and a loaded native module.
//!
//! Modules generated with `pknative` export these symbols:
//! - `pkInitApi(PkNativeApi*, unsigned long long) -> int`
//! - `pkExportModule(PKVM*) -> PkHandle*`
//! - `pkCleanupModule(PKVM*)` (optional)

use std::ffi::{c_int, c_ulonglong};

/// Opaque host dispatch table (`PkNativeApi`), built by the host's
/// `pkMakeNativeAPI`.
#[repr(C)]
pub struct NativeApi {
    _private: [u8; 0],
}

/// Opaque pocketlang VM (`PKVM`).
#[repr(C)]
pub struct Vm {
    _private: [u8; 0],
}

/// Opaque pocketlang handle (`PkHandle`).
#[repr(C)]
pub struct Handle {
    _private: [u8; 0],
}

/// `pkInitApi`: copies the host table into the module.
pub type InitApiFn = unsafe extern "C" fn(api: *mut NativeApi, fingerprint: c_ulonglong) -> c_int;

/// `pkExportModule`: builds the module object.
pub type ExportModuleFn = unsafe extern "C" fn(vm: *mut Vm) -> *mut Handle;

/// `pkCleanupModule`: releases module resources before unloading.
pub type CleanupModuleFn = unsafe extern "C" fn(vm: *mut Vm);

/// `PK_API_INIT_OK`
pub const INIT_OK: c_int = 0;
/// `PK_API_INIT_ALREADY`
pub const INIT_ALREADY: c_int = 1;
/// `PK_API_INIT_MISMATCH`
pub const INIT_MISMATCH: c_int = -1;

/// Outcome of calling a module's initializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// The module copied the table.
    Initialized,
    /// The module had already been handed a table and kept the first one.
    AlreadyInitialized,
    /// The module was generated from a different header; its table is
    /// untouched.
    Mismatch,
}

impl InitStatus {
    /// Maps a status code returned by the initializer. Unknown codes map to
    /// `None`.
    #[must_use]
    pub fn from_code(code: c_int) -> Option<Self> {
        match code {
            INIT_OK => Some(Self::Initialized),
            INIT_ALREADY => Some(Self::AlreadyInitialized),
            INIT_MISMATCH => Some(Self::Mismatch),
            _ => None,
        }
    }
}
