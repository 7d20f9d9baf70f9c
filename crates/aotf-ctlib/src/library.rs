//! Runtime binding to the vendor AOTF library
//!
//! Entry points, as exported by the vendor library:
//!
//! ```text
//! HANDLE       AotfOpen(int index);
//! BOOL         AotfClose(HANDLE handle);
//! BOOL         AotfWrite(HANDLE handle, unsigned len, const char *buf);
//! BOOL         AotfRead(HANDLE handle, unsigned len, char *buf, unsigned *nread);
//! BOOL         AotfIsReadDataAvailable(HANDLE handle);
//! unsigned int AotfGetInstance(HANDLE handle);
//! ```

use std::ffi::{c_int, c_uint, c_void};
use std::path::Path;

use aotf_core::{Handle, Transport};
use libloading::Library;

use crate::error::{CtLibError, Result};

type RawHandle = *mut c_void;

type OpenFn = unsafe extern "C" fn(c_int) -> RawHandle;
type CloseFn = unsafe extern "C" fn(RawHandle) -> c_int;
type WriteFn = unsafe extern "C" fn(RawHandle, c_uint, *const u8) -> c_int;
type ReadFn = unsafe extern "C" fn(RawHandle, c_uint, *mut u8, *mut c_uint) -> c_int;
type IsDataAvailableFn = unsafe extern "C" fn(RawHandle) -> c_int;
type GetInstanceFn = unsafe extern "C" fn(RawHandle) -> c_uint;

/// Loaded vendor library
///
/// The function pointers stay valid for as long as the library is loaded,
/// which is the lifetime of this value.
pub struct CtLibrary {
    open: OpenFn,
    close: CloseFn,
    write: WriteFn,
    read: ReadFn,
    is_data_available: IsDataAvailableFn,
    get_instance: GetInstanceFn,
    // Must be dropped after the function pointers are last used
    _library: Library,
}

impl CtLibrary {
    /// Load the vendor library and resolve its entry points
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // SAFETY: loading runs the library's initialisation routines. The
        // vendor library has no initialisers with preconditions.
        let library = unsafe { Library::new(path) }.map_err(|source| CtLibError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        let lib = Self {
            open: symbol(&library, "AotfOpen")?,
            close: symbol(&library, "AotfClose")?,
            write: symbol(&library, "AotfWrite")?,
            read: symbol(&library, "AotfRead")?,
            is_data_available: symbol(&library, "AotfIsReadDataAvailable")?,
            get_instance: symbol(&library, "AotfGetInstance")?,
            _library: library,
        };

        log::info!("aotf: loaded vendor library {}", path.display());
        Ok(lib)
    }
}

/// Resolve `name` and copy out the function pointer
fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T> {
    // SAFETY: every caller's `T` matches the C declaration of `name` above.
    unsafe { library.get::<T>(name.as_bytes()) }
        .map(|sym| *sym)
        .map_err(|source| CtLibError::MissingSymbol { name, source })
}

fn raw(handle: Handle) -> RawHandle {
    handle.raw() as RawHandle
}

// SAFETY (all blocks below): the pointers come from `load` and the library
// is still loaded. Buffers are valid for the lengths passed.
impl Transport for CtLibrary {
    fn open(&mut self, index: u32) -> Option<Handle> {
        let index = c_int::try_from(index).ok()?;
        let handle = unsafe { (self.open)(index) };
        Handle::from_raw(handle as usize)
    }

    fn close(&mut self, handle: Handle) -> bool {
        unsafe { (self.close)(raw(handle)) != 0 }
    }

    fn write(&mut self, handle: Handle, data: &[u8]) -> bool {
        let Ok(len) = c_uint::try_from(data.len()) else {
            log::error!("aotf: {} byte write exceeds the driver limit", data.len());
            return false;
        };
        unsafe { (self.write)(raw(handle), len, data.as_ptr()) != 0 }
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Option<usize> {
        let len = c_uint::try_from(buf.len()).unwrap_or(c_uint::MAX);
        let mut nread: c_uint = 0;
        let ok = unsafe { (self.read)(raw(handle), len, buf.as_mut_ptr(), &mut nread) != 0 };
        ok.then(|| (nread as usize).min(buf.len()))
    }

    fn is_data_available(&mut self, handle: Handle) -> bool {
        unsafe { (self.is_data_available)(raw(handle)) != 0 }
    }

    fn instance(&mut self, handle: Handle) -> u32 {
        unsafe { (self.get_instance)(raw(handle)) }
    }
}
