//! Transport primitive abstraction
//!
//! The controller is reached through a vendor driver that speaks in device
//! handles and raw byte buffers. This module only describes that capability;
//! implementations live in their own crates (vendor library, dummy device).

use core::fmt;
use core::num::NonZeroUsize;

/// Opaque device handle returned by [`Transport::open`]
///
/// Drivers report a failed open with a zero handle, so a `Handle` is always
/// non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroUsize);

impl Handle {
    /// Wrap a raw driver handle, returning `None` for the zero handle
    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Self)
    }

    /// Raw driver value
    pub fn raw(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0.get())
    }
}

/// Byte-level access to AOTF controllers
///
/// Every call maps one-to-one onto a driver primitive. Failure is reported
/// the way drivers report it (a `false`, a missing handle, a missing byte
/// count); the engine turns that into typed errors.
pub trait Transport {
    /// Open the controller with the given enumeration index
    fn open(&mut self, index: u32) -> Option<Handle>;

    /// Close a previously opened controller
    fn close(&mut self, handle: Handle) -> bool;

    /// Write all of `data` to the controller
    fn write(&mut self, handle: Handle, data: &[u8]) -> bool;

    /// Read up to `buf.len()` bytes
    ///
    /// Returns the number of bytes read, or `None` if the driver reported
    /// a read failure.
    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Option<usize>;

    /// Whether the controller has bytes waiting to be read
    fn is_data_available(&mut self, handle: Handle) -> bool;

    /// Controller index the driver associates with `handle`
    fn instance(&mut self, handle: Handle) -> u32;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, index: u32) -> Option<Handle> {
        (**self).open(index)
    }

    fn close(&mut self, handle: Handle) -> bool {
        (**self).close(handle)
    }

    fn write(&mut self, handle: Handle, data: &[u8]) -> bool {
        (**self).write(handle, data)
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Option<usize> {
        (**self).read(handle, buf)
    }

    fn is_data_available(&mut self, handle: Handle) -> bool {
        (**self).is_data_available(handle)
    }

    fn instance(&mut self, handle: Handle) -> u32 {
        (**self).instance(handle)
    }
}
