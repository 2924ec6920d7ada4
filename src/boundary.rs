use std::fmt;

use crate::handle::RawHandle;

/// Address of a foreign object or function, carried as a fixed-width integer.
///
/// The bridge never dereferences these. They are opaque tokens minted by the
/// foreign side and handed back to it through [`CallBoundary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativePtr(pub usize);

impl NativePtr {
    /// The null foreign pointer.
    pub const NULL: NativePtr = NativePtr(0);

    /// Returns the raw address.
    pub fn addr(self) -> usize {
        self.0
    }

    /// Returns `true` for the null pointer.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// The fixed-signature call boundary supplied by the foreign/native side.
///
/// This is the sole external interface of the bridge. Exactly one `invoke` is
/// in flight at any instant, but an implementation may call back into the host
/// (and through it, into another trampoline) before returning, so methods take
/// `&self`; boundaries that mutate use interior mutability.
///
/// Handles cross this boundary as plain integers. The raw value `0` denotes
/// "none/invalid".
pub trait CallBoundary {
    /// Invokes the foreign function at `func` with the given function,
    /// receiver, and argument handles, returning one result handle.
    ///
    /// A failure inside foreign code is reported through the result handle's
    /// error flag, never by unwinding out of this call.
    fn invoke(
        &self,
        func: NativePtr,
        func_handle: RawHandle,
        this_handle: RawHandle,
        args: &[RawHandle],
    ) -> RawHandle;

    /// Runs the foreign finalizer at `finalizer` on `ptr` after the owning
    /// handle's refcount reached zero.
    fn finalize(&self, finalizer: NativePtr, ptr: NativePtr);
}
