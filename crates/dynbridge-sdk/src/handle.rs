//! Opaque handles passed across the boundary

use std::ffi::c_void;
use std::fmt;
use std::ptr;

/// Keep-alive token for a managed object.
///
/// Issued by the handle table; `0` is never issued. Handles are unique for
/// the life of the process and are not reused after release.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BackingHandle(u64);

impl BackingHandle {
    /// The null handle
    pub const NULL: BackingHandle = BackingHandle(0);

    /// Wrap a raw handle value
    pub const fn from_raw(raw: u64) -> Self {
        BackingHandle(raw)
    }

    /// Raw handle value
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Check for the null handle
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Opaque reference to an interned managed type.
///
/// Type handles stay valid for the life of the process.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeHandle(u64);

impl TypeHandle {
    /// The null type handle
    pub const NULL: TypeHandle = TypeHandle(0);

    /// Wrap a raw handle value
    pub const fn from_raw(raw: u64) -> Self {
        TypeHandle(raw)
    }

    /// Raw handle value
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Check for the null handle
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Interpreter-owned compiled method.
///
/// Opaque to the bridge. Its lifetime is independent of the method
/// descriptor it was compiled from; the interpreter may cache and reuse it.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompiledMethodHandle(*mut c_void);

// Safety: the bridge never dereferences the pointer; ownership and
// synchronization of the pointee belong to the interpreter.
unsafe impl Send for CompiledMethodHandle {}
unsafe impl Sync for CompiledMethodHandle {}

impl CompiledMethodHandle {
    /// The null compiled method
    pub const fn null() -> Self {
        CompiledMethodHandle(ptr::null_mut())
    }

    /// Wrap an interpreter pointer
    pub const fn from_ptr(ptr: *mut c_void) -> Self {
        CompiledMethodHandle(ptr)
    }

    /// Interpreter pointer
    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }

    /// Check for null
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for CompiledMethodHandle {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for CompiledMethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompiledMethodHandle({:p})", self.0)
    }
}
