//! Fixed-layout views exposed to native interpreters
//!
//! Field order is the ABI. Both sides agree on it without sharing source,
//! so the layout is pinned by compile-time assertions at the bottom of
//! this file. Slots added after the first revision of a view
//! (`get_param_type`, `get_clause`) follow `backing_handle`, so older
//! interpreters still see the original fields at the original offsets.
//!
//! Every callback takes the view it was read from as `this`. Callbacks that
//! can fail return a [`BridgeStatus`] and write their result through an
//! out-pointer; `get_code` cannot fail for a live view and returns null only
//! when the view's backing handle is dead.

use std::ffi::{c_char, CStr};

use crate::handle::{BackingHandle, TypeHandle};
use crate::status::BridgeStatus;

/// Signature accessor on a method view
pub type GetSignatureFn =
    unsafe extern "C" fn(this: *const MethodView, out: *mut *const SignatureView) -> BridgeStatus;

/// Header accessor on a method view
pub type GetHeaderFn =
    unsafe extern "C" fn(this: *const MethodView, out: *mut *const HeaderView) -> BridgeStatus;

/// Return type accessor on a signature view
pub type GetReturnTypeFn =
    unsafe extern "C" fn(this: *const SignatureView, out: *mut TypeHandle) -> BridgeStatus;

/// Parameter type accessor on a signature view
pub type GetParamTypeFn = unsafe extern "C" fn(
    this: *const SignatureView,
    index: i32,
    out: *mut TypeHandle,
) -> BridgeStatus;

/// Local variable type accessor on a header view
pub type GetLocalTypeFn =
    unsafe extern "C" fn(this: *const HeaderView, index: i32, out: *mut TypeHandle) -> BridgeStatus;

/// Opcode bytes of a header view (`code_size` bytes, read-only)
pub type GetCodeFn = unsafe extern "C" fn(this: *const HeaderView) -> *const u8;

/// Instruction pointer to byte offset
pub type GetIpOffsetFn =
    unsafe extern "C" fn(this: *const HeaderView, ip: *const u8, out: *mut i32) -> BridgeStatus;

/// Exception clause accessor on a header view
pub type GetClauseFn = unsafe extern "C" fn(
    this: *const HeaderView,
    index: i32,
    out: *mut ExceptionClauseView,
) -> BridgeStatus;

/// Common accessor for the three view kinds
pub trait View {
    /// Handle keeping this view and its managed object alive
    fn backing_handle(&self) -> BackingHandle;
}

/// Identity of a dynamic method
#[repr(C)]
#[derive(Debug)]
pub struct MethodView {
    /// NUL-terminated method name, valid while the view is alive
    pub name: *const c_char,
    /// Declaring type
    pub owning_type: TypeHandle,
    /// Build a signature view (caller owns one reference to it)
    pub get_signature: GetSignatureFn,
    /// Build a header view (caller owns one reference to it)
    pub get_header: GetHeaderFn,
    /// Keep-alive handle for this view
    pub backing_handle: BackingHandle,
}

/// Parameter shape of a dynamic method
#[repr(C)]
#[derive(Debug)]
pub struct SignatureView {
    /// Number of declared parameters, excluding `this`
    pub param_count: i32,
    /// Non-zero for instance methods
    pub has_this: u8,
    /// Resolve the return type (lazy)
    pub get_return_type: GetReturnTypeFn,
    /// Keep-alive handle for this view
    pub backing_handle: BackingHandle,
    /// Resolve a parameter type, `0 <= index < param_count`
    pub get_param_type: GetParamTypeFn,
}

/// Bytecode header of a finalized dynamic method
#[repr(C)]
#[derive(Debug)]
pub struct HeaderView {
    /// Opcode stream length in bytes
    pub code_size: i32,
    /// Maximum evaluation stack depth
    pub max_stack: i32,
    /// Number of local variables
    pub local_count: i32,
    /// Number of exception clauses
    pub clause_count: i32,
    /// Non-zero when locals are zero-initialized
    pub init_locals: u8,
    /// Resolve a local variable type, `0 <= index < local_count`
    pub get_local_type: GetLocalTypeFn,
    /// Opcode bytes; the pointer is stable while the view is alive
    pub get_code: GetCodeFn,
    /// Map an instruction pointer inside the code to its offset
    pub get_ip_offset: GetIpOffsetFn,
    /// Keep-alive handle for this view
    pub backing_handle: BackingHandle,
    /// Read an exception clause, `0 <= index < clause_count`
    pub get_clause: GetClauseFn,
}

/// Exception clause as seen by the interpreter
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExceptionClauseView {
    /// [`ClauseKind`] as raw value
    pub kind: u32,
    /// Start of the protected region
    pub try_offset: u32,
    /// Length of the protected region
    pub try_length: u32,
    /// Start of the handler
    pub handler_offset: u32,
    /// Length of the handler
    pub handler_length: u32,
    /// Caught type for `Catch` clauses, null otherwise
    pub catch_type: TypeHandle,
}

/// Kind of an exception clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    /// Typed catch
    Catch,
    /// Filter block
    Filter,
    /// Finally block
    Finally,
    /// Fault block
    Fault,
}

impl ClauseKind {
    /// Raw ABI value
    pub const fn as_raw(self) -> u32 {
        match self {
            ClauseKind::Catch => 0,
            ClauseKind::Filter => 1,
            ClauseKind::Finally => 2,
            ClauseKind::Fault => 3,
        }
    }

    /// Decode a raw ABI value
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(ClauseKind::Catch),
            1 => Some(ClauseKind::Filter),
            2 => Some(ClauseKind::Finally),
            3 => Some(ClauseKind::Fault),
            _ => None,
        }
    }
}

// Safety: the name pointer addresses an immutable C string owned by the
// managed object that `backing_handle` keeps alive. Views are never mutated
// after construction.
unsafe impl Send for MethodView {}
unsafe impl Sync for MethodView {}

impl MethodView {
    /// Method name
    ///
    /// # Safety
    /// The view must be alive (its backing handle not yet released), and
    /// `name` must be the pointer the bridge wrote.
    pub unsafe fn name(&self) -> &CStr {
        CStr::from_ptr(self.name)
    }
}

impl SignatureView {
    /// Whether the method takes `this`
    pub fn has_this(&self) -> bool {
        self.has_this != 0
    }
}

impl HeaderView {
    /// Whether locals are zero-initialized
    pub fn init_locals(&self) -> bool {
        self.init_locals != 0
    }
}

impl ExceptionClauseView {
    /// Decoded clause kind
    pub fn clause_kind(&self) -> Option<ClauseKind> {
        ClauseKind::from_raw(self.kind)
    }
}

impl View for MethodView {
    fn backing_handle(&self) -> BackingHandle {
        self.backing_handle
    }
}

impl View for SignatureView {
    fn backing_handle(&self) -> BackingHandle {
        self.backing_handle
    }
}

impl View for HeaderView {
    fn backing_handle(&self) -> BackingHandle {
        self.backing_handle
    }
}

// ============================================================================
// Layout
// ============================================================================

#[cfg(target_pointer_width = "64")]
const _: () = {
    use std::mem::{offset_of, size_of};

    assert!(size_of::<MethodView>() == 40);
    assert!(offset_of!(MethodView, name) == 0);
    assert!(offset_of!(MethodView, owning_type) == 8);
    assert!(offset_of!(MethodView, get_signature) == 16);
    assert!(offset_of!(MethodView, get_header) == 24);
    assert!(offset_of!(MethodView, backing_handle) == 32);

    assert!(size_of::<SignatureView>() == 32);
    assert!(offset_of!(SignatureView, param_count) == 0);
    assert!(offset_of!(SignatureView, has_this) == 4);
    assert!(offset_of!(SignatureView, get_return_type) == 8);
    assert!(offset_of!(SignatureView, backing_handle) == 16);
    assert!(offset_of!(SignatureView, get_param_type) == 24);

    assert!(size_of::<HeaderView>() == 64);
    assert!(offset_of!(HeaderView, code_size) == 0);
    assert!(offset_of!(HeaderView, max_stack) == 4);
    assert!(offset_of!(HeaderView, local_count) == 8);
    assert!(offset_of!(HeaderView, clause_count) == 12);
    assert!(offset_of!(HeaderView, init_locals) == 16);
    assert!(offset_of!(HeaderView, get_local_type) == 24);
    assert!(offset_of!(HeaderView, get_code) == 32);
    assert!(offset_of!(HeaderView, get_ip_offset) == 40);
    assert!(offset_of!(HeaderView, backing_handle) == 48);
    assert!(offset_of!(HeaderView, get_clause) == 56);

    assert!(size_of::<ExceptionClauseView>() == 32);
    assert!(offset_of!(ExceptionClauseView, kind) == 0);
    assert!(offset_of!(ExceptionClauseView, handler_length) == 16);
    assert!(offset_of!(ExceptionClauseView, catch_type) == 24);
};
