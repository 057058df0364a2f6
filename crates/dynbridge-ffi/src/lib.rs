//! C FFI for the dynbridge descriptor bridge
//!
//! Entry points an external interpreter links against:
//! - Register its compile callback
//! - Retain and release view handles it keeps past a compile request
//! - Map status codes and last errors to messages
//! - Query the capability gate and switch on logging
//!
//! Views themselves are walked through the function pointers they carry;
//! see `dynbridge_sdk` for their layout.

use dynbridge_engine::{config, dispatch, gate, handles, CompileRequest, DynamicMethodCompiler};
use dynbridge_sdk::{
    BackingHandle, BridgeError, BridgeResult, BridgeStatus, CompiledMethodHandle, MethodView,
};
use std::ffi::{c_void, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use tracing_subscriber::EnvFilter;

// Callbacks rely on catch_unwind to turn panics into INTERNAL
#[cfg(panic = "abort")]
compile_error!("dynbridge-ffi must be built with panic = \"unwind\"");

/// Environment variable holding the `tracing` filter for [`dynbridge_init_logging`]
pub const ENV_LOG: &str = "DYNBRIDGE_LOG";

/// Interpreter compile callback.
///
/// Receives the top-level method view and the `user_data` given at
/// registration. Returns null on failure. The method view is released by
/// the bridge when the callback returns; sub-views obtained from it belong
/// to the callback.
pub type NativeCompileFn =
    unsafe extern "C" fn(view: *const MethodView, user_data: *mut c_void) -> CompiledMethodHandle;

// ============================================================================
// Compiler Registration
// ============================================================================

struct NativeCompiler {
    callback: NativeCompileFn,
    // Opaque to the bridge; kept as an integer so the compiler is Send + Sync
    user_data: usize,
}

impl DynamicMethodCompiler for NativeCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> BridgeResult<CompiledMethodHandle> {
        let handle = unsafe { (self.callback)(request.view_ptr(), self.user_data as *mut c_void) };
        if handle.is_null() {
            tracing::debug!(
                method = %request.descriptor().name_lossy(),
                "native compiler returned null"
            );
            return Err(BridgeError::CompilationFailed(format!(
                "interpreter could not compile {}",
                request.descriptor().name_lossy()
            )));
        }
        Ok(handle)
    }
}

fn status_of(result: BridgeResult<()>) -> BridgeStatus {
    match result {
        Ok(()) => BridgeStatus::OK,
        Err(e) => dynbridge_engine::set_last_error(e),
    }
}

/// Register the interpreter's compile callback
///
/// # Returns
/// * `OK` on success
/// * `NULL_ARGUMENT` if `callback` is NULL
/// * `ALREADY_REGISTERED` if a callback was registered before
///
/// # Safety
/// - `callback` must stay callable for the life of the process
/// - `user_data` is passed back untouched; `callback` may be invoked with it
///   concurrently from any thread that compiles a dynamic method
///
/// # Example (C)
/// ```c
/// int32_t status = dynbridge_register_compiler(my_compile, my_ctx);
/// if (status != 0) {
///     fprintf(stderr, "bridge: %s\n", dynbridge_status_message(status));
/// }
/// ```
#[no_mangle]
pub unsafe extern "C" fn dynbridge_register_compiler(
    callback: Option<NativeCompileFn>,
    user_data: *mut c_void,
) -> BridgeStatus {
    let Some(callback) = callback else {
        return status_of(Err(BridgeError::NullArgument));
    };
    status_of(dispatch::register_compiler(NativeCompiler {
        callback,
        user_data: user_data as usize,
    }))
}

// ============================================================================
// Handle Lifetime
// ============================================================================

/// Take another reference to a view handle
///
/// # Returns
/// * `OK` on success
/// * `INVALID_HANDLE` if the handle is not live
///
/// # Safety
/// Safe to call with any value.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_handle_retain(handle: BackingHandle) -> BridgeStatus {
    status_of(handles::global().retain(handle))
}

/// Give back one reference to a view handle
///
/// Every sub-view obtained through `get_signature`/`get_header` must be
/// released exactly once (plus once per retain).
///
/// # Returns
/// * `OK` on success
/// * `INVALID_HANDLE` if the handle is not live (double release)
///
/// # Safety
/// The view must not be used after its last reference is released.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_handle_release(handle: BackingHandle) -> BridgeStatus {
    status_of(handles::global().release(handle))
}

/// Number of live handles in the bridge
///
/// # Safety
/// Safe to call at any time.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_live_handles() -> u64 {
    handles::global().live_count() as u64
}

// ============================================================================
// Errors
// ============================================================================

/// Static description of a status code
///
/// # Safety
/// The returned string is static and must not be freed.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_status_message(status: BridgeStatus) -> *const c_char {
    status.message().as_ptr()
}

/// Message of the last failed bridge call on this thread
///
/// Consumes the error: a second call returns NULL.
///
/// # Returns
/// * Null-terminated message; free it with `dynbridge_string_free()`
/// * NULL if no error is pending
///
/// # Safety
/// The returned string must be freed with `dynbridge_string_free()`.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_last_error_message() -> *mut c_char {
    match dynbridge_engine::take_last_error() {
        Some(err) => CString::new(err.to_string())
            .map(CString::into_raw)
            .unwrap_or(ptr::null_mut()),
        None => ptr::null_mut(),
    }
}

/// Free a string returned by the bridge
///
/// # Safety
/// - `s` must come from `dynbridge_last_error_message()` (or be NULL)
/// - `s` must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn dynbridge_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    drop(CString::from_raw(s));
}

// ============================================================================
// Capability and Diagnostics
// ============================================================================

/// 1 if dynamic methods will be handed to the interpreter, else 0
///
/// # Safety
/// Safe to call at any time.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_interpreter_available() -> c_int {
    gate::interpreter_available(config::global()) as c_int
}

/// Install a stderr `tracing` subscriber filtered by `DYNBRIDGE_LOG`
///
/// # Returns
/// * 1 if a subscriber was installed
/// * 0 if `DYNBRIDGE_LOG` is unset or invalid, or a subscriber already exists
///
/// # Safety
/// Safe to call at any time.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_init_logging() -> c_int {
    let Ok(filter) = EnvFilter::try_from_env(ENV_LOG) else {
        return 0;
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok() as c_int
}

/// Bridge version string
///
/// # Safety
/// The returned string is static and must not be freed.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// Tests
// ============================================================================
