//! Status codes returned across the native boundary

use std::ffi::CStr;
use std::fmt;

/// Status code returned by every view callback and C entry point.
///
/// A transparent `i32` rather than a Rust enum so that any value a native
/// caller produces is still a valid `BridgeStatus`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeStatus(i32);

impl BridgeStatus {
    /// Success
    pub const OK: BridgeStatus = BridgeStatus(0);
    /// See [`crate::BridgeError::InvalidHandle`]
    pub const INVALID_HANDLE: BridgeStatus = BridgeStatus(1);
    /// See [`crate::BridgeError::MethodNotFinalized`]
    pub const METHOD_NOT_FINALIZED: BridgeStatus = BridgeStatus(2);
    /// See [`crate::BridgeError::IndexOutOfRange`]
    pub const INDEX_OUT_OF_RANGE: BridgeStatus = BridgeStatus(3);
    /// See [`crate::BridgeError::InvalidPointer`]
    pub const INVALID_POINTER: BridgeStatus = BridgeStatus(4);
    /// See [`crate::BridgeError::AlreadyRegistered`]
    pub const ALREADY_REGISTERED: BridgeStatus = BridgeStatus(5);
    /// See [`crate::BridgeError::NoCallbackRegistered`]
    pub const NO_CALLBACK_REGISTERED: BridgeStatus = BridgeStatus(6);
    /// See [`crate::BridgeError::InterpreterUnavailable`]
    pub const INTERPRETER_UNAVAILABLE: BridgeStatus = BridgeStatus(7);
    /// See [`crate::BridgeError::CompilationFailed`]
    pub const COMPILATION_FAILED: BridgeStatus = BridgeStatus(8);
    /// See [`crate::BridgeError::AlreadyFinalized`]
    pub const ALREADY_FINALIZED: BridgeStatus = BridgeStatus(9);
    /// See [`crate::BridgeError::InvalidMetadata`]
    pub const INVALID_METADATA: BridgeStatus = BridgeStatus(10);
    /// See [`crate::BridgeError::NullArgument`]
    pub const NULL_ARGUMENT: BridgeStatus = BridgeStatus(11);
    /// See [`crate::BridgeError::Internal`]
    pub const INTERNAL: BridgeStatus = BridgeStatus(12);

    /// Wrap a raw status value
    pub const fn from_raw(raw: i32) -> Self {
        BridgeStatus(raw)
    }

    /// Raw status value
    pub const fn as_raw(self) -> i32 {
        self.0
    }

    /// Whether this is [`BridgeStatus::OK`]
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Static, NUL-terminated description of the status
    pub fn message(self) -> &'static CStr {
        match self.0 {
            0 => c"ok",
            1 => c"invalid handle",
            2 => c"method not finalized",
            3 => c"index out of range",
            4 => c"invalid pointer",
            5 => c"compiler already registered",
            6 => c"no compiler registered",
            7 => c"interpreter unavailable",
            8 => c"compilation failed",
            9 => c"method already finalized",
            10 => c"invalid method metadata",
            11 => c"null argument",
            12 => c"internal error",
            _ => c"unknown status",
        }
    }
}

impl fmt::Debug for BridgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BridgeStatus({}: {})", self.0, self.message().to_string_lossy())
    }
}

impl fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message().to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok() {
        assert!(BridgeStatus::OK.is_ok());
        assert!(!BridgeStatus::INVALID_HANDLE.is_ok());
        assert_eq!(BridgeStatus::from_raw(0), BridgeStatus::OK);
    }

    #[test]
    fn test_unknown_status_message() {
        let status = BridgeStatus::from_raw(-42);
        assert_eq!(status.message().to_str().unwrap(), "unknown status");
        assert_eq!(status.as_raw(), -42);
    }

    #[test]
    fn test_display() {
        assert_eq!(BridgeStatus::INVALID_POINTER.to_string(), "invalid pointer");
    }
}
