//! Error types for the dynbridge ABI

use crate::status::BridgeStatus;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge error types
///
/// Inside Rust these travel as `Result`s. At the native boundary each
/// variant collapses to a [`BridgeStatus`] code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Handle was never issued or has been released
    #[error("Invalid handle: {0:#x}")]
    InvalidHandle(u64),

    /// Header requested for a method whose body is still being built
    #[error("Method '{0}' is not finalized")]
    MethodNotFinalized(String),

    /// Indexed query past the end of a table
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Requested index
        index: i64,
        /// Number of entries
        len: usize,
    },

    /// Instruction pointer outside the method's code
    #[error("Instruction pointer is outside the method body")]
    InvalidPointer,

    /// A second compiler registration
    #[error("A dynamic method compiler is already registered")]
    AlreadyRegistered,

    /// Compile requested before any compiler was registered
    #[error("No dynamic method compiler registered")]
    NoCallbackRegistered,

    /// The interpreter is not part of this build or is switched off
    #[error("Interpreter is not available")]
    InterpreterUnavailable,

    /// The compiler rejected the method
    #[error("Compilation failed: {0}")]
    CompilationFailed(String),

    /// Body installed twice on the same method
    #[error("Method '{0}' is already finalized")]
    AlreadyFinalized(String),

    /// Malformed method metadata (name, clauses, sizes)
    #[error("Invalid method metadata: {0}")]
    InvalidMetadata(String),

    /// Null pointer passed across the boundary
    #[error("Null argument")]
    NullArgument,

    /// Bridge-side failure (e.g. a caught panic)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Whether the host runtime is expected to handle this error by
    /// rejecting the dynamic method, rather than treating it as a protocol
    /// violation by the native caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BridgeError::NoCallbackRegistered | BridgeError::InterpreterUnavailable
        )
    }

    /// Status code for this error
    pub fn status(&self) -> BridgeStatus {
        BridgeStatus::from(self)
    }
}

impl From<&BridgeError> for BridgeStatus {
    fn from(err: &BridgeError) -> Self {
        match err {
            BridgeError::InvalidHandle(_) => BridgeStatus::INVALID_HANDLE,
            BridgeError::MethodNotFinalized(_) => BridgeStatus::METHOD_NOT_FINALIZED,
            BridgeError::IndexOutOfRange { .. } => BridgeStatus::INDEX_OUT_OF_RANGE,
            BridgeError::InvalidPointer => BridgeStatus::INVALID_POINTER,
            BridgeError::AlreadyRegistered => BridgeStatus::ALREADY_REGISTERED,
            BridgeError::NoCallbackRegistered => BridgeStatus::NO_CALLBACK_REGISTERED,
            BridgeError::InterpreterUnavailable => BridgeStatus::INTERPRETER_UNAVAILABLE,
            BridgeError::CompilationFailed(_) => BridgeStatus::COMPILATION_FAILED,
            BridgeError::AlreadyFinalized(_) => BridgeStatus::ALREADY_FINALIZED,
            BridgeError::InvalidMetadata(_) => BridgeStatus::INVALID_METADATA,
            BridgeError::NullArgument => BridgeStatus::NULL_ARGUMENT,
            BridgeError::Internal(_) => BridgeStatus::INTERNAL,
        }
    }
}

impl From<BridgeError> for BridgeStatus {
    fn from(err: BridgeError) -> Self {
        BridgeStatus::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(BridgeError::NoCallbackRegistered.is_recoverable());
        assert!(BridgeError::InterpreterUnavailable.is_recoverable());
        assert!(!BridgeError::InvalidHandle(7).is_recoverable());
        assert!(!BridgeError::InvalidPointer.is_recoverable());
    }

    #[test]
    fn test_error_to_status() {
        assert_eq!(
            BridgeError::IndexOutOfRange { index: 3, len: 1 }.status(),
            BridgeStatus::INDEX_OUT_OF_RANGE
        );
        assert_eq!(
            BridgeError::MethodNotFinalized("m".to_string()).status(),
            BridgeStatus::METHOD_NOT_FINALIZED
        );
        assert_eq!(
            BridgeStatus::from(BridgeError::AlreadyRegistered),
            BridgeStatus::ALREADY_REGISTERED
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            BridgeError::InvalidHandle(0x10).to_string(),
            "Invalid handle: 0x10"
        );
        assert_eq!(
            BridgeError::IndexOutOfRange { index: 1, len: 1 }.to_string(),
            "Index 1 out of range (len 1)"
        );
    }
}
