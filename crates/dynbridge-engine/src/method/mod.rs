//! Dynamic method descriptors
//!
//! A [`MethodDescriptor`] is the managed object the bridge describes to the
//! interpreter. It is shared through `Arc` so that every view built over it
//! keeps it alive. Its body is installed exactly once; after that the
//! descriptor is immutable and views may hand out pointers into it.

mod builder;
pub mod il;

pub use builder::DynamicMethod;
pub use il::{IlCode, IlStream};

use crate::types::TypeRef;
use dynbridge_sdk::{BridgeError, BridgeResult, ClauseKind};
use once_cell::sync::OnceCell;
use std::borrow::Cow;
use std::ffi::{CStr, CString};

/// Parameter and return types of a method
#[derive(Debug, Clone)]
pub struct MethodSignature {
    /// Return type (`void` for none)
    pub return_type: TypeRef,
    /// Declared parameters, excluding `this`
    pub params: Vec<TypeRef>,
    /// Instance method
    pub has_this: bool,
}

impl MethodSignature {
    /// Static method signature
    pub fn new(return_type: TypeRef, params: Vec<TypeRef>) -> Self {
        MethodSignature {
            return_type,
            params,
            has_this: false,
        }
    }

    /// Mark as an instance method
    pub fn with_this(mut self) -> Self {
        self.has_this = true;
        self
    }
}

/// Protected region and its handler
#[derive(Debug, Clone)]
pub struct ExceptionClause {
    /// Handler kind
    pub kind: ClauseKind,
    /// Start of the protected region
    pub try_offset: u32,
    /// Length of the protected region
    pub try_length: u32,
    /// Start of the handler
    pub handler_offset: u32,
    /// Length of the handler
    pub handler_length: u32,
    /// Caught type, for `Catch` clauses
    pub catch_type: Option<TypeRef>,
}

/// Finalized body of a dynamic method
#[derive(Debug)]
pub struct MethodBody {
    code: IlCode,
    max_stack: u32,
    locals: Vec<TypeRef>,
    init_locals: bool,
    clauses: Vec<ExceptionClause>,
}

impl MethodBody {
    /// Assemble a body
    pub fn new(
        code: IlCode,
        max_stack: u32,
        locals: Vec<TypeRef>,
        init_locals: bool,
        clauses: Vec<ExceptionClause>,
    ) -> Self {
        MethodBody {
            code,
            max_stack,
            locals,
            init_locals,
            clauses,
        }
    }

    /// Opcode bytes
    pub fn code(&self) -> &IlCode {
        &self.code
    }

    /// Maximum evaluation stack depth
    pub fn max_stack(&self) -> u32 {
        self.max_stack
    }

    /// Local variable types
    pub fn locals(&self) -> &[TypeRef] {
        &self.locals
    }

    /// Zero-initialize locals
    pub fn init_locals(&self) -> bool {
        self.init_locals
    }

    /// Exception clauses
    pub fn clauses(&self) -> &[ExceptionClause] {
        &self.clauses
    }

    /// Check that every count fits the `i32` view fields and every clause
    /// lies inside the code
    pub fn validate(&self) -> BridgeResult<()> {
        let code_len = self.code.len();
        for (what, n) in [
            ("code size", code_len),
            ("max stack", self.max_stack as usize),
            ("local count", self.locals.len()),
            ("clause count", self.clauses.len()),
        ] {
            if n > i32::MAX as usize {
                return Err(BridgeError::InvalidMetadata(format!(
                    "{} {} does not fit in i32",
                    what, n
                )));
            }
        }

        for (i, clause) in self.clauses.iter().enumerate() {
            let try_end = clause.try_offset as u64 + clause.try_length as u64;
            let handler_end = clause.handler_offset as u64 + clause.handler_length as u64;
            if try_end > code_len as u64 || handler_end > code_len as u64 {
                return Err(BridgeError::InvalidMetadata(format!(
                    "clause {} extends past the end of the code ({} bytes)",
                    i, code_len
                )));
            }
            if clause.kind == ClauseKind::Catch && clause.catch_type.is_none() {
                return Err(BridgeError::InvalidMetadata(format!(
                    "catch clause {} has no catch type",
                    i
                )));
            }
        }
        Ok(())
    }
}

/// A dynamically synthesized method
///
/// Identity and signature are fixed at creation. The body is installed once
/// by [`MethodDescriptor::install_body`] (usually through
/// [`DynamicMethod::finalize`]); until then the method is under
/// construction and header views over it fail.
#[derive(Debug)]
pub struct MethodDescriptor {
    name: CString,
    owner: TypeRef,
    signature: MethodSignature,
    body: OnceCell<MethodBody>,
}

impl MethodDescriptor {
    /// Create a descriptor without a body
    pub fn new(name: &str, owner: TypeRef, signature: MethodSignature) -> BridgeResult<Self> {
        let name = CString::new(name).map_err(|_| {
            BridgeError::InvalidMetadata(format!("method name {:?} contains NUL", name))
        })?;
        if signature.params.len() > i32::MAX as usize {
            return Err(BridgeError::InvalidMetadata(
                "parameter count does not fit in i32".to_string(),
            ));
        }
        Ok(MethodDescriptor {
            name,
            owner,
            signature,
            body: OnceCell::new(),
        })
    }

    /// Method name as a C string
    pub fn name(&self) -> &CStr {
        &self.name
    }

    /// Method name for diagnostics
    pub fn name_lossy(&self) -> Cow<'_, str> {
        self.name.to_string_lossy()
    }

    /// Declaring type
    pub fn owner(&self) -> &TypeRef {
        &self.owner
    }

    /// Signature
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Body, once finalized
    pub fn body(&self) -> Option<&MethodBody> {
        self.body.get()
    }

    /// Body, or `MethodNotFinalized`
    pub fn finalized_body(&self) -> BridgeResult<&MethodBody> {
        self.body
            .get()
            .ok_or_else(|| BridgeError::MethodNotFinalized(self.name_lossy().into_owned()))
    }

    /// Check if the body has been installed
    pub fn is_finalized(&self) -> bool {
        self.body.get().is_some()
    }

    /// Validate and install the body
    pub fn install_body(&self, body: MethodBody) -> BridgeResult<()> {
        body.validate()?;
        self.body
            .set(body)
            .map_err(|_| BridgeError::AlreadyFinalized(self.name_lossy().into_owned()))?;
        tracing::debug!(method = %self.name_lossy(), "method finalized");
        Ok(())
    }
}
