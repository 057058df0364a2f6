//! Host-side builder for dynamic methods

use super::il::IlStream;
use super::{ExceptionClause, MethodBody, MethodDescriptor, MethodSignature};
use crate::types::TypeRef;
use dynbridge_sdk::BridgeResult;
use std::sync::Arc;

/// Default maximum stack depth for new methods
pub const DEFAULT_MAX_STACK: u32 = 8;

/// A dynamic method under construction
///
/// The descriptor exists from the start (see [`DynamicMethod::descriptor`])
/// but has no body until [`DynamicMethod::finalize`] consumes the builder,
/// so nothing can be emitted after finalization.
///
/// ```ignore
/// let mut method = DynamicMethod::new("Answer", TypeDesc::object("Host"), sig)?;
/// method.il().emit(&[0x1F, 0x2A, 0x2A]);
/// let descriptor = method.finalize()?;
/// ```
#[derive(Debug)]
pub struct DynamicMethod {
    descriptor: Arc<MethodDescriptor>,
    il: IlStream,
    max_stack: u32,
    locals: Vec<TypeRef>,
    init_locals: bool,
    clauses: Vec<ExceptionClause>,
}

impl DynamicMethod {
    /// Start a method
    pub fn new(name: &str, owner: TypeRef, signature: MethodSignature) -> BridgeResult<Self> {
        Ok(DynamicMethod {
            descriptor: Arc::new(MethodDescriptor::new(name, owner, signature)?),
            il: IlStream::new(),
            max_stack: DEFAULT_MAX_STACK,
            locals: Vec::new(),
            init_locals: true,
            clauses: Vec::new(),
        })
    }

    /// Replace the opcode writer (e.g. to control segmenting)
    pub fn with_il_stream(mut self, il: IlStream) -> Self {
        self.il = il;
        self
    }

    /// The descriptor being built; not finalized until `finalize`
    pub fn descriptor(&self) -> Arc<MethodDescriptor> {
        self.descriptor.clone()
    }

    /// Opcode writer
    pub fn il(&mut self) -> &mut IlStream {
        &mut self.il
    }

    /// Append raw opcode bytes
    pub fn emit(&mut self, bytes: &[u8]) -> &mut Self {
        self.il.emit(bytes);
        self
    }

    /// Offset of the next emitted byte (branch targets, clause bounds)
    pub fn offset(&self) -> u32 {
        self.il.offset() as u32
    }

    /// Declare a local; returns its index
    pub fn declare_local(&mut self, ty: TypeRef) -> u32 {
        self.locals.push(ty);
        (self.locals.len() - 1) as u32
    }

    /// Set the maximum stack depth
    pub fn set_max_stack(&mut self, max_stack: u32) -> &mut Self {
        self.max_stack = max_stack;
        self
    }

    /// Zero-initialize locals on entry
    pub fn set_init_locals(&mut self, init_locals: bool) -> &mut Self {
        self.init_locals = init_locals;
        self
    }

    /// Add an exception clause
    pub fn add_clause(&mut self, clause: ExceptionClause) -> &mut Self {
        self.clauses.push(clause);
        self
    }

    /// Install the body and hand out the finished descriptor
    pub fn finalize(self) -> BridgeResult<Arc<MethodDescriptor>> {
        let body = MethodBody::new(
            self.il.into_code(),
            self.max_stack,
            self.locals,
            self.init_locals,
            self.clauses,
        );
        self.descriptor.install_body(body)?;
        Ok(self.descriptor)
    }
}
