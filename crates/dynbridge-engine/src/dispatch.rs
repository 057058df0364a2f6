//! Callback dispatch
//!
//! The host runtime hands a dynamic method to the registered compiler and
//! gets back an opaque compiled-method handle. The compiler runs
//! synchronously on the calling thread and sees the method only through a
//! [`MethodView`](dynbridge_sdk::MethodView).

use crate::config::{self, BridgeConfig};
use crate::method::MethodDescriptor;
use crate::views::{build_method_view, MethodView, MethodViewRef, RequestScope};
use dynbridge_sdk::{BridgeError, BridgeResult, CompiledMethodHandle};
use once_cell::sync::{Lazy, OnceCell};
use std::fmt;
use std::sync::Arc;

/// One compile request
pub struct CompileRequest<'a> {
    descriptor: &'a Arc<MethodDescriptor>,
    view: &'a MethodViewRef,
}

impl<'a> CompileRequest<'a> {
    /// Method being compiled
    pub fn descriptor(&self) -> &'a Arc<MethodDescriptor> {
        self.descriptor
    }

    /// Top-level view; released by dispatch when the compiler returns
    pub fn method_view(&self) -> &'a MethodViewRef {
        self.view
    }

    /// Address of the top-level view, for native compilers
    pub fn view_ptr(&self) -> *const MethodView {
        self.view.as_ptr()
    }
}

/// The interpreter's compile entry point
pub trait DynamicMethodCompiler: Send + Sync {
    /// Compile the requested method.
    ///
    /// A null handle counts as failure.
    fn compile(&self, request: &CompileRequest<'_>) -> BridgeResult<CompiledMethodHandle>;
}

impl<F> DynamicMethodCompiler for F
where
    F: Fn(&CompileRequest<'_>) -> BridgeResult<CompiledMethodHandle> + Send + Sync,
{
    fn compile(&self, request: &CompileRequest<'_>) -> BridgeResult<CompiledMethodHandle> {
        self(request)
    }
}

/// Holds at most one compiler for the life of the slot
pub struct CompilerSlot {
    compiler: OnceCell<Box<dyn DynamicMethodCompiler>>,
    config: BridgeConfig,
}

impl CompilerSlot {
    /// Empty slot with default configuration
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    /// Empty slot with the given configuration
    pub fn with_config(config: BridgeConfig) -> Self {
        CompilerSlot {
            compiler: OnceCell::new(),
            config,
        }
    }

    /// Configuration of this slot
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Install the compiler; a second registration is rejected
    pub fn register(&self, compiler: impl DynamicMethodCompiler + 'static) -> BridgeResult<()> {
        self.compiler
            .set(Box::new(compiler))
            .map_err(|_| BridgeError::AlreadyRegistered)?;
        tracing::info!("dynamic method compiler registered");
        Ok(())
    }

    /// Check if a compiler is installed
    pub fn is_registered(&self) -> bool {
        self.compiler.get().is_some()
    }

    /// Hand `method` to the compiler
    pub fn compile(&self, method: &Arc<MethodDescriptor>) -> BridgeResult<CompiledMethodHandle> {
        let compiler = self
            .compiler
            .get()
            .ok_or(BridgeError::NoCallbackRegistered)?;

        let span = tracing::debug_span!("compile", method = %method.name_lossy());
        let _enter = span.enter();

        let scope = RequestScope::begin();
        let view = build_method_view(method);
        let result = compiler.compile(&CompileRequest {
            descriptor: method,
            view: &view,
        });

        let top = view.handle();
        if let Err(e) = view.release() {
            tracing::warn!(
                handle = top.as_raw(),
                error = %e,
                "compiler released the method view it did not own"
            );
        }

        self.note_leftovers(scope.finish().len());

        let handle = result?;
        if handle.is_null() {
            return Err(BridgeError::CompilationFailed(format!(
                "compiler returned no code for {}",
                method.name_lossy()
            )));
        }
        Ok(handle)
    }
}

impl CompilerSlot {
    /// Log the view handles a request left live; true when over the threshold
    fn note_leftovers(&self, live: usize) -> bool {
        let threshold = self.config.leak_warn_threshold;
        if live > threshold {
            tracing::warn!(live, threshold, "compiler left many view handles live");
            return true;
        }
        tracing::debug!(live, "compiler returned");
        false
    }
}

impl Default for CompilerSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompilerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerSlot")
            .field("registered", &self.is_registered())
            .field("config", &self.config)
            .finish()
    }
}

static GLOBAL: Lazy<CompilerSlot> =
    Lazy::new(|| CompilerSlot::with_config(config::global().clone()));

/// Process-wide compiler slot
pub fn global() -> &'static CompilerSlot {
    &GLOBAL
}

/// Register the process-wide compiler
pub fn register_compiler(compiler: impl DynamicMethodCompiler + 'static) -> BridgeResult<()> {
    global().register(compiler)
}

/// Compile through the process-wide slot, bypassing the capability gate
pub fn compile(method: &Arc<MethodDescriptor>) -> BridgeResult<CompiledMethodHandle> {
    global().compile(method)
}
