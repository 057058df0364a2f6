//! Capability gate
//!
//! Dynamic method compilation needs both the `interpreter` cargo feature
//! and [`BridgeConfig::interpreter_enabled`]. When either is off the host
//! runtime gets `InterpreterUnavailable` and no view is ever built.

use crate::config::BridgeConfig;
use crate::method::MethodDescriptor;
use dynbridge_sdk::{BridgeError, BridgeResult, CompiledMethodHandle};
use std::sync::Arc;

#[cfg(feature = "interpreter")]
use crate::config;
#[cfg(feature = "interpreter")]
use crate::dispatch::{self, CompilerSlot};

/// Whether dynamic methods can be handed to the interpreter
pub fn interpreter_available(config: &BridgeConfig) -> bool {
    cfg!(feature = "interpreter") && config.interpreter_enabled
}

/// Compile a dynamic method through the process-wide compiler
#[cfg(feature = "interpreter")]
pub fn compile_dynamic_method(
    method: &Arc<MethodDescriptor>,
) -> BridgeResult<CompiledMethodHandle> {
    compile_dynamic_method_with(config::global(), dispatch::global(), method)
}

/// Compile a dynamic method with an explicit configuration and slot
#[cfg(feature = "interpreter")]
pub fn compile_dynamic_method_with(
    config: &BridgeConfig,
    slot: &CompilerSlot,
    method: &Arc<MethodDescriptor>,
) -> BridgeResult<CompiledMethodHandle> {
    if !interpreter_available(config) {
        tracing::debug!(method = %method.name_lossy(), "interpreter disabled");
        return Err(BridgeError::InterpreterUnavailable);
    }
    slot.compile(method)
}

/// Compile a dynamic method; always unavailable in this build
#[cfg(not(feature = "interpreter"))]
pub fn compile_dynamic_method(
    method: &Arc<MethodDescriptor>,
) -> BridgeResult<CompiledMethodHandle> {
    tracing::debug!(method = %method.name_lossy(), "built without interpreter support");
    Err(BridgeError::InterpreterUnavailable)
}
