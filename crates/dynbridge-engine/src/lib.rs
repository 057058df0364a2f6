//! dynbridge engine
//!
//! Host-runtime side of the descriptor bridge:
//! - **Handles**: reference-counted table of objects native code points at (`handles`)
//! - **Methods**: dynamic method descriptors, bodies and the IL writer (`method`)
//! - **Types**: interned type handles (`types`)
//! - **Views**: fixed-layout views handed to the interpreter (`views`, feature `interpreter`)
//! - **Dispatch**: the registered compiler callback (`dispatch`, feature `interpreter`)
//! - **Gate**: build-time and run-time interpreter switch (`gate`)
//!
//! # Example
//!
//! ```rust,ignore
//! use dynbridge_engine::{gate, DynamicMethod, MethodSignature, TypeDesc};
//!
//! let mut method = DynamicMethod::new(
//!     "Add",
//!     TypeDesc::object("Calc"),
//!     MethodSignature::new(TypeDesc::i32(), vec![TypeDesc::i32(), TypeDesc::i32()]),
//! )?;
//! method.emit(&[0x02, 0x03, 0x58, 0x2A]);
//! let method = method.finalize()?;
//!
//! let compiled = gate::compile_dynamic_method(&method)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Environment-driven configuration
pub mod config;

/// Handle table for objects referenced from native code
pub mod handles;

/// Dynamic method model
pub mod method;

/// Type interning
pub mod types;

/// ABI views over method descriptors
#[cfg(feature = "interpreter")]
pub mod views;

/// Compiler callback registration and dispatch
#[cfg(feature = "interpreter")]
pub mod dispatch;

/// Interpreter capability gate
pub mod gate;

pub use config::BridgeConfig;
pub use handles::HandleTable;
pub use method::{
    DynamicMethod, ExceptionClause, IlCode, IlStream, MethodBody, MethodDescriptor,
    MethodSignature,
};
pub use types::{TypeDesc, TypeInterner, TypeRef, ValueKind};

#[cfg(feature = "interpreter")]
pub use dispatch::{CompileRequest, CompilerSlot, DynamicMethodCompiler};
#[cfg(feature = "interpreter")]
pub use views::{
    build_header_view, build_method_view, build_signature_view, set_last_error, take_last_error,
    HeaderViewRef, MethodViewRef, SignatureViewRef, ViewRef,
};

pub use dynbridge_sdk::{BridgeError, BridgeResult, BridgeStatus};
