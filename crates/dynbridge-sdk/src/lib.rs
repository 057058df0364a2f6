//! dynbridge SDK - ABI shared with native interpreters
//!
//! This crate holds the types both sides of the descriptor bridge agree on:
//! the fixed-layout method, signature and header views, the callback
//! signatures stored in them, the opaque handle types and the status codes
//! callbacks return. It has no runtime behavior of its own; the managed side
//! lives in `dynbridge-engine`.
//!
//! # Walking a method view (C)
//!
//! ```c
//! const SignatureView* sig = NULL;
//! if (view->get_signature(view, &sig) != 0) return NULL;
//! const HeaderView* header = NULL;
//! if (view->get_header(view, &header) != 0) return NULL;
//! const uint8_t* code = header->get_code(header);
//! // ... translate header->code_size bytes ...
//! dynbridge_handle_release(sig->backing_handle);
//! dynbridge_handle_release(header->backing_handle);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod handle;
pub mod status;
pub mod view;

pub use error::{BridgeError, BridgeResult};
pub use handle::{BackingHandle, CompiledMethodHandle, TypeHandle};
pub use status::BridgeStatus;
pub use view::{
    ClauseKind, ExceptionClauseView, GetClauseFn, GetCodeFn, GetHeaderFn, GetIpOffsetFn,
    GetLocalTypeFn, GetParamTypeFn, GetReturnTypeFn, GetSignatureFn, HeaderView, MethodView,
    SignatureView, View,
};
