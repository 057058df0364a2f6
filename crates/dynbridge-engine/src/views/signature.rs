//! Signature views

use super::boundary::{check, guard, note_built};
use super::{checked_index, resolve_cell, SignatureViewRef, ViewCell, ViewRef};
use crate::handles;
use crate::method::MethodDescriptor;
use crate::types;
use dynbridge_sdk::{BridgeError, BridgeResult, BridgeStatus, SignatureView, TypeHandle};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Handle-table cell behind a [`SignatureView`]
pub struct SignatureViewCell {
    view: SignatureView,
    method: Arc<MethodDescriptor>,
    return_type: OnceCell<TypeHandle>,
}

impl ViewCell for SignatureViewCell {
    type View = SignatureView;

    fn view(&self) -> &SignatureView {
        &self.view
    }

    fn method(&self) -> &Arc<MethodDescriptor> {
        &self.method
    }
}

/// Build a signature view; the caller owns the returned reference
pub fn build_signature_view(method: &Arc<MethodDescriptor>) -> SignatureViewRef {
    let signature = method.signature();
    let (handle, cell) = handles::global().register_with(|handle| SignatureViewCell {
        view: SignatureView {
            param_count: signature.params.len() as i32,
            has_this: signature.has_this as u8,
            get_return_type: signature_get_return_type,
            get_param_type: signature_get_param_type,
            backing_handle: handle,
        },
        method: method.clone(),
        return_type: OnceCell::new(),
    });
    note_built(handle);
    tracing::trace!(
        method = %method.name_lossy(),
        handle = handle.as_raw(),
        "built signature view"
    );
    ViewRef::new(handle, cell)
}

unsafe extern "C" fn signature_get_return_type(
    this: *const SignatureView,
    out: *mut TypeHandle,
) -> BridgeStatus {
    guard(|| {
        if out.is_null() {
            return Err(BridgeError::NullArgument);
        }
        let cell = unsafe { resolve_cell::<SignatureViewCell>(this)? };
        let ty = *cell
            .return_type
            .get_or_init(|| types::global().intern(&cell.method.signature().return_type));
        unsafe { out.write(ty) };
        Ok(())
    })
}

unsafe extern "C" fn signature_get_param_type(
    this: *const SignatureView,
    index: i32,
    out: *mut TypeHandle,
) -> BridgeStatus {
    guard(|| {
        if out.is_null() {
            return Err(BridgeError::NullArgument);
        }
        let cell = unsafe { resolve_cell::<SignatureViewCell>(this)? };
        let params = &cell.method.signature().params;
        let index = checked_index(index, params.len())?;
        unsafe { out.write(types::global().intern(&params[index])) };
        Ok(())
    })
}

impl ViewRef<SignatureViewCell> {
    /// Return type handle
    pub fn return_type(&self) -> BridgeResult<TypeHandle> {
        let mut out = TypeHandle::NULL;
        check(unsafe { (self.get_return_type)(self.as_ptr(), &mut out) })?;
        Ok(out)
    }

    /// Handle of parameter `index` (excluding `this`)
    pub fn param_type(&self, index: i32) -> BridgeResult<TypeHandle> {
        let mut out = TypeHandle::NULL;
        check(unsafe { (self.get_param_type)(self.as_ptr(), index, &mut out) })?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::MethodSignature;
    use crate::types::TypeDesc;

    fn descriptor(signature: MethodSignature) -> Arc<MethodDescriptor> {
        Arc::new(MethodDescriptor::new("Sig", TypeDesc::object("Host"), signature).unwrap())
    }

    #[test]
    fn test_signature_fields() {
        let signature =
            MethodSignature::new(TypeDesc::f64(), vec![TypeDesc::f64(), TypeDesc::bool()]);
        let view = build_signature_view(&descriptor(signature.with_this()));
        assert_eq!(view.param_count, 2);
        assert!(view.has_this());
        assert_eq!(view.backing_handle, view.handle());
    }

    #[test]
    fn test_return_type_is_stable() {
        let view = build_signature_view(&descriptor(MethodSignature::new(
            TypeDesc::i64(),
            vec![],
        )));
        let first = view.return_type().unwrap();
        let second = view.return_type().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, types::global().intern(&TypeDesc::i64()));
    }

    #[test]
    fn test_param_types() {
        let view = build_signature_view(&descriptor(MethodSignature::new(
            TypeDesc::void(),
            vec![TypeDesc::i32(), TypeDesc::object("System.String")],
        )));
        let p1 = types::global().resolve(view.param_type(1).unwrap()).unwrap();
        assert_eq!(p1.name(), "System.String");

        assert!(matches!(
            view.param_type(2),
            Err(BridgeError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            view.param_type(-1),
            Err(BridgeError::IndexOutOfRange { index: -1, .. })
        ));
    }

    #[test]
    fn test_no_params() {
        let signature = MethodSignature::new(TypeDesc::void(), vec![]);
        let view = build_signature_view(&descriptor(signature));
        assert_eq!(view.param_count, 0);
        assert!(!view.has_this());
        assert!(view.param_type(0).is_err());
    }
}
