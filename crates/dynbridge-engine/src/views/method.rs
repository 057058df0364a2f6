//! Method views

use super::boundary::{check, guard, note_built};
use super::{
    build_header_view, build_signature_view, resolve_cell, HeaderViewRef, MethodViewRef,
    SignatureViewRef, ViewCell, ViewRef,
};
use crate::handles;
use crate::method::MethodDescriptor;
use crate::types;
use dynbridge_sdk::{BridgeError, BridgeResult, BridgeStatus, HeaderView, MethodView, SignatureView};
use std::ffi::CStr;
use std::ptr;
use std::sync::Arc;

/// Handle-table cell behind a [`MethodView`]
pub struct MethodViewCell {
    view: MethodView,
    method: Arc<MethodDescriptor>,
}

impl ViewCell for MethodViewCell {
    type View = MethodView;

    fn view(&self) -> &MethodView {
        &self.view
    }

    fn method(&self) -> &Arc<MethodDescriptor> {
        &self.method
    }
}

/// Build the top-level view over a method.
///
/// Works on methods still under construction; only header views need a
/// finalized body. The caller owns the returned reference.
pub fn build_method_view(method: &Arc<MethodDescriptor>) -> MethodViewRef {
    let owning_type = types::global().intern(method.owner());
    let (handle, cell) = handles::global().register_with(|handle| MethodViewCell {
        view: MethodView {
            name: method.name().as_ptr(),
            owning_type,
            get_signature: method_get_signature,
            get_header: method_get_header,
            backing_handle: handle,
        },
        method: method.clone(),
    });
    note_built(handle);
    tracing::debug!(method = %method.name_lossy(), handle = handle.as_raw(), "built method view");
    ViewRef::new(handle, cell)
}

unsafe extern "C" fn method_get_signature(
    this: *const MethodView,
    out: *mut *const SignatureView,
) -> BridgeStatus {
    guard(|| {
        if out.is_null() {
            return Err(BridgeError::NullArgument);
        }
        let cell = unsafe { resolve_cell::<MethodViewCell>(this)? };
        let signature = build_signature_view(&cell.method);
        unsafe { out.write(signature.into_raw()) };
        Ok(())
    })
}

unsafe extern "C" fn method_get_header(
    this: *const MethodView,
    out: *mut *const HeaderView,
) -> BridgeStatus {
    guard(|| {
        if out.is_null() {
            return Err(BridgeError::NullArgument);
        }
        let cell = unsafe { resolve_cell::<MethodViewCell>(this)? };
        let header = build_header_view(&cell.method)?;
        unsafe { out.write(header.into_raw()) };
        Ok(())
    })
}

impl ViewRef<MethodViewCell> {
    /// Method name
    pub fn name(&self) -> &CStr {
        self.cell().method.name()
    }

    /// Ask the view for its signature, as native code would
    pub fn signature(&self) -> BridgeResult<SignatureViewRef> {
        let mut out = ptr::null();
        check(unsafe { (self.get_signature)(self.as_ptr(), &mut out) })?;
        unsafe { SignatureViewRef::from_raw(out) }
    }

    /// Ask the view for its header, as native code would
    pub fn header(&self) -> BridgeResult<HeaderViewRef> {
        let mut out = ptr::null();
        check(unsafe { (self.get_header)(self.as_ptr(), &mut out) })?;
        unsafe { HeaderViewRef::from_raw(out) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{DynamicMethod, MethodSignature};
    use crate::types::TypeDesc;

    fn method() -> DynamicMethod {
        DynamicMethod::new(
            "Concat",
            TypeDesc::object("Strings"),
            MethodSignature::new(
                TypeDesc::object("System.String"),
                vec![TypeDesc::object("System.String"), TypeDesc::object("System.String")],
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_method_view_fields() {
        let mut builder = method();
        builder.emit(&[0x2A]);
        let descriptor = builder.finalize().unwrap();
        let view = build_method_view(&descriptor);

        assert_eq!(view.name().to_str().unwrap(), "Concat");
        assert_eq!(unsafe { view.as_ptr().as_ref().unwrap().name() }, view.name());
        assert_eq!(view.backing_handle, view.handle());
        let owner = types::global().resolve(view.owning_type).unwrap();
        assert_eq!(owner.name(), "Strings");
    }

    #[test]
    fn test_sub_views_are_independent() {
        let mut builder = method();
        builder.emit(&[0x2A]);
        let view = build_method_view(&builder.finalize().unwrap());

        let signature = view.signature().unwrap();
        let header = view.header().unwrap();
        assert_ne!(signature.handle(), view.handle());
        assert_ne!(header.handle(), signature.handle());

        let signature_handle = signature.handle();
        drop(view);
        assert!(handles::global().is_live(signature_handle));
        assert_eq!(signature.param_count, 2);
        assert_eq!(header.code_size, 1);
    }

    #[test]
    fn test_unfinalized_method() {
        let builder = method();
        let view = build_method_view(&builder.descriptor());

        let signature = view.signature().unwrap();
        assert_eq!(signature.param_count, 2);
        assert!(matches!(
            view.header(),
            Err(BridgeError::MethodNotFinalized(name)) if name == "Concat"
        ));
    }

    #[test]
    fn test_null_out_pointer() {
        let view = build_method_view(&method().descriptor());
        let status = unsafe { (view.get_signature)(view.as_ptr(), ptr::null_mut()) };
        assert_eq!(status, BridgeStatus::NULL_ARGUMENT);
    }

    #[test]
    fn test_forged_view_rejected() {
        let view = build_method_view(&method().descriptor());
        let forged = MethodView { ..*view };
        let mut out = ptr::null();
        let status = unsafe { (view.get_signature)(&forged, &mut out) };
        assert_eq!(status, BridgeStatus::INVALID_HANDLE);
        assert!(out.is_null());
    }

    #[test]
    fn test_released_view_rejected() {
        let view = build_method_view(&method().descriptor());
        let second = view.retain().unwrap();
        handles::global().release(view.handle()).unwrap();
        handles::global().release(view.handle()).unwrap();
        assert!(!view.is_live());

        assert!(matches!(
            view.signature(),
            Err(BridgeError::InvalidHandle(_))
        ));
        assert!(!second.is_live());
    }
}
