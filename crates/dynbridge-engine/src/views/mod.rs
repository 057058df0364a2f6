//! View builder
//!
//! Builds the fixed-layout [`MethodView`], [`SignatureView`] and
//! [`HeaderView`] over a [`MethodDescriptor`] and wires their function
//! pointers back into the bridge.
//!
//! Each view lives inside a *cell* registered in the global handle table;
//! the cell also holds an `Arc` of the descriptor (and, for headers, a
//! contiguous copy of fragmented code). The view's `backing_handle` is the
//! cell's handle, so the view's address stays valid exactly as long as that
//! handle has references. Callbacks never trust the `this` pointer alone:
//! they resolve the cell through the handle table and check the address.
//!
//! Rust code holds views through [`ViewRef`], which owns one reference and
//! releases it on drop. Native code owns the references it receives from
//! `get_signature`/`get_header` and gives them back with
//! `dynbridge_handle_release`.

mod boundary;
mod header;
mod method;
mod signature;

pub use boundary::{set_last_error, take_last_error};
pub use header::{build_header_view, HeaderViewCell};
pub use method::{build_method_view, MethodViewCell};
pub use signature::{build_signature_view, SignatureViewCell};

pub(crate) use boundary::RequestScope;

use crate::handles;
use crate::method::MethodDescriptor;
use dynbridge_sdk::{BackingHandle, BridgeError, BridgeResult, View};
use std::fmt;
use std::ops::Deref;
use std::ptr;
use std::sync::Arc;

pub use dynbridge_sdk::{HeaderView, MethodView, SignatureView};

/// Owned reference to a method view
pub type MethodViewRef = ViewRef<MethodViewCell>;
/// Owned reference to a signature view
pub type SignatureViewRef = ViewRef<SignatureViewCell>;
/// Owned reference to a header view
pub type HeaderViewRef = ViewRef<HeaderViewCell>;

/// Handle-table object holding one view and what it points into
pub trait ViewCell: Send + Sync + 'static {
    /// The ABI view inside the cell
    type View: View;

    /// The view
    fn view(&self) -> &Self::View;

    /// The descriptor the view describes
    fn method(&self) -> &Arc<MethodDescriptor>;
}

/// One counted reference to a view.
///
/// Dropping it releases the reference. The view stays readable through
/// `Deref` for as long as the `ViewRef` exists, but its callbacks fail with
/// `InvalidHandle` once the handle itself is no longer live.
pub struct ViewRef<C: ViewCell> {
    cell: Arc<C>,
    handle: BackingHandle,
    owned: bool,
}

impl<C: ViewCell> ViewRef<C> {
    pub(crate) fn new(handle: BackingHandle, cell: Arc<C>) -> Self {
        ViewRef {
            cell,
            handle,
            owned: true,
        }
    }

    pub(crate) fn cell(&self) -> &Arc<C> {
        &self.cell
    }

    /// Backing handle of the view
    pub fn handle(&self) -> BackingHandle {
        self.handle
    }

    /// Address handed to native code
    pub fn as_ptr(&self) -> *const C::View {
        self.cell.view() as *const C::View
    }

    /// The descriptor behind the view
    pub fn descriptor(&self) -> &Arc<MethodDescriptor> {
        self.cell.method()
    }

    /// Whether the backing handle is still live
    pub fn is_live(&self) -> bool {
        handles::global().is_live(self.handle)
    }

    /// Take another reference to the same view
    pub fn retain(&self) -> BridgeResult<Self> {
        handles::global().retain(self.handle)?;
        Ok(ViewRef::new(self.handle, self.cell.clone()))
    }

    /// Give the reference back, reporting a dead handle
    pub fn release(mut self) -> BridgeResult<()> {
        self.owned = false;
        handles::global().release(self.handle)
    }

    /// Hand the reference to native code, which must release it
    pub fn into_raw(mut self) -> *const C::View {
        self.owned = false;
        self.as_ptr()
    }

    /// Adopt a reference previously handed out with [`ViewRef::into_raw`]
    /// or written by a `get_signature`/`get_header` callback.
    ///
    /// # Safety
    /// `ptr` must be null or point to a view of this kind whose backing
    /// handle has not been released.
    pub unsafe fn from_raw(ptr: *const C::View) -> BridgeResult<Self> {
        let cell = resolve_cell::<C>(ptr)?;
        let handle = cell.view().backing_handle();
        Ok(ViewRef::new(handle, cell))
    }
}

impl<C: ViewCell> Deref for ViewRef<C> {
    type Target = C::View;

    fn deref(&self) -> &Self::Target {
        self.cell.view()
    }
}

impl<C: ViewCell> Drop for ViewRef<C> {
    fn drop(&mut self) {
        if self.owned {
            if let Err(e) = handles::global().release(self.handle) {
                tracing::trace!(handle = self.handle.as_raw(), error = %e, "view already released");
            }
        }
    }
}

impl<C: ViewCell> fmt::Debug for ViewRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRef")
            .field("handle", &self.handle.as_raw())
            .field("method", &self.cell.method().name_lossy())
            .field("owned", &self.owned)
            .finish()
    }
}

/// Find the cell behind a view pointer received from native code.
///
/// # Safety
/// `this` must be null or point to readable memory laid out as `C::View`.
pub(crate) unsafe fn resolve_cell<C: ViewCell>(this: *const C::View) -> BridgeResult<Arc<C>> {
    if this.is_null() {
        return Err(BridgeError::NullArgument);
    }
    let handle = (*this).backing_handle();
    let cell = handles::global().resolve_as::<C>(handle)?;
    if !ptr::eq(cell.view(), this) {
        tracing::warn!(
            handle = handle.as_raw(),
            "view address does not match its backing handle"
        );
        return Err(BridgeError::InvalidHandle(handle.as_raw()));
    }
    Ok(cell)
}

/// Bounds-check an index received from native code
pub(crate) fn checked_index(index: i32, len: usize) -> BridgeResult<usize> {
    if index < 0 || index as usize >= len {
        return Err(BridgeError::IndexOutOfRange {
            index: index as i64,
            len,
        });
    }
    Ok(index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{DynamicMethod, MethodSignature};
    use crate::types::TypeDesc;

    fn finalized() -> Arc<MethodDescriptor> {
        let mut method = DynamicMethod::new(
            "Square",
            TypeDesc::object("Math"),
            MethodSignature::new(TypeDesc::i32(), vec![TypeDesc::i32()]),
        )
        .unwrap();
        method.emit(&[0x02, 0x02, 0x5A, 0x2A]);
        method.finalize().unwrap()
    }

    #[test]
    fn test_checked_index() {
        assert_eq!(checked_index(0, 1).unwrap(), 0);
        assert!(matches!(
            checked_index(1, 1),
            Err(BridgeError::IndexOutOfRange { index: 1, len: 1 })
        ));
        assert!(matches!(
            checked_index(-1, 4),
            Err(BridgeError::IndexOutOfRange { index: -1, len: 4 })
        ));
    }

    #[test]
    fn test_drop_releases() {
        let view = build_method_view(&finalized());
        let handle = view.handle();
        assert!(handles::global().is_live(handle));
        drop(view);
        assert!(!handles::global().is_live(handle));
    }

    #[test]
    fn test_retain_and_release() {
        let view = build_method_view(&finalized());
        let second = view.retain().unwrap();
        assert_eq!(handles::global().ref_count(view.handle()), 2);

        let handle = view.handle();
        view.release().unwrap();
        assert!(second.is_live());
        drop(second);
        assert!(!handles::global().is_live(handle));
    }

    #[test]
    fn test_into_raw_from_raw() {
        let view = build_signature_view(&finalized());
        let handle = view.handle();
        let raw = view.into_raw();
        assert!(handles::global().is_live(handle));

        let adopted = unsafe { SignatureViewRef::from_raw(raw) }.unwrap();
        assert_eq!(adopted.handle(), handle);
        assert_eq!(adopted.param_count, 1);
        drop(adopted);
        assert!(!handles::global().is_live(handle));
    }

    #[test]
    fn test_from_raw_null() {
        let result = unsafe { HeaderViewRef::from_raw(ptr::null()) };
        assert!(matches!(result, Err(BridgeError::NullArgument)));
    }

    #[test]
    fn test_descriptor_outlives_caller() {
        let descriptor = finalized();
        let weak = Arc::downgrade(&descriptor);
        let header = build_header_view(&descriptor).unwrap();
        drop(descriptor);

        assert!(weak.upgrade().is_some());
        assert_eq!(header.code().unwrap(), &[0x02, 0x02, 0x5A, 0x2A]);
        drop(header);
        assert!(weak.upgrade().is_none());
    }
}
