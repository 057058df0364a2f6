//! Header views
//!
//! A header view exposes the finalized body. Contiguous code is handed out
//! in place; fragmented code is copied once into the cell when the view is
//! built, and every `get_code` call on that view returns the same copy.

use super::boundary::{check, error_for, guard, note_built, take_last_error};
use super::{checked_index, resolve_cell, HeaderViewRef, ViewCell, ViewRef};
use crate::handles;
use crate::method::{ExceptionClause, MethodBody, MethodDescriptor};
use crate::types;
use dynbridge_sdk::{
    BridgeError, BridgeResult, BridgeStatus, ExceptionClauseView, HeaderView, TypeHandle,
};
use std::ptr;
use std::slice;
use std::sync::Arc;

/// Handle-table cell behind a [`HeaderView`]
pub struct HeaderViewCell {
    view: HeaderView,
    method: Arc<MethodDescriptor>,
    materialized: Option<Box<[u8]>>,
}

impl HeaderViewCell {
    fn body(&self) -> BridgeResult<&MethodBody> {
        self.method.finalized_body()
    }

    fn code(&self) -> BridgeResult<&[u8]> {
        if let Some(copy) = &self.materialized {
            return Ok(copy);
        }
        self.body()?.code().as_contiguous().ok_or_else(|| {
            BridgeError::Internal("fragmented body without a contiguous copy".to_string())
        })
    }

    /// Check if `get_code` hands out a copy rather than the body itself
    pub fn is_materialized(&self) -> bool {
        self.materialized.is_some()
    }
}

impl ViewCell for HeaderViewCell {
    type View = HeaderView;

    fn view(&self) -> &HeaderView {
        &self.view
    }

    fn method(&self) -> &Arc<MethodDescriptor> {
        &self.method
    }
}

/// Build a header view over a finalized method.
///
/// Fails with `MethodNotFinalized` while the body is still being emitted.
pub fn build_header_view(method: &Arc<MethodDescriptor>) -> BridgeResult<HeaderViewRef> {
    let body = method.finalized_body()?;
    let code = body.code();
    let materialized = match code.as_contiguous() {
        Some(_) => None,
        None => Some(code.to_contiguous()),
    };

    let copied = materialized.is_some();
    let (handle, cell) = handles::global().register_with(|handle| HeaderViewCell {
        view: HeaderView {
            code_size: code.len() as i32,
            max_stack: body.max_stack() as i32,
            local_count: body.locals().len() as i32,
            clause_count: body.clauses().len() as i32,
            init_locals: body.init_locals() as u8,
            get_local_type: header_get_local_type,
            get_code: header_get_code,
            get_ip_offset: header_get_ip_offset,
            get_clause: header_get_clause,
            backing_handle: handle,
        },
        method: method.clone(),
        materialized,
    });
    note_built(handle);
    tracing::trace!(
        method = %method.name_lossy(),
        handle = handle.as_raw(),
        copied,
        "built header view"
    );
    Ok(ViewRef::new(handle, cell))
}

fn clause_view(clause: &ExceptionClause) -> ExceptionClauseView {
    ExceptionClauseView {
        kind: clause.kind.as_raw(),
        try_offset: clause.try_offset,
        try_length: clause.try_length,
        handler_offset: clause.handler_offset,
        handler_length: clause.handler_length,
        catch_type: clause
            .catch_type
            .as_ref()
            .map_or(TypeHandle::NULL, |ty| types::global().intern(ty)),
    }
}

unsafe extern "C" fn header_get_local_type(
    this: *const HeaderView,
    index: i32,
    out: *mut TypeHandle,
) -> BridgeStatus {
    guard(|| {
        if out.is_null() {
            return Err(BridgeError::NullArgument);
        }
        let cell = unsafe { resolve_cell::<HeaderViewCell>(this)? };
        let locals = cell.body()?.locals();
        let index = checked_index(index, locals.len())?;
        unsafe { out.write(types::global().intern(&locals[index])) };
        Ok(())
    })
}

unsafe extern "C" fn header_get_code(this: *const HeaderView) -> *const u8 {
    let mut code = ptr::null();
    guard(|| {
        let cell = unsafe { resolve_cell::<HeaderViewCell>(this)? };
        code = cell.code()?.as_ptr();
        Ok(())
    });
    code
}

unsafe extern "C" fn header_get_ip_offset(
    this: *const HeaderView,
    ip: *const u8,
    out: *mut i32,
) -> BridgeStatus {
    guard(|| {
        if out.is_null() {
            return Err(BridgeError::NullArgument);
        }
        let cell = unsafe { resolve_cell::<HeaderViewCell>(this)? };
        let code = cell.code()?;
        let start = code.as_ptr() as usize;
        let ip = ip as usize;
        if ip < start || ip >= start + code.len() {
            return Err(BridgeError::InvalidPointer);
        }
        unsafe { out.write((ip - start) as i32) };
        Ok(())
    })
}

unsafe extern "C" fn header_get_clause(
    this: *const HeaderView,
    index: i32,
    out: *mut ExceptionClauseView,
) -> BridgeStatus {
    guard(|| {
        if out.is_null() {
            return Err(BridgeError::NullArgument);
        }
        let cell = unsafe { resolve_cell::<HeaderViewCell>(this)? };
        let clauses = cell.body()?.clauses();
        let index = checked_index(index, clauses.len())?;
        unsafe { out.write(clause_view(&clauses[index])) };
        Ok(())
    })
}

impl ViewRef<HeaderViewCell> {
    /// The code bytes, as native code sees them
    pub fn code(&self) -> BridgeResult<&[u8]> {
        // Stale errors must not be mistaken for this call's failure
        take_last_error();
        let ptr = unsafe { (self.get_code)(self.as_ptr()) };
        if ptr.is_null() {
            return Err(take_last_error()
                .unwrap_or_else(|| error_for(BridgeStatus::INTERNAL)));
        }
        Ok(unsafe { slice::from_raw_parts(ptr, self.code_size as usize) })
    }

    /// Type handle of local `index`
    pub fn local_type(&self, index: i32) -> BridgeResult<TypeHandle> {
        let mut out = TypeHandle::NULL;
        check(unsafe { (self.get_local_type)(self.as_ptr(), index, &mut out) })?;
        Ok(out)
    }

    /// Offset of `ip` from the start of the code
    pub fn ip_offset(&self, ip: *const u8) -> BridgeResult<i32> {
        let mut out = 0;
        check(unsafe { (self.get_ip_offset)(self.as_ptr(), ip, &mut out) })?;
        Ok(out)
    }

    /// Exception clause `index`
    pub fn clause(&self, index: i32) -> BridgeResult<ExceptionClauseView> {
        let mut out = ExceptionClauseView::default();
        check(unsafe { (self.get_clause)(self.as_ptr(), index, &mut out) })?;
        Ok(out)
    }

    /// Check if the code is a copy of a fragmented body
    pub fn is_materialized(&self) -> bool {
        self.cell().is_materialized()
    }
}
