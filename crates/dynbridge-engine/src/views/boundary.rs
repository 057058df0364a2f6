//! Native-call boundary helpers
//!
//! View callbacks return a bare [`BridgeStatus`]. The full error is kept in
//! a per-thread slot so Rust callers (and `dynbridge_last_error_message`)
//! can recover the details after a failed call.

use crate::handles;
use dynbridge_sdk::{BackingHandle, BridgeError, BridgeResult, BridgeStatus};
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

thread_local! {
    static LAST_ERROR: RefCell<Option<BridgeError>> = const { RefCell::new(None) };
    static REQUEST_LOG: RefCell<Option<Vec<BackingHandle>>> = const { RefCell::new(None) };
}

/// Store `err` as this thread's last error and return its status
pub fn set_last_error(err: BridgeError) -> BridgeStatus {
    let status = err.status();
    tracing::debug!(status = %status, error = %err, "bridge call failed");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err));
    status
}

/// Take the error recorded by the last failed call on this thread
pub fn take_last_error() -> Option<BridgeError> {
    LAST_ERROR.with(|slot| slot.borrow_mut().take())
}

/// Recover the error behind a failed status
pub(crate) fn error_for(status: BridgeStatus) -> BridgeError {
    match take_last_error() {
        Some(err) if err.status() == status => err,
        _ => BridgeError::Internal(format!("callback failed with status {}", status.as_raw())),
    }
}

/// Turn a callback status back into a result
pub(crate) fn check(status: BridgeStatus) -> BridgeResult<()> {
    if status.is_ok() {
        Ok(())
    } else {
        Err(error_for(status))
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run a callback body, converting errors and panics into a status.
///
/// Panics must not unwind into native frames.
pub(crate) fn guard<F>(f: F) -> BridgeStatus
where
    F: FnOnce() -> BridgeResult<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => BridgeStatus::OK,
        Ok(Err(err)) => set_last_error(err),
        Err(panic) => set_last_error(BridgeError::Internal(format!(
            "panic in view callback: {}",
            panic_message(panic)
        ))),
    }
}

/// Note a view built on this thread, for the enclosing compile request
pub(crate) fn note_built(handle: BackingHandle) {
    REQUEST_LOG.with(|log| {
        if let Some(log) = log.borrow_mut().as_mut() {
            log.push(handle);
        }
    });
}

/// Tracks the views built on this thread while a compile request runs
pub(crate) struct RequestScope {
    previous: Option<Vec<BackingHandle>>,
    finished: bool,
}

impl RequestScope {
    pub(crate) fn begin() -> Self {
        let previous = REQUEST_LOG.with(|log| log.borrow_mut().replace(Vec::new()));
        RequestScope {
            previous,
            finished: false,
        }
    }

    /// Close the scope; returns the views built in it that are still live
    pub(crate) fn finish(mut self) -> Vec<BackingHandle> {
        self.finished = true;
        let previous = self.previous.take();
        let built = REQUEST_LOG.with(|log| std::mem::replace(&mut *log.borrow_mut(), previous));
        let table = handles::global();
        built
            .unwrap_or_default()
            .into_iter()
            .filter(|h| table.is_live(*h))
            .collect()
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        if !self.finished {
            let previous = self.previous.take();
            REQUEST_LOG.with(|log| *log.borrow_mut() = previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_ok() {
        assert_eq!(guard(|| Ok(())), BridgeStatus::OK);
    }

    #[test]
    fn test_guard_records_error() {
        let status = guard(|| Err(BridgeError::IndexOutOfRange { index: 3, len: 1 }));
        assert_eq!(status, BridgeStatus::INDEX_OUT_OF_RANGE);
        assert!(matches!(
            take_last_error(),
            Some(BridgeError::IndexOutOfRange { index: 3, len: 1 })
        ));
        assert!(take_last_error().is_none());
    }

    #[test]
    fn test_guard_catches_panic() {
        let status = guard(|| panic!("boom"));
        assert_eq!(status, BridgeStatus::INTERNAL);
        match take_last_error() {
            Some(BridgeError::Internal(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_for_mismatched_status() {
        set_last_error(BridgeError::NullArgument);
        let err = error_for(BridgeStatus::INVALID_POINTER);
        assert!(matches!(err, BridgeError::Internal(_)));
    }

    #[test]
    fn test_request_scope_filters_released() {
        let table = handles::global();
        let scope = RequestScope::begin();
        let kept = table.register(std::sync::Arc::new(1u8));
        let gone = table.register(std::sync::Arc::new(2u8));
        note_built(kept);
        note_built(gone);
        table.release(gone).unwrap();

        assert_eq!(scope.finish(), vec![kept]);
        table.release(kept).unwrap();
    }

    #[test]
    fn test_request_scope_nests() {
        let table = handles::global();
        let outer = RequestScope::begin();
        let a = table.register(std::sync::Arc::new(1u8));
        note_built(a);
        {
            let inner = RequestScope::begin();
            let b = table.register(std::sync::Arc::new(2u8));
            note_built(b);
            assert_eq!(inner.finish(), vec![b]);
            table.release(b).unwrap();
        }
        assert_eq!(outer.finish(), vec![a]);
        table.release(a).unwrap();
    }
}
