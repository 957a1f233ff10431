// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Thread-local last error message and panic containment.

use std::cell::RefCell;
use std::ffi::{c_char, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use super::types::StatusCode;
use crate::engine::InferenceError;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Record `message` as this thread's last error.
pub fn set_last_error(message: impl Into<String>) {
    let mut bytes = message.into().into_bytes();
    bytes.retain(|b| *b != 0);
    let message = CString::new(bytes).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// This thread's last error as an owned string, for Rust callers and tests.
pub fn last_error() -> Option<String> {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|m| m.to_string_lossy().into_owned())
    })
}

/// Store `error` as the last error and return its status code.
pub(crate) fn report(operation: &'static str, error: &InferenceError) -> StatusCode {
    let status = StatusCode::from(error);
    if error.is_caller_error() {
        tracing::warn!(operation, status = status.code(), error = %error, "Call rejected");
    } else {
        tracing::error!(operation, status = status.code(), error = %error, "Call failed");
    }
    set_last_error(error.to_string());
    status
}

/// Run `f`, turning a panic into `Err(StatusCode::Internal)`.
pub(crate) fn contain<T>(operation: &'static str, f: impl FnOnce() -> T) -> Result<T, StatusCode> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(operation, panic = %detail, "Panic contained at boundary");
        set_last_error(format!("internal error in {}: {}", operation, detail));
        StatusCode::Internal
    })
}

/// Last error message of the calling thread, or null if none.
///
/// The pointer stays valid until the next call on this thread that sets or
/// clears the error.
#[no_mangle]
pub extern "C" fn monoinfer_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(ptr::null(), |m| m.as_ptr())
    })
}

/// Clear the calling thread's last error.
#[no_mangle]
pub extern "C" fn monoinfer_clear_last_error() {
    clear_last_error();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_set_and_clear() {
        set_last_error("boom");
        assert_eq!(last_error().as_deref(), Some("boom"));
        let raw = monoinfer_last_error();
        assert!(!raw.is_null());
        assert_eq!(unsafe { CStr::from_ptr(raw) }.to_str().unwrap(), "boom");
        monoinfer_clear_last_error();
        assert!(monoinfer_last_error().is_null());
    }

    #[test]
    fn test_interior_nul_stripped() {
        set_last_error("a\0b");
        assert_eq!(last_error().as_deref(), Some("ab"));
    }

    #[test]
    fn test_errors_are_per_thread() {
        set_last_error("main");
        std::thread::spawn(|| assert!(last_error().is_none()))
            .join()
            .unwrap();
        assert_eq!(last_error().as_deref(), Some("main"));
    }

    #[test]
    fn test_contain_catches_panic() {
        let result: Result<(), StatusCode> = contain("test", || panic!("kaboom"));
        assert_eq!(result, Err(StatusCode::Internal));
        assert!(last_error().unwrap().contains("kaboom"));
        assert_eq!(contain("test", || 5), Ok(5));
    }
}
