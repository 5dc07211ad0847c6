//! Last-error channel for the C ABI
//!
//! C hosts cannot receive a `Result`, so every `pyfunc_*` entry point returns
//! a status code and parks the error here, per thread, until the host picks
//! it up:
//!
//! ```ignore
//! if (pyfunc_command(py, argc, argv, &store) != PYFUNC_OK) {
//!     const char *msg = pyfunc_take_error();
//!     /* report through the host's own fatal-error mechanism */
//! }
//! ```

use pyfunc_core::{BridgeError, FatalScope};
use std::cell::RefCell;
use std::ffi::{CString, c_char};
use std::ptr;

/// Success
pub const PYFUNC_OK: i32 = 0;
/// Fatal on every cooperating process (definition, resolution, source load)
pub const PYFUNC_FATAL_ALL: i32 = 1;
/// Fatal on this process only (call and output-conversion failures)
pub const PYFUNC_FATAL_ONE: i32 = 2;

thread_local! {
    static LAST_ERROR: RefCell<Option<BridgeError>> = const { RefCell::new(None) };

    /// Backing storage for the pointer handed out by `pyfunc_take_error`
    static ERROR_CSTRING: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Status code reported for `error`
pub fn status_of(error: &BridgeError) -> i32 {
    match error.scope() {
        FatalScope::All => PYFUNC_FATAL_ALL,
        FatalScope::One => PYFUNC_FATAL_ONE,
    }
}

/// Park `error` for the host and return its status code
pub fn set_last_error(error: BridgeError) -> i32 {
    let status = status_of(&error);
    ERROR_CSTRING.with(|cs| *cs.borrow_mut() = None);
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(error));
    status
}

pub fn take_last_error() -> Option<BridgeError> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

pub fn has_last_error() -> bool {
    LAST_ERROR.with(|e| e.borrow().is_some())
}

pub fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
    ERROR_CSTRING.with(|e| *e.borrow_mut() = None);
}

/// Map a `Result` onto a status code, parking the error
pub fn report(result: Result<(), BridgeError>) -> i32 {
    match result {
        Ok(()) => PYFUNC_OK,
        Err(e) => set_last_error(e),
    }
}

/// Format a panic payload into an error message
pub fn format_panic_payload(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// C-compatible copy of `text`; interior NULs become '?'
pub fn to_cstring(text: &str) -> CString {
    let safe: String = text
        .chars()
        .map(|c| if c == '\0' { '?' } else { c })
        .collect();
    CString::new(safe).unwrap_or_default()
}

/// Whether an error is pending on this thread
#[unsafe(no_mangle)]
pub extern "C" fn pyfunc_has_error() -> bool {
    has_last_error()
}

/// Take (and clear) the pending error message
///
/// Returns null if no error is pending. The pointer stays valid until the
/// next call that sets, takes or clears an error on this thread; copy it if
/// it must outlive that.
#[unsafe(no_mangle)]
pub extern "C" fn pyfunc_take_error() -> *const c_char {
    match take_last_error() {
        Some(error) => ERROR_CSTRING.with(|cs| {
            let cstring = to_cstring(error.message());
            let ptr = cstring.as_ptr();
            *cs.borrow_mut() = Some(cstring);
            ptr
        }),
        None => ptr::null(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn pyfunc_clear_error() {
    clear_last_error();
}
