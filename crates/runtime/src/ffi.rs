//! C ABI for C/C++ hosts
//!
//! A host keeps one opaque `PyfuncHandle` per instance and forwards every
//! `python ...` command to it. Host variables are reached through a
//! [`PyfuncVariableStore`] of callbacks supplied with each call.
//!
//! Every entry point returns a status code (`PYFUNC_OK`, `PYFUNC_FATAL_ALL`,
//! `PYFUNC_FATAL_ONE`) or a sentinel, and parks the error in the thread-local
//! channel of [`crate::error`]. Panics never cross the boundary.
//!
//! # Usage from C
//!
//! ```c
//! PyfuncHandle *py = pyfunc_create(lmp);
//! const char *argv[] = {"loop", "input", "1", "SELF", "format", "p", "file", "loop.py"};
//! if (pyfunc_command(py, 8, argv, &store) != PYFUNC_OK)
//!     fatal(pyfunc_take_error());
//! pyfunc_destroy(py);
//! ```

use crate::config::BridgeConfig;
use crate::error::{PYFUNC_OK, format_panic_payload, report, set_last_error, to_cstring};
use crate::host::Python;
use pyfunc_core::{BridgeError, HostHandle, VariableStore};
use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::ptr;
use tracing::error;

/// Host variable store as a set of C callbacks
///
/// - `retrieve` returns the current text of `name`, or null if no such
///   variable exists. The string must stay valid until the next callback.
/// - `accepts` reports whether `variable` is a python-style variable bound to
///   `binding`.
/// - `publish` stores `text` into `variable` on behalf of `binding` and
///   returns false if the variable does not belong to that binding.
#[repr(C)]
pub struct PyfuncVariableStore {
    pub context: *mut c_void,
    pub retrieve:
        Option<unsafe extern "C" fn(context: *mut c_void, name: *const c_char) -> *const c_char>,
    pub accepts: Option<
        unsafe extern "C" fn(
            context: *mut c_void,
            binding: *const c_char,
            variable: *const c_char,
        ) -> bool,
    >,
    pub publish: Option<
        unsafe extern "C" fn(
            context: *mut c_void,
            binding: *const c_char,
            variable: *const c_char,
            text: *const c_char,
        ) -> bool,
    >,
}

/// [`VariableStore`] over a host callback table
struct CallbackStore<'a> {
    callbacks: Option<&'a PyfuncVariableStore>,
}

impl VariableStore for CallbackStore<'_> {
    fn retrieve(&mut self, name: &str) -> Option<String> {
        let callbacks = self.callbacks?;
        let retrieve = callbacks.retrieve?;
        let name = to_cstring(name);
        // SAFETY: the host guarantees the callback contract documented above
        let text = unsafe { retrieve(callbacks.context, name.as_ptr()) };
        if text.is_null() {
            return None;
        }
        // SAFETY: non-null strings returned by `retrieve` are NUL-terminated
        Some(unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned())
    }

    fn accepts(&self, binding: &str, variable: &str) -> bool {
        let Some(callbacks) = self.callbacks else {
            return false;
        };
        let Some(accepts) = callbacks.accepts else {
            return false;
        };
        let (binding, variable) = (to_cstring(binding), to_cstring(variable));
        // SAFETY: see retrieve
        unsafe { accepts(callbacks.context, binding.as_ptr(), variable.as_ptr()) }
    }

    fn publish_for(&mut self, binding: &str, variable: &str, text: &str) -> bool {
        let Some(callbacks) = self.callbacks else {
            return false;
        };
        let Some(publish) = callbacks.publish else {
            return false;
        };
        let (binding, variable, text) = (to_cstring(binding), to_cstring(variable), to_cstring(text));
        // SAFETY: see retrieve
        unsafe {
            publish(
                callbacks.context,
                binding.as_ptr(),
                variable.as_ptr(),
                text.as_ptr(),
            )
        }
    }
}

/// Opaque per-host-instance state
///
/// Only ever shared, never borrowed mutably: a python function running under
/// `pyfunc_invoke_function` may call back into any entry point with the
/// same handle.
pub struct PyfuncHandle {
    python: Python,
    /// Keeps the last string handed out by `pyfunc_long_string` alive
    long_string: RefCell<Option<CString>>,
}

/// Run `f`, turning a panic into a parked fatal-all error
fn guarded(f: impl FnOnce() -> i32) -> i32 {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(payload) => {
            let msg = format_panic_payload(&payload);
            error!("panic inside python bridge: {}", msg);
            set_last_error(BridgeError::Init(format!(
                "internal error in python bridge: {}",
                msg
            )))
        }
    }
}

/// Borrow a C string argument as UTF-8
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn arg<'a>(ptr: *const c_char) -> Result<&'a str, BridgeError> {
    if ptr.is_null() {
        return Err(BridgeError::invalid_command());
    }
    // SAFETY: guaranteed by the caller
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| BridgeError::Definition("Python command argument is not valid UTF-8".into()))
}

/// Collect `argc` arguments from `argv`
///
/// # Safety
/// `argv` must point to `argc` NUL-terminated strings.
unsafe fn argv_strings<'a>(argc: c_int, argv: *const *const c_char) -> Result<Vec<&'a str>, BridgeError> {
    if argv.is_null() || argc < 0 {
        return Err(BridgeError::invalid_command());
    }
    (0..argc as usize)
        // SAFETY: guaranteed by the caller
        .map(|i| unsafe { arg(*argv.add(i)) })
        .collect()
}

/// Copy `text` into a caller buffer of `len` bytes, NUL-terminated
///
/// # Safety
/// `buf` must be valid for `len` bytes of writes.
unsafe fn copy_out(text: &str, buf: *mut c_char, len: usize) {
    if buf.is_null() || len == 0 {
        return;
    }
    let n = text.len().min(len - 1);
    // SAFETY: n + 1 <= len, guaranteed writable by the caller
    unsafe {
        ptr::copy_nonoverlapping(text.as_ptr() as *const c_char, buf, n);
        *buf.add(n) = 0;
    }
}

fn handle_ref<'a>(handle: *mut PyfuncHandle) -> Result<&'a PyfuncHandle, BridgeError> {
    // SAFETY: non-null handles come from pyfunc_create and are only used by
    // the thread that drives the host's command loop
    unsafe { handle.as_ref() }
        .ok_or_else(|| BridgeError::Init("Python bridge handle is null".to_string()))
}

fn create(host: *mut c_void, config: BridgeConfig) -> *mut PyfuncHandle {
    Box::into_raw(Box::new(PyfuncHandle {
        python: Python::new(config, HostHandle::from_ptr(host)),
        long_string: RefCell::new(None),
    }))
}

/// Create a bridge facade configured from the environment
///
/// `host` is the pointer handed to functions declaring a `p` input. The
/// embedded runtime is not started until the first command needs it.
#[unsafe(no_mangle)]
pub extern "C" fn pyfunc_create(host: *mut c_void) -> *mut PyfuncHandle {
    create(host, BridgeConfig::from_env())
}

/// Create a bridge facade configured from a TOML file
///
/// Returns null (with the error parked) if the file cannot be loaded.
///
/// # Safety
/// `path` must be a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pyfunc_create_with_config(
    host: *mut c_void,
    path: *const c_char,
) -> *mut PyfuncHandle {
    // SAFETY: guaranteed by the caller
    let loaded = unsafe { arg(path) }.and_then(|path| {
        BridgeConfig::load(Path::new(path)).map_err(BridgeError::Init)
    });
    match loaded {
        Ok(config) => create(host, config),
        Err(e) => {
            set_last_error(e);
            ptr::null_mut()
        }
    }
}

/// Destroy a facade, releasing every binding and finalizing the runtime if
/// this facade started it
///
/// # Safety
/// `handle` must come from `pyfunc_create*` and not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pyfunc_destroy(handle: *mut PyfuncHandle) {
    if handle.is_null() {
        return;
    }
    guarded(|| {
        // SAFETY: guaranteed by the caller
        drop(unsafe { Box::from_raw(handle) });
        PYFUNC_OK
    });
}

/// Execute one `python` command; `argv[0]` is the binding name
///
/// # Safety
/// `argv` must hold `argc` NUL-terminated strings; `store` must be null or
/// point to a valid callback table.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pyfunc_command(
    handle: *mut PyfuncHandle,
    argc: c_int,
    argv: *const *const c_char,
    store: *const PyfuncVariableStore,
) -> c_int {
    guarded(|| {
        report((|| -> Result<(), BridgeError> {
            let handle = handle_ref(handle)?;
            // SAFETY: guaranteed by the caller
            let args = unsafe { argv_strings(argc, argv) }?;
            let mut store = CallbackStore {
                // SAFETY: guaranteed by the caller
                callbacks: unsafe { store.as_ref() },
            };
            handle.python.command(&args, &mut store)
        })())
    })
}

/// Call binding `name` and copy its result text into `buf`
///
/// `buf` receives at most `len - 1` bytes plus a terminator. String results
/// of bindings declared with `length` are fetched with `pyfunc_long_string`.
///
/// # Safety
/// `name` must be a NUL-terminated string; `buf` must be writable for `len`
/// bytes; `store` as for `pyfunc_command`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pyfunc_invoke_function(
    handle: *mut PyfuncHandle,
    name: *const c_char,
    store: *const PyfuncVariableStore,
    buf: *mut c_char,
    len: usize,
) -> c_int {
    guarded(|| {
        report((|| -> Result<(), BridgeError> {
            let handle = handle_ref(handle)?;
            // SAFETY: guaranteed by the caller
            let name = unsafe { arg(name) }?;
            let mut store = CallbackStore {
                // SAFETY: guaranteed by the caller
                callbacks: unsafe { store.as_ref() },
            };
            let mut result = handle.python.result_buffer();
            handle.python.invoke_function(name, &mut store, &mut result)?;
            // SAFETY: guaranteed by the caller
            unsafe { copy_out(result.as_str(), buf, len) };
            Ok(())
        })())
    })
}

/// Slot index of binding `name`, or -1
///
/// # Safety
/// `name` must be a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pyfunc_find(handle: *mut PyfuncHandle, name: *const c_char) -> c_int {
    let Ok(handle) = handle_ref(handle) else {
        return -1;
    };
    // SAFETY: guaranteed by the caller
    match unsafe { arg(name) } {
        Ok(name) => index_or_missing(handle.python.find(name)),
        Err(_) => -1,
    }
}

/// Slot index of `name` if it publishes `variable`, or -1
///
/// With `numeric` set, bindings returning strings never match.
///
/// # Safety
/// `name` and `variable` must be NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pyfunc_variable_match(
    handle: *mut PyfuncHandle,
    name: *const c_char,
    variable: *const c_char,
    numeric: bool,
) -> c_int {
    let Ok(handle) = handle_ref(handle) else {
        return -1;
    };
    // SAFETY: guaranteed by the caller
    match unsafe { (arg(name), arg(variable)) } {
        (Ok(name), Ok(variable)) => {
            index_or_missing(handle.python.variable_match(name, variable, numeric))
        }
        _ => -1,
    }
}

/// Last string result of `name` if it was declared with `length`, else null
///
/// The pointer stays valid until the next call on this handle.
///
/// # Safety
/// `name` must be a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pyfunc_long_string(
    handle: *mut PyfuncHandle,
    name: *const c_char,
) -> *const c_char {
    let Ok(handle) = handle_ref(handle) else {
        return ptr::null();
    };
    // SAFETY: guaranteed by the caller
    let Ok(name) = (unsafe { arg(name) }) else {
        return ptr::null();
    };
    let text = handle.python.long_string(name).map(|text| to_cstring(&text));
    let mut slot = handle.long_string.borrow_mut();
    *slot = text;
    slot.as_ref().map_or(ptr::null(), |text| text.as_ptr())
}

/// Execute inline source in the shared namespace
///
/// # Safety
/// `source` must be a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pyfunc_execute_string(
    handle: *mut PyfuncHandle,
    source: *const c_char,
) -> c_int {
    guarded(|| {
        report((|| -> Result<(), BridgeError> {
            let handle = handle_ref(handle)?;
            // SAFETY: guaranteed by the caller
            let source = unsafe { arg(source) }?;
            handle.python.execute_source(source)
        })())
    })
}

/// Execute a source file in the shared namespace
///
/// # Safety
/// `path` must be a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pyfunc_execute_file(
    handle: *mut PyfuncHandle,
    path: *const c_char,
) -> c_int {
    guarded(|| {
        report((|| -> Result<(), BridgeError> {
            let handle = handle_ref(handle)?;
            // SAFETY: guaranteed by the caller
            let path = unsafe { arg(path) }?;
            handle.python.execute_file(Path::new(path))
        })())
    })
}

/// Whether this library was built with the embedded CPython backend
#[unsafe(no_mangle)]
pub extern "C" fn pyfunc_is_enabled() -> bool {
    cfg!(feature = "python")
}

fn index_or_missing(index: Option<usize>) -> c_int {
    index
        .and_then(|i| c_int::try_from(i).ok())
        .unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PYFUNC_FATAL_ALL, PYFUNC_FATAL_ONE, clear_last_error, take_last_error};
    use std::collections::HashMap;

    #[derive(Default)]
    struct HostVars {
        text: HashMap<String, CString>,
        python: HashMap<String, String>,
        published: Vec<(String, String)>,
    }

    fn as_str<'a>(ptr: *const c_char) -> &'a str {
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap()
    }

    unsafe extern "C" fn retrieve(context: *mut c_void, name: *const c_char) -> *const c_char {
        let vars = unsafe { &*(context as *const HostVars) };
        vars.text
            .get(as_str(name))
            .map_or(ptr::null(), |value| value.as_ptr())
    }

    unsafe extern "C" fn accepts(
        context: *mut c_void,
        binding: *const c_char,
        variable: *const c_char,
    ) -> bool {
        let vars = unsafe { &*(context as *const HostVars) };
        vars.python.get(as_str(variable)).map(String::as_str) == Some(as_str(binding))
    }

    unsafe extern "C" fn publish(
        context: *mut c_void,
        _binding: *const c_char,
        variable: *const c_char,
        text: *const c_char,
    ) -> bool {
        let vars = unsafe { &mut *(context as *mut HostVars) };
        vars.published
            .push((as_str(variable).to_string(), as_str(text).to_string()));
        true
    }

    fn table(vars: &mut HostVars) -> PyfuncVariableStore {
        PyfuncVariableStore {
            context: vars as *mut HostVars as *mut c_void,
            retrieve: Some(retrieve),
            accepts: Some(accepts),
            publish: Some(publish),
        }
    }

    #[test]
    fn test_callback_store() {
        let mut vars = HostVars::default();
        vars.text
            .insert("x".to_string(), CString::new("2.5").unwrap());
        vars.python.insert("out".to_string(), "f".to_string());
        let callbacks = table(&mut vars);
        let mut store = CallbackStore {
            callbacks: Some(&callbacks),
        };

        assert_eq!(store.retrieve("x"), Some("2.5".to_string()));
        assert_eq!(store.retrieve("y"), None);
        assert!(store.accepts("f", "out"));
        assert!(!store.accepts("g", "out"));
        assert!(store.publish_for("f", "out", "7"));
        drop(store);
        assert_eq!(vars.published, vec![("out".to_string(), "7".to_string())]);
    }

    #[test]
    fn test_missing_callbacks() {
        let mut store = CallbackStore { callbacks: None };
        assert_eq!(store.retrieve("x"), None);
        assert!(!store.accepts("f", "x"));
        assert!(!store.publish_for("f", "x", "1"));
    }

    #[test]
    fn test_copy_out_truncates() {
        let mut buf = [0x7f as c_char; 8];
        unsafe { copy_out("abcdefghij", buf.as_mut_ptr(), buf.len()) };
        assert_eq!(as_str(buf.as_ptr()), "abcdefg");

        unsafe { copy_out("ab", buf.as_mut_ptr(), buf.len()) };
        assert_eq!(as_str(buf.as_ptr()), "ab");
    }

    #[test]
    fn test_args_collects_and_validates() {
        let owned: Vec<CString> = ["f", "invoke"]
            .iter()
            .map(|s| CString::new(*s).unwrap())
            .collect();
        let argv: Vec<*const c_char> = owned.iter().map(|s| s.as_ptr()).collect();
        let collected = unsafe { argv_strings(2, argv.as_ptr()) }.unwrap();
        assert_eq!(collected, vec!["f", "invoke"]);

        assert!(unsafe { argv_strings(1, ptr::null()) }.is_err());
        let with_null = [ptr::null::<c_char>()];
        assert!(unsafe { argv_strings(1, with_null.as_ptr()) }.is_err());
    }

    #[test]
    fn test_null_handle_reports_error() {
        clear_last_error();
        let argv = [c"f".as_ptr(), c"invoke".as_ptr()];
        let status = unsafe { pyfunc_command(ptr::null_mut(), 2, argv.as_ptr(), ptr::null()) };
        assert_eq!(status, PYFUNC_FATAL_ALL);
        assert!(matches!(take_last_error(), Some(BridgeError::Init(_))));
        assert_eq!(unsafe { pyfunc_find(ptr::null_mut(), c"f".as_ptr()) }, -1);
    }

    #[test]
    fn test_guarded_catches_panics() {
        clear_last_error();
        let status = guarded(|| panic!("exploded"));
        assert_eq!(status, PYFUNC_FATAL_ALL);
        let err = take_last_error().unwrap();
        assert!(err.message().contains("exploded"));
        assert_ne!(status, PYFUNC_FATAL_ONE);
    }

    #[test]
    fn test_lookups_before_first_command() {
        let handle = pyfunc_create(ptr::null_mut());
        assert_eq!(unsafe { pyfunc_find(handle, c"f".as_ptr()) }, -1);
        assert_eq!(
            unsafe { pyfunc_variable_match(handle, c"f".as_ptr(), c"x".as_ptr(), true) },
            -1
        );
        assert!(unsafe { pyfunc_long_string(handle, c"f".as_ptr()) }.is_null());
        unsafe { pyfunc_destroy(handle) };
    }

    #[test]
    fn test_create_with_bad_config() {
        clear_last_error();
        let handle =
            unsafe { pyfunc_create_with_config(ptr::null_mut(), c"/nonexistent/bridge.toml".as_ptr()) };
        assert!(handle.is_null());
        assert!(matches!(take_last_error(), Some(BridgeError::Init(_))));
    }
}
