//! Embedded CPython backend
//!
//! Lifecycle calls go straight to the C API so the bridge can tell "already
//! initialized by someone else" apart from "started here", and can finalize
//! only what it started. Everything else runs through pyo3 with the GIL held
//! for the duration of the operation.
//!
//! After startup the GIL is released (`PyEval_SaveThread`) so that any host
//! thread can later take it with `PyGILState_Ensure`, which is what
//! `Python::with_gil` does.
//!
//! Lock order is bridge lock, then GIL: every method here runs with the
//! [`RuntimeLock`](crate::lock::RuntimeLock) already held and takes the GIL
//! inside it. Python code re-entering the bridge from the thread that is
//! running the outer call is fine (both are re-entrant). A *different*
//! Python thread must not call into the bridge while holding the GIL: it
//! would wait on the bridge lock while the bridge waits on the GIL.

use crate::config::BridgeConfig;
use crate::interp::{Interpreter, Resolved, SourceError};
use pyfunc_core::HostHandle;
use pyo3::ffi;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyModule, PyTuple};
use std::os::raw::c_char;
use std::path::Path;
use tracing::debug;

/// Handle on the process-wide CPython interpreter
#[derive(Default)]
pub struct CPython {
    main: Option<Py<PyModule>>,
}

impl CPython {
    pub fn new() -> Self {
        Self::default()
    }

    fn namespace<'py>(&self, py: Python<'py>) -> Result<Bound<'py, PyModule>, String> {
        self.main
            .as_ref()
            .map(|main| main.bind(py).clone())
            .ok_or_else(|| "shared namespace not attached".to_string())
    }

    /// Compile `source` and execute it in the shared namespace
    fn exec(&self, source: &str, filename: &str) -> Result<(), SourceError> {
        Python::with_gil(|py| {
            let main = self.namespace(py).map_err(SourceError::Raised)?;
            let run = || -> PyResult<()> {
                let builtins = PyModule::import(py, "builtins")?;
                let code = builtins
                    .getattr("compile")?
                    .call1((source, filename, "exec"))?;
                builtins.getattr("exec")?.call1((code, main.dict()))?;
                Ok(())
            };
            run().map_err(|e| SourceError::Raised(diagnostic(py, &e)))
        })
    }
}

impl Interpreter for CPython {
    type Object = Py<PyAny>;

    fn is_initialized(&self) -> bool {
        // SAFETY: Py_IsInitialized may be called at any time
        unsafe { ffi::Py_IsInitialized() != 0 }
    }

    fn initialize(&mut self, config: &BridgeConfig) -> Result<(), String> {
        // SAFETY: only reached when no interpreter is live; the runtime lock
        // serializes concurrent bridge construction
        unsafe {
            ffi::Py_InitializeEx(0);
            if ffi::Py_IsInitialized() == 0 {
                return Err("Py_InitializeEx failed".to_string());
            }
            ffi::PyEval_SaveThread();
        }

        if config.unbuffered {
            Python::with_gil(|py| -> PyResult<()> {
                let sys = PyModule::import(py, "sys")?;
                let kwargs = PyDict::new(py);
                kwargs.set_item("write_through", true)?;
                for stream in ["stdout", "stderr"] {
                    sys.getattr(stream)?
                        .call_method("reconfigure", (), Some(&kwargs))?;
                }
                Ok(())
            })
            .map_err(|e| format!("could not make stdio unbuffered: {}", e))?;
            debug!("python stdio set to write-through");
        }
        Ok(())
    }

    fn attach_namespace(&mut self, config: &BridgeConfig) -> Result<(), String> {
        let main = Python::with_gil(|py| {
            PyModule::import(py, config.main_module.as_str())
                .map(Bound::unbind)
                .map_err(|e| diagnostic(py, &e))
        })?;
        self.main = Some(main);
        Ok(())
    }

    fn finalize(&mut self) {
        if let Some(main) = self.main.take() {
            Python::with_gil(|_py| drop(main));
        }
        // SAFETY: the owning bridge calls this once, after every object it
        // holds has been released; the GIL state is never released again
        unsafe {
            ffi::PyGILState_Ensure();
            ffi::Py_FinalizeEx();
        }
    }

    fn run_source(&self, source: &str) -> Result<(), SourceError> {
        self.exec(source, "<string>")
    }

    fn run_file(&self, path: &Path) -> Result<(), SourceError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Open(format!("{}: {}", path.display(), e)))?;
        self.exec(&source, &path.display().to_string())
    }

    fn resolve(&self, name: &str) -> Resolved<Py<PyAny>> {
        Python::with_gil(|py| {
            let Ok(main) = self.namespace(py) else {
                return Resolved::NotFound;
            };
            match main.getattr(name) {
                Ok(object) if object.is_callable() => Resolved::Callable(object.unbind()),
                Ok(_) => Resolved::NotCallable,
                Err(_) => Resolved::NotFound,
            }
        })
    }

    fn new_int(&self, value: i64) -> Option<Py<PyAny>> {
        // SAFETY: constructor returns a new reference or null
        Python::with_gil(|py| owned(py, unsafe { ffi::PyLong_FromLongLong(value) }))
    }

    fn new_double(&self, value: f64) -> Option<Py<PyAny>> {
        // SAFETY: see new_int
        Python::with_gil(|py| owned(py, unsafe { ffi::PyFloat_FromDouble(value) }))
    }

    fn new_text(&self, value: &str) -> Option<Py<PyAny>> {
        let len = ffi::Py_ssize_t::try_from(value.len()).ok()?;
        // SAFETY: pointer and length describe a valid UTF-8 buffer
        Python::with_gil(|py| {
            owned(py, unsafe {
                ffi::PyUnicode_FromStringAndSize(value.as_ptr() as *const c_char, len)
            })
        })
    }

    fn new_capsule(&self, host: HostHandle) -> Option<Py<PyAny>> {
        // SAFETY: the capsule stores the pointer without dereferencing it;
        // CPython rejects a null pointer, which surfaces as `None`
        Python::with_gil(|py| {
            owned(py, unsafe {
                ffi::PyCapsule_New(host.as_ptr(), std::ptr::null(), None)
            })
        })
    }

    fn duplicate(&self, object: &Py<PyAny>) -> Py<PyAny> {
        Python::with_gil(|py| object.clone_ref(py))
    }

    fn call(&self, callable: &Py<PyAny>, args: Vec<Py<PyAny>>) -> Result<Py<PyAny>, String> {
        Python::with_gil(|py| {
            let args = PyTuple::new(py, args).map_err(|e| diagnostic(py, &e))?;
            callable
                .bind(py)
                .call1(args)
                .map(Bound::unbind)
                .map_err(|e| diagnostic(py, &e))
        })
    }

    fn to_int(&self, object: &Py<PyAny>) -> Result<i64, String> {
        Python::with_gil(|py| object.bind(py).extract::<i64>().map_err(|e| e.to_string()))
    }

    fn to_double(&self, object: &Py<PyAny>) -> Result<f64, String> {
        Python::with_gil(|py| object.bind(py).extract::<f64>().map_err(|e| e.to_string()))
    }

    fn to_text(&self, object: &Py<PyAny>) -> Result<String, String> {
        Python::with_gil(|py| object.bind(py).extract::<String>().map_err(|e| e.to_string()))
    }

    fn release(&self, object: Py<PyAny>) {
        Python::with_gil(|_py| drop(object));
    }
}

/// Take ownership of a fresh reference, clearing the error set on failure
fn owned(py: Python<'_>, ptr: *mut ffi::PyObject) -> Option<Py<PyAny>> {
    // SAFETY: `ptr` is a new reference or null
    match unsafe { Bound::from_owned_ptr_or_opt(py, ptr) } {
        Some(object) => Some(object.unbind()),
        None => {
            let _ = PyErr::take(py);
            None
        }
    }
}

/// Traceback plus exception line, the way `PyErr_Print` would show it
fn diagnostic(py: Python<'_>, err: &PyErr) -> String {
    let mut text = String::new();
    if let Some(traceback) = err.traceback(py)
        && let Ok(formatted) = traceback.format()
    {
        text.push_str(&formatted);
    }
    text.push_str(&err.to_string());
    text
}
