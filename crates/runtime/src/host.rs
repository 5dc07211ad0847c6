//! Host-facing facade
//!
//! Hosts keep one [`Python`] per instance. Nothing touches the embedded
//! runtime until the first command that needs it, so hosts built without the
//! python feature (or scripts that never use it) pay nothing. When the
//! backend is compiled out, the first such command fails with
//! [`BridgeError::Unavailable`].
//!
//! Like [`Bridge`], the facade works through `&self` so a function running
//! inside a call can reach back into it.

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::interp::Interpreter;
use crate::python::CPython;
use pyfunc_core::{BridgeError, HostHandle, ResultBuffer, VariableStore};
use std::cell::{OnceCell, RefCell};
use std::path::Path;
use tracing::debug;

const MISSING_MSG: &str = "Python support missing! Rebuild with: cargo build --features python";

type Factory<R> = Box<dyn FnMut() -> R>;

pub struct Python<R: Interpreter = CPython> {
    bridge: OnceCell<Bridge<R>>,
    factory: RefCell<Factory<R>>,
    enabled: bool,
    config: BridgeConfig,
    host: HostHandle,
}

impl Python<CPython> {
    /// Facade over the process's CPython interpreter
    pub fn new(config: BridgeConfig, host: HostHandle) -> Self {
        Python {
            bridge: OnceCell::new(),
            factory: RefCell::new(Box::new(CPython::new)),
            enabled: cfg!(feature = "python"),
            config,
            host,
        }
    }
}

impl<R: Interpreter> Python<R> {
    /// Facade over a caller-supplied backend
    pub fn with_runtime(
        factory: impl FnMut() -> R + 'static,
        config: BridgeConfig,
        host: HostHandle,
    ) -> Self {
        Python {
            bridge: OnceCell::new(),
            factory: RefCell::new(Box::new(factory)),
            enabled: true,
            config,
            host,
        }
    }

    /// Whether a real runtime backend is available
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the bridge has been started
    pub fn is_started(&self) -> bool {
        self.bridge.get().is_some()
    }

    fn bridge(&self) -> Result<&Bridge<R>, BridgeError> {
        if !self.enabled {
            return Err(BridgeError::Unavailable(MISSING_MSG.to_string()));
        }
        if let Some(bridge) = self.bridge.get() {
            return Ok(bridge);
        }
        debug!("starting python bridge on first use");
        let runtime = (self.factory.borrow_mut().as_mut())();
        let bridge = Bridge::new(runtime, self.config.clone(), self.host)?;
        Ok(self.bridge.get_or_init(|| bridge))
    }

    /// Execute one `python` command; `args[0]` is the binding name
    pub fn command<S: AsRef<str>>(
        &self,
        args: &[S],
        store: &mut dyn VariableStore,
    ) -> Result<(), BridgeError> {
        self.bridge()?.command(args, store)
    }

    pub fn invoke_function(
        &self,
        name: &str,
        store: &mut dyn VariableStore,
        result: &mut ResultBuffer,
    ) -> Result<(), BridgeError> {
        self.bridge()?.invoke_function(name, store, result)
    }

    /// Slot index of binding `name`; `None` before the first definition
    pub fn find(&self, name: &str) -> Option<usize> {
        self.bridge.get()?.find(name)
    }

    pub fn variable_match(&self, name: &str, variable: &str, numeric: bool) -> Option<usize> {
        self.bridge.get()?.variable_match(name, variable, numeric)
    }

    pub fn long_string(&self, name: &str) -> Option<String> {
        self.bridge.get()?.long_string(name)
    }

    pub fn execute_source(&self, source: &str) -> Result<(), BridgeError> {
        self.bridge()?.execute_source(source)
    }

    pub fn execute_file(&self, path: &Path) -> Result<(), BridgeError> {
        self.bridge()?.execute_file(path)
    }

    /// Result buffer sized by this facade's configuration
    pub fn result_buffer(&self) -> ResultBuffer {
        ResultBuffer::with_capacity(self.config.result_capacity)
    }

    /// Tear the bridge down now; a later command starts a fresh one
    pub fn shutdown(&mut self) {
        self.bridge.take();
    }
}
