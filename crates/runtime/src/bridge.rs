//! The bridge: one registry of bindings over one embedded runtime
//!
//! A [`Bridge`] accepts already-tokenized host commands and turns them into
//! registry updates, source loads and calls. Definitions are staged in full
//! (parsed, source loaded, callable resolved) before the registry is touched,
//! so a failing command leaves the previous binding of that name in place.
//!
//! Every operation takes `&self`. Python code running inside a call may come
//! back through the host and issue more commands on the same bridge, so the
//! registry lives in a `RefCell` whose borrows never span a runtime call.

use crate::config::BridgeConfig;
use crate::interp::{Interpreter, Resolved, SourceError};
use crate::invoke::{CallPlan, invoke};
use crate::lifecycle::Lifecycle;
use crate::marshal::deliver;
use pyfunc_core::{
    Binding, BridgeError, Command, Definition, HostHandle, Registry, ResultBuffer, ScalarKind,
    SourceLoad, VariableStore, parse_command,
};
use std::cell::{Ref, RefCell};
use std::path::Path;
use tracing::{debug, warn};

pub struct Bridge<R: Interpreter> {
    lifecycle: Lifecycle<R>,
    registry: RefCell<Registry<R::Object>>,
    host: HostHandle,
    config: BridgeConfig,
}

impl<R: Interpreter> Bridge<R> {
    /// Start (or attach to) the runtime and create an empty registry
    ///
    /// `host` is handed to functions declaring a `p` input as an opaque
    /// capsule; pass [`HostHandle::null`] if the host exposes no callbacks.
    pub fn new(runtime: R, config: BridgeConfig, host: HostHandle) -> Result<Self, BridgeError> {
        let lifecycle = Lifecycle::start(runtime, &config)?;
        Ok(Bridge {
            lifecycle,
            registry: RefCell::new(Registry::new()),
            host,
            config,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Whether this bridge started the runtime and will finalize it
    pub fn owns_runtime(&self) -> bool {
        self.lifecycle.owns_runtime()
    }

    /// Current bindings; do not hold across a command
    pub fn registry(&self) -> Ref<'_, Registry<R::Object>> {
        self.registry.borrow()
    }

    /// Execute one host command; `args[0]` is the binding name
    pub fn command<S: AsRef<str>>(
        &self,
        args: &[S],
        store: &mut dyn VariableStore,
    ) -> Result<(), BridgeError> {
        match parse_command(args)? {
            Command::Invoke { name } => self.invoke_command(&name, store),
            Command::Source { target } => self.source(&target),
            Command::Define(definition) => self.define(definition),
        }
    }

    /// Call `name` and publish its result to the host variable it declared
    fn invoke_command(&self, name: &str, store: &mut dyn VariableStore) -> Result<(), BridgeError> {
        let variable = self
            .registry
            .borrow()
            .get(name)
            .ok_or_else(undefined_function)?
            .output_variable()
            .map(str::to_string);

        if let Some(variable) = &variable
            && !store.accepts(name, variable)
        {
            return Err(variable_mismatch());
        }

        let mut result = ResultBuffer::with_capacity(self.config.result_capacity);
        self.invoke_function(name, store, &mut result)?;

        let Some(variable) = variable else {
            return Ok(());
        };
        let text = self
            .long_string(name)
            .unwrap_or_else(|| result.as_str().to_string());
        if store.publish_for(name, &variable, &text) {
            Ok(())
        } else {
            Err(variable_mismatch())
        }
    }

    /// `source`: execute a file if `target` names one, else inline text
    fn source(&self, target: &str) -> Result<(), BridgeError> {
        let path = Path::new(target);
        let outcome = self.lifecycle.locked(|rt| {
            if path.is_file() {
                debug!(path = %path.display(), "executing python source file");
                rt.run_file(path)
            } else {
                debug!("executing inline python source");
                rt.run_source(target)
            }
        });
        outcome.map_err(|e| {
            log_source_error(&e);
            BridgeError::SourceLoad("Could not process Python source command".to_string())
        })
    }

    /// Load the definition's source, resolve its callable, then install it
    ///
    /// The displaced callable (if any) is released before the new binding
    /// goes in, both under the lock.
    fn define(&self, definition: Definition) -> Result<(), BridgeError> {
        let index = self.registry.borrow().next_index(&definition.name);
        let (mut binding, load): (Binding<R::Object>, SourceLoad) = definition.into_parts();
        let name = binding.name.clone();

        self.lifecycle.locked(|rt| -> Result<(), BridgeError> {
            load_source(rt, &load, index, &name)?;
            let callable = match rt.resolve(&name) {
                Resolved::Callable(callable) => callable,
                Resolved::NotCallable => {
                    return Err(BridgeError::SourceLoad(format!(
                        "Python function {} is not callable",
                        name
                    )));
                }
                Resolved::NotFound => {
                    return Err(BridgeError::SourceLoad(format!(
                        "Could not find Python function {} {}",
                        index, name
                    )));
                }
            };
            binding.bind(callable);

            let previous = self
                .registry
                .borrow_mut()
                .get_mut(&name)
                .and_then(Binding::unbind);
            if let Some(previous) = previous {
                rt.release(previous);
            }
            let (slot, _) = self.registry.borrow_mut().install(binding);
            debug!(name = %name, slot, "python function defined");
            Ok(())
        })
    }

    /// Call `name`, leaving its result in `result` (or its overflow buffer)
    pub fn invoke_function(
        &self,
        name: &str,
        store: &mut dyn VariableStore,
        result: &mut ResultBuffer,
    ) -> Result<(), BridgeError> {
        self.lifecycle.locked(|rt| -> Result<(), BridgeError> {
            let plan = {
                let registry = self.registry.borrow();
                let binding = registry.get(name).ok_or_else(undefined_function)?;
                CallPlan::prepare(rt, binding)?
            };
            let kind = plan.output_kind();
            if let Some(text) = invoke(rt, plan, self.host, store)? {
                self.deliver(name, kind, &text, result);
            }
            Ok(())
        })
    }

    /// Route result text by the binding as it stands after the call
    fn deliver(&self, name: &str, kind: Option<ScalarKind>, text: &str, result: &mut ResultBuffer) {
        let mut registry = self.registry.borrow_mut();
        let output = registry
            .get_mut(name)
            .and_then(|binding| binding.output.as_mut())
            .filter(|output| Some(output.kind) == kind);
        deliver(text, output, result);
    }

    /// Slot index of binding `name`
    pub fn find(&self, name: &str) -> Option<usize> {
        self.registry.borrow().index_of(name)
    }

    /// Slot index of `name` if it publishes host variable `variable`
    ///
    /// With `numeric` set, bindings returning strings never match.
    pub fn variable_match(&self, name: &str, variable: &str, numeric: bool) -> Option<usize> {
        let registry = self.registry.borrow();
        registry
            .matching_output(name, variable, numeric)
            .and_then(|_| registry.index_of(name))
    }

    /// Last string result of `name`, if it was declared with `length`
    pub fn long_string(&self, name: &str) -> Option<String> {
        self.registry
            .borrow()
            .get(name)
            .and_then(Binding::long_string)
            .map(str::to_string)
    }

    /// Execute inline source in the shared namespace for its side effects
    pub fn execute_source(&self, source: &str) -> Result<(), BridgeError> {
        self.lifecycle.locked(|rt| rt.run_source(source)).map_err(|e| {
            log_source_error(&e);
            BridgeError::SourceLoad("Could not process Python string".to_string())
        })
    }

    /// Execute a source file in the shared namespace for its side effects
    pub fn execute_file(&self, path: &Path) -> Result<(), BridgeError> {
        self.lifecycle
            .locked(|rt| rt.run_file(path))
            .map_err(|e| file_error(path, e, ""))
    }
}

impl<R: Interpreter> Drop for Bridge<R> {
    fn drop(&mut self) {
        let callables: Vec<R::Object> = self
            .registry
            .get_mut()
            .drain()
            .into_iter()
            .filter_map(|mut binding| binding.unbind())
            .collect();
        self.lifecycle.shutdown(callables);
    }
}

fn load_source<R: Interpreter>(
    rt: &R,
    load: &SourceLoad,
    index: usize,
    name: &str,
) -> Result<(), BridgeError> {
    let function = format!(" for function {} {}", index, name);
    match load {
        SourceLoad::File(path) => rt.run_file(path).map_err(|e| file_error(path, e, &function)),
        SourceLoad::Here(source) => rt.run_source(source).map_err(|e| {
            log_source_error(&e);
            BridgeError::SourceLoad(format!("Could not process Python string{}", function))
        }),
        SourceLoad::Exists | SourceLoad::Unspecified => Ok(()),
    }
}

/// `suffix` names the binding being defined, if any
fn file_error(path: &Path, error: SourceError, suffix: &str) -> BridgeError {
    log_source_error(&error);
    let verb = match error {
        SourceError::Open(_) => "open",
        SourceError::Raised(_) => "process",
    };
    BridgeError::SourceLoad(format!(
        "Could not {} Python file {}{}",
        verb,
        path.display(),
        suffix
    ))
}

fn log_source_error(error: &SourceError) {
    match error {
        SourceError::Open(detail) => warn!("{}", detail),
        SourceError::Raised(diagnostic) => warn!("{}", diagnostic),
    }
}

fn undefined_function() -> BridgeError {
    BridgeError::Resolution("Python invoke of undefined function".to_string())
}

fn variable_mismatch() -> BridgeError {
    BridgeError::Resolution("Python variable does not match Python function".to_string())
}
