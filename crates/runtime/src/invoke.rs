//! Invocation engine
//!
//! One call of a bound function: build the positional arguments in declared
//! order, call, convert the result to host text. The caller holds the runtime
//! lock for the whole sequence, and every native object created along the
//! way (partial argument lists, the returned object) is released on every
//! path.
//!
//! A call works from a [`CallPlan`], a snapshot of the binding taken before
//! the call with its own reference to the callable. The function being called
//! may re-enter the bridge and redefine bindings, including this one, so
//! nothing borrowed from the registry survives across the call.

use crate::interp::Interpreter;
use crate::marshal::{from_native, to_native};
use pyfunc_core::{Binding, BridgeError, FuncValue, HostHandle, ScalarKind, VariableStore};
use tracing::{debug, warn};

/// Everything one call needs, detached from the registry
pub struct CallPlan<O> {
    pub name: String,
    pub inputs: Vec<FuncValue>,
    /// Declared output kind and host variable
    pub output: Option<(ScalarKind, String)>,
    callable: O,
}

impl<O> CallPlan<O> {
    /// Snapshot `binding`, taking a new reference to its callable
    pub fn prepare<R>(runtime: &R, binding: &Binding<O>) -> Result<Self, BridgeError>
    where
        R: Interpreter<Object = O>,
    {
        let callable = binding.callable.as_ref().ok_or_else(|| {
            BridgeError::SourceLoad(format!("Python function {} is not bound", binding.name))
        })?;
        Ok(CallPlan {
            name: binding.name.clone(),
            inputs: binding.inputs.clone(),
            output: binding
                .output
                .as_ref()
                .map(|out| (out.kind, out.variable.clone())),
            callable: runtime.duplicate(callable),
        })
    }

    pub fn output_kind(&self) -> Option<ScalarKind> {
        self.output.as_ref().map(|(kind, _)| *kind)
    }
}

/// Call `plan`; the result comes back as host text if an output is declared
///
/// Consumes the plan and releases its callable reference.
pub fn invoke<R: Interpreter>(
    runtime: &R,
    plan: CallPlan<R::Object>,
    host: HostHandle,
    store: &mut dyn VariableStore,
) -> Result<Option<String>, BridgeError> {
    let outcome = call(runtime, &plan, host, store);
    runtime.release(plan.callable);
    outcome
}

fn call<R: Interpreter>(
    runtime: &R,
    plan: &CallPlan<R::Object>,
    host: HostHandle,
    store: &mut dyn VariableStore,
) -> Result<Option<String>, BridgeError> {
    let mut args = Vec::with_capacity(plan.inputs.len());
    for input in &plan.inputs {
        match to_native(runtime, input, host, store) {
            Ok(object) => args.push(object),
            Err(e) => {
                for object in args {
                    runtime.release(object);
                }
                return Err(e);
            }
        }
    }

    debug!(name = %plan.name, args = plan.inputs.len(), "invoking python function");
    let returned = runtime.call(&plan.callable, args).map_err(|diagnostic| {
        warn!(name = %plan.name, "{}", diagnostic);
        BridgeError::Call(format!(
            "Python function evaluation failed: {}",
            last_line(&diagnostic)
        ))
    })?;

    let text = plan
        .output
        .as_ref()
        .map(|(kind, variable)| from_native(runtime, &returned, *kind, variable))
        .transpose();
    runtime.release(returned);
    text
}

/// Final line of a multi-line diagnostic (the exception line of a traceback)
fn last_line(diagnostic: &str) -> &str {
    diagnostic
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or(diagnostic)
        .trim()
}
