//! Binding descriptors
//!
//! A [`Binding`] associates a host-visible name with a callable living in the
//! embedded runtime, plus the typing of its inputs and optional output. The
//! callable is generic (`H`) so this crate never depends on a concrete runtime.

use crate::buffer::OverflowBuffer;
use crate::value::{FuncValue, ScalarKind, ValueKind};

/// Declared output of a binding
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub kind: ScalarKind,
    /// Host variable the result is published to (without the `v_` prefix)
    pub variable: String,
    /// Present only for string outputs declared with `length <n>`
    pub overflow: Option<OverflowBuffer>,
}

impl OutputSpec {
    pub fn new(kind: ScalarKind, variable: impl Into<String>) -> Self {
        OutputSpec {
            kind,
            variable: variable.into(),
            overflow: None,
        }
    }

    pub fn with_overflow(mut self, capacity: usize) -> Self {
        self.overflow = Some(OverflowBuffer::new(capacity));
        self
    }
}

/// One named entry of the binding registry
#[derive(Debug)]
pub struct Binding<H> {
    pub name: String,
    /// Call-argument order is declaration order
    pub inputs: Vec<FuncValue>,
    pub output: Option<OutputSpec>,
    /// Native callable, present once the definition has been bound
    pub callable: Option<H>,
}

impl<H> Binding<H> {
    pub fn new(name: impl Into<String>, inputs: Vec<FuncValue>, output: Option<OutputSpec>) -> Self {
        Binding {
            name: name.into(),
            inputs,
            output,
            callable: None,
        }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        usize::from(self.output.is_some())
    }

    pub fn output_kind(&self) -> ValueKind {
        self.output
            .as_ref()
            .map(|out| out.kind.into())
            .unwrap_or(ValueKind::None)
    }

    pub fn output_variable(&self) -> Option<&str> {
        self.output.as_ref().map(|out| out.variable.as_str())
    }

    /// Whether string results go to the per-binding overflow buffer
    pub fn returns_long_string(&self) -> bool {
        self.output
            .as_ref()
            .is_some_and(|out| out.overflow.is_some())
    }

    /// Text held by the overflow buffer, if one was declared
    pub fn long_string(&self) -> Option<&str> {
        self.output
            .as_ref()
            .and_then(|out| out.overflow.as_ref())
            .map(OverflowBuffer::as_str)
    }

    pub fn is_bound(&self) -> bool {
        self.callable.is_some()
    }

    /// Attach the native callable, returning any previously held one
    pub fn bind(&mut self, callable: H) -> Option<H> {
        self.callable.replace(callable)
    }

    /// Detach the native callable so the owner can release it
    pub fn unbind(&mut self) -> Option<H> {
        self.callable.take()
    }

    /// Whether the host variable `variable` is produced by this binding
    ///
    /// With `numeric` set, string outputs never match.
    pub fn produces(&self, variable: &str, numeric: bool) -> bool {
        match &self.output {
            Some(out) => out.variable == variable && !(numeric && !out.kind.is_numeric()),
            None => false,
        }
    }
}
