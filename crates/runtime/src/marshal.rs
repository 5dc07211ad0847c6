//! Value marshalling across the runtime boundary
//!
//! Host to native: each declared input becomes a fresh native object per
//! call. Variable references are resolved against the host store *now*, so a
//! binding always sees the variable's current value.
//!
//! Native to host: the returned object is converted to text according to the
//! binding's declared output kind. Delivery is a separate step, so the
//! conversion never needs the binding itself: the text lands either in the
//! caller's fixed result buffer or in the binding's overflow buffer.

use crate::interp::Interpreter;
use pyfunc_core::numeric::{atof, atoi};
use pyfunc_core::{
    BridgeError, FuncValue, HostHandle, OutputSpec, ResultBuffer, ScalarKind, VariableStore,
    format_double, format_int,
};

/// Build the native object for one input
pub fn to_native<R: Interpreter>(
    runtime: &R,
    value: &FuncValue,
    host: HostHandle,
    store: &mut dyn VariableStore,
) -> Result<R::Object, BridgeError> {
    let object = match value {
        FuncValue::Int(v) => runtime.new_int(*v),
        FuncValue::Double(v) => runtime.new_double(*v),
        FuncValue::String(s) => runtime.new_text(s),
        FuncValue::HostHandle => runtime.new_capsule(host),
        FuncValue::Variable { name, kind } => {
            let text = store.retrieve(name).ok_or_else(|| {
                BridgeError::Resolution(format!(
                    "Could not evaluate Python function input variable {}",
                    name
                ))
            })?;
            match kind {
                ScalarKind::Int => runtime.new_int(atoi(&text)),
                ScalarKind::Double => runtime.new_double(atof(&text)),
                ScalarKind::String => runtime.new_text(&text),
            }
        }
    };
    object.ok_or_else(|| {
        BridgeError::Arguments("Could not create Python function arguments".to_string())
    })
}

/// Convert a native result into host text for output kind `kind`
///
/// `variable` only names the host variable in the error message.
pub fn from_native<R: Interpreter>(
    runtime: &R,
    object: &R::Object,
    kind: ScalarKind,
    variable: &str,
) -> Result<String, BridgeError> {
    let converted = match kind {
        ScalarKind::Int => runtime.to_int(object).map(format_int),
        ScalarKind::Double => runtime.to_double(object).map(format_double),
        ScalarKind::String => runtime.to_text(object),
    };
    converted.map_err(|detail| {
        let expected = match kind {
            ScalarKind::Int => "integer",
            ScalarKind::Double => "float",
            ScalarKind::String => "string",
        };
        BridgeError::Output(format!(
            "Python function evaluation failed: expected {} result for v_{} ({})",
            expected, variable, detail
        ))
    })
}

/// Write result `text` where `output` wants it
///
/// Strings go to the overflow buffer when the binding declared one, otherwise
/// everything is written (truncated) into `result`.
pub fn deliver(text: &str, output: Option<&mut OutputSpec>, result: &mut ResultBuffer) {
    match output {
        Some(OutputSpec {
            kind: ScalarKind::String,
            overflow: Some(overflow),
            ..
        }) => overflow.write(text),
        _ => result.write(text),
    }
}
