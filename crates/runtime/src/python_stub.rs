//! Stub backend used when the "python" feature is disabled.
//!
//! Provides the same `CPython` type so the facade and the C ABI compile
//! unchanged. Startup fails with a message telling the user how to rebuild;
//! no other method is reachable because no bridge can be constructed.

use crate::config::BridgeConfig;
use crate::interp::{Interpreter, Resolved, SourceError};
use pyfunc_core::HostHandle;
use std::path::Path;

pub const FEATURE_MSG: &str =
    "Python support missing! Rebuild with: cargo build --features python";

/// Placeholder for the embedded interpreter
#[derive(Debug, Default)]
pub struct CPython;

/// Never constructed: there are no native objects without a runtime
#[derive(Debug)]
pub enum NoObject {}

impl CPython {
    pub fn new() -> Self {
        CPython
    }
}

impl Interpreter for CPython {
    type Object = NoObject;

    fn is_initialized(&self) -> bool {
        false
    }

    fn initialize(&mut self, _config: &BridgeConfig) -> Result<(), String> {
        Err(FEATURE_MSG.to_string())
    }

    fn attach_namespace(&mut self, _config: &BridgeConfig) -> Result<(), String> {
        Err(FEATURE_MSG.to_string())
    }

    fn finalize(&mut self) {}

    fn run_source(&self, _source: &str) -> Result<(), SourceError> {
        Err(SourceError::Raised(FEATURE_MSG.to_string()))
    }

    fn run_file(&self, _path: &Path) -> Result<(), SourceError> {
        Err(SourceError::Raised(FEATURE_MSG.to_string()))
    }

    fn resolve(&self, _name: &str) -> Resolved<NoObject> {
        Resolved::NotFound
    }

    fn new_int(&self, _value: i64) -> Option<NoObject> {
        None
    }

    fn new_double(&self, _value: f64) -> Option<NoObject> {
        None
    }

    fn new_text(&self, _value: &str) -> Option<NoObject> {
        None
    }

    fn new_capsule(&self, _host: HostHandle) -> Option<NoObject> {
        None
    }

    fn duplicate(&self, object: &NoObject) -> NoObject {
        match *object {}
    }

    fn call(&self, callable: &NoObject, _args: Vec<NoObject>) -> Result<NoObject, String> {
        match *callable {}
    }

    fn to_int(&self, object: &NoObject) -> Result<i64, String> {
        match *object {}
    }

    fn to_double(&self, object: &NoObject) -> Result<f64, String> {
        match *object {}
    }

    fn to_text(&self, object: &NoObject) -> Result<String, String> {
        match *object {}
    }

    fn release(&self, object: NoObject) {
        match object {}
    }
}
