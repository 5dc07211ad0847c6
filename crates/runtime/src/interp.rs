//! Capability set of the embedded runtime
//!
//! The bridge sees the embedded interpreter only through this trait: bring it
//! up or down, execute source in one shared namespace, resolve a callable,
//! build a handful of scalar objects, call, and convert the result back.
//! Native objects are opaque handles (`Self::Object`) that the bridge never
//! inspects beyond those conversions.
//!
//! Every method is called with the global runtime lock held; implementations
//! must not assume anything about which thread calls them beyond that.
//!
//! Apart from startup and teardown, methods take `&self`: a call into the
//! runtime may run code that re-enters the bridge, so no exclusive borrow can
//! be held across it.

use crate::config::BridgeConfig;
use pyfunc_core::HostHandle;
use std::path::Path;

/// Outcome of looking a name up in the shared namespace
#[derive(Debug)]
pub enum Resolved<O> {
    Callable(O),
    NotCallable,
    NotFound,
}

/// Why executing source failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The file could not be opened or read
    Open(String),
    /// The runtime raised while executing; carries its diagnostic
    Raised(String),
}

/// Embedded interpreter as seen by the bridge
pub trait Interpreter {
    /// Opaque native object handle
    type Object;

    /// Whether an interpreter instance is already live in this process
    fn is_initialized(&self) -> bool;

    /// One-time startup of the interpreter and its thread-safety primitive
    fn initialize(&mut self, config: &BridgeConfig) -> Result<(), String>;

    /// Fetch (or create) the shared namespace named by the configuration
    fn attach_namespace(&mut self, config: &BridgeConfig) -> Result<(), String>;

    /// Shut the interpreter down; only called by the owning bridge
    fn finalize(&mut self);

    /// Execute inline source text in the shared namespace
    fn run_source(&self, source: &str) -> Result<(), SourceError>;

    /// Execute a source file in the shared namespace
    fn run_file(&self, path: &Path) -> Result<(), SourceError>;

    /// Look `name` up in the shared namespace
    fn resolve(&self, name: &str) -> Resolved<Self::Object>;

    /// New native integer; `None` if the runtime could not allocate it
    fn new_int(&self, value: i64) -> Option<Self::Object>;

    fn new_double(&self, value: f64) -> Option<Self::Object>;

    fn new_text(&self, value: &str) -> Option<Self::Object>;

    /// Opaque capsule carrying the host instance pointer
    fn new_capsule(&self, host: HostHandle) -> Option<Self::Object>;

    /// New reference to `object`, released separately with [`Interpreter::release`]
    fn duplicate(&self, object: &Self::Object) -> Self::Object;

    /// Call `callable` with positional `args`, consuming them
    ///
    /// On failure returns the runtime's diagnostic text.
    fn call(&self, callable: &Self::Object, args: Vec<Self::Object>) -> Result<Self::Object, String>;

    fn to_int(&self, object: &Self::Object) -> Result<i64, String>;

    fn to_double(&self, object: &Self::Object) -> Result<f64, String>;

    fn to_text(&self, object: &Self::Object) -> Result<String, String>;

    /// Drop the bridge's reference to a native object
    fn release(&self, object: Self::Object);
}
