//! pyfunc runtime: the embedded-interpreter half of the function bridge
//!
//! Key pieces:
//! - `Interpreter`: the small capability set the bridge needs from a runtime
//! - `Lifecycle`: start/attach, the global lock, finalize-if-owned
//! - `marshal` / `invoke`: values across the boundary, one call end to end
//! - `Bridge`: registry plus commands; `Python`: the lazy host facade
//! - `ffi`: C ABI for C/C++ hosts
//!
//! The CPython backend lives behind the "python" feature. Without it a stub
//! with the same interface reports that Python support is missing.

pub mod bridge;
pub mod config;
pub mod error;
pub mod ffi;
pub mod host;
pub mod interp;
pub mod invoke;
pub mod lifecycle;
pub mod lock;
pub mod marshal;

#[cfg(feature = "python")]
pub mod python;

#[cfg(not(feature = "python"))]
#[path = "python_stub.rs"]
pub mod python;

#[cfg(test)]
mod scripted;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use error::{PYFUNC_FATAL_ALL, PYFUNC_FATAL_ONE, PYFUNC_OK};
pub use host::Python;
pub use interp::{Interpreter, Resolved, SourceError};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use lock::{RuntimeGuard, RuntimeLock};
pub use python::CPython;

// The binding model is part of this crate's API
pub use pyfunc_core::{
    BridgeError, FatalScope, HostHandle, MapVariableStore, ResultBuffer, VariableStore,
};
