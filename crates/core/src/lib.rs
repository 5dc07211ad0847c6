//! pyfunc core: the host-side half of the embedded function bridge
//!
//! This crate knows nothing about the embedded runtime. It defines what a
//! binding *is* and how a host command describes one, so the runtime crate
//! only has to move values across the boundary.
//!
//! # Modules
//!
//! - `value`: typed inputs (literals, variable references, host handle)
//! - `binding`: binding descriptors and their declared outputs
//! - `registry`: name-keyed collection of bindings
//! - `definition`: the `input`/`return`/`format`/`length`/`file`/`here`/`exists` protocol
//! - `buffer`: fixed and overflow result buffers, result text formatting
//! - `numeric`: strict literal parsing and lenient variable conversion
//! - `store`: the host variable store contract
//! - `error`: error taxonomy and fatal scopes

pub mod binding;
pub mod buffer;
pub mod definition;
pub mod error;
pub mod numeric;
pub mod registry;
pub mod store;
pub mod value;

pub use binding::{Binding, OutputSpec};
pub use buffer::{OverflowBuffer, RESULT_CAPACITY, ResultBuffer, format_double, format_int};
pub use definition::{Command, Definition, SourceLoad, parse_command};
pub use error::{BridgeError, FatalScope};
pub use registry::Registry;
pub use store::{MapVariableStore, StoredVariable, VariableStore};
pub use value::{FuncValue, HostHandle, SELF_TOKEN, ScalarKind, VARIABLE_PREFIX, ValueKind};
