//! Bridge error taxonomy
//!
//! Every failure the bridge can report falls into one of the classes below.
//! None of them is recoverable inside the bridge: the host turns each one into
//! its own fatal-error report. What differs is *who* reports it:
//!
//! - [`FatalScope::All`]: the failure follows from the input script itself
//!   (bad keyword usage, missing variable, missing symbol). Every cooperating
//!   process sees the same failure, so the host may abort collectively.
//! - [`FatalScope::One`]: the failure happened inside the embedded runtime
//!   during a call. Only some processes of a distributed run may hit it, so
//!   each one must report independently.

use std::fmt;

/// Who is expected to observe a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalScope {
    /// Every cooperating process fails the same way
    All,
    /// Only the current process is known to have failed
    One,
}

/// Error raised by any bridge operation
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Malformed definition command (keyword usage, arity, type codes, load modes)
    Definition(String),
    /// A referenced host variable or binding name does not exist
    Resolution(String),
    /// Source could not be read or executed, or the callable was not found
    SourceLoad(String),
    /// Native argument objects could not be constructed
    Arguments(String),
    /// The native call raised inside the embedded runtime
    Call(String),
    /// The native result does not convert to the declared output kind
    Output(String),
    /// The embedded runtime could not be brought up
    Init(String),
    /// The embedded runtime backend is not compiled in
    Unavailable(String),
}

impl BridgeError {
    /// Whether this failure is collective or process-local
    pub fn scope(&self) -> FatalScope {
        match self {
            BridgeError::Call(_) | BridgeError::Output(_) => FatalScope::One,
            _ => FatalScope::All,
        }
    }

    /// The bare message without the class prefix
    pub fn message(&self) -> &str {
        match self {
            BridgeError::Definition(msg)
            | BridgeError::Resolution(msg)
            | BridgeError::SourceLoad(msg)
            | BridgeError::Arguments(msg)
            | BridgeError::Call(msg)
            | BridgeError::Output(msg)
            | BridgeError::Init(msg)
            | BridgeError::Unavailable(msg) => msg,
        }
    }

    /// Shorthand for the generic definition error used by most keyword checks
    pub fn invalid_command() -> Self {
        BridgeError::Definition("Invalid python command".to_string())
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = match self {
            BridgeError::Definition(_) => "definition error",
            BridgeError::Resolution(_) => "resolution error",
            BridgeError::SourceLoad(_) => "source load error",
            BridgeError::Arguments(_) => "argument error",
            BridgeError::Call(_) => "call error",
            BridgeError::Output(_) => "output error",
            BridgeError::Init(_) => "initialization error",
            BridgeError::Unavailable(_) => "unavailable",
        };
        write!(f, "{}: {}", class, self.message())
    }
}

impl std::error::Error for BridgeError {}
