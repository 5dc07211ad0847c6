//! Typed values passed from the host into embedded functions
//!
//! A [`FuncValue`] is one declared input of a binding. It is either a literal
//! parsed at definition time or a reference to a host variable that is looked
//! up again on every call.

use std::ffi::c_void;
use std::fmt;

/// Prefix marking a host variable reference (`v_name`)
pub const VARIABLE_PREFIX: &str = "v_";

/// The only literal accepted for a `p` (host handle) input
pub const SELF_TOKEN: &str = "SELF";

/// Scalar kinds that can flow in both directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Int,
    Double,
    String,
}

impl ScalarKind {
    /// Map a `format` code to a scalar kind (`p` is not a scalar)
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'i' => Some(ScalarKind::Int),
            'f' => Some(ScalarKind::Double),
            's' => Some(ScalarKind::String),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            ScalarKind::Int => 'i',
            ScalarKind::Double => 'f',
            ScalarKind::String => 's',
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, ScalarKind::String)
    }
}

/// Kind tag of a value as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Double,
    String,
    Pointer,
    None,
}

impl From<ScalarKind> for ValueKind {
    fn from(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Int => ValueKind::Int,
            ScalarKind::Double => ValueKind::Double,
            ScalarKind::String => ValueKind::String,
        }
    }
}

/// One declared input of a binding
#[derive(Debug, Clone, PartialEq)]
pub enum FuncValue {
    Int(i64),
    Double(f64),
    String(String),
    /// Opaque handle to the host instance; resolved by the bridge at call time
    HostHandle,
    /// Host variable resolved at call time, converted to `kind`
    Variable { name: String, kind: ScalarKind },
}

impl FuncValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FuncValue::Int(_) => ValueKind::Int,
            FuncValue::Double(_) => ValueKind::Double,
            FuncValue::String(_) => ValueKind::String,
            FuncValue::HostHandle => ValueKind::Pointer,
            FuncValue::Variable { kind, .. } => (*kind).into(),
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, FuncValue::Variable { .. })
    }

    /// Name of the referenced host variable, if this is a reference
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            FuncValue::Variable { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for FuncValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuncValue::Int(v) => write!(f, "{}", v),
            FuncValue::Double(v) => write!(f, "{}", v),
            FuncValue::String(s) => write!(f, "{:?}", s),
            FuncValue::HostHandle => write!(f, "{}", SELF_TOKEN),
            FuncValue::Variable { name, kind } => {
                write!(f, "{}{}:{}", VARIABLE_PREFIX, name, kind.code())
            }
        }
    }
}

/// Split a `v_name` token into its variable name
pub fn strip_variable_prefix(token: &str) -> Option<&str> {
    token.strip_prefix(VARIABLE_PREFIX)
}

/// Raw, non-owned pointer to the host instance
///
/// The bridge never dereferences it. It is wrapped into an opaque runtime
/// object so runtime-side code can hand it back to host extension APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostHandle(*mut c_void);

impl HostHandle {
    pub const fn null() -> Self {
        HostHandle(std::ptr::null_mut())
    }

    pub fn from_ptr(ptr: *mut c_void) -> Self {
        HostHandle(ptr)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for HostHandle {
    fn default() -> Self {
        HostHandle::null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_codes() {
        assert_eq!(ScalarKind::from_code('i'), Some(ScalarKind::Int));
        assert_eq!(ScalarKind::from_code('f'), Some(ScalarKind::Double));
        assert_eq!(ScalarKind::from_code('s'), Some(ScalarKind::String));
        assert_eq!(ScalarKind::from_code('p'), None);
        assert_eq!(ScalarKind::from_code('x'), None);
        assert!(ScalarKind::Double.is_numeric());
        assert!(!ScalarKind::String.is_numeric());
    }

    #[test]
    fn test_kind_of_variable_follows_declared_kind() {
        let v = FuncValue::Variable {
            name: "temp".to_string(),
            kind: ScalarKind::Double,
        };
        assert!(v.is_variable());
        assert_eq!(v.kind(), ValueKind::Double);
        assert_eq!(v.variable_name(), Some("temp"));
        assert_eq!(FuncValue::HostHandle.kind(), ValueKind::Pointer);
        assert!(!FuncValue::Int(3).is_variable());
    }

    #[test]
    fn test_strip_variable_prefix() {
        assert_eq!(strip_variable_prefix("v_abc"), Some("abc"));
        assert_eq!(strip_variable_prefix("abc"), None);
        assert_eq!(strip_variable_prefix("v"), None);
    }
}
