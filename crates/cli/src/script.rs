//! Script runner for the reference host
//!
//! A script is a sequence of host commands, one per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! variable n string 10
//! variable area python circle
//! python circle input 1 v_n return v_area format ff here """
//! def circle(r):
//!     return 3.141592653589793 * r * r
//! """
//! print area is ${area}
//! ```
//!
//! `"""` opens a verbatim argument that may span lines; nothing inside it is
//! split or substituted. Outside of it, `${name}` is replaced by the value of
//! variable `name` (python-style variables call their function first) and
//! the rest is split with shell-like quoting.

use pyfunc_core::{BridgeError, FatalScope, HostHandle, MapVariableStore};
use pyfunc_runtime::{BridgeConfig, Python};
use std::ffi::c_void;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

const TRIPLE: &str = "\"\"\"";

#[derive(Debug)]
pub enum ScriptError {
    Io(std::io::Error),
    Syntax { line: usize, message: String },
    Bridge { line: usize, error: BridgeError },
}

impl ScriptError {
    /// Process exit code: 1 for collective failures, 2 for process-local ones
    pub fn exit_code(&self) -> i32 {
        match self {
            ScriptError::Bridge { error, .. } if error.scope() == FatalScope::One => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Io(e) => write!(f, "I/O error: {}", e),
            ScriptError::Syntax { line, message } => write!(f, "line {}: {}", line, message),
            ScriptError::Bridge { line, error } => write!(f, "line {}: {}", line, error),
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<std::io::Error> for ScriptError {
    fn from(e: std::io::Error) -> Self {
        ScriptError::Io(e)
    }
}

fn syntax(line: usize, message: impl Into<String>) -> ScriptError {
    ScriptError::Syntax {
        line,
        message: message.into(),
    }
}

/// Split script text into logical commands, joining `"""` blocks
///
/// Each command is paired with the line number it starts on.
pub fn commands(text: &str) -> Result<Vec<(usize, String)>, ScriptError> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        let (start, mut command) = match pending.take() {
            Some((start, mut command)) => {
                command.push('\n');
                command.push_str(line);
                (start, command)
            }
            None => {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                (number, line.to_string())
            }
        };
        if command.matches(TRIPLE).count() % 2 == 1 {
            pending = Some((start, command));
            continue;
        }
        command.truncate(command.trim_end().len());
        out.push((start, command));
    }

    match pending {
        Some((start, _)) => Err(syntax(start, "Unterminated triple quote")),
        None => Ok(out),
    }
}

pub struct Script<W: Write> {
    python: Python,
    /// Boxed so its address can be handed to python code as the host handle
    store: Box<MapVariableStore>,
    out: W,
}

impl<W: Write> Script<W> {
    pub fn new(config: BridgeConfig, out: W) -> Self {
        let mut store = Box::new(MapVariableStore::new());
        let host = HostHandle::from_ptr(&mut *store as *mut MapVariableStore as *mut c_void);
        Script {
            python: Python::new(config, host),
            store,
            out,
        }
    }

    pub fn store(&self) -> &MapVariableStore {
        &self.store
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Read and run a script file
    pub fn run_file(&mut self, path: &Path) -> Result<(), ScriptError> {
        let text = fs::read_to_string(path)?;
        self.run(&text)
    }

    /// Run every command of `text`, stopping at the first failure
    pub fn run(&mut self, text: &str) -> Result<(), ScriptError> {
        for (line, command) in commands(text)? {
            self.execute(line, &command)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn execute(&mut self, line: usize, command: &str) -> Result<(), ScriptError> {
        let tokens = self.tokenize(line, command)?;
        let Some((head, args)) = tokens.split_first() else {
            return Ok(());
        };
        debug!(line, command = %head, "executing");
        match head.as_str() {
            "python" => self
                .python
                .command(args, &mut *self.store)
                .map_err(|error| ScriptError::Bridge { line, error }),
            "variable" => self.variable(line, args),
            "print" => {
                writeln!(self.out, "{}", args.join(" "))?;
                Ok(())
            }
            other => Err(syntax(line, format!("Unknown command: {}", other))),
        }
    }

    /// `variable <name> string <value>` or `variable <name> python <func>`
    fn variable(&mut self, line: usize, args: &[String]) -> Result<(), ScriptError> {
        match args {
            [name, style, value] if style == "string" => {
                self.store.set(name.as_str(), value.as_str());
                Ok(())
            }
            [name, style, func] if style == "python" => {
                self.store.bind_python(name.as_str(), func.as_str());
                Ok(())
            }
            _ => Err(syntax(line, "Illegal variable command")),
        }
    }

    fn tokenize(&mut self, line: usize, command: &str) -> Result<Vec<String>, ScriptError> {
        let mut tokens = Vec::new();
        let mut rest = command;
        while let Some(start) = rest.find(TRIPLE) {
            tokens.extend(self.split_plain(line, &rest[..start])?);
            let after = &rest[start + TRIPLE.len()..];
            let end = after
                .find(TRIPLE)
                .ok_or_else(|| syntax(line, "Unterminated triple quote"))?;
            tokens.push(after[..end].to_string());
            rest = &after[end + TRIPLE.len()..];
        }
        tokens.extend(self.split_plain(line, rest)?);
        Ok(tokens)
    }

    fn split_plain(&mut self, line: usize, text: &str) -> Result<Vec<String>, ScriptError> {
        let text = self.substitute(line, text)?;
        shlex::split(&text).ok_or_else(|| syntax(line, "Unbalanced quotes"))
    }

    /// Replace every `${name}` in `text` with the variable's current value
    fn substitute(&mut self, line: usize, text: &str) -> Result<String, ScriptError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| syntax(line, "Invalid variable name in variable reference"))?;
            let value = self.evaluate(line, &after[..end])?;
            out.push_str(&value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Current value of `name`, calling its function for python-style variables
    fn evaluate(&mut self, line: usize, name: &str) -> Result<String, ScriptError> {
        let Some(binding) = self.store.python_binding(name).map(str::to_string) else {
            return self
                .store
                .get(name)
                .map(str::to_string)
                .ok_or_else(|| syntax(line, format!("Substitution for illegal variable {}", name)));
        };

        let bridge = |error| ScriptError::Bridge { line, error };
        if self.python.variable_match(&binding, name, false).is_none() {
            return Err(bridge(BridgeError::Resolution(
                "Python variable does not match Python function".to_string(),
            )));
        }
        let mut result = self.python.result_buffer();
        self.python
            .invoke_function(&binding, &mut *self.store, &mut result)
            .map_err(bridge)?;
        Ok(self
            .python
            .long_string(&binding)
            .unwrap_or_else(|| result.as_str().to_string()))
    }
}
