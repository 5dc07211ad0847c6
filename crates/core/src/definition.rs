//! Definition protocol
//!
//! Interprets one already-tokenized bridge command:
//!
//! ```text
//! <name> input <N> <value-or-ref>{N} return v_<var> format <codes> [length <n>] (file <path> | here <src> | exists)
//! <name> invoke
//! <name> source (<path> | <inline-src>)
//! ```
//!
//! Parsing is pure: nothing is registered and no source is run here. A
//! [`Definition`] is only produced once every keyword and every literal has
//! been validated, so a rejected command leaves no trace.

use crate::binding::{Binding, OutputSpec};
use crate::error::BridgeError;
use crate::numeric::{parse_float, parse_int};
use crate::value::{FuncValue, SELF_TOKEN, ScalarKind, strip_variable_prefix};
use std::path::PathBuf;

/// How the runtime source backing a definition is provided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLoad {
    /// No load keyword: bind to whatever the namespace already holds
    Unspecified,
    /// `file <path>`: execute the file in the shared namespace
    File(PathBuf),
    /// `here <src>`: execute inline source text
    Here(String),
    /// `exists`: the caller asserts the callable is already defined
    Exists,
}

impl SourceLoad {
    /// Whether this mode executes any source at all
    pub fn executes_source(&self) -> bool {
        matches!(self, SourceLoad::File(_) | SourceLoad::Here(_))
    }
}

/// A fully validated definition, ready to be bound
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub inputs: Vec<FuncValue>,
    pub output: Option<OutputSpec>,
    pub load: SourceLoad,
}

impl Definition {
    /// Split into an unbound binding and the load action
    pub fn into_parts<H>(self) -> (Binding<H>, SourceLoad) {
        (Binding::new(self.name, self.inputs, self.output), self.load)
    }
}

/// One parsed bridge command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `<name> invoke`
    Invoke { name: String },
    /// `<name> source <path-or-text>`
    Source { target: String },
    /// `<name> [keywords...]`
    Define(Definition),
}

/// Keyword arguments collected before validation
#[derive(Default)]
struct RawOptions<'a> {
    inputs: Vec<&'a str>,
    output: Option<&'a str>,
    format: Option<&'a str>,
    length: Option<usize>,
    file: Option<&'a str>,
    here: Option<&'a str>,
    exists: bool,
}

/// Parse a bridge command from its argument vector (`args[0]` is the name)
pub fn parse_command<S: AsRef<str>>(args: &[S]) -> Result<Command, BridgeError> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    if args.len() < 2 {
        return Err(BridgeError::invalid_command());
    }
    let name = args[0];

    if args.len() == 2 && args[1] == "invoke" {
        return Ok(Command::Invoke {
            name: name.to_string(),
        });
    }
    if args.len() == 3 && args[1] == "source" {
        return Ok(Command::Source {
            target: args[2].to_string(),
        });
    }

    let options = collect_options(&args)?;
    build_definition(name, options).map(Command::Define)
}

fn collect_options<'a>(args: &[&'a str]) -> Result<RawOptions<'a>, BridgeError> {
    let narg = args.len();
    let mut options = RawOptions::default();

    let mut iarg = 1;
    while iarg < narg {
        match args[iarg] {
            "input" => {
                if iarg + 2 > narg {
                    return Err(BridgeError::invalid_command());
                }
                let count = parse_int(args[iarg + 1])?;
                if count < 0 {
                    return Err(BridgeError::invalid_command());
                }
                let count = count as usize;
                iarg += 2;
                if iarg + count > narg {
                    return Err(BridgeError::invalid_command());
                }
                options.inputs = args[iarg..iarg + count].to_vec();
                iarg += count;
            }
            "return" => {
                if iarg + 2 > narg {
                    return Err(BridgeError::invalid_command());
                }
                options.output = Some(args[iarg + 1]);
                iarg += 2;
            }
            "format" => {
                if iarg + 2 > narg {
                    return Err(BridgeError::invalid_command());
                }
                options.format = Some(args[iarg + 1]);
                iarg += 2;
            }
            "length" => {
                if iarg + 2 > narg {
                    return Err(BridgeError::invalid_command());
                }
                let length = parse_int(args[iarg + 1])?;
                if length <= 0 {
                    return Err(BridgeError::invalid_command());
                }
                options.length = Some(length as usize);
                iarg += 2;
            }
            "file" => {
                if iarg + 2 > narg {
                    return Err(BridgeError::invalid_command());
                }
                options.file = Some(args[iarg + 1]);
                iarg += 2;
            }
            "here" => {
                if iarg + 2 > narg {
                    return Err(BridgeError::invalid_command());
                }
                options.here = Some(args[iarg + 1]);
                iarg += 2;
            }
            "exists" => {
                options.exists = true;
                iarg += 1;
            }
            _ => return Err(BridgeError::invalid_command()),
        }
    }

    let load_modes = [options.file.is_some(), options.here.is_some(), options.exists];
    if load_modes.iter().filter(|&&given| given).count() > 1 {
        return Err(BridgeError::invalid_command());
    }

    Ok(options)
}

fn build_definition(name: &str, options: RawOptions<'_>) -> Result<Definition, BridgeError> {
    let ninput = options.inputs.len();
    let noutput = usize::from(options.output.is_some());

    let codes: Vec<char> = match options.format {
        Some(format) => format.chars().collect(),
        None if ninput + noutput > 0 => return Err(BridgeError::invalid_command()),
        None => Vec::new(),
    };
    if codes.len() != ninput + noutput {
        return Err(BridgeError::invalid_command());
    }

    let inputs = options
        .inputs
        .iter()
        .zip(&codes)
        .map(|(token, &code)| parse_input(token, code))
        .collect::<Result<Vec<_>, _>>()?;

    let output = match options.output {
        Some(token) => Some(parse_output(token, codes[ninput], options.length)?),
        None if options.length.is_some() => {
            return Err(BridgeError::Definition(
                "Python command length keyword cannot be used unless output is a string"
                    .to_string(),
            ));
        }
        None => None,
    };

    let load = if let Some(path) = options.file {
        SourceLoad::File(PathBuf::from(path))
    } else if let Some(source) = options.here {
        SourceLoad::Here(source.to_string())
    } else if options.exists {
        SourceLoad::Exists
    } else {
        SourceLoad::Unspecified
    };

    Ok(Definition {
        name: name.to_string(),
        inputs,
        output,
        load,
    })
}

/// Interpret one input token under its format code
fn parse_input(token: &str, code: char) -> Result<FuncValue, BridgeError> {
    if let Some(variable) = strip_variable_prefix(token) {
        // Host handles are never passed through variables
        let kind = ScalarKind::from_code(code).ok_or_else(BridgeError::invalid_command)?;
        return Ok(FuncValue::Variable {
            name: variable.to_string(),
            kind,
        });
    }

    match code {
        'i' => parse_int(token).map(FuncValue::Int),
        'f' => parse_float(token).map(FuncValue::Double),
        's' => Ok(FuncValue::String(token.to_string())),
        'p' if token == SELF_TOKEN => Ok(FuncValue::HostHandle),
        _ => Err(BridgeError::invalid_command()),
    }
}

fn parse_output(token: &str, code: char, length: Option<usize>) -> Result<OutputSpec, BridgeError> {
    let kind = ScalarKind::from_code(code).ok_or_else(BridgeError::invalid_command)?;
    let variable = strip_variable_prefix(token).ok_or_else(BridgeError::invalid_command)?;

    let spec = OutputSpec::new(kind, variable);
    match length {
        Some(_) if kind != ScalarKind::String => Err(BridgeError::Definition(
            "Python command length keyword cannot be used unless output is a string".to_string(),
        )),
        Some(capacity) => Ok(spec.with_overflow(capacity)),
        None => Ok(spec),
    }
}
