//! Scripted interpreter for exercising the bridge without CPython
//!
//! Implements [`Interpreter`] over a tiny line language so tests can drive
//! definitions, redefinitions and calls end to end:
//!
//! ```text
//! def <name> = <library-fn>   # bind a callable from the test library
//! let <name> = <literal>      # bind a non-callable value
//! raise <message>             # fail the load
//! ```
//!
//! Process-global state (initialization, namespace, counters) is shared
//! through `Rc<RefCell<Process>>` so two interpreters built from the same
//! process behave like two bridges inside one OS process.

use crate::config::BridgeConfig;
use crate::interp::{Interpreter, Resolved, SourceError};
use pyfunc_core::HostHandle;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

pub type NativeFn = Rc<dyn Fn(&[Obj]) -> Result<Obj, String>>;

#[derive(Clone)]
pub enum Obj {
    None,
    Int(i64),
    Double(f64),
    Text(String),
    Capsule(usize),
    Func(String, NativeFn),
    /// Extra reference handed out by `duplicate`
    Ref(Box<Obj>),
}

impl std::fmt::Debug for Obj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Obj::None => write!(f, "None"),
            Obj::Int(v) => write!(f, "i:{}", v),
            Obj::Double(v) => write!(f, "f:{}", v),
            Obj::Text(s) => write!(f, "s:{}", s),
            Obj::Capsule(p) => write!(f, "p:{:#x}", p),
            Obj::Func(name, _) => write!(f, "<function {}>", name),
            Obj::Ref(inner) => write!(f, "&{:?}", inner),
        }
    }
}

#[derive(Default)]
pub struct Process {
    pub initialized: bool,
    pub init_count: usize,
    pub finalize_count: usize,
    pub attached: bool,
    pub namespace: HashMap<String, Obj>,
    pub library: HashMap<String, NativeFn>,
    pub sources: Vec<String>,
    pub calls: Vec<Vec<Obj>>,
    pub released_functions: Vec<String>,
    pub released_refs: usize,
    /// Runs after a function object is released, outside any borrow
    pub on_release: Option<Rc<dyn Fn(&str)>>,
    pub fail_allocation: bool,
    pub fail_attach: bool,
}

impl Process {
    /// A fresh, not-yet-initialized process with the standard test library
    pub fn shared() -> Rc<RefCell<Process>> {
        let mut process = Process::default();
        process.install_standard_library();
        Rc::new(RefCell::new(process))
    }

    pub fn define(&mut self, name: &str, f: impl Fn(&[Obj]) -> Result<Obj, String> + 'static) {
        self.library.insert(name.to_string(), Rc::new(f));
    }

    fn install_standard_library(&mut self) {
        self.define("add", |args| {
            if args.iter().any(|a| matches!(a, Obj::Double(_))) {
                let mut total = 0.0;
                for arg in args {
                    match arg {
                        Obj::Int(v) => total += *v as f64,
                        Obj::Double(v) => total += v,
                        other => return Err(format!("TypeError: cannot add {:?}", other)),
                    }
                }
                Ok(Obj::Double(total))
            } else {
                let mut total = 0;
                for arg in args {
                    match arg {
                        Obj::Int(v) => total += v,
                        other => return Err(format!("TypeError: cannot add {:?}", other)),
                    }
                }
                Ok(Obj::Int(total))
            }
        });
        self.define("first", |args| {
            args.first()
                .cloned()
                .ok_or_else(|| "IndexError: no arguments".to_string())
        });
        self.define("describe", |args| {
            let parts: Vec<String> = args.iter().map(|a| format!("{:?}", a)).collect();
            Ok(Obj::Text(parts.join(",")))
        });
        self.define("concat", |args| {
            let mut out = String::new();
            for arg in args {
                match arg {
                    Obj::Text(s) => out.push_str(s),
                    other => return Err(format!("TypeError: cannot concat {:?}", other)),
                }
            }
            Ok(Obj::Text(out))
        });
        self.define("pi", |_| Ok(Obj::Double(3.14159265358979)));
        self.define("seven", |_| Ok(Obj::Int(7)));
        self.define("long", |_| Ok(Obj::Text("x".repeat(200))));
        self.define("nothing", |_| Ok(Obj::None));
        self.define("fail", |_| {
            Err("Traceback (most recent call last):\nZeroDivisionError: division by zero".to_string())
        });
    }
}

pub struct ScriptedInterpreter {
    process: Rc<RefCell<Process>>,
}

impl ScriptedInterpreter {
    pub fn new(process: &Rc<RefCell<Process>>) -> Self {
        ScriptedInterpreter {
            process: Rc::clone(process),
        }
    }

    fn execute(&self, source: &str) -> Result<(), SourceError> {
        let mut process = self.process.borrow_mut();
        process.sources.push(source.to_string());
        for line in source.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(message) = line.strip_prefix("raise ") {
                return Err(SourceError::Raised(message.to_string()));
            }
            let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));
            let (name, value) = match rest.split_once('=') {
                Some((n, v)) => (n.trim().to_string(), v.trim()),
                None => {
                    return Err(SourceError::Raised(format!(
                        "SyntaxError: invalid syntax: {}",
                        line
                    )));
                }
            };
            match keyword {
                "def" => {
                    let f = process
                        .library
                        .get(value)
                        .cloned()
                        .ok_or_else(|| SourceError::Raised(format!("NameError: {}", value)))?;
                    process
                        .namespace
                        .insert(name, Obj::Func(value.to_string(), f));
                }
                "let" => {
                    let literal = if let Ok(v) = value.parse::<i64>() {
                        Obj::Int(v)
                    } else if let Ok(v) = value.parse::<f64>() {
                        Obj::Double(v)
                    } else {
                        Obj::Text(value.trim_matches('"').to_string())
                    };
                    process.namespace.insert(name, literal);
                }
                _ => {
                    return Err(SourceError::Raised(format!(
                        "SyntaxError: invalid syntax: {}",
                        line
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Interpreter for ScriptedInterpreter {
    type Object = Obj;

    fn is_initialized(&self) -> bool {
        self.process.borrow().initialized
    }

    fn initialize(&mut self, _config: &BridgeConfig) -> Result<(), String> {
        let mut process = self.process.borrow_mut();
        process.initialized = true;
        process.init_count += 1;
        Ok(())
    }

    fn attach_namespace(&mut self, _config: &BridgeConfig) -> Result<(), String> {
        let mut process = self.process.borrow_mut();
        if process.fail_attach {
            return Err("no main module".to_string());
        }
        process.attached = true;
        Ok(())
    }

    fn finalize(&mut self) {
        let mut process = self.process.borrow_mut();
        process.initialized = false;
        process.finalize_count += 1;
        process.namespace.clear();
    }

    fn run_source(&self, source: &str) -> Result<(), SourceError> {
        self.execute(source)
    }

    fn run_file(&self, path: &Path) -> Result<(), SourceError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Open(format!("{}: {}", path.display(), e)))?;
        self.execute(&source)
    }

    fn resolve(&self, name: &str) -> Resolved<Obj> {
        match self.process.borrow().namespace.get(name) {
            Some(f @ Obj::Func(..)) => Resolved::Callable(f.clone()),
            Some(_) => Resolved::NotCallable,
            None => Resolved::NotFound,
        }
    }

    fn new_int(&self, value: i64) -> Option<Obj> {
        (!self.process.borrow().fail_allocation).then_some(Obj::Int(value))
    }

    fn new_double(&self, value: f64) -> Option<Obj> {
        (!self.process.borrow().fail_allocation).then_some(Obj::Double(value))
    }

    fn new_text(&self, value: &str) -> Option<Obj> {
        (!self.process.borrow().fail_allocation).then(|| Obj::Text(value.to_string()))
    }

    fn new_capsule(&self, host: HostHandle) -> Option<Obj> {
        (!self.process.borrow().fail_allocation).then_some(Obj::Capsule(host.as_ptr() as usize))
    }

    fn duplicate(&self, object: &Obj) -> Obj {
        Obj::Ref(Box::new(object.clone()))
    }

    fn call(&self, callable: &Obj, args: Vec<Obj>) -> Result<Obj, String> {
        self.process.borrow_mut().calls.push(args.clone());
        call_native(callable, &args)
    }

    fn to_int(&self, object: &Obj) -> Result<i64, String> {
        match object {
            Obj::Int(v) => Ok(*v),
            other => Err(format!("TypeError: {:?} is not an integer", other)),
        }
    }

    fn to_double(&self, object: &Obj) -> Result<f64, String> {
        match object {
            Obj::Int(v) => Ok(*v as f64),
            Obj::Double(v) => Ok(*v),
            other => Err(format!("TypeError: must be real number, not {:?}", other)),
        }
    }

    fn to_text(&self, object: &Obj) -> Result<String, String> {
        match object {
            Obj::Text(s) => Ok(s.clone()),
            other => Err(format!("TypeError: {:?} is not a string", other)),
        }
    }

    fn release(&self, object: Obj) {
        match object {
            Obj::Func(name, _) => {
                let hook = {
                    let mut process = self.process.borrow_mut();
                    process.released_functions.push(name.clone());
                    process.on_release.clone()
                };
                if let Some(hook) = hook {
                    hook(&name);
                }
            }
            Obj::Ref(_) => self.process.borrow_mut().released_refs += 1,
            _ => {}
        }
    }
}

/// No borrow of the process is held here: library functions may re-enter
fn call_native(callable: &Obj, args: &[Obj]) -> Result<Obj, String> {
    match callable {
        Obj::Func(_, f) => f(args),
        Obj::Ref(inner) => call_native(inner, args),
        other => Err(format!("TypeError: {:?} is not callable", other)),
    }
}
