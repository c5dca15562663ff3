//! Register VM: fibers, calls, and the collector interface.

mod dispatch;
pub mod ops;

use crate::config::RuntimeConfig;
use crate::corelib::native::NativeError;
use crate::env::Env;
use crate::fiber::{Fiber, FiberStatus, Frame};
use crate::value::Value;
use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use thiserror::Error;

/// Type alias for debug callback to simplify type signatures
pub type DebugCallback = Option<Box<dyn FnMut(&DebugEvent)>>;

/// Debug events emitted during VM execution.
#[derive(Debug, Clone)]
pub enum DebugEvent {
    /// A routine raised the debug signal.
    Signal {
        function: String,
        pc: usize,
        value: Value,
    },
    /// A bytecode function was entered.
    CallEnter { function: String },
}

#[derive(Debug, Error)]
pub enum VmError {
    /// Raised by `error` or the `err` instruction; catchable by callers.
    #[error("{}", ops::error_message(.0))]
    Error(Value),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("arity mismatch: {name} expects {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("type error: expected {expected}, got {got}")]
    Type { expected: &'static str, got: String },
    #[error("stack overflow: depth exceeded {0}")]
    StackOverflow(usize),
    #[error("illegal instruction 0x{0:08x}")]
    IllegalInstruction(u32),
    #[error(transparent)]
    Native(#[from] NativeError),
    #[error("unhandled signal: {0}")]
    UnhandledSignal(String),
}

impl VmError {
    pub fn type_error(expected: &'static str, got: &Value) -> Self {
        VmError::Type {
            expected,
            got: got.type_name().to_string(),
        }
    }

    /// The error as a runtime value, as stored on a failed fiber.
    pub fn to_value(&self) -> Value {
        match self {
            VmError::Error(v) => v.clone(),
            other => Value::string(other.to_string()),
        }
    }
}

/// Collector bookkeeping. Values are reference counted, so a collection
/// only records that one was requested.
#[derive(Debug, Default)]
pub(crate) struct GcState {
    pub interval: usize,
    pub collections: u64,
    pub roots: Vec<Value>,
}

/// How a fiber is being entered.
pub(crate) enum Resume {
    Start(Vec<Value>),
    Value(Value),
}

/// How a run of the dispatch loop ended.
pub(crate) enum Exit {
    Return(Value),
    Yield(Value),
}

pub struct Vm {
    pub(crate) config: RuntimeConfig,
    pub(crate) gc: GcState,
    out: Box<dyn Write>,
    input: Box<dyn BufRead>,
    debug_callback: DebugCallback,
    fiber_depth: usize,
    /// Nested tree-walking evaluations, across every evaluator on this VM.
    pub(crate) eval_depth: usize,
    root_env: Option<Env>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Vm {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            gc: GcState {
                interval: config.gc_interval,
                ..GcState::default()
            },
            config,
            out: Box::new(io::stdout()),
            input: Box::new(io::BufReader::new(io::stdin())),
            debug_callback: None,
            fiber_depth: 0,
            eval_depth: 0,
            root_env: None,
        }
    }

    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    pub fn with_input(mut self, input: Box<dyn BufRead>) -> Self {
        self.input = input;
        self
    }

    pub fn set_debug_callback(&mut self, callback: DebugCallback) {
        self.debug_callback = callback;
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn output(&mut self) -> &mut dyn Write {
        self.out.as_mut()
    }

    pub fn input(&mut self) -> &mut dyn BufRead {
        self.input.as_mut()
    }

    /// Environment used by `eval` when none is passed.
    pub fn root_env(&self) -> Option<Env> {
        self.root_env.clone()
    }

    pub fn set_root_env(&mut self, env: Env) {
        self.root_env = Some(env);
    }

    /// Keeps `value` alive for the lifetime of the VM.
    pub fn gc_root(&mut self, value: Value) {
        self.gc.roots.push(value);
    }

    /// Removes one root equal to `value`. Returns whether one was found.
    pub fn gc_unroot(&mut self, value: &Value) -> bool {
        match self.gc.roots.iter().position(|v| v == value) {
            Some(i) => {
                self.gc.roots.swap_remove(i);
                true
            }
            None => false,
        }
    }

    pub fn gc_roots(&self) -> &[Value] {
        &self.gc.roots
    }

    pub fn gc_collect(&mut self) {
        self.gc.collections += 1;
        tracing::trace!(collections = self.gc.collections, roots = self.gc.roots.len(), "gc collect");
    }

    pub fn gc_collections(&self) -> u64 {
        self.gc.collections
    }

    pub fn gc_interval(&self) -> usize {
        self.gc.interval
    }

    pub fn set_gc_interval(&mut self, interval: usize) {
        self.gc.interval = interval;
    }

    /// Calls `f` with `args` on a fresh fiber and returns its result.
    /// A yield that escapes the call is an error.
    pub fn call(&mut self, f: &Value, args: &[Value]) -> Result<Value, VmError> {
        match f {
            Value::CFunction(cf) => (cf.fun)(self, args),
            Value::Function(func) => {
                let fiber = Rc::new(RefCell::new(Fiber::new(func.clone())));
                match self.run_fiber(&fiber, Resume::Start(args.to_vec()))? {
                    Exit::Return(v) => Ok(v),
                    Exit::Yield(_) => Err(VmError::UnhandledSignal("yield".into())),
                }
            }
            other => dispatch::call_data_structure(other, args),
        }
    }

    /// Resumes `fiber` with `value`, returning what it next yields or
    /// returns. A new fiber receives `value` as its argument when its
    /// function takes one.
    pub fn resume(&mut self, fiber: &Rc<RefCell<Fiber>>, value: Value) -> Result<Value, VmError> {
        match self.run_fiber(fiber, Resume::Value(value))? {
            Exit::Return(v) | Exit::Yield(v) => Ok(v),
        }
    }

    pub(crate) fn run_fiber(
        &mut self,
        fiber: &Rc<RefCell<Fiber>>,
        resume: Resume,
    ) -> Result<Exit, VmError> {
        if self.fiber_depth >= self.config.max_fiber_depth {
            return Err(VmError::StackOverflow(self.config.max_fiber_depth));
        }
        let mut state = {
            let mut fib = fiber.borrow_mut();
            match fib.status {
                FiberStatus::New => {
                    let args = match resume {
                        Resume::Start(args) => args,
                        Resume::Value(v) => {
                            let takes_arg = !matches!(fib.func.def.arity.max, Some(0));
                            if takes_arg {
                                vec![v]
                            } else {
                                Vec::new()
                            }
                        }
                    };
                    let frame = Frame::enter(&fib.func, args)?;
                    fib.state.frames.push(frame);
                }
                FiberStatus::Pending => {
                    let v = match resume {
                        Resume::Value(v) => v,
                        Resume::Start(args) => args.into_iter().next().unwrap_or(Value::Nil),
                    };
                    if let Some(top) = fib.state.frames.last_mut() {
                        let dest = top.dest as usize;
                        top.slots[dest] = v;
                    }
                }
                status => {
                    return Err(VmError::Runtime(format!(
                        "cannot resume fiber with status {}",
                        status
                    )))
                }
            }
            fib.status = FiberStatus::Alive;
            std::mem::take(&mut fib.state)
        };

        self.fiber_depth += 1;
        let result = self.execute(&mut state);
        self.fiber_depth -= 1;

        let mut fib = fiber.borrow_mut();
        fib.state = state;
        match &result {
            Ok(Exit::Return(v)) => {
                fib.status = FiberStatus::Dead;
                fib.last = v.clone();
            }
            Ok(Exit::Yield(v)) => {
                fib.status = FiberStatus::Pending;
                fib.last = v.clone();
            }
            Err(e) => {
                fib.status = FiberStatus::Error;
                fib.last = e.to_value();
            }
        }
        result
    }

    fn emit(&mut self, event: DebugEvent) {
        if let Some(cb) = self.debug_callback.as_mut() {
            cb(&event);
        }
    }

    fn has_debug_callback(&self) -> bool {
        self.debug_callback.is_some()
    }
}
