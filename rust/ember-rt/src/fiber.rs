//! Fibers: resumable call stacks.

use crate::function::Function;
use crate::value::Value;
use crate::vm::VmError;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberStatus {
    /// Created, never resumed.
    New,
    /// Suspended at a yield.
    Pending,
    /// Currently running.
    Alive,
    /// Returned.
    Dead,
    /// Raised an error.
    Error,
}

impl FiberStatus {
    pub fn name(self) -> &'static str {
        match self {
            FiberStatus::New => "new",
            FiberStatus::Pending => "pending",
            FiberStatus::Alive => "alive",
            FiberStatus::Dead => "dead",
            FiberStatus::Error => "error",
        }
    }
}

impl fmt::Display for FiberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub(crate) struct Frame {
    pub func: Rc<Function>,
    pub pc: usize,
    pub slots: Vec<Value>,
    /// Slot receiving the result of a pending call or resume.
    pub dest: u8,
}

impl Frame {
    /// Lays `args` out in a fresh frame, checking arity.
    pub fn enter(func: &Rc<Function>, args: Vec<Value>) -> Result<Self, VmError> {
        let def = &func.def;
        if !def.arity.accepts(args.len()) {
            return Err(VmError::Arity {
                name: def.name.clone(),
                expected: def.arity.describe(),
                got: args.len(),
            });
        }
        let mut slots = vec![Value::Nil; def.slot_count as usize];
        if def.flags.vararg {
            let fixed = def.arity.fixed as usize;
            let mut args = args.into_iter();
            for slot in slots.iter_mut().take(fixed) {
                *slot = args.next().unwrap_or(Value::Nil);
            }
            slots[fixed] = Value::tuple(args.collect());
        } else {
            for (slot, arg) in slots.iter_mut().zip(args) {
                *slot = arg;
            }
        }
        Ok(Self {
            func: func.clone(),
            pc: 0,
            slots,
            dest: 0,
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct FiberState {
    pub frames: Vec<Frame>,
    /// Arguments pushed for the next call.
    pub pending: Vec<Value>,
}

pub struct Fiber {
    pub(crate) func: Rc<Function>,
    pub(crate) status: FiberStatus,
    pub(crate) state: FiberState,
    pub(crate) last: Value,
}

impl Fiber {
    pub fn new(func: Rc<Function>) -> Self {
        Self {
            func,
            status: FiberStatus::New,
            state: FiberState::default(),
            last: Value::Nil,
        }
    }

    pub fn status(&self) -> FiberStatus {
        self.status
    }

    /// The value last yielded, returned, or raised.
    pub fn last_value(&self) -> &Value {
        &self.last
    }

    pub fn function(&self) -> &Rc<Function> {
        &self.func
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.state.frames.len()
    }
}

impl fmt::Debug for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("function", &self.func.def.name)
            .field("status", &self.status)
            .finish()
    }
}
