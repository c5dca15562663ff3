//! The dispatch loop.

use super::{ops, DebugEvent, Exit, Vm, VmError};
use crate::fiber::{FiberState, Frame};
use crate::value::Value;
use ember_core::{OpCode, SignalCode};
use std::cmp::Ordering;

/// Outcome of preparing a call.
enum Callee {
    /// A bytecode frame to push.
    Frame(Frame),
    /// A native or data-structure call that already produced its result.
    Value(Value),
}

fn jump_target(here: usize, offset: i32) -> usize {
    (here as i64 + offset as i64) as usize
}

/// Pops the running frame and hands `value` to the caller. Returns the
/// value when the fiber's outermost frame has returned.
fn pop_frame(st: &mut FiberState, value: Value) -> Option<Value> {
    st.frames.pop();
    match st.frames.last_mut() {
        Some(caller) => {
            let dest = caller.dest as usize;
            caller.slots[dest] = value;
            None
        }
        None => Some(value),
    }
}

impl Vm {
    pub(crate) fn execute(&mut self, st: &mut FiberState) -> Result<Exit, VmError> {
        loop {
            let Some(top) = st.frames.len().checked_sub(1) else {
                return Ok(Exit::Return(Value::Nil));
            };
            let (ins, here) = {
                let frame = &mut st.frames[top];
                let here = frame.pc;
                let ins = *frame.func.def.bytecode.get(here).ok_or_else(|| {
                    VmError::Runtime(format!("{} ran past its last instruction", frame.func.def.name))
                })?;
                frame.pc += 1;
                (ins, here)
            };
            let op = ins.opcode().ok_or(VmError::IllegalInstruction(ins.word()))?;
            let (a, b, c) = (ins.a() as usize, ins.b() as usize, ins.c() as usize);

            macro_rules! slot {
                ($i:expr) => {
                    st.frames[top].slots[$i]
                };
            }

            match op {
                OpCode::Noop => {}
                OpCode::Error => return Err(VmError::Error(slot!(a).clone())),
                OpCode::Signal => {
                    let payload = slot!(b).clone();
                    match SignalCode::from_repr(ins.c()) {
                        Some(SignalCode::Ok) => {
                            if let Some(v) = pop_frame(st, payload) {
                                return Ok(Exit::Return(v));
                            }
                        }
                        Some(SignalCode::Error) => return Err(VmError::Error(payload)),
                        Some(SignalCode::Debug) => {
                            if self.has_debug_callback() {
                                let function = st.frames[top].func.def.name.clone();
                                self.emit(DebugEvent::Signal {
                                    function,
                                    pc: here,
                                    value: payload,
                                });
                            }
                            slot!(a) = Value::Nil;
                        }
                        Some(SignalCode::Yield) => {
                            st.frames[top].dest = ins.a();
                            return Ok(Exit::Yield(payload));
                        }
                        None => {
                            return Err(VmError::UnhandledSignal(format!("signal {}", ins.c())))
                        }
                    }
                }
                OpCode::Return => {
                    let v = slot!(a).clone();
                    if let Some(v) = pop_frame(st, v) {
                        return Ok(Exit::Return(v));
                    }
                }
                OpCode::ReturnNil => {
                    if let Some(v) = pop_frame(st, Value::Nil) {
                        return Ok(Exit::Return(v));
                    }
                }
                OpCode::AddImmediate => {
                    let n = slot!(b)
                        .as_number()
                        .ok_or_else(|| VmError::type_error("number", &slot!(b)))?;
                    slot!(a) = Value::Number(n + ins.imm8() as f64);
                }
                OpCode::Add | OpCode::Subtract | OpCode::Multiply | OpCode::Divide => {
                    let v = ops::arith(op, &slot!(b), &slot!(c))?;
                    slot!(a) = v;
                }
                OpCode::BAnd
                | OpCode::BOr
                | OpCode::BXor
                | OpCode::ShiftLeft
                | OpCode::ShiftRight
                | OpCode::ShiftRightUnsigned => {
                    let v = ops::bitwise(op, &slot!(b), &slot!(c))?;
                    slot!(a) = v;
                }
                OpCode::BNot => {
                    let v = ops::bnot(&slot!(b))?;
                    slot!(a) = v;
                }
                OpCode::MoveNear => {
                    let v = slot!(b).clone();
                    slot!(a) = v;
                }
                OpCode::Jump => st.frames[top].pc = jump_target(here, ins.imm24()),
                OpCode::JumpIf => {
                    if slot!(a).truthy() {
                        st.frames[top].pc = jump_target(here, ins.imm16() as i32);
                    }
                }
                OpCode::JumpIfNot => {
                    if !slot!(a).truthy() {
                        st.frames[top].pc = jump_target(here, ins.imm16() as i32);
                    }
                }
                OpCode::GreaterThan | OpCode::LessThan | OpCode::Equals => {
                    let v = ops::order_compare(op, &slot!(b), &slot!(c));
                    slot!(a) = v;
                }
                OpCode::EqualsImmediate => {
                    let imm = ins.imm8() as f64;
                    let v = matches!(slot!(b), Value::Number(n) if n == imm);
                    slot!(a) = Value::Boolean(v);
                }
                OpCode::LessThanImmediate => {
                    let imm = Value::Number(ins.imm8() as f64);
                    let v = slot!(b).compare(&imm) == Ordering::Less;
                    slot!(a) = Value::Boolean(v);
                }
                OpCode::NumericGreaterThan
                | OpCode::NumericGreaterThanEqual
                | OpCode::NumericLessThan
                | OpCode::NumericLessThanEqual
                | OpCode::NumericEqual => {
                    let v = ops::numeric_compare(op, &slot!(b), &slot!(c))?;
                    slot!(a) = v;
                }
                OpCode::LoadNil => slot!(a) = Value::Nil,
                OpCode::LoadTrue => slot!(a) = Value::Boolean(true),
                OpCode::LoadFalse => slot!(a) = Value::Boolean(false),
                OpCode::LoadInteger => slot!(a) = Value::Number(ins.imm16() as f64),
                OpCode::LoadConstant => {
                    let k = ins.imm16() as u16 as usize;
                    let v = st.frames[top].func.def.constants[k].clone();
                    slot!(a) = v;
                }
                OpCode::LoadSelf => {
                    let f = Value::Function(st.frames[top].func.clone());
                    slot!(a) = f;
                }
                OpCode::Push => {
                    let v = slot!(a).clone();
                    st.pending.push(v);
                }
                OpCode::Push2 => {
                    let (x, y) = (slot!(a).clone(), slot!(b).clone());
                    st.pending.push(x);
                    st.pending.push(y);
                }
                OpCode::PushArray => {
                    let items = slot!(a)
                        .as_indexed()
                        .ok_or_else(|| VmError::type_error("array or tuple", &slot!(a)))?;
                    st.pending.extend(items);
                }
                OpCode::Call => {
                    let callee = slot!(b).clone();
                    let args = std::mem::take(&mut st.pending);
                    match self.prepare_call(&callee, args)? {
                        Callee::Frame(frame) => {
                            if st.frames.len() >= self.config.max_call_depth {
                                return Err(VmError::StackOverflow(self.config.max_call_depth));
                            }
                            st.frames[top].dest = ins.a();
                            st.frames.push(frame);
                        }
                        Callee::Value(v) => slot!(a) = v,
                    }
                }
                OpCode::TailCall => {
                    let callee = slot!(a).clone();
                    let args = std::mem::take(&mut st.pending);
                    match self.prepare_call(&callee, args)? {
                        Callee::Frame(frame) => st.frames[top] = frame,
                        Callee::Value(v) => {
                            if let Some(v) = pop_frame(st, v) {
                                return Ok(Exit::Return(v));
                            }
                        }
                    }
                }
                OpCode::Resume => {
                    let fiber = match &slot!(b) {
                        Value::Fiber(f) => f.clone(),
                        other => return Err(VmError::type_error("fiber", other)),
                    };
                    let v = slot!(c).clone();
                    let result = self.resume(&fiber, v)?;
                    slot!(a) = result;
                }
                OpCode::Get => {
                    let v = ops::get(&slot!(b), &slot!(c))?;
                    slot!(a) = v;
                }
                OpCode::Put => {
                    let v = slot!(c).clone();
                    ops::put(&slot!(a), &slot!(b), v)?;
                }
                OpCode::GetIndex => {
                    let v = ops::get_index(&slot!(b), c)?;
                    slot!(a) = v;
                }
                OpCode::Length => {
                    let n = ops::length(&slot!(b))?;
                    slot!(a) = Value::Number(n as f64);
                }
                OpCode::MakeArray => {
                    let items = std::mem::take(&mut st.pending);
                    slot!(a) = Value::array(items);
                }
                OpCode::MakeTuple => {
                    let items = std::mem::take(&mut st.pending);
                    slot!(a) = Value::tuple(items);
                }
            }
        }
    }

    fn prepare_call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Callee, VmError> {
        match callee {
            Value::Function(func) => {
                let frame = Frame::enter(func, args)?;
                if self.has_debug_callback() {
                    self.emit(DebugEvent::CallEnter {
                        function: func.def.name.clone(),
                    });
                }
                Ok(Callee::Frame(frame))
            }
            Value::CFunction(cf) => Ok(Callee::Value((cf.fun)(self, &args)?)),
            other => Ok(Callee::Value(call_data_structure(other, &args)?)),
        }
    }
}

/// Calling a data structure looks up its single argument; calling a
/// keyword looks itself up in its single argument.
pub(crate) fn call_data_structure(ds: &Value, args: &[Value]) -> Result<Value, VmError> {
    match ds {
        Value::Keyword(_) | Value::Table(_) | Value::Struct(_) | Value::Array(_)
        | Value::Tuple(_) | Value::String(_) | Value::Buffer(_) => match args {
            [arg] if matches!(ds, Value::Keyword(_)) => ops::get(arg, ds),
            [key] => ops::get(ds, key),
            _ => Err(VmError::Arity {
                name: ds.type_name().to_string(),
                expected: "1".to_string(),
                got: args.len(),
            }),
        },
        other => Err(VmError::type_error("callable", other)),
    }
}

#[cfg(test)]
mod tests {
    use crate::function::{Arity, FuncDef, FuncFlags, Function};
    use crate::value::Value;
    use crate::vm::{Vm, VmError};
    use ember_core::{Instruction, OpCode};

    fn func(arity: Arity, slots: u32, code: Vec<Instruction>, constants: Vec<Value>) -> Value {
        let def = FuncDef {
            name: "test".into(),
            doc: None,
            flags: FuncFlags::default(),
            arity,
            slot_count: slots,
            bytecode: code,
            constants,
        };
        def.verify().unwrap();
        Value::Function(Function::new(def))
    }

    #[test]
    fn test_add_immediate_and_return() {
        let f = func(
            Arity::exact(1),
            1,
            vec![
                Instruction::ssi(OpCode::AddImmediate, 0, 0, 5),
                Instruction::s(OpCode::Return, 0),
            ],
            vec![],
        );
        let mut vm = Vm::default();
        assert_eq!(vm.call(&f, &[Value::Number(2.0)]).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn test_call_writes_destination_slot() {
        let inner = func(
            Arity::exact(1),
            1,
            vec![
                Instruction::ss(OpCode::Length, 0, 0),
                Instruction::s(OpCode::Return, 0),
            ],
            vec![],
        );
        let outer = func(
            Arity::exact(1),
            2,
            vec![
                Instruction::si(OpCode::LoadConstant, 1, 0),
                Instruction::s(OpCode::Push, 0),
                Instruction::ss(OpCode::Call, 0, 1),
                Instruction::s(OpCode::Return, 0),
            ],
            vec![inner],
        );
        let mut vm = Vm::default();
        let arg = Value::tuple(vec![Value::Nil, Value::Nil, Value::Nil]);
        assert_eq!(vm.call(&outer, &[arg]).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_arity_mismatch_is_reported() {
        let f = func(Arity::exact(2), 2, vec![Instruction::op(OpCode::ReturnNil)], vec![]);
        let mut vm = Vm::default();
        assert!(matches!(
            vm.call(&f, &[Value::Nil]),
            Err(VmError::Arity { got: 1, .. })
        ));
    }

    #[test]
    fn test_error_instruction_raises_value() {
        let f = func(Arity::exact(1), 1, vec![Instruction::s(OpCode::Error, 0)], vec![]);
        let mut vm = Vm::default();
        match vm.call(&f, &["boom".into()]) {
            Err(VmError::Error(v)) => assert_eq!(v, Value::string("boom")),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_unbounded_recursion_overflows() {
        let f = func(
            Arity::exact(0),
            1,
            vec![
                Instruction::s(OpCode::LoadSelf, 0),
                Instruction::ss(OpCode::Call, 0, 0),
                Instruction::s(OpCode::Return, 0),
            ],
            vec![],
        );
        let mut vm = Vm::default();
        assert!(matches!(vm.call(&f, &[]), Err(VmError::StackOverflow(1024))));
    }

    #[test]
    fn test_keyword_call_looks_up() {
        let mut vm = Vm::default();
        let st = Value::structure(crate::table::Struct::from_pairs([(
            Value::keyword("a"),
            Value::Number(1.0),
        )]));
        assert_eq!(vm.call(&Value::keyword("a"), &[st]).unwrap(), Value::Number(1.0));
    }
}
