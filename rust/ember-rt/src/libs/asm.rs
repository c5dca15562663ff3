//! Textual assembler and disassembler.
//!
//! A routine is described by a struct:
//!
//! ```text
//! {:name "inc" :arity 1 :slotcount 1
//!  :bytecode [(addim 0 0 1) (ret 0)]}
//! ```
//!
//! Bytecode entries are tuples headed by a mnemonic. A keyword in the
//! bytecode marks the position of the next instruction, and a keyword used
//! as a jump operand assembles to the relative offset of that label.

use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::function::{Arity, FuncDef, FuncFlags, Function};
use crate::table::Struct;
use crate::value::Value;
use crate::vm::{Vm, VmError};
use ember_core::{Imm, Instruction, OpCode, Shape};
use rustc_hash::FxHashMap;
use std::rc::Rc;
use std::str::FromStr;

fn asm_error(msg: impl Into<String>) -> VmError {
    VmError::Error(Value::string(msg.into()))
}

fn field(desc: &Value, key: &str) -> Value {
    let k = Value::keyword(key);
    match desc {
        Value::Struct(s) => s.get(&k),
        Value::Table(t) => t.borrow().get(&k),
        _ => Value::Nil,
    }
}

fn opt_u32(desc: &Value, key: &str) -> Result<Option<u32>, VmError> {
    match field(desc, key) {
        Value::Nil => Ok(None),
        v => v
            .as_index()
            .map(|n| Some(n as u32))
            .ok_or_else(|| asm_error(format!("expected non-negative integer for :{}", key))),
    }
}

fn opt_string(desc: &Value, key: &str) -> Option<String> {
    field(desc, key)
        .as_bytes()
        .map(|b| String::from_utf8_lossy(b).into_owned())
}

struct Assembler {
    labels: FxHashMap<Rc<[u8]>, usize>,
    max_slot: Option<u8>,
}

impl Assembler {
    fn slot(&mut self, v: &Value) -> Result<u8, VmError> {
        let n = v
            .as_index()
            .filter(|n| *n <= u8::MAX as usize)
            .ok_or_else(|| asm_error(format!("expected slot index, got {}", v.describe())))?
            as u8;
        self.max_slot = Some(self.max_slot.map_or(n, |m| m.max(n)));
        Ok(n)
    }

    fn immediate(&self, v: &Value, imm: Imm, pc: usize, min: i64, max: i64) -> Result<i64, VmError> {
        let n = match (imm, v) {
            (Imm::Jump, Value::Keyword(label)) => {
                let target = self.labels.get(label).ok_or_else(|| {
                    asm_error(format!("unknown label :{}", String::from_utf8_lossy(label)))
                })?;
                *target as i64 - pc as i64
            }
            _ => match v {
                Value::Number(n) if n.fract() == 0.0 => *n as i64,
                other => return Err(asm_error(format!("expected integer, got {}", other.describe()))),
            },
        };
        if n < min || n > max {
            return Err(asm_error(format!("immediate {} out of range [{}, {}]", n, min, max)));
        }
        Ok(n)
    }

    fn instruction(&mut self, entry: &[Value], pc: usize) -> Result<Instruction, VmError> {
        let (head, operands) = entry
            .split_first()
            .ok_or_else(|| asm_error("empty instruction"))?;
        let mnemonic = match head {
            Value::Symbol(s) => String::from_utf8_lossy(s).into_owned(),
            other => return Err(asm_error(format!("expected mnemonic, got {}", other.describe()))),
        };
        let op = OpCode::from_str(&mnemonic)
            .map_err(|_| asm_error(format!("unknown instruction {}", mnemonic)))?;
        let shape = op.shape();
        if operands.len() != shape.operand_count() {
            return Err(asm_error(format!(
                "{} expects {} operands, got {}",
                mnemonic,
                shape.operand_count(),
                operands.len()
            )));
        }
        Ok(match shape {
            Shape::Empty => Instruction::op(op),
            Shape::S => Instruction::s(op, self.slot(&operands[0])?),
            Shape::SS => Instruction::ss(op, self.slot(&operands[0])?, self.slot(&operands[1])?),
            Shape::SSS => Instruction::sss(
                op,
                self.slot(&operands[0])?,
                self.slot(&operands[1])?,
                self.slot(&operands[2])?,
            ),
            Shape::SI(imm) => {
                let a = self.slot(&operands[0])?;
                let n = match imm {
                    Imm::Constant => self.immediate(&operands[1], imm, pc, 0, u16::MAX as i64)? as u16 as i16,
                    _ => self.immediate(&operands[1], imm, pc, i16::MIN as i64, i16::MAX as i64)? as i16,
                };
                Instruction::si(op, a, n)
            }
            Shape::SSI(imm) => {
                let a = self.slot(&operands[0])?;
                let b = self.slot(&operands[1])?;
                let n = match imm {
                    Imm::Index | Imm::Signal => self.immediate(&operands[2], imm, pc, 0, u8::MAX as i64)? as u8 as i8,
                    _ => self.immediate(&operands[2], imm, pc, i8::MIN as i64, i8::MAX as i64)? as i8,
                };
                Instruction::ssi(op, a, b, n)
            }
            Shape::L(imm) => {
                let n = self.immediate(&operands[0], imm, pc, -(1 << 23), (1 << 23) - 1)?;
                Instruction::l(op, n as i32)
            }
        })
    }
}

/// Assembles a routine description into a verified function.
pub fn assemble(desc: &Value) -> Result<Rc<Function>, VmError> {
    if !matches!(desc, Value::Struct(_) | Value::Table(_)) {
        return Err(VmError::type_error("struct or table", desc));
    }
    let name = opt_string(desc, "name").unwrap_or_else(|| "_thunk".to_string());
    let doc = opt_string(desc, "doc");
    let vararg = field(desc, "vararg").truthy();
    let fixed = opt_u32(desc, "arity")?.unwrap_or(0);
    let min = opt_u32(desc, "min-arity")?.unwrap_or(fixed);
    let max = if vararg {
        None
    } else {
        Some(opt_u32(desc, "max-arity")?.unwrap_or(fixed))
    };
    let code = field(desc, "bytecode")
        .as_indexed()
        .ok_or_else(|| asm_error("expected :bytecode to be a tuple or array"))?;
    let constants = match field(desc, "constants") {
        Value::Nil => Vec::new(),
        v => v
            .as_indexed()
            .ok_or_else(|| asm_error("expected :constants to be a tuple or array"))?,
    };

    let mut asm = Assembler {
        labels: FxHashMap::default(),
        max_slot: None,
    };
    let mut pc = 0;
    for entry in &code {
        match entry {
            Value::Keyword(label) => {
                asm.labels.insert(label.clone(), pc);
            }
            _ => pc += 1,
        }
    }

    let mut bytecode = Vec::with_capacity(pc);
    for entry in &code {
        match entry {
            Value::Keyword(_) => {}
            Value::Tuple(parts) => {
                let ins = asm.instruction(parts, bytecode.len())?;
                bytecode.push(ins);
            }
            other => return Err(asm_error(format!("expected instruction, got {}", other.describe()))),
        }
    }

    let frame_floor = fixed + u32::from(vararg);
    let used = asm.max_slot.map_or(0, |m| m as u32 + 1);
    let slot_count = match opt_u32(desc, "slotcount")? {
        Some(n) => n,
        None => used.max(frame_floor),
    };

    let def = FuncDef {
        name,
        doc,
        flags: FuncFlags {
            vararg,
            intrinsic: None,
        },
        arity: Arity { fixed, min, max },
        slot_count,
        bytecode,
        constants,
    };
    def.verify()
        .map_err(|e| asm_error(format!("{}: {}", def.name, e)))?;
    Ok(Function::new(def))
}

/// The description [`assemble`] accepts for `func`.
pub fn disassemble(func: &Function) -> Value {
    let def = &func.def;
    let bytecode = def
        .bytecode
        .iter()
        .map(|ins| {
            let mut parts = vec![ins
                .opcode()
                .map(|op| Value::symbol(op.mnemonic()))
                .unwrap_or_default()];
            parts.extend(ins.operands().into_iter().map(|n| Value::Number(n as f64)));
            Value::tuple(parts)
        })
        .collect();
    let mut pairs = vec![
        (Value::keyword("name"), Value::string(&def.name)),
        (Value::keyword("arity"), Value::Number(def.arity.fixed as f64)),
        (Value::keyword("min-arity"), Value::Number(def.arity.min as f64)),
        (Value::keyword("vararg"), Value::Boolean(def.flags.vararg)),
        (Value::keyword("slotcount"), Value::Number(def.slot_count as f64)),
        (Value::keyword("bytecode"), Value::tuple(bytecode)),
        (Value::keyword("constants"), Value::tuple(def.constants.clone())),
    ];
    if let Some(max) = def.arity.max {
        pairs.push((Value::keyword("max-arity"), Value::Number(max as f64)));
    }
    if let Some(doc) = &def.doc {
        pairs.push((Value::keyword("doc"), Value::string(doc)));
    }
    if let Some(intrinsic) = def.flags.intrinsic {
        pairs.push((Value::keyword("intrinsic"), Value::keyword(intrinsic.name())));
    }
    Value::structure(Struct::from_pairs(pairs))
}

fn cfun_asm(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("asm", args, 1)?;
    Ok(Value::Function(assemble(&args[0])?))
}

fn cfun_disasm(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("disasm", args, 1)?;
    match &args[0] {
        Value::Function(f) => Ok(disassemble(f)),
        other => Err(VmError::type_error("function", other)),
    }
}

const ENTRIES: &[Entry] = &[
    ("asm", cfun_asm,
        "(asm assembly)\n\nReturns a new function that is the compiled result of the assembly. The syntax for the assembly can be found on the ember website, and should correspond to the return value of disasm. Will throw an error on invalid assembly."),
    ("disasm", cfun_disasm,
        "(disasm func)\n\nReturns assembly that could be used to compile the given function. func must be a function, not a c function. Will throw on error on a badly typed argument."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;

    fn read(src: &str) -> Value {
        reader::parse(src).unwrap().unwrap().to_value()
    }

    #[test]
    fn test_assemble_with_labels() {
        // (fn [x] (if x 1 2))
        let f = assemble(&read(
            "{:name \"pick\" :arity 1
              :bytecode [(jmpno 0 :else) (ldi 0 1) (ret 0)
                         :else (ldi 0 2) (ret 0)]}",
        ))
        .unwrap();
        assert_eq!(f.def.slot_count, 1);
        assert_eq!(f.def.bytecode[0].jump_offset(), Some(3));
        let mut vm = Vm::default();
        let f = Value::Function(f);
        assert_eq!(vm.call(&f, &[true.into()]).unwrap(), Value::Number(1.0));
        assert_eq!(vm.call(&f, &[Value::Nil]).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_disasm_reassembles_identically() {
        let f = assemble(&read(
            "{:name \"k\" :doc \"constant\" :arity 0 :constants [\"hi\"]
              :bytecode [(ldc 0 0) (ret 0)]}",
        ))
        .unwrap();
        let desc = disassemble(&f);
        let again = assemble(&desc).unwrap();
        assert_eq!(again.def.bytecode, f.def.bytecode);
        assert_eq!(again.def.doc.as_deref(), Some("constant"));
        assert_eq!(field(&desc, "bytecode").describe(), "((ldc 0 0) (ret 0))");
    }

    #[test]
    fn test_vararg_frame_floor() {
        let f = assemble(&read("{:arity 1 :vararg true :bytecode [(ret 1)]}")).unwrap();
        assert_eq!(f.def.arity.max, None);
        assert_eq!(f.def.slot_count, 2);
    }

    #[test]
    fn test_rejects_bad_assembly() {
        for src in [
            "{:bytecode [(nope 0)]}",
            "{:bytecode [(ret)]}",
            "{:bytecode [(jmp :missing)]}",
            "{:bytecode [(ldi 0 70000) (ret 0)]}",
            "{:bytecode [(ldn 0)]}",
            "{:slotcount 1 :bytecode [(ret 3)]}",
        ] {
            assert!(assemble(&read(src)).is_err(), "{} should not assemble", src);
        }
    }
}
