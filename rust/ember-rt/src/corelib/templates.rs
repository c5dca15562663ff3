//! Hand-assembled primitives: variadic reducers, variadic comparators,
//! `apply`, and the fixed single-purpose routines.
//!
//! Every jump offset is relative to the jump instruction itself.

use super::assemble::quick_asm;
use super::BootError;
use crate::env::Env;
use crate::function::FuncFlags;
use ember_core::{Instruction, Intrinsic, OpCode, SignalCode};

use OpCode::*;

const fn s(op: OpCode, a: u8) -> Instruction {
    Instruction::s(op, a)
}

const fn ss(op: OpCode, a: u8, b: u8) -> Instruction {
    Instruction::ss(op, a, b)
}

const fn sss(op: OpCode, a: u8, b: u8, c: u8) -> Instruction {
    Instruction::sss(op, a, b, c)
}

const fn si(op: OpCode, a: u8, imm: i16) -> Instruction {
    Instruction::si(op, a, imm)
}

const fn ssi(op: OpCode, a: u8, b: u8, imm: i8) -> Instruction {
    Instruction::ssi(op, a, b, imm)
}

pub const VAROP_LEN: usize = 19;
pub const COMPARATOR_LEN: usize = 16;
pub const APPLY_LEN: usize = 12;

/// Frame size shared by the three templates.
pub const TEMPLATE_SLOTS: u32 = 6;

/// Variadic reducer over `op`.
///
/// No arguments yield `nullary`, one argument `x` yields `unary op x`, and
/// more fold `op` left to right starting from the first argument.
///
/// Slots: 0 args, 1 argn, 2 test, 3 accumulator, 4 operand, 5 index.
pub const fn varop(op: OpCode, nullary: i16, unary: i16) -> [Instruction; VAROP_LEN] {
    [
        ss(Length, 1, 0),
        ssi(EqualsImmediate, 2, 1, 0),
        si(JumpIfNot, 2, 3),
        si(LoadInteger, 3, nullary),
        s(Return, 3),
        ssi(EqualsImmediate, 2, 1, 1),
        si(JumpIfNot, 2, 5),
        si(LoadInteger, 3, unary),
        ssi(GetIndex, 4, 0, 0),
        sss(op, 3, 3, 4),
        s(Return, 3),
        ssi(GetIndex, 3, 0, 0),
        si(LoadInteger, 5, 1),
        // loop
        sss(Get, 4, 0, 5),
        sss(op, 3, 3, 4),
        ssi(AddImmediate, 5, 5, 1),
        sss(Equals, 2, 5, 1),
        si(JumpIfNot, 2, -4),
        s(Return, 3),
    ]
}

/// Variadic ordered comparator over adjacent pairs.
///
/// Fewer than two arguments yield `true`. A pair passes when `op` holds,
/// or when it does not hold if `negate` is set; the first failing pair
/// ends the walk. `invert` swaps the literals returned for "all pairs
/// passed" (normally `true`) and "a pair failed" (normally `false`).
///
/// Slots: 0 args, 1 argn, 2 test, 3 last, 4 next, 5 index.
pub const fn comparator(op: OpCode, invert: bool, negate: bool) -> [Instruction; COMPARATOR_LEN] {
    let (success, failure) = if invert {
        (LoadFalse, LoadTrue)
    } else {
        (LoadTrue, LoadFalse)
    };
    // Short argument lists go to whichever tail block loads true.
    let short = if invert { 12 } else { 10 };
    let fail_jump = if negate { JumpIf } else { JumpIfNot };
    [
        ss(Length, 1, 0),
        ssi(LessThanImmediate, 2, 1, 2),
        si(JumpIf, 2, short),
        ssi(GetIndex, 3, 0, 0),
        si(LoadInteger, 5, 1),
        // loop
        sss(Get, 4, 0, 5),
        sss(op, 2, 3, 4),
        si(fail_jump, 2, 7),
        ssi(AddImmediate, 5, 5, 1),
        ss(MoveNear, 3, 4),
        sss(Equals, 2, 5, 1),
        si(JumpIfNot, 2, -6),
        s(success, 3),
        s(Return, 3),
        s(failure, 3),
        s(Return, 3),
    ]
}

/// `(apply f & args)`: pushes every element of `args` but the last, splats
/// the last, and tail calls `f`. With no `args` it tail calls `f` directly.
///
/// Slots: 0 f, 1 args, 2 argn, 3 test, 4 index, 5 element.
pub const fn apply() -> [Instruction; APPLY_LEN] {
    [
        ss(Length, 2, 1),
        ssi(EqualsImmediate, 3, 2, 0),
        si(JumpIf, 3, 9),
        si(LoadInteger, 4, 0),
        // loop
        sss(Get, 5, 1, 4),
        ssi(AddImmediate, 4, 4, 1),
        sss(Equals, 3, 4, 2),
        si(JumpIf, 3, 3),
        s(Push, 5),
        Instruction::l(Jump, -5),
        s(PushArray, 5),
        s(TailCall, 0),
    ]
}

struct Reducer {
    name: &'static str,
    op: OpCode,
    nullary: i16,
    unary: i16,
    intrinsic: Intrinsic,
    doc: &'static str,
}

fn reducers() -> [Reducer; 10] {
    let r = |name, op, nullary, unary, intrinsic, doc| Reducer {
        name,
        op,
        nullary,
        unary,
        intrinsic,
        doc,
    };
    [
        r("+", Add, 0, 0, Intrinsic::Add, "(+ & xs)\n\nReturns the sum of all xs. xs must be numbers. Returns 0 with no arguments."),
        r("-", Subtract, 0, 0, Intrinsic::Subtract, "(- & xs)\n\nWith one argument returns its negation; otherwise subtracts the rest of xs from the first."),
        r("*", Multiply, 1, 1, Intrinsic::Multiply, "(* & xs)\n\nReturns the product of all xs. Returns 1 with no arguments."),
        r("/", Divide, 1, 1, Intrinsic::Divide, "(/ & xs)\n\nWith one argument returns its reciprocal; otherwise divides the first of xs by the rest."),
        r("band", BAnd, -1, -1, Intrinsic::Band, "(band & xs)\n\nBitwise and of the 32-bit integers xs. Returns -1 with no arguments."),
        r("bor", BOr, 0, 0, Intrinsic::Bor, "(bor & xs)\n\nBitwise or of the 32-bit integers xs. Returns 0 with no arguments."),
        r("bxor", BXor, 0, 0, Intrinsic::Bxor, "(bxor & xs)\n\nBitwise exclusive or of the 32-bit integers xs. Returns 0 with no arguments."),
        r("blshift", ShiftLeft, 1, 1, Intrinsic::ShiftLeft, "(blshift x & shifts)\n\nShifts x left by each of shifts in turn."),
        r("brshift", ShiftRight, 1, 1, Intrinsic::ShiftRight, "(brshift x & shifts)\n\nArithmetic right shift of x by each of shifts in turn."),
        r("brushift", ShiftRightUnsigned, 1, 1, Intrinsic::ShiftRightUnsigned, "(brushift x & shifts)\n\nLogical right shift of x by each of shifts in turn."),
    ]
}

struct Comparator {
    name: &'static str,
    op: OpCode,
    invert: bool,
    negate: bool,
    intrinsic: Intrinsic,
    doc: &'static str,
}

fn comparators() -> [Comparator; 12] {
    let c = |name, op, invert, negate, intrinsic, doc| Comparator {
        name,
        op,
        invert,
        negate,
        intrinsic,
        doc,
    };
    [
        c("order>", GreaterThan, false, false, Intrinsic::OrderGt, "(order> & xs)\n\nCheck if xs is strictly descending according to the total order of values."),
        c("order<", LessThan, false, false, Intrinsic::OrderLt, "(order< & xs)\n\nCheck if xs is strictly ascending according to the total order of values."),
        c("order>=", LessThan, false, true, Intrinsic::OrderGte, "(order>= & xs)\n\nCheck if xs is non-ascending according to the total order of values."),
        c("order<=", GreaterThan, false, true, Intrinsic::OrderLte, "(order<= & xs)\n\nCheck if xs is non-descending according to the total order of values."),
        c("=", Equals, false, false, Intrinsic::OrderEq, "(= & xs)\n\nReturns true if all values in xs are the same."),
        c("not=", Equals, true, false, Intrinsic::OrderNeq, "(not= & xs)\n\nReturns true if any adjacent values in xs differ."),
        c(">", NumericGreaterThan, false, false, Intrinsic::Gt, "(> & xs)\n\nCheck if the numbers xs are strictly decreasing."),
        c("<", NumericLessThan, false, false, Intrinsic::Lt, "(< & xs)\n\nCheck if the numbers xs are strictly increasing."),
        c(">=", NumericGreaterThanEqual, false, false, Intrinsic::Gte, "(>= & xs)\n\nCheck if the numbers xs are non-increasing."),
        c("<=", NumericLessThanEqual, false, false, Intrinsic::Lte, "(<= & xs)\n\nCheck if the numbers xs are non-decreasing."),
        c("==", NumericEqual, false, false, Intrinsic::Eq, "(== & xs)\n\nCheck if all the numbers xs are numerically equal."),
        c("not==", NumericEqual, true, false, Intrinsic::Neq, "(not== & xs)\n\nCheck if any adjacent numbers in xs are numerically unequal."),
    ]
}

/// Assembles and binds every templated and fixed primitive.
pub fn register(env: &Env) -> Result<(), BootError> {
    let variadic = FuncFlags::vararg();
    let plain = FuncFlags::default();

    quick_asm(
        env,
        plain.with_intrinsic(Intrinsic::Debug),
        "debug",
        0,
        0,
        Some(0),
        1,
        &[ssi(Signal, 0, 0, SignalCode::Debug as i8), Instruction::op(ReturnNil)],
        "(debug)\n\nRaises the debug signal, which a debug hook may observe. Returns nil.",
    )?;
    quick_asm(
        env,
        plain.with_intrinsic(Intrinsic::Error),
        "error",
        1,
        1,
        Some(1),
        1,
        &[s(Error, 0)],
        "(error e)\n\nThrows the error value e, which the caller may catch.",
    )?;
    quick_asm(
        env,
        variadic.with_intrinsic(Intrinsic::Apply),
        "apply",
        1,
        1,
        None,
        TEMPLATE_SLOTS,
        &apply(),
        "(apply f & args)\n\nCalls f with args, splicing the elements of the last argument, an array or tuple, into the call.",
    )?;
    quick_asm(
        env,
        plain.with_intrinsic(Intrinsic::Yield),
        "yield",
        1,
        0,
        Some(1),
        2,
        &[ssi(Signal, 0, 0, SignalCode::Yield as i8), s(Return, 0)],
        "(yield &opt x)\n\nSuspends the current fiber, handing x to the resumer. Returns the value the fiber is next resumed with.",
    )?;
    quick_asm(
        env,
        plain.with_intrinsic(Intrinsic::Resume),
        "resume",
        2,
        1,
        Some(2),
        2,
        &[sss(Resume, 0, 0, 1), s(Return, 0)],
        "(resume fiber &opt x)\n\nResumes fiber with x. Returns the value it next yields or returns.",
    )?;
    quick_asm(
        env,
        plain.with_intrinsic(Intrinsic::Get),
        "get",
        2,
        2,
        Some(2),
        2,
        &[sss(Get, 0, 0, 1), s(Return, 0)],
        "(get ds key)\n\nGets the value stored under key in ds, or nil.",
    )?;
    quick_asm(
        env,
        plain.with_intrinsic(Intrinsic::Put),
        "put",
        3,
        3,
        Some(3),
        3,
        &[sss(Put, 0, 1, 2), s(Return, 0)],
        "(put ds key value)\n\nStores value under key in the mutable ds. Returns ds.",
    )?;
    quick_asm(
        env,
        plain.with_intrinsic(Intrinsic::Length),
        "length",
        1,
        1,
        Some(1),
        1,
        &[ss(Length, 0, 0), s(Return, 0)],
        "(length ds)\n\nReturns the number of elements, bytes, or entries in ds.",
    )?;
    quick_asm(
        env,
        plain.with_intrinsic(Intrinsic::Bnot),
        "bnot",
        1,
        1,
        Some(1),
        1,
        &[ss(BNot, 0, 0), s(Return, 0)],
        "(bnot x)\n\nBitwise complement of the 32-bit integer x.",
    )?;

    for r in reducers() {
        quick_asm(
            env,
            variadic.with_intrinsic(r.intrinsic),
            r.name,
            0,
            0,
            None,
            TEMPLATE_SLOTS,
            &varop(r.op, r.nullary, r.unary),
            r.doc,
        )?;
    }
    for c in comparators() {
        quick_asm(
            env,
            variadic.with_intrinsic(c.intrinsic),
            c.name,
            0,
            0,
            None,
            TEMPLATE_SLOTS,
            &comparator(c.op, c.invert, c.negate),
            c.doc,
        )?;
    }
    Ok(())
}

/// Names of every primitive [`register`] binds.
pub fn primitive_names() -> Vec<&'static str> {
    let mut names = vec!["debug", "error", "apply", "yield", "resume", "get", "put", "length", "bnot"];
    names.extend(reducers().iter().map(|r| r.name));
    names.extend(comparators().iter().map(|c| c.name));
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{verify, FrameLayout};

    fn variadic_layout() -> FrameLayout {
        FrameLayout {
            slot_count: TEMPLATE_SLOTS,
            constant_count: 0,
            fixed_arity: 0,
            min_arity: 0,
            max_arity: None,
            vararg: true,
        }
    }

    fn target(code: &[Instruction], pc: usize) -> usize {
        (pc as i64 + code[pc].jump_offset().unwrap() as i64) as usize
    }

    #[test]
    fn test_varop_shape() {
        let code = varop(Add, 0, 0);
        assert_eq!(code.len(), 19);
        assert_eq!(target(&code, 2), 5);
        assert_eq!(target(&code, 6), 11);
        assert_eq!(code[17].jump_offset(), Some(-4));
        assert_eq!(target(&code, 17), 13);
        assert_eq!(code[9], Instruction::sss(Add, 3, 3, 4));
        assert_eq!(code[14], Instruction::sss(Add, 3, 3, 4));
        verify(&code, &variadic_layout()).unwrap();
    }

    #[test]
    fn test_comparator_shape() {
        let code = comparator(LessThan, false, false);
        assert_eq!(code.len(), 16);
        assert_eq!(code[11].jump_offset(), Some(-6));
        assert_eq!(target(&code, 11), 5);
        assert_eq!(target(&code, 7), 14);
        assert_eq!(target(&code, 2), 12);
        assert_eq!(code[12].opcode(), Some(LoadTrue));
        verify(&code, &variadic_layout()).unwrap();
    }

    #[test]
    fn test_inverted_comparator_short_path_loads_true() {
        let code = comparator(Equals, true, false);
        let short = target(&code, 2);
        assert_eq!(short, 14);
        assert_eq!(code[short].opcode(), Some(LoadTrue));
        assert_eq!(code[12].opcode(), Some(LoadFalse));
    }

    #[test]
    fn test_negated_comparator_fails_when_op_holds() {
        let code = comparator(LessThan, false, true);
        assert_eq!(code[7].opcode(), Some(JumpIf));
        assert_eq!(target(&code, 7), 14);
    }

    #[test]
    fn test_apply_shape() {
        let code = apply();
        assert_eq!(code.len(), 12);
        assert_eq!(code[target(&code, 2)].opcode(), Some(TailCall));
        assert_eq!(code[target(&code, 7)].opcode(), Some(PushArray));
        assert_eq!(target(&code, 9), 4);
        let layout = FrameLayout {
            fixed_arity: 1,
            min_arity: 1,
            ..variadic_layout()
        };
        verify(&code, &layout).unwrap();
    }

    #[test]
    fn test_register_tags_every_primitive() {
        let env = Env::new();
        register(&env).unwrap();
        for name in primitive_names() {
            match env.lookup(name) {
                Some(crate::value::Value::Function(f)) => {
                    assert!(f.intrinsic().is_some(), "{name} lacks an intrinsic tag");
                    assert!(env.doc(name).is_some());
                }
                other => panic!("{name} bound to {other:?}"),
            }
        }
        assert_eq!(env.len(), primitive_names().len());
    }
}
