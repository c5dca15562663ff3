//! Floating-point math.

use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::value::Value;
use crate::vm::{Vm, VmError};

macro_rules! unary {
    ($fname:ident, $name:literal, $method:ident) => {
        fn $fname(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
            args::fix_arity($name, args, 1)?;
            Ok(Value::Number(args::number(args, 0)?.$method()))
        }
    };
}

unary!(cfun_floor, "math/floor", floor);
unary!(cfun_ceil, "math/ceil", ceil);
unary!(cfun_round, "math/round", round);
unary!(cfun_sqrt, "math/sqrt", sqrt);
unary!(cfun_abs, "math/abs", abs);
unary!(cfun_log, "math/log", ln);
unary!(cfun_exp, "math/exp", exp);
unary!(cfun_sin, "math/sin", sin);
unary!(cfun_cos, "math/cos", cos);

fn cfun_pow(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("math/pow", args, 2)?;
    Ok(Value::Number(args::number(args, 0)?.powf(args::number(args, 1)?)))
}

const ENTRIES: &[Entry] = &[
    ("math/floor", cfun_floor, "(math/floor x)\n\nReturns the largest integer value number that is not greater than x."),
    ("math/ceil", cfun_ceil, "(math/ceil x)\n\nReturns the smallest integer value number that is not less than x."),
    ("math/round", cfun_round, "(math/round x)\n\nReturns the integer nearest to x, rounding half away from zero."),
    ("math/sqrt", cfun_sqrt, "(math/sqrt x)\n\nReturns the square root of x."),
    ("math/abs", cfun_abs, "(math/abs x)\n\nReturns the absolute value of x."),
    ("math/log", cfun_log, "(math/log x)\n\nReturns the natural logarithm of x."),
    ("math/exp", cfun_exp, "(math/exp x)\n\nReturns e to the power of x."),
    ("math/sin", cfun_sin, "(math/sin x)\n\nReturns the sine of x."),
    ("math/cos", cfun_cos, "(math/cos x)\n\nReturns the cosine of x."),
    ("math/pow", cfun_pow, "(math/pow a x)\n\nReturns a to the power of x."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
    env.def("math/pi", Value::Number(std::f64::consts::PI), Some("The value pi."));
    env.def("math/e", Value::Number(std::f64::consts::E), Some("The base of the natural log."));
    env.def("math/inf", Value::Number(f64::INFINITY), Some("The number representing positive infinity."));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unary_functions() {
        let mut vm = Vm::default();
        assert_eq!(cfun_floor(&mut vm, &[(-1.5).into()]).unwrap(), Value::Number(-2.0));
        assert_eq!(cfun_round(&mut vm, &[2.5.into()]).unwrap(), Value::Number(3.0));
        assert_eq!(cfun_sqrt(&mut vm, &[16.into()]).unwrap(), Value::Number(4.0));
        assert!(cfun_abs(&mut vm, &["x".into()]).is_err());
        assert_eq!(cfun_pow(&mut vm, &[2.into(), 10.into()]).unwrap(), Value::Number(1024.0));
    }

    #[test]
    fn test_constants_bound() {
        let env = Env::new();
        populate(&mut Vm::default(), &env);
        assert_eq!(env.lookup("math/inf"), Some(Value::Number(f64::INFINITY)));
    }
}
