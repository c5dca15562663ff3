//! A core image must reproduce the environment the boot source builds.

use ember_rt::corelib::bootstrap::{ImageBootstrap, SourceBootstrap};
use ember_rt::corelib::make_image;
use ember_rt::corelib::templates::primitive_names;
use ember_rt::{Runtime, RuntimeConfig, Value, Vm};

fn from_source() -> Runtime {
    Runtime::with_bootstrap(RuntimeConfig::default(), &SourceBootstrap).expect("source boot")
}

fn from_image() -> Runtime {
    let bytes = make_image(&mut Vm::default()).expect("image should build");
    Runtime::with_bootstrap(RuntimeConfig::default(), &ImageBootstrap::from_bytes(bytes))
        .expect("image boot")
}

const PROGRAMS: &[&str] = &[
    "(map inc [1 2 3])",
    "(filter odd? @[1 2 3 4 5])",
    "(reduce + 0 [1 2 3 4])",
    "(sum [1 2 3])",
    "(product [])",
    "(keys {:a 1})",
    "(values {:a 1})",
    "(last [1 2 3])",
    "(last [])",
    "(first (tuple :x :y))",
    "(apply + 1 2 [3 4])",
    "(order<= 1 1 2)",
    "(not (nil? nil))",
    "(string (zero? 0) (pos? -1) (even? 4))",
];

// ─── equivalence ───

#[test]
fn image_matches_source_results() {
    let mut src = from_source();
    let mut img = from_image();
    for program in PROGRAMS {
        let a = src.eval_str(program).unwrap();
        let b = img.eval_str(program).unwrap();
        assert_eq!(a.describe(), b.describe(), "{}", program);
    }
}

/// Argument lists every primitive is called with: none, one, and three in
/// ascending, descending, repeated, and mixed orders.
fn primitive_inputs() -> Vec<Vec<Value>> {
    vec![
        vec![],
        vec![1.into()],
        vec![1.into(), 2.into(), 3.into()],
        vec![3.into(), 2.into(), 1.into()],
        vec![2.into(), 2.into(), 1.into()],
        vec![1.into(), (-4).into(), 2.5.into()],
    ]
}

fn outcome(rt: &mut Runtime, name: &str, args: &[Value]) -> Result<String, String> {
    rt.call(name, args)
        .map(|v| v.describe())
        .map_err(|e| e.to_string())
}

#[test]
fn image_primitives_agree_with_source_primitives() {
    let mut src = from_source();
    let mut img = from_image();
    for name in primitive_names() {
        for args in primitive_inputs() {
            assert_eq!(
                outcome(&mut src, name, &args),
                outcome(&mut img, name, &args),
                "({} {:?})",
                name,
                args
            );
        }
    }
}

#[test]
fn image_has_the_same_bindings_and_docs() {
    let src = from_source();
    let img = from_image();
    assert_eq!(src.env().names(), img.env().names());
    for name in src.env().names() {
        assert_eq!(src.env().doc(&name), img.env().doc(&name), "{}", name);
    }
}

#[test]
fn image_keeps_source_locations() {
    let img = from_image();
    let src = img.env().binding("map").and_then(|b| b.source).expect("map has a source");
    assert_eq!(src.file, "boot/core.ember");
}

#[test]
fn image_resolves_natives_to_the_live_ones() {
    let img = from_image();
    match img.lookup("print") {
        Some(Value::CFunction(cf)) => assert_eq!(cf.name, "print"),
        other => panic!("print bound to {:?}", other),
    }
    assert_eq!(img.lookup("_env"), Some(img.env().to_value()));
}

#[test]
fn corrupted_image_is_rejected() {
    let mut bytes = make_image(&mut Vm::default()).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    let result = Runtime::with_bootstrap(RuntimeConfig::default(), &ImageBootstrap::from_bytes(bytes));
    assert!(result.is_err());
}

// ─── tail calls ───

#[test]
fn self_tail_calls_run_in_constant_space() {
    for mut rt in [from_source(), from_image()] {
        let countdown = rt
            .eval_str(
                "(asm '{:name \"countdown\" :arity 1
                        :bytecode [(eqim 1 0 0) (jmpif 1 :done)
                                   (addim 0 0 -1) (ldself 1) (push 0) (tcall 1)
                                   :done
                                   (ret 0)]})",
            )
            .unwrap();
        let v = rt.vm().call(&countdown, &[Value::Number(10000.0)]).unwrap();
        assert_eq!(v, Value::Number(0.0));
    }
}

#[test]
fn apply_tail_calls_do_not_grow_the_stack() {
    let mut rt = from_source();
    let v = rt.eval_str("(apply sum [(array/new 0)])").unwrap();
    assert_eq!(v, Value::Number(0.0));
    let big: Vec<Value> = (0..10000).map(|_| Value::Number(1.0)).collect();
    let plus = rt.lookup("+").unwrap();
    let v = rt.call("apply", &[plus, Value::array(big)]).unwrap();
    assert_eq!(v, Value::Number(10000.0));
}
