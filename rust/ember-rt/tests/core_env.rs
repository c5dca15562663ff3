//! The environment as a whole: catalog contents, shadowing, and natives.

use ember_rt::corelib::bootstrap::SourceBootstrap;
use ember_rt::{Runtime, RuntimeConfig, Value, VmError};

fn runtime() -> Runtime {
    Runtime::with_bootstrap(RuntimeConfig::default(), &SourceBootstrap).expect("core env should build")
}

#[test]
fn native_catalog_is_bound_with_docs() {
    let rt = runtime();
    for name in [
        "native", "print", "describe", "string", "symbol", "keyword", "buffer", "abstract?",
        "table", "array", "scan-number", "tuple", "struct", "gensym", "gccollect",
        "gcsetinterval", "gcinterval", "type", "next", "hash", "getline",
    ] {
        let b = rt.env().binding(name).unwrap_or_else(|| panic!("{} missing", name));
        assert!(matches!(b.value, Value::CFunction(_)), "{} is not native", name);
        assert!(b.doc.is_some_and(|d| d.starts_with(&format!("({}", name))), "{} has no doc", name);
    }
}

#[test]
fn dictionary_constructors_need_pairs() {
    let mut rt = runtime();
    for name in ["table", "struct"] {
        let err = rt.call(name, &[1.into(), 2.into(), 3.into()]).unwrap_err();
        assert!(err.to_string().contains("expected even number of arguments"));
    }
    assert_eq!(rt.call("struct", &[]).unwrap().describe(), "{}");
}

#[test]
fn sequence_constructors_accept_zero_arguments() {
    let mut rt = runtime();
    assert_eq!(rt.call("array", &[]).unwrap().describe(), "@[]");
    assert_eq!(rt.call("tuple", &[]).unwrap(), Value::tuple(vec![]));
    assert_eq!(rt.call("buffer", &[]).unwrap().describe(), "@\"\"");
}

#[test]
fn next_visits_each_key_once() {
    let mut rt = runtime();
    let t = rt
        .call("table", &[Value::keyword("a"), 1.into(), Value::keyword("b"), 2.into(), 3.into(), 4.into()])
        .unwrap();
    let mut seen = Vec::new();
    let mut key = rt.call("next", &[t.clone(), Value::Nil]).unwrap();
    while !key.is_nil() {
        seen.push(key.clone());
        key = rt.call("next", &[t.clone(), key]).unwrap();
    }
    assert_eq!(seen.len(), 3);
    seen.sort_by(|a, b| a.compare(b));
    seen.dedup();
    assert_eq!(seen.len(), 3);
}

#[test]
fn scan_number_forms() {
    let mut rt = runtime();
    for (src, expected) in [("1_000", 1000.0), ("0x1F", 31.0), ("8r17", 15.0), ("1.5e2", 150.0)] {
        assert_eq!(rt.call("scan-number", &[src.into()]).unwrap(), Value::Number(expected));
    }
    assert_eq!(rt.call("scan-number", &["12abc".into()]).unwrap(), Value::Nil);
}

#[test]
fn gensym_avoids_existing_symbols() {
    let mut rt = runtime();
    let taken = rt.eval_str("'_000001").unwrap();
    for _ in 0..4 {
        let fresh = rt.call("gensym", &[]).unwrap();
        assert_ne!(fresh, taken);
    }
}

#[test]
fn version_and_self_bindings() {
    let rt = runtime();
    assert_eq!(
        rt.lookup("ember/version"),
        Some(Value::string(env!("CARGO_PKG_VERSION")))
    );
    assert_eq!(rt.lookup("_env"), Some(rt.env().to_value()));
    assert!(rt.lookup("ember/build").is_some());
}

#[test]
fn libraries_are_populated() {
    let rt = runtime();
    for name in [
        "slurp", "math/floor", "array/push", "tuple/slice", "buffer/push-string", "table/setproto",
        "fiber/new", "os/clock", "parse", "eval", "debug/intrinsic", "string/split", "marshal",
    ] {
        assert!(rt.lookup(name).is_some(), "{} missing", name);
    }
}

#[cfg(feature = "typed-array")]
#[test]
fn typed_arrays_view_buffers() {
    let mut rt = runtime();
    let buf = rt.eval_str("(buffer/new 0)").unwrap();
    rt.call("buffer/push-string", &[buf.clone(), "\0\0\0\0".into()]).unwrap();
    let words = rt
        .call("tarray/new", &[Value::keyword("int32"), 1.into(), buf.clone()])
        .unwrap();
    rt.call("tarray/set", &[words.clone(), 0.into(), (-2).into()]).unwrap();
    assert_eq!(buf.to_bytes(), vec![0xfe, 0xff, 0xff, 0xff]);
    assert_eq!(rt.call("tarray/get", &[words, 0.into()]).unwrap(), Value::Number(-2.0));
}

#[test]
fn fibers_yield_and_resume() {
    let mut rt = runtime();
    // Yields its argument, then returns whatever it was resumed with plus one.
    let body = rt
        .eval_str(
            "(asm '{:arity 1 :bytecode [(sig 1 0 3) (addim 1 1 1) (ret 1)]})",
        )
        .unwrap();
    let fiber = rt.call("fiber/new", &[body]).unwrap();
    assert_eq!(rt.call("resume", &[fiber.clone(), 10.into()]).unwrap(), Value::Number(10.0));
    assert_eq!(rt.call("fiber/status", &[fiber.clone()]).unwrap(), Value::keyword("pending"));
    assert_eq!(rt.call("resume", &[fiber.clone(), 41.into()]).unwrap(), Value::Number(42.0));
    assert_eq!(rt.call("fiber/status", &[fiber.clone()]).unwrap(), Value::keyword("dead"));
    assert!(rt.call("resume", &[fiber, Value::Nil]).is_err());
}

#[test]
fn fibers_yield_through_the_yield_binding() {
    let mut rt = runtime();
    // Calls `yield` as an ordinary function, then returns its result plus one.
    let body = rt
        .eval_str(
            "(asm {:arity 1 :constants [yield] \
                   :bytecode '[(ldc 1 0) (push 0) (call 2 1) (addim 2 2 1) (ret 2)]})",
        )
        .unwrap();
    let fiber = rt.call("fiber/new", &[body]).unwrap();
    assert_eq!(rt.call("resume", &[fiber.clone(), 10.into()]).unwrap(), Value::Number(10.0));
    assert_eq!(rt.call("fiber/status", &[fiber.clone()]).unwrap(), Value::keyword("pending"));
    assert_eq!(rt.call("resume", &[fiber.clone(), 41.into()]).unwrap(), Value::Number(42.0));
    assert_eq!(rt.call("fiber/status", &[fiber]).unwrap(), Value::keyword("dead"));
}

#[test]
fn errors_are_values() {
    let mut rt = runtime();
    match rt.eval_str("(error {:code 7})") {
        Err(VmError::Error(v)) => assert_eq!(v.describe(), "{:code 7}"),
        other => panic!("expected a raised value, got {:?}", other),
    }
}

#[test]
fn print_writes_to_vm_output() {
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Shared(Rc<RefCell<Vec<u8>>>);
    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let out = Shared::default();
    let vm = ember_rt::Vm::default().with_output(Box::new(out.clone()));
    let mut rt = Runtime::from_vm(vm, &SourceBootstrap).unwrap();
    rt.eval_str("(print \"a\" 1 :b)").unwrap();
    assert_eq!(out.0.borrow().as_slice(), b"a1b\n");
}

#[test]
fn deeply_nested_input_is_a_catchable_error() {
    let mut rt = runtime();
    let src = format!("{}{}", "[".repeat(200_000), "]".repeat(200_000));
    for name in ["parse", "parse-all", "eval-string"] {
        let err = rt.call(name, &[Value::string(&src)]).unwrap_err();
        assert!(err.to_string().contains("nested deeper"), "{}: {}", name, err);
    }
    // The runtime is still usable afterwards.
    assert_eq!(rt.eval_str("(+ 1 2)").unwrap(), Value::Number(3.0));
}

#[test]
fn cyclic_data_cannot_be_evaluated_or_marshalled_past_the_limit() {
    let mut rt = runtime();
    let arr = rt.call("array", &[]).unwrap();
    rt.call("array/push", &[arr.clone(), arr.clone()]).unwrap();
    assert!(rt.call("eval", &[arr.clone()]).is_err());
    // Shared objects are written once, so a cycle marshals fine.
    assert!(rt.call("marshal", &[arr.clone()]).is_ok());
    rt.call("array/pop", &[arr]).unwrap();
}
