//! End-to-end scenarios: source text through reader and machine to
//! final values.

use serial_test::serial;
use skm_core::value::Value;
use skm_vsm::config::{GcSettings, VsmConfig};
use skm_vsm::error::VsmError;
use skm_vsm::interp::Schematika;

fn interp() -> Schematika {
    Schematika::new(VsmConfig::default())
}

/// Evaluate `src` and return the last form's boxed value, cloned out
/// of the heap.
fn eval_last(interp: &mut Schematika, src: &str) -> Value {
    let results = interp.eval_source(src);
    let last = results
        .last()
        .unwrap_or_else(|| panic!("no forms in {src:?}"));
    match last {
        Ok(r) => interp
            .value_of(*r)
            .unwrap_or_else(|| panic!("{src:?} produced a non-value object")),
        Err(e) => panic!("{src:?} failed: {e}"),
    }
}

#[test]
#[serial]
fn test_define_then_reference_global() {
    let mut s = interp();
    let v = eval_last(&mut s, "def pi : f64 = 3.14159265; pi;");
    assert_eq!(v, Value::F64(3.14159265));
}

#[test]
#[serial]
fn test_define_evaluates_to_defined_value() {
    let mut s = interp();
    let v = eval_last(&mut s, "def pi : f64 = 3.14159265;");
    assert_eq!(v, Value::F64(3.14159265));
}

#[test]
#[serial]
fn test_immediate_lambda_application() {
    let mut s = interp();
    let v = eval_last(&mut s, "(lambda (x:i64, y:i64) { x * y; })(13, 15);");
    assert_eq!(v, Value::I64(195));
}

#[test]
#[serial]
fn test_float_multiplication() {
    let mut s = interp();
    let v = eval_last(&mut s, "3.14159265 * 0.5;");
    assert_eq!(v, Value::F64(1.570796325));
}

#[test]
#[serial]
fn test_defined_procedure_applied() {
    let mut s = interp();
    let v = eval_last(&mut s, "def sq = lambda (x : f64) { x * x; }; sq(4.0);");
    assert_eq!(v, Value::F64(16.0));
}

#[test]
#[serial]
fn test_block_with_nested_define() {
    let mut s = interp();
    let v = eval_last(
        &mut s,
        "def foo = lambda (x:f64) { def y = x * x; y; };  foo(3.0);",
    );
    assert_eq!(v, Value::F64(9.0));
}

#[test]
#[serial]
fn test_syntax_error_then_clean_continue() {
    let mut s = interp();
    s.begin_interactive_session();
    let results = s.eval_source("def foo : f64 = ;\ndef ok = 5; ok;\n");
    assert_eq!(results.len(), 3);
    let Err(VsmError::Read(_)) = &results[0] else {
        panic!("first form should be a syntax error");
    };
    let ok = results[2].as_ref().expect("recovery failed");
    assert_eq!(s.value_of(*ok), Some(Value::I64(5)));
}

#[test]
#[serial]
fn test_if_selects_branches() {
    let mut s = interp();
    assert_eq!(
        eval_last(&mut s, "if (1 == 1) then 10 else 20;"),
        Value::I64(10)
    );
    assert_eq!(
        eval_last(&mut s, "if (1 == 2) then 10 else 20;"),
        Value::I64(20)
    );
    assert_eq!(
        eval_last(&mut s, "if (2 > 1) then 1 else 2;"),
        Value::I64(1)
    );
}

#[test]
#[serial]
fn test_arithmetic_precedence_end_to_end() {
    let mut s = interp();
    assert_eq!(eval_last(&mut s, "1 + 2 * 3;"), Value::I64(7));
    assert_eq!(eval_last(&mut s, "(1 + 2) * 3;"), Value::I64(9));
    assert_eq!(eval_last(&mut s, "10 - 4 - 3;"), Value::I64(3));
    assert_eq!(eval_last(&mut s, "12 / 4 / 3;"), Value::I64(1));
}

#[test]
#[serial]
fn test_mixed_numeric_promotion() {
    let mut s = interp();
    assert_eq!(eval_last(&mut s, "1 + 0.5;"), Value::F64(1.5));
}

#[test]
#[serial]
fn test_closure_captures_environment() {
    let mut s = interp();
    let v = eval_last(
        &mut s,
        "def make_adder = lambda (n:i64) { lambda (m:i64) { n + m; }; };\n\
         def add3 = make_adder(3);\n\
         add3(4);",
    );
    assert_eq!(v, Value::I64(7));
}

#[test]
#[serial]
fn test_recursive_function() {
    let mut s = interp();
    let v = eval_last(
        &mut s,
        "def fact = lambda (n:i64) { if (n == 0) then 1 else n * fact(n - 1); };\n\
         fact(10);",
    );
    assert_eq!(v, Value::I64(3628800));
}

#[test]
#[serial]
fn test_zero_formal_lambda() {
    let mut s = interp();
    let v = eval_last(&mut s, "(lambda () { 42; })();");
    assert_eq!(v, Value::I64(42));
}

#[test]
#[serial]
fn test_sequence_value_is_last() {
    let mut s = interp();
    let v = eval_last(&mut s, "{ 1; 2; 3; };");
    assert_eq!(v, Value::I64(3));
}

#[test]
#[serial]
fn test_string_values() {
    let mut s = interp();
    let v = eval_last(&mut s, "def greeting = \"hello\\n\"; greeting;");
    assert_eq!(v, Value::Str("hello\n".to_string()));
    assert_eq!(
        eval_last(&mut s, "\"a\" == \"a\";"),
        Value::Bool(true)
    );
}

#[test]
#[serial]
fn test_division_by_zero_is_eval_error() {
    let mut s = interp();
    let results = s.eval_source("1 / 0;");
    let Err(VsmError::Eval(e)) = &results[0] else {
        panic!("expected eval error");
    };
    assert!(e.message.contains("division by zero"));
}

#[test]
#[serial]
fn test_applying_non_procedure_is_eval_error() {
    let mut s = interp();
    let results = s.eval_source("def x = 5; x(1);");
    let Err(VsmError::Eval(e)) = &results[1] else {
        panic!("expected eval error");
    };
    assert!(e.message.contains("not a procedure"));
}

#[test]
#[serial]
fn test_arity_mismatch_is_eval_error() {
    let mut s = interp();
    let results = s.eval_source("def sq = lambda (x:i64) { x * x; }; sq(1, 2);");
    let Err(VsmError::Eval(e)) = &results[1] else {
        panic!("expected eval error");
    };
    assert!(e.message.contains("arity mismatch"));
}

#[test]
#[serial]
fn test_non_boolean_if_test_is_eval_error() {
    let mut s = interp();
    let results = s.eval_source("if (1) then 2 else 3;");
    let Err(VsmError::Eval(e)) = &results[0] else {
        panic!("expected eval error");
    };
    assert!(e.message.contains("not a boolean"));
}

#[test]
#[serial]
fn test_eval_error_halts_form_but_not_session() {
    let mut s = interp();
    s.begin_interactive_session();
    let results = s.eval_source("1 / 0;\n2 + 3;");
    assert_eq!(results.len(), 2);
    assert!(results[0].is_err());
    let ok = results[1].as_ref().expect("session should continue");
    assert_eq!(s.value_of(*ok), Some(Value::I64(5)));
}

#[test]
#[serial]
fn test_evaluation_across_collections() {
    // a small young generation forces collections mid-evaluation
    let mut cfg = VsmConfig::default();
    cfg.gc = GcSettings {
        n_generations: 2,
        space_z: 96 * 1024,
        redline_z: 0,
        trigger_z: 16 * 1024,
        promote_age: 1,
    };
    let mut s = Schematika::new(cfg);
    s.eval_source("def fib = lambda (n:i64) { if (n < 2) then n else fib(n - 1) + fib(n - 2); };");
    let results = s.eval_source("fib(15);");
    let ok = results[0].as_ref().expect("evaluation survived collections");
    assert_eq!(s.value_of(*ok), Some(Value::I64(610)));
    // collections actually happened
    let stats = s.memory_stats();
    assert!(
        stats.iter().any(|g| g.n_collections > 0),
        "expected at least one collection: {stats:?}"
    );
}

#[test]
#[serial]
fn test_globals_survive_explicit_collection() {
    let mut s = interp();
    s.eval_source("def pi : f64 = 3.14159265; def sq = lambda (x:f64) { x * x; };");
    s.collect_now();
    let v = eval_last(&mut s, "sq(pi);");
    assert_eq!(v, Value::F64(3.14159265 * 3.14159265));
}

#[test]
#[serial]
fn test_redefinition_overwrites() {
    let mut s = interp();
    let v = eval_last(&mut s, "def x = 1; def x = 2; x;");
    assert_eq!(v, Value::I64(2));
}

#[test]
#[serial]
fn test_render_value_forms() {
    let mut s = interp();
    let results = s.eval_source("3.14159265 * 0.5;");
    let r = *results[0].as_ref().unwrap();
    assert_eq!(s.render_value(r), "1.570796325");

    let results = s.eval_source("lambda (x:i64) { x; };");
    let r = *results[0].as_ref().unwrap();
    assert_eq!(s.render_value(r), "#<closure/1>");
}

#[test]
#[serial]
fn test_incomplete_input_suspends_and_resumes() {
    let mut s = interp();
    let results = s.read_eval("def x = 1 +", false);
    assert!(results.is_empty());
    assert!(s.is_incomplete());
    assert!(s.parser_stack_depth() > 1);
    let results = s.read_eval(" 2;", true);
    assert_eq!(results.len(), 1);
    let ok = results[0].as_ref().expect("resumed parse failed");
    assert_eq!(s.value_of(*ok), Some(Value::I64(3)));
}
