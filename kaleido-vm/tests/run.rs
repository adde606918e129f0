use kaleido_vm::{Limits, Machine, RuntimeError, VmError, run_source};

fn run(source: &str) -> Vec<f64> {
    run_source(source, Limits::default()).unwrap_or_else(|e| panic!("{source:?} failed: {e}"))
}

fn run_sample(name: &str) -> Vec<f64> {
    let path = format!("../samples/{}.ks", name);
    let source = std::fs::read_to_string(&path).expect("failed to read sample");
    run(&source)
}

// ── Условные выражения ───────────────────────────────────────────────────

#[test]
fn zero_condition_selects_else() {
    assert_eq!(run("if 0 then 1 else 2;"), vec![2.0]);
}

#[test]
fn non_zero_condition_selects_then() {
    assert_eq!(run("if 1 then 1 else 2;"), vec![1.0]);
    assert_eq!(run("if 0 - 3 then 1 else 2;"), vec![1.0]);
}

#[test]
fn nested_conditionals_merge_correctly() {
    let source = "def sign(x) if x then (if (x / fabs(x)) - 1 then 0 - 1 else 1) else 0; \
                  extern fabs(x); sign(5); sign(0 - 5); sign(0);";
    assert_eq!(run(source), vec![1.0, -1.0, 0.0]);
}

// ── Арифметика ───────────────────────────────────────────────────────────

#[test]
fn right_associative_arithmetic() {
    assert_eq!(run_sample("assoc"), vec![9.0, 3.0, 14.0]);
}

#[test]
fn remainder_follows_fmod() {
    assert_eq!(run("7 % 3; (0 - 7) % 3;"), vec![1.0, -1.0]);
}

#[test]
fn division_by_zero_is_left_to_floating_point() {
    let values = run("1 / 0; 0 % 0;");
    assert_eq!(values[0], f64::INFINITY);
    assert!(values[1].is_nan());
}

// ── Функции ──────────────────────────────────────────────────────────────

#[test]
fn recursive_fibonacci() {
    assert_eq!(run_sample("fib"), vec![1.0, 55.0, 610.0]);
}

#[test]
fn builtin_externs() {
    assert_eq!(run_sample("math"), vec![5.0, 3.375, 2.0]);
}

#[test]
fn forward_reference_to_later_definition() {
    assert_eq!(run("def a(x) b(x) + 1; def b(y) y * 10; a(2);"), vec![21.0]);
}

#[test]
fn printd_reports_through_console() {
    let module = kaleido::compile("extern printd(x); printd(4) + 1;").unwrap();
    let mut machine = Machine::new(&module, Limits::default());
    let values = machine.run().unwrap();
    assert_eq!(values, vec![4.0, 1.0]);
    assert_eq!(machine.console.text(), "4.000000\n1.000000\n");
}

// ── Ошибки ───────────────────────────────────────────────────────────────

#[test]
fn unknown_external_fails_at_run_time() {
    let err = run_source("extern launch(x); launch(1);", Limits::default()).unwrap_err();
    assert!(matches!(
        err,
        VmError::Runtime(RuntimeError::UnresolvedExternal { ref name }) if name == "launch"
    ));
    assert_eq!(err.exit_code(), 70);
}

#[test]
fn compile_errors_keep_their_exit_code() {
    let err = run_source("def f(a, b) a; f(1);", Limits::default()).unwrap_err();
    assert!(matches!(err, VmError::Compile(_)));
    assert_eq!(err.exit_code(), 67);
}

#[test]
fn infinite_recursion_is_stopped() {
    let limits = Limits {
        max_depth: 100,
        ..Limits::default()
    };
    let err = run_source("def loop(x) loop(x); loop(1);", limits).unwrap_err();
    assert!(matches!(
        err,
        VmError::Runtime(RuntimeError::CallDepthExceeded { limit: 100, .. })
    ));
}

#[test]
fn default_limits_stop_runaway_recursion() {
    let err = run_source("def loop(x) loop(x + 1); loop(0);", Limits::default()).unwrap_err();
    assert!(matches!(
        err,
        VmError::Runtime(RuntimeError::CallDepthExceeded { limit: 1000, .. })
    ));
    assert_eq!(err.exit_code(), 70);
}

#[test]
fn deep_but_finite_recursion_returns() {
    let source = "def down(n) if n then down(n - 1) + 1 else 0; down(900);";
    assert_eq!(run(source), vec![900.0]);
}
