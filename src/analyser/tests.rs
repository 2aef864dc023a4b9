use crate::{
    config::SystemConfig,
    error::{ErrorKind, Exception},
    ir::OpKind,
    program::Program,
    runtime::value::{Symbol, Value},
    system::{CaptureSink, System},
};
use std::sync::Arc;

fn system_with(config: SystemConfig) -> (System, Arc<CaptureSink>) {
    let sink = Arc::new(CaptureSink::default());
    let system = System::with_sink(config, sink.clone()).expect("system");
    (system, sink)
}

fn run(text: &str) -> Result<Value, Exception> {
    let (system, _) = system_with(SystemConfig::default());
    let mut program = Program::from_text("test", text, &system);
    program.compile()?;
    program.eval()
}

fn num(text: &str) -> f64 {
    match run(text) {
        Ok(value) => value.as_num().unwrap_or_else(|| panic!("{text}: {value} is not a number")),
        Err(err) => panic!("{text}: {err}"),
    }
}

fn compile_error(text: &str) -> ErrorKind {
    let (system, _) = system_with(SystemConfig::default());
    let mut program = Program::from_text("test", text, &system);
    program.compile().expect_err(text).kind
}

#[test]
fn function_definitions() {
    assert_eq!(num("let f(x) = x * x in f 3"), 9.0);
    assert_eq!(num("let add x y = x + y in add 2 5"), 7.0);
    assert_eq!(num("let f = x -> x + 1 in f 1"), 2.0);
}

#[test]
fn definitions_are_order_independent() {
    assert_eq!(num("let a = b + 1; b = 2 in a"), 3.0);
    assert_eq!(num("let f x = g x + k; g x = x * k; k = 2 in f 1"), 4.0);
}

#[test]
fn braces_hold_modules_or_records() {
    let module = run("{a = 1; b = a + 1}").expect("module");
    assert_eq!(module.field(&Symbol::new("b")).and_then(|b| b.as_num()), Some(2.0));
    let colons = run("{a: 1, b: a + 1}").expect("module");
    assert_eq!(colons.field(&Symbol::new("b")).and_then(|b| b.as_num()), Some(2.0));
    let record = run("let r = {a: 1} in {...r, c: 3}").expect("record");
    assert_eq!(record.to_string(), "{a:1,c:3}");
    assert_eq!(run("{}").expect("empty").to_string(), "{}");
}

#[test]
fn closures_capture_each_variable_once() {
    let (system, _) = system_with(SystemConfig::default());
    let mut program = Program::from_text("test", "x -> y -> x + x * y", &system);
    program.compile().expect("compile");
    let op = &program.analysis().expect("analysis").op;
    let OpKind::Lambda { lambda, captures } = &op.kind else {
        panic!("expected a lambda, got {}", op.name());
    };
    assert!(captures.is_empty());
    let OpKind::Lambda { captures, .. } = &lambda.body.kind else {
        panic!("expected a nested lambda");
    };
    assert_eq!(captures.len(), 1);
}

#[test]
fn constants_are_not_captured() {
    let (system, _) = system_with(SystemConfig::default());
    let mut program = Program::from_text("test", "let k = 2 in y -> y * k", &system);
    program.compile().expect("compile");
    let op = &program.analysis().expect("analysis").op;
    let OpKind::Let { body, .. } = &op.kind else {
        panic!("expected let, got {}", op.name());
    };
    let OpKind::Lambda { captures, .. } = &body.kind else {
        panic!("expected a lambda");
    };
    assert!(captures.is_empty());
}

#[test]
fn data_cannot_refer_to_itself() {
    assert!(matches!(
        compile_error("let a = a + 1 in a"),
        ErrorKind::IllegalRecursiveReference { .. }
    ));
    assert!(matches!(
        compile_error("let a = b; b = a in a"),
        ErrorKind::IllegalRecursiveReference { .. }
    ));
    // functions may recurse
    assert_eq!(num("let fact n = if (n <= 1) 1 else n * fact (n - 1) in fact 5"), 120.0);
}

#[test]
fn assignment_rules() {
    assert_eq!(num("local x = 1; x := x + 2; x"), 3.0);
    assert!(matches!(
        compile_error("local x = 0; local y = [for (i in 1..3) x := i]; x"),
        ErrorKind::NotAssignableFromExpression { .. }
    ));
    assert!(matches!(
        compile_error("let a = 1 in do a := 2 in a"),
        ErrorKind::NotAssignable { .. }
    ));
    assert!(matches!(
        compile_error("local x = 0; local f = y -> do x := y in y; x"),
        ErrorKind::NotAssignable { .. }
    ));
}

#[test]
fn statements_are_rejected_in_expressions() {
    assert!(matches!(
        compile_error("1 + (local x = 2)"),
        ErrorKind::NotAnExpression { .. }
    ));
    assert!(matches!(compile_error("1 + (a = 2)"), ErrorKind::NotAnExpression { .. }));
    assert!(matches!(
        compile_error("let a = 1; print a in a"),
        ErrorKind::MixedDefinitionsAndStatements
    ));
    assert!(matches!(compile_error("zzz + 1"), ErrorKind::NotDefined { .. }));
    assert!(matches!(
        compile_error("local x = 1; local x = 2; x"),
        ErrorKind::MultiplyDefined { .. }
    ));
}

#[test]
fn ambiguous_juxtaposition_warns() {
    let (system, sink) = system_with(SystemConfig::default());
    let mut program = Program::from_text("test", "let f x = x; x = 1 in f -x", &system);
    program.compile().expect("compile");
    let mut program = Program::from_text("test", "let f x = {b: x}; a = {b: 2} in f a.b", &system);
    program.compile().expect("compile");
    let lines = sink.lines();
    let warnings: Vec<_> = lines.iter().filter(|line| line.starts_with("WARNING:")).collect();
    assert_eq!(warnings.len(), 2, "{lines:?}");
    assert!(warnings[0].contains("is a subtraction"));
    assert!(warnings[1].contains("selects field b"));
}

fn where_program(level: u8, verbose: bool) -> (Result<f64, Exception>, usize) {
    let config = SystemConfig {
        deprecation_level: level,
        verbose,
        ..SystemConfig::default()
    };
    let (system, sink) = system_with(config);
    let mut program = Program::from_text("test", "(x + 1 where (x = 2)) + (y where (y = 3))", &system);
    let result = program
        .compile()
        .and_then(|_| program.eval())
        .map(|value| value.as_num().unwrap_or(f64::NAN));
    let warnings = sink.lines().iter().filter(|line| line.contains("deprecated")).count();
    (result, warnings)
}

#[test]
fn deprecation_levels() {
    let (result, warnings) = where_program(0, false);
    assert_eq!(result.expect("level 0"), 6.0);
    assert_eq!(warnings, 0);

    let (result, warnings) = where_program(1, false);
    assert_eq!(result.expect("level 1"), 6.0);
    assert_eq!(warnings, 1);

    let (_, warnings) = where_program(1, true);
    assert_eq!(warnings, 2);

    let (result, _) = where_program(2, false);
    let err = result.expect_err("level 2 rejects `where`");
    assert!(matches!(err.kind, ErrorKind::Deprecated { .. }));
    assert_eq!(err.help.as_deref(), Some("use `let (defs) in body` instead"));
}

#[test]
fn recursive_groups_share_one_capture_slot() {
    let text = "x -> let f n = g n + x; g n = x * n in f 1";
    let (system, _) = system_with(SystemConfig::default());
    let mut program = Program::from_text("test", text, &system);
    program.compile().expect("compile");
    let op = &program.analysis().expect("analysis").op;
    let OpKind::Lambda { lambda, .. } = &op.kind else {
        panic!("expected a lambda, got {}", op.name());
    };
    let OpKind::Let { scope, .. } = &lambda.body.kind else {
        panic!("expected let, got {}", lambda.body.name());
    };
    assert_eq!(scope.captures.len(), 1);
    assert_eq!(scope.lambdas.len(), 2);
    assert_eq!(num(&format!("({text}) 3")), 6.0);
}
