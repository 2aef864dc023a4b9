use shape_lang::{
    config::{SystemConfig, Target},
    error::{ErrorKind, Exception},
    program::Program,
    runtime::value::Value,
    system::{CaptureSink, System},
};
use std::sync::Arc;

fn system() -> (System, Arc<CaptureSink>) {
    let sink = Arc::new(CaptureSink::default());
    let system = System::with_sink(SystemConfig::default(), sink.clone()).expect("system");
    (system, sink)
}

fn run(text: &str) -> Result<Value, Exception> {
    let (system, _) = system();
    let mut program = Program::from_text("test.shape", text, &system);
    program.compile()?;
    program.eval()
}

fn show(text: &str) -> String {
    match run(text) {
        Ok(value) => value.to_string(),
        Err(err) => panic!("{text}: {err}"),
    }
}

#[test]
fn arithmetic_and_lists() {
    assert_eq!(show("1 + 2 * 3"), "7");
    assert_eq!(show("[1, 2] + 1"), "[2,3]");
    assert_eq!(show("[for (i in 1..4) i * i]"), "[1,4,9,16]");
    assert_eq!(show("[1, 2, 3].[1]"), "2");
    assert_eq!(show("2 ^ 10"), "1024");
}

#[test]
fn tail_calls_run_in_constant_stack() {
    let text = "let total (n, acc) = if (n == 0) acc else total (n - 1, acc + n) in total (1000000, 0)";
    assert_eq!(show(text), "500000500000");
}

#[test]
fn record_patterns_use_defaults() {
    let text = "let f {a, b = 2} = a + b in [f {a: 1}, f {a: 1, b: 5}]";
    assert_eq!(show(text), "[3,6]");

    let err = run("let f {a, b = 2} = a + b in f {b: 1}").expect_err("missing a");
    assert!(matches!(err.kind, ErrorKind::MissingField { .. }), "{err}");
    let err = run("let f {a, b = 2} = a + b in f {a: 1, c: 2}").expect_err("extra c");
    assert!(matches!(err.kind, ErrorKind::UnmatchedField { .. }), "{err}");
}

#[test]
fn errors_carry_call_sites() {
    let err = run("let f x = x.foo in f 1").expect_err("no field");
    assert!(err.trace.len() >= 2, "{err}");
    assert!(err.to_string().contains("test.shape:1:"), "{err}");
}

#[test]
fn reactive_values_propagate() {
    assert!(run("time + 1").expect("eval").is_reactive());
    assert!(run("let f t = t * 2 in f time").expect("eval").is_reactive());
    assert!(run("if (time > 1) 1 else 2").expect("eval").is_reactive());
    assert_eq!(show("let t = time in 3"), "3");
}

#[test]
fn statement_programs() {
    let (system, sink) = system();
    let mut program = Program::from_text("test.shape", "local x = 2; print x; x := x * 3; print x", &system);
    program.compile().expect("compile");
    assert!(matches!(program.eval().expect("eval"), Value::Null));
    assert_eq!(sink.lines(), vec!["2".to_string(), "6".to_string()]);
}

#[test]
fn assertions() {
    assert_eq!(show("do assert (1 < 2) in 5"), "5");
    let err = run("do assert (2 < 1) in 5").expect_err("assertion");
    assert_eq!(err.kind, ErrorKind::AssertionFailed);
}

#[test]
fn user_defined_shapes_export() {
    let text = "{
        is_2d = true;
        is_3d = false;
        bbox = [[-1, -1], [1, 1]];
        dist p = mag(p.[[X, Y]]) - 1;
        colour p = [p.[X], 0, 1];
    }";
    let (system, _) = system();
    let mut program = Program::from_text("circle.shape", text, &system);
    program.compile().expect("compile");
    let shape = program.shape().expect("eval").expect("a shape");
    assert!(shape.is_2d && !shape.is_3d);
    assert_eq!(shape.bbox.min, [-1.0, -1.0, 0.0]);

    let glsl = shape.export(&system, Target::Glsl).expect("glsl");
    assert!(glsl.contains("float dist(vec4 r0)"), "{glsl}");
    assert!(glsl.contains("vec2 r"), "{glsl}");
    assert!(glsl.contains("vec3 colour(vec4 r0)"), "{glsl}");
    assert!(glsl.contains("float r1 = r0.x;"), "{glsl}");
    assert!(glsl.contains("vec3(r1, 0.0, 1.0)"), "{glsl}");
}

#[test]
fn vectors_unify_with_scalars_in_shapes() {
    let text = "{
        is_2d = false;
        is_3d = true;
        bbox = [[-1, -1, -1], [1, 1, 1]];
        dist p = max(abs(p.[[X, Y, Z]]) - 1, 0).[X];
        colour p = [1, 1, 1] * 0.5;
    }";
    let (system, _) = system();
    let mut program = Program::from_text("box.shape", text, &system);
    program.compile().expect("compile");
    let shape = program.shape().expect("eval").expect("a shape");
    let glsl = shape.export(&system, Target::Glsl).expect("glsl");
    assert!(glsl.contains("vec3(1.0)"), "{glsl}");
    assert!(glsl.contains("vec3(0.0)"), "{glsl}");
    assert!(glsl.contains("return vec3(0.5, 0.5, 0.5);") || glsl.contains("return vec3(0.5);"), "{glsl}");
}

#[test]
fn failures_are_reported_through_the_sink() {
    let (system, sink) = system();
    let mut program = Program::from_text("test.shape", "1 + nope", &system);
    assert_eq!(program.run(None), None);
    let lines = sink.lines();
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].starts_with("ERROR: nope: not defined"), "{lines:?}");

    let mut program = Program::from_text("test.shape", "[1, 2] * 2", &system);
    assert_eq!(program.run(None).as_deref(), Some("[2,4]\n"));
    let mut program = Program::from_text("test.shape", "1 + 2", &system);
    assert_eq!(program.run(Some(Target::Glsl)), None);
    assert!(sink.lines()[1].contains("does not evaluate to a shape"));
}

#[test]
fn list_patterns_fall_through_in_match() {
    assert_eq!(show("match [[a, b] -> a + b, x -> 99] [1, 2, 3]"), "99");
    assert_eq!(show("match [[a, b] -> a + b, x -> 99] [1, 2]"), "3");
}

#[test]
fn constant_patterns_cannot_match_reactive_values() {
    let err = run("match [0 -> 1, x -> 2] time").expect_err("reactive scrutinee");
    assert!(matches!(err.kind, ErrorKind::NotProvablyEqual { .. }), "{err}");
}
