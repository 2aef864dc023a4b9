use super::{compiler::ScEntry, export_shape, types::ScType, ScCompiler};
use crate::{
    config::{SystemConfig, Target},
    error::{ErrorKind, LangResult},
    language::span::{Location, Source},
    program::Program,
    runtime::value::{Symbol, Value},
    system::{CaptureSink, System},
};
use std::sync::Arc;

fn system() -> System {
    System::with_sink(SystemConfig::default(), Arc::new(CaptureSink::default())).expect("system")
}

fn eval(system: &System, text: &str) -> Value {
    let mut program = Program::from_text("test", text, system);
    program.compile().expect("compile");
    program.eval().expect("eval")
}

fn loc() -> Location {
    Location::new(Source::new("test", ""), Default::default())
}

/// Compiles a function of a point to a number.
fn compile(text: &str, result: ScType) -> LangResult<String> {
    let system = system();
    let function = eval(&system, text);
    let mut compiler = ScCompiler::new(&system, Target::Glsl);
    compiler.compile_entry(
        &ScEntry {
            name: "f",
            function: &function,
            param: ScType::vec(4),
            result,
        },
        &loc(),
    )?;
    Ok(compiler.finish())
}

fn shape(text: &str, target: Target) -> String {
    let system = system();
    let value = eval(&system, text);
    let dist = value.field(&Symbol::new("dist")).expect("dist");
    let colour = value.field(&Symbol::new("colour")).expect("colour");
    export_shape(&system, target, &dist, &colour, &loc()).expect("export")
}

#[test]
fn sphere_exports_both_entry_points() {
    let glsl = shape("sphere 1", Target::Glsl);
    assert!(glsl.contains("float dist(vec4 r0)"), "{glsl}");
    assert!(glsl.contains("vec3 r1 = r0.xyz;"), "{glsl}");
    assert!(glsl.contains("length(r1)"), "{glsl}");
    assert!(glsl.contains("vec3 colour(vec4 r0)"), "{glsl}");
    assert!(glsl.contains("return vec3(0.8, 0.8, 0.5);"), "{glsl}");
}

#[test]
fn cpp_output_uses_glm_and_c_linkage() {
    let cpp = shape("sphere 1", Target::Cpp);
    assert!(cpp.starts_with("#include <glm/glm.hpp>"), "{cpp}");
    assert!(cpp.contains("extern \"C\" float dist(glm::vec4 r0)"), "{cpp}");
    assert!(cpp.contains("glm::vec3(r0.x, r0.y, r0.z)"), "{cpp}");
    assert!(cpp.contains("glm::length("), "{cpp}");
    assert!(cpp.contains("extern \"C\" glm::vec3 colour(glm::vec4 r0)"), "{cpp}");
}

#[test]
fn calls_through_records_are_inlined() {
    let glsl = shape("translate [1, 0, 0] (cube 2)", Target::Glsl);
    assert!(glsl.contains(" - 1.0;"), "{glsl}");
    assert!(glsl.contains("abs("), "{glsl}");
    assert!(glsl.contains("max(r"), "{glsl}");
    assert!(glsl.contains("vec3(0.0)"), "{glsl}");
}

#[test]
fn repeated_pure_expressions_are_emitted_once() {
    let glsl = compile("p -> sin(p.[X]) + sin(p.[X])", ScType::num()).expect("compile");
    assert_eq!(glsl.matches("sin(").count(), 1, "{glsl}");
    assert_eq!(glsl.matches("r0.x").count(), 1, "{glsl}");
}

#[test]
fn constants_fold_before_emission() {
    let glsl = compile("p -> 2 * 3 + p.[X]", ScType::num()).expect("compile");
    assert!(glsl.contains("6.0 + r1") || glsl.contains("6.0 + r0.x"), "{glsl}");
    assert!(!glsl.contains("2.0 * 3.0"), "{glsl}");
}

#[test]
fn scalars_broadcast_to_vectors() {
    let glsl = compile("p -> mag(p.[[X, Y, Z]] + 1)", ScType::num()).expect("compile");
    assert!(glsl.contains("vec3(1.0)"), "{glsl}");
}

#[test]
fn mismatched_vectors_do_not_unify() {
    let err = compile("p -> mag(p.[[X, Y]] + p.[[X, Y, Z]])", ScType::num()).expect_err("mismatch");
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }), "{err}");
    assert_eq!(err.message(), "can't convert vec2 and vec3 to a common type");
}

#[test]
fn time_becomes_a_uniform() {
    let glsl = compile("p -> p.[X] + time", ScType::num()).expect("compile");
    assert!(glsl.starts_with("uniform float rv_time;"), "{glsl}");
    assert!(glsl.contains("+ rv_time"), "{glsl}");
}

#[test]
fn conditional_expressions_emit_branches() {
    let glsl = compile("p -> if (p.[X] < 0) 1 else p.[Y]", ScType::num()).expect("compile");
    assert!(glsl.contains("if (r"), "{glsl}");
    assert!(glsl.contains("} else {"), "{glsl}");
    // the chosen branch of a constant condition is compiled alone
    let glsl = compile("p -> if (1 < 2) p.[X] else p.[Y]", ScType::num()).expect("compile");
    assert!(!glsl.contains("if ("), "{glsl}");
}

#[test]
fn loops_and_assignments() {
    let glsl = compile(
        "p -> do local i = 0; local s = 0; while (i < 3) (s := s + p.[X]; i := i + 1) in s",
        ScType::num(),
    )
    .expect("compile");
    assert!(glsl.contains("while (true) {"), "{glsl}");
    assert!(glsl.contains("break;"), "{glsl}");
    let glsl = compile(
        "p -> do local s = 0; for (i in 1..3) s := s + i * p.[X] in s",
        ScType::num(),
    )
    .expect("compile");
    assert!(glsl.contains("for (float r"), "{glsl}");
    assert!(glsl.contains("<= 3.0"), "{glsl}");
}

#[test]
fn loops_over_constant_lists_are_unrolled() {
    let glsl = compile(
        "p -> do local s = 0; for (k in [2, 5]) s := s + k * p.[X] in s",
        ScType::num(),
    )
    .expect("compile");
    assert!(!glsl.contains("for ("), "{glsl}");
    assert!(glsl.contains("2.0 * r"), "{glsl}");
    assert!(glsl.contains("5.0 * r"), "{glsl}");
}

#[test]
fn unsupported_constructs_are_reported() {
    let err = compile("p -> do print p in 1", ScType::num()).expect_err("print");
    assert!(matches!(err.kind, ErrorKind::NotSupported { .. }), "{err}");
    let err = compile("let f x = f x in p -> f p", ScType::num()).expect_err("recursion");
    assert!(matches!(err.kind, ErrorKind::NotSupported { .. }), "{err}");
}

#[test]
fn entry_results_are_type_checked() {
    let err = compile("p -> p", ScType::num()).expect_err("vec4 is not a distance");
    assert!(err.message().contains("returns vec4"), "{err}");
}

#[test]
fn nested_arrays_index_row_major() {
    let table = "local a = [[1, 2, 3, 4, 5], [6, 7, 8, 9, 10]]";
    let glsl = compile(
        &format!("p -> do {table}; local i = p.[X]; local j = p.[Y] in a.[i, j]"),
        ScType::num(),
    )
    .expect("compile");
    assert!(glsl.contains("float[10] r1 = float[10](1.0, 2.0, 3.0"), "{glsl}");
    assert!(glsl.contains("r1[int(r"), "{glsl}");
    assert!(glsl.contains(") * 5 + int(r"), "{glsl}");

    let glsl = compile(&format!("p -> do {table} in a.[1, 3] * p.[X]"), ScType::num()).expect("compile");
    assert!(glsl.contains("r1[8]"), "{glsl}");
    assert!(!glsl.contains("float[5]"), "{glsl}");

    // a partial index gathers the row
    let glsl = compile(
        &format!("p -> do {table}; local i = p.[X] in a.[i].[2]"),
        ScType::num(),
    )
    .expect("compile");
    assert!(glsl.contains("float[5](r1[int(r"), "{glsl}");
    assert!(glsl.contains(") * 5 + 4]"), "{glsl}");
}

#[test]
fn constant_folding_leaves_no_dead_code() {
    let glsl = compile(
        "p -> do assert (do local t = p.[X] in true) in p.[Y]",
        ScType::num(),
    )
    .expect("compile");
    assert!(!glsl.contains("r0.x"), "{glsl}");
    assert!(glsl.contains("r0.y"), "{glsl}");
    assert!(!glsl.contains("r2"), "{glsl}");

    let err = compile(
        "p -> do local s = 0; for (i in 0..3 by p.[X]) s := s + i in s",
        ScType::num(),
    )
    .expect_err("run-time step");
    assert!(matches!(err.kind, ErrorKind::NotConstant { .. }), "{err}");
}
