use std::{
    env, fs,
    path::PathBuf,
    process::{Command, Output, Stdio},
};

fn bin_path() -> String {
    if let Ok(path) = env::var("CARGO_BIN_EXE_shape-lang") {
        return path;
    }
    let mut fallback =
        PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("manifest dir not set by cargo"));
    fallback.push("target");
    fallback.push("debug");
    fallback.push("shape-lang");
    if cfg!(windows) {
        fallback.set_extension("exe");
    }
    if fallback.exists() {
        return fallback.to_string_lossy().into_owned();
    }
    panic!(
        "binary path not set by cargo test and fallback {:?} not found",
        fallback
    );
}

/// A scratch directory holding `main.shape` and, optionally, `shape.toml`.
fn scratch(name: &str, program: &str, config: Option<&str>) -> PathBuf {
    let dir = env::temp_dir().join(format!("shape-lang-cli-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    fs::write(dir.join("main.shape"), program).expect("write program");
    if let Some(config) = config {
        fs::write(dir.join("shape.toml"), config).expect("write config");
    }
    dir
}

fn shape_lang(command: &str, dir: &PathBuf) -> Output {
    Command::new(bin_path())
        .arg(command)
        .arg(dir.join("main.shape"))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("failed to run shape-lang")
}

#[test]
fn run_prints_the_value() {
    let dir = scratch("run", "let f x = x * x in [f 2, f 3]", None);
    let output = shape_lang("run", &dir);
    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "[4,9]");
}

#[test]
fn glsl_exports_a_sphere() {
    let dir = scratch("glsl", "sphere 1", None);
    let output = shape_lang("glsl", &dir);
    assert!(
        output.status.success(),
        "glsl failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("float dist(vec4 r0)"), "{stdout}");
    assert!(stdout.contains("vec3 colour(vec4 r0)"), "{stdout}");
}

#[test]
fn export_reads_the_target_from_config() {
    let dir = scratch("export", "cube 2", Some("target = \"cpp\"\n"));
    let output = shape_lang("export", &dir);
    assert!(
        output.status.success(),
        "export failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("#include <glm/glm.hpp>"), "{stdout}");
}

#[test]
fn errors_exit_with_failure() {
    let dir = scratch("error", "1 + nope", None);
    let output = shape_lang("run", &dir);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR:"), "{stderr}");
    assert!(stderr.contains("nope: not defined"), "{stderr}");

    let dir = scratch("not-a-shape", "1 + 2", None);
    let output = shape_lang("glsl", &dir);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not evaluate to a shape"));
}

#[test]
fn config_can_reject_deprecated_syntax() {
    let program = "x + 1 where (x = 2)";
    let dir = scratch("lenient", program, None);
    let output = shape_lang("run", &dir);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("deprecated"));

    let dir = scratch("strict", program, Some("deprecation_level = 2\n"));
    let output = shape_lang("run", &dir);
    assert_eq!(output.status.code(), Some(1));

    let dir = scratch("bad-config", program, Some("deprecation = 2\n"));
    let output = shape_lang("run", &dir);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid configuration"));
}

#[test]
fn usage_is_printed_for_bad_arguments() {
    let output = Command::new(bin_path())
        .arg("run")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("failed to run shape-lang");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage: shape-lang"));
}
