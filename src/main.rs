use shape_lang::{
    config::{SystemConfig, Target},
    diagnostics,
    program::Program,
    system::System,
};
use std::env;
use std::fs;
use std::path::Path;
use std::process;
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = "Usage: shape-lang [run|glsl|cpp|export] <file.shape>";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().collect();

    if args.len() != 3 {
        eprintln!("{USAGE}");
        process::exit(1);
    }

    let command = &args[1];
    let path = Path::new(&args[2]);

    let config = match SystemConfig::load_beside(path) {
        Ok(config) => config,
        Err(error) => {
            diagnostics::report_config_error(&error);
            process::exit(1);
        }
    };

    let target = match command.as_str() {
        "run" => None,
        "glsl" => Some(Target::Glsl),
        "cpp" => Some(Target::Cpp),
        "export" => Some(config.target),
        _ => {
            eprintln!("Invalid command. {USAGE}");
            process::exit(1);
        }
    };

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) => {
            diagnostics::report_io_error(path, &error);
            process::exit(1);
        }
    };

    let system = match System::new(config) {
        Ok(system) => system,
        Err(error) => {
            diagnostics::report_exception(&error);
            process::exit(1);
        }
    };

    let mut program = Program::from_text(&path.display().to_string(), &text, &system);
    match program.run(target) {
        Some(output) => print!("{output}"),
        None => process::exit(1),
    }
}
