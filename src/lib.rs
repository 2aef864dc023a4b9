pub mod analyser;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ir;
pub mod language;
pub mod program;
pub mod runtime;
pub mod sc;
pub mod shape;
pub mod system;
