//! The shape compiler: a second backend over the Operation IR that emits
//! GLSL or C++ for the distance and colour functions of a shape.

pub mod builtins;
pub mod compiler;
pub mod constify;
pub mod ops;
pub mod pattern;
pub mod types;
pub mod value;

pub use compiler::{export_shape, ScCompiler};

#[cfg(test)]
mod tests;
