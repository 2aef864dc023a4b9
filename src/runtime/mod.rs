pub mod builtins;
pub mod executor;
pub mod frame;
pub mod function;
pub mod interpreter;
pub mod module;
pub mod primitive;
pub mod reactive;
pub mod value;
