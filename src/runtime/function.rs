use crate::{
    analyser::pattern::Pattern,
    error::LangResult,
    ir::Op,
    language::span::Location,
    runtime::{module::Module, value::Value},
    sc::types::ScType,
};
use std::fmt;
use std::sync::Arc;

/// The analysed form of `pattern -> body`.
#[derive(Debug)]
pub struct Lambda {
    pub pattern: Pattern,
    pub body: Op,
    /// Number of frame slots the body needs, parameters included.
    pub nslots: usize,
    pub name: Option<String>,
    pub loc: Location,
}

#[derive(Clone)]
pub struct Closure {
    pub lambda: Arc<Lambda>,
    pub nonlocals: Arc<Module>,
}

pub type BuiltinFn = fn(&Value, &Location) -> LangResult<Value>;

/// Computes the result type of a builtin applied to a reactive argument.
pub type ReactiveRule = fn(&Value) -> LangResult<ScType>;

pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
    /// `None` if the builtin rejects reactive arguments.
    pub reactive: Option<ReactiveRule>,
}

#[derive(Clone)]
pub enum Function {
    Closure(Closure),
    Builtin(Arc<Builtin>),
    /// Built by `match`: each arm is tried in order until one accepts the argument.
    Piecewise(Arc<Vec<Function>>),
}

impl Function {
    pub fn name(&self) -> Option<&str> {
        match self {
            Function::Closure(closure) => closure.lambda.name.as_deref(),
            Function::Builtin(builtin) => Some(builtin.name),
            Function::Piecewise(_) => None,
        }
    }

    pub fn same_as(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Closure(a), Function::Closure(b)) => {
                Arc::ptr_eq(&a.lambda, &b.lambda) && Arc::ptr_eq(&a.nonlocals, &b.nonlocals)
            }
            (Function::Builtin(a), Function::Builtin(b)) => Arc::ptr_eq(a, b),
            (Function::Piecewise(a), Function::Piecewise(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "<function {name}>"),
            None => write!(f, "<function>"),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Closure(closure) => f
                .debug_struct("Closure")
                .field("name", &closure.lambda.name)
                .field("nonlocals", &closure.nonlocals.len())
                .finish(),
            Function::Builtin(builtin) => write!(f, "Builtin({})", builtin.name),
            Function::Piecewise(arms) => f.debug_tuple("Piecewise").field(arms).finish(),
        }
    }
}
