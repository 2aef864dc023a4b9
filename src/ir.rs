//! The Operation IR produced by the analyser and consumed by both the
//! interpreter and the shape compiler.

use crate::{
    analyser::{locative::Locative, pattern::Pattern},
    language::{
        ast::{ActionKind, BinaryOp, UnaryOp},
        span::Location,
    },
    runtime::{
        function::{Function, Lambda},
        module::Dictionary,
        value::{Symbol, Value},
    },
    sc::types::ScType,
};
use std::fmt::Write;
use std::sync::Arc;

pub type Op = Arc<Operation>;

#[derive(Debug)]
pub struct Operation {
    pub loc: Location,
    /// Side-effect free and independent of mutable variables.
    pub pure: bool,
    pub kind: OpKind,
}

#[derive(Debug)]
pub enum OpKind {
    Constant(Value),
    LocalRef(usize),
    NonlocalRef(usize),
    ModuleRef {
        module: Op,
        index: usize,
        name: Symbol,
    },
    Call {
        function: Op,
        argument: Op,
    },
    /// List comprehension; every item is executed with a list executor.
    List(Vec<Op>),
    /// Record comprehension; every item is executed with a record executor.
    Record(Vec<Op>),
    Field {
        key: Op,
        value: Op,
    },
    Spread(Op),
    Dot {
        base: Op,
        field: Symbol,
    },
    Index {
        base: Op,
        indices: Vec<Op>,
    },
    Unary {
        op: UnaryOp,
        operand: Op,
    },
    Binary {
        op: BinaryOp,
        left: Op,
        right: Op,
    },
    Range {
        first: Op,
        last: Op,
        step: Option<Op>,
        half_open: bool,
    },
    Lambda {
        lambda: Arc<Lambda>,
        captures: Vec<Op>,
    },
    Module(Arc<ScopeExec>),
    Let {
        scope: Arc<ScopeExec>,
        body: Op,
    },
    Block {
        stmts: Vec<Op>,
        body: Option<Op>,
    },
    LocalDef {
        pattern: Arc<Pattern>,
        value: Op,
    },
    Assign {
        locative: Locative,
        value: Op,
    },
    If {
        condition: Op,
        then_branch: Op,
    },
    IfElse {
        condition: Op,
        then_branch: Op,
        else_branch: Op,
    },
    For {
        pattern: Arc<Pattern>,
        list: Op,
        until: Option<Op>,
        body: Op,
    },
    While {
        condition: Op,
        body: Op,
    },
    Action {
        kind: ActionKind,
        argument: Op,
    },
    /// A value supplied by the renderer at run time, such as `time`.
    Uniform {
        name: String,
        ty: ScType,
    },
}

/// Builds the module of a recursive scope.
///
/// Construction order: evaluate `captures` in the enclosing frame into their
/// hidden slots, store every function definition as a lambda, then run the
/// data definitions in dependency order.
#[derive(Debug)]
pub struct ScopeExec {
    pub dictionary: Arc<Dictionary>,
    /// Frame slot that holds the module while it is in scope.
    pub module_slot: usize,
    pub size: usize,
    pub captures: Vec<(usize, Op)>,
    pub lambdas: Vec<(usize, Arc<Lambda>)>,
    pub inits: Vec<UnitInit>,
}

#[derive(Debug)]
pub struct UnitInit {
    pub pattern: Pattern,
    pub value: Op,
}

impl ScopeExec {
    fn is_pure(&self) -> bool {
        self.captures.iter().all(|(_, op)| op.pure)
            && self.inits.iter().all(|init| init.value.pure)
    }
}

impl Operation {
    pub fn new(kind: OpKind, loc: Location) -> Op {
        let pure = kind.is_pure();
        Arc::new(Self { loc, pure, kind })
    }

    pub fn constant(value: Value, loc: Location) -> Op {
        Self::new(OpKind::Constant(value), loc)
    }

    /// A reference to a `local` variable, which may be reassigned.
    pub fn mutable_ref(slot: usize, loc: Location) -> Op {
        Arc::new(Self {
            loc,
            pure: false,
            kind: OpKind::LocalRef(slot),
        })
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match &self.kind {
            OpKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Operations that produce a value when evaluated.
    pub fn is_expression(&self) -> bool {
        match &self.kind {
            OpKind::Field { .. }
            | OpKind::Spread(_)
            | OpKind::LocalDef { .. }
            | OpKind::Assign { .. }
            | OpKind::If { .. }
            | OpKind::For { .. }
            | OpKind::While { .. }
            | OpKind::Action { .. } => false,
            OpKind::Block { body, .. } => body.as_ref().map_or(false, |b| b.is_expression()),
            OpKind::Let { body, .. } => body.is_expression(),
            OpKind::IfElse {
                then_branch,
                else_branch,
                ..
            } => then_branch.is_expression() && else_branch.is_expression(),
            _ => true,
        }
    }

    /// A structural key that ignores source locations. Two pure operations
    /// with the same fingerprint compute the same value in the same frame.
    pub fn fingerprint(&self) -> Option<String> {
        let mut out = String::new();
        self.write_fingerprint(&mut out).then_some(out)
    }

    fn write_fingerprint(&self, out: &mut String) -> bool {
        let children: Vec<&Op> = match &self.kind {
            OpKind::Constant(value) => return write_value_key(value, out),
            OpKind::LocalRef(slot) => {
                let _ = write!(out, "L{slot}");
                return true;
            }
            OpKind::NonlocalRef(slot) => {
                let _ = write!(out, "N{slot}");
                return true;
            }
            OpKind::Uniform { name, .. } => {
                let _ = write!(out, "U{name}");
                return true;
            }
            OpKind::ModuleRef { module, index, .. } => {
                let _ = write!(out, "M{index}");
                vec![module]
            }
            OpKind::Call { function, argument } => {
                out.push_str("call");
                vec![function, argument]
            }
            OpKind::List(items) => {
                out.push_str("list");
                items.iter().collect()
            }
            OpKind::Dot { base, field } => {
                let _ = write!(out, "dot.{field}");
                vec![base]
            }
            OpKind::Index { base, indices } => {
                out.push_str("index");
                std::iter::once(base).chain(indices.iter()).collect()
            }
            OpKind::Unary { op, operand } => {
                let _ = write!(out, "u{}", op.symbol());
                vec![operand]
            }
            OpKind::Binary { op, left, right } => {
                let _ = write!(out, "b{}", op.symbol());
                vec![left, right]
            }
            OpKind::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                out.push_str("ifelse");
                vec![condition, then_branch, else_branch]
            }
            _ => return false,
        };
        out.push('(');
        for child in children {
            if !child.write_fingerprint(out) {
                return false;
            }
            out.push(',');
        }
        out.push(')');
        true
    }
}

fn write_value_key(value: &Value, out: &mut String) -> bool {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Num(n) => {
            let _ = write!(out, "#{:x}", n.to_bits());
        }
        Value::Char(c) => {
            let _ = write!(out, "'{c}");
        }
        Value::Symbol(name) => {
            let _ = write!(out, "#{name}");
        }
        Value::String(text) => {
            let _ = write!(out, "{text:?}");
        }
        Value::List(items) => {
            out.push('[');
            for item in items.iter() {
                if !write_value_key(item, out) {
                    return false;
                }
                out.push(',');
            }
            out.push(']');
        }
        Value::Reactive(reactive) => return reactive.op.write_fingerprint(out),
        // identity is enough for shared aggregates
        Value::Record(record) => {
            let _ = write!(out, "rec@{:p}", Arc::as_ptr(record));
        }
        Value::Module(module) => {
            let _ = write!(out, "mod@{:p}", Arc::as_ptr(module));
        }
        Value::Function(Function::Closure(closure)) => {
            let _ = write!(
                out,
                "fn@{:p}/{:p}",
                Arc::as_ptr(&closure.lambda),
                Arc::as_ptr(&closure.nonlocals)
            );
        }
        Value::Function(Function::Builtin(builtin)) => {
            let _ = write!(out, "fn:{}", builtin.name);
        }
        Value::Function(Function::Piecewise(arms)) => {
            let _ = write!(out, "match@{:p}", Arc::as_ptr(arms));
        }
        Value::Lambda(lambda) => {
            let _ = write!(out, "lambda@{:p}", Arc::as_ptr(lambda));
        }
    }
    true
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Constant(_) => "Constant",
            OpKind::LocalRef(_) => "LocalRef",
            OpKind::NonlocalRef(_) => "NonlocalRef",
            OpKind::ModuleRef { .. } => "ModuleRef",
            OpKind::Call { .. } => "Call",
            OpKind::List(_) => "List",
            OpKind::Record(_) => "Record",
            OpKind::Field { .. } => "Field",
            OpKind::Spread(_) => "Spread",
            OpKind::Dot { .. } => "Dot",
            OpKind::Index { .. } => "Index",
            OpKind::Unary { .. } => "Unary",
            OpKind::Binary { .. } => "Binary",
            OpKind::Range { .. } => "Range",
            OpKind::Lambda { .. } => "Lambda",
            OpKind::Module(_) => "Module",
            OpKind::Let { .. } => "Let",
            OpKind::Block { .. } => "Block",
            OpKind::LocalDef { .. } => "LocalDef",
            OpKind::Assign { .. } => "Assign",
            OpKind::If { .. } => "If",
            OpKind::IfElse { .. } => "IfElse",
            OpKind::For { .. } => "For",
            OpKind::While { .. } => "While",
            OpKind::Action { .. } => "Action",
            OpKind::Uniform { .. } => "Uniform",
        }
    }

    fn is_pure(&self) -> bool {
        match self {
            OpKind::Constant(_)
            | OpKind::LocalRef(_)
            | OpKind::NonlocalRef(_)
            | OpKind::Uniform { .. } => true,
            OpKind::ModuleRef { module, .. } => module.pure,
            OpKind::Call { function, argument } => function.pure && argument.pure,
            OpKind::List(items) | OpKind::Record(items) => items.iter().all(|op| op.pure),
            OpKind::Field { key, value } => key.pure && value.pure,
            OpKind::Spread(op) => op.pure,
            OpKind::Dot { base, .. } => base.pure,
            OpKind::Index { base, indices } => base.pure && indices.iter().all(|op| op.pure),
            OpKind::Unary { operand, .. } => operand.pure,
            OpKind::Binary { left, right, .. } => left.pure && right.pure,
            OpKind::Range {
                first, last, step, ..
            } => first.pure && last.pure && step.as_ref().map_or(true, |s| s.pure),
            OpKind::Lambda { captures, .. } => captures.iter().all(|op| op.pure),
            OpKind::Module(scope) => scope.is_pure(),
            OpKind::Let { scope, body } => scope.is_pure() && body.pure,
            OpKind::Block { stmts, body } => {
                stmts.iter().all(|op| op.pure) && body.as_ref().map_or(true, |b| b.pure)
            }
            OpKind::IfElse {
                condition,
                then_branch,
                else_branch,
            } => condition.pure && then_branch.pure && else_branch.pure,
            OpKind::LocalDef { .. }
            | OpKind::Assign { .. }
            | OpKind::If { .. }
            | OpKind::For { .. }
            | OpKind::While { .. }
            | OpKind::Action { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::{Source, Span};

    fn loc(start: usize) -> Location {
        Location::new(Source::new("t", "x + y + z"), Span::new(start, start + 1))
    }

    fn add(left: Op, right: Op, at: usize) -> Op {
        Operation::new(
            OpKind::Binary {
                op: BinaryOp::Add,
                left,
                right,
            },
            loc(at),
        )
    }

    #[test]
    fn fingerprints_ignore_locations() {
        let a = add(Operation::new(OpKind::LocalRef(0), loc(0)), Operation::constant(Value::Num(1.0), loc(4)), 2);
        let b = add(Operation::new(OpKind::LocalRef(0), loc(8)), Operation::constant(Value::Num(1.0), loc(6)), 4);
        let c = add(Operation::new(OpKind::LocalRef(1), loc(8)), Operation::constant(Value::Num(1.0), loc(6)), 4);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn mutable_references_are_impure() {
        let var = Operation::mutable_ref(0, loc(0));
        let sum = add(var, Operation::constant(Value::Num(1.0), loc(4)), 2);
        assert!(!sum.pure);
        assert!(sum.is_expression());
    }
}
