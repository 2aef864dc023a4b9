use crate::{
    analyser::{deprecation::Deprecation, pattern::Target},
    error::{ErrorKind, Exception, LangResult},
    ir::{Op, OpKind, ScopeExec},
    language::{
        ast::{ActionKind, BinaryOp},
        span::Location,
    },
    runtime::{
        executor::{ActionExecutor, Executor, ListExecutor, RecordExecutor},
        frame::Frame,
        function::{Closure, Function},
        module::Module,
        primitive, reactive,
        reactive::Reactive,
        value::{Symbol, Value},
    },
    system::System,
};
use std::sync::Arc;
use tracing::trace;

/// One step of evaluation in tail position: either a finished value, or a call
/// that the caller's trampoline performs without growing the stack.
pub enum TailResult {
    Value(Value),
    Call {
        function: Value,
        argument: Value,
        loc: Location,
    },
}

pub fn eval(op: &Op, frame: &mut Frame) -> LangResult<Value> {
    match &op.kind {
        OpKind::Constant(value) => Ok(value.clone()),
        OpKind::LocalRef(slot) => Ok(frame.slot(*slot)),
        OpKind::NonlocalRef(slot) => frame.nonlocals.get(*slot).ok_or_else(|| {
            Exception::at(
                ErrorKind::IllegalRecursiveReference {
                    name: op.loc.text().to_string(),
                },
                &op.loc,
            )
        }),
        OpKind::ModuleRef {
            module,
            index,
            name,
        } => match eval(module, frame)? {
            Value::Module(module) => module.get(*index).ok_or_else(|| {
                Exception::at(
                    ErrorKind::IllegalRecursiveReference {
                        name: name.to_string(),
                    },
                    &op.loc,
                )
            }),
            other => Err(Exception::domain(format!("{other}: not a module"), &op.loc)),
        },
        OpKind::Call { .. } | OpKind::IfElse { .. } | OpKind::Let { .. } | OpKind::Block { .. } => {
            match tail_eval(op, frame)? {
                TailResult::Value(value) => Ok(value),
                TailResult::Call {
                    function,
                    argument,
                    loc,
                } => call_function(frame.system, function, argument, &loc),
            }
        }
        OpKind::List(items) => {
            let mut executor = ListExecutor::default();
            for item in items {
                exec(item, frame, &mut executor)?;
            }
            Ok(Value::list(executor.items))
        }
        OpKind::Record(items) => {
            let mut executor = RecordExecutor::default();
            for item in items {
                exec(item, frame, &mut executor)?;
            }
            Ok(Value::record(executor.fields))
        }
        OpKind::Dot { base, field } => {
            let base = eval(base, frame)?;
            get_field(&base, field, &op.loc)
        }
        OpKind::Index { base, indices } => {
            let mut value = eval(base, frame)?;
            for index in indices {
                let index = eval(index, frame)?;
                value = index_value(&value, &index, &op.loc)?;
            }
            Ok(value)
        }
        OpKind::Unary { op: unop, operand } => {
            let operand = eval(operand, frame)?;
            primitive::unary(*unop, &operand, &op.loc)
        }
        OpKind::Binary {
            op: binop @ (BinaryOp::And | BinaryOp::Or),
            left,
            right,
        } => {
            let left = eval(left, frame)?;
            match (binop, primitive::condition(&left, &op.loc)?) {
                (BinaryOp::And, Some(false)) => Ok(Value::Bool(false)),
                (BinaryOp::Or, Some(true)) => Ok(Value::Bool(true)),
                (_, Some(_)) => {
                    let right = eval(right, frame)?;
                    match primitive::condition(&right, &op.loc)? {
                        Some(b) => Ok(Value::Bool(b)),
                        None => Ok(right),
                    }
                }
                (_, None) => {
                    let right = eval(right, frame)?;
                    reactive::binary(*binop, &left, &right, &op.loc)
                }
            }
        }
        OpKind::Binary {
            op: binop,
            left,
            right,
        } => {
            let left = eval(left, frame)?;
            let right = eval(right, frame)?;
            primitive::binary(*binop, &left, &right, &op.loc)
        }
        OpKind::Range {
            first,
            last,
            step,
            half_open,
        } => {
            let first = number(&eval(first, frame)?, "range bound", &op.loc)?;
            let last = number(&eval(last, frame)?, "range bound", &op.loc)?;
            let step = match step {
                Some(step) => number(&eval(step, frame)?, "range step", &op.loc)?,
                None => 1.0,
            };
            primitive::range(first, last, step, *half_open, &op.loc)
        }
        OpKind::Lambda { lambda, captures } => {
            let values = captures
                .iter()
                .map(|capture| eval(capture, frame))
                .collect::<LangResult<Vec<_>>>()?;
            Ok(Value::Function(Function::Closure(Closure {
                lambda: lambda.clone(),
                nonlocals: Module::from_values(values),
            })))
        }
        OpKind::Module(scope) => Ok(Value::Module(build_module(scope, frame)?)),
        OpKind::Uniform { ty, .. } => Ok(Reactive::value(op.clone(), ty.clone())),
        _ => Err(Exception::at(
            ErrorKind::NotAnExpression {
                what: op.loc.text().to_string(),
            },
            &op.loc,
        )),
    }
}

fn tail_eval(op: &Op, frame: &mut Frame) -> LangResult<TailResult> {
    match &op.kind {
        OpKind::Call { function, argument } => {
            let function = eval(function, frame)?;
            let argument = eval(argument, frame)?;
            Ok(TailResult::Call {
                function,
                argument,
                loc: op.loc.clone(),
            })
        }
        OpKind::IfElse {
            condition,
            then_branch,
            else_branch,
        } => {
            let cond = eval(condition, frame)?;
            match primitive::condition(&cond, &condition.loc)? {
                Some(true) => tail_eval(then_branch, frame),
                Some(false) => tail_eval(else_branch, frame),
                None => {
                    let a = eval(then_branch, frame)?;
                    let b = eval(else_branch, frame)?;
                    reactive::if_else(&cond, &a, &b, &op.loc).map(TailResult::Value)
                }
            }
        }
        OpKind::Let { scope, body } => {
            build_module(scope, frame)?;
            tail_eval(body, frame)
        }
        OpKind::Block {
            stmts,
            body: Some(body),
        } => {
            for stmt in stmts {
                exec(stmt, frame, &mut ActionExecutor)?;
            }
            tail_eval(body, frame)
        }
        _ => eval(op, frame).map(TailResult::Value),
    }
}

pub fn exec(op: &Op, frame: &mut Frame, executor: &mut dyn Executor) -> LangResult<()> {
    match &op.kind {
        OpKind::LocalDef { pattern, value } => {
            let value = eval(value, frame)?;
            pattern.exec(value, frame, Target::Frame)
        }
        OpKind::Assign { locative, value } => {
            let value = eval(value, frame)?;
            locative.store(frame, value)
        }
        OpKind::If {
            condition,
            then_branch,
        } => {
            let cond = eval(condition, frame)?;
            match primitive::condition(&cond, &condition.loc)? {
                Some(true) => exec(then_branch, frame, executor),
                Some(false) => Ok(()),
                None => Err(Exception::domain(
                    "a reactive condition cannot control a statement",
                    &condition.loc,
                )),
            }
        }
        OpKind::IfElse {
            condition,
            then_branch,
            else_branch,
        } => {
            let cond = eval(condition, frame)?;
            match primitive::condition(&cond, &condition.loc)? {
                Some(true) => exec(then_branch, frame, executor),
                Some(false) => exec(else_branch, frame, executor),
                None if op.is_expression() => {
                    let a = eval(then_branch, frame)?;
                    let b = eval(else_branch, frame)?;
                    let value = reactive::if_else(&cond, &a, &b, &op.loc)?;
                    executor.push_value(value, &op.loc)
                }
                None => Err(Exception::domain(
                    "a reactive condition cannot control a statement",
                    &condition.loc,
                )),
            }
        }
        OpKind::For {
            pattern,
            list,
            until,
            body,
        } => {
            let items = match eval(list, frame)? {
                Value::List(items) => items.as_ref().clone(),
                Value::String(text) => text.chars().map(Value::Char).collect(),
                other => {
                    return Err(Exception::domain(
                        format!("{other}: not a list"),
                        &list.loc,
                    ))
                }
            };
            for item in items {
                pattern.exec(item, frame, Target::Frame)?;
                if let Some(until) = until {
                    let done = eval(until, frame)?;
                    if primitive::condition(&done, &until.loc)? == Some(true) {
                        break;
                    }
                }
                exec(body, frame, executor)?;
            }
            Ok(())
        }
        OpKind::While { condition, body } => loop {
            let cond = eval(condition, frame)?;
            match primitive::condition(&cond, &condition.loc)? {
                Some(true) => exec(body, frame, executor)?,
                Some(false) => return Ok(()),
                None => {
                    return Err(Exception::domain(
                        "a reactive condition cannot control a loop",
                        &condition.loc,
                    ))
                }
            }
        },
        OpKind::Action { kind, argument } => {
            let value = eval(argument, frame)?;
            match kind {
                ActionKind::Print => {
                    frame.system.print(&display_text(&value));
                    Ok(())
                }
                ActionKind::Warning => {
                    frame.system.warning(Exception::at(
                        ErrorKind::Custom(display_text(&value)),
                        &op.loc,
                    ));
                    Ok(())
                }
                ActionKind::Assert => match primitive::condition(&value, &argument.loc)? {
                    Some(true) => Ok(()),
                    Some(false) => Err(Exception::at(ErrorKind::AssertionFailed, &op.loc)),
                    None => Err(Exception::at(
                        ErrorKind::NotProvablyEqual {
                            left: argument.loc.text().to_string(),
                            right: "true".into(),
                        },
                        &op.loc,
                    )),
                },
            }
        }
        OpKind::Block { stmts, body } => match body {
            Some(body) => {
                for stmt in stmts {
                    exec(stmt, frame, &mut ActionExecutor)?;
                }
                exec(body, frame, executor)
            }
            None => {
                for stmt in stmts {
                    exec(stmt, frame, executor)?;
                }
                Ok(())
            }
        },
        OpKind::Let { scope, body } => {
            build_module(scope, frame)?;
            exec(body, frame, executor)
        }
        OpKind::Field { key, value } => {
            let name = match eval(key, frame)? {
                Value::Symbol(name) => name,
                Value::String(text) => Symbol::new(&text),
                other => {
                    return Err(Exception::domain(
                        format!("{other}: not a field name"),
                        &key.loc,
                    ))
                }
            };
            let value = eval(value, frame)?;
            executor.push_field(name, value, &op.loc)
        }
        OpKind::Spread(source) => match eval(source, frame)? {
            Value::List(items) => {
                for item in items.iter() {
                    executor.push_value(item.clone(), &op.loc)?;
                }
                Ok(())
            }
            Value::String(text) => {
                for ch in text.chars() {
                    executor.push_value(Value::Char(ch), &op.loc)?;
                }
                Ok(())
            }
            record if record.is_record() => {
                for (name, value) in record.fields().unwrap_or_default() {
                    executor.push_field(name, value, &op.loc)?;
                }
                Ok(())
            }
            other => Err(Exception::domain(
                format!("{other}: cannot be spread"),
                &source.loc,
            )),
        },
        _ => {
            let value = eval(op, frame)?;
            executor.push_value(value, &op.loc)
        }
    }
}

/// Constructs the module of a recursive scope and stores it in its frame slot.
pub fn build_module(scope: &ScopeExec, frame: &mut Frame) -> LangResult<Arc<Module>> {
    let module = Module::new(scope.dictionary.clone(), scope.size);
    frame.set_slot(scope.module_slot, Value::Module(module.clone()));
    for (slot, capture) in &scope.captures {
        let value = eval(capture, frame)?;
        module.set(*slot, value);
    }
    for (slot, lambda) in &scope.lambdas {
        module.set(*slot, Value::Lambda(lambda.clone()));
    }
    for init in &scope.inits {
        let value = eval(&init.value, frame)?;
        init.pattern.exec(value, frame, Target::Module(&module))?;
    }
    Ok(module)
}

enum Entered<'a> {
    Value(Value),
    Body { frame: Frame<'a>, body: Op },
}

fn enter<'a>(
    system: &'a System,
    function: &Function,
    argument: Value,
    loc: &Location,
) -> LangResult<Entered<'a>> {
    match function {
        Function::Closure(closure) => {
            let mut frame = Frame::new(system, closure.lambda.nslots, closure.nonlocals.clone());
            closure
                .lambda
                .pattern
                .exec(argument, &mut frame, Target::Frame)
                .map_err(|err| err.push_call_site(loc))?;
            Ok(Entered::Body {
                frame,
                body: closure.lambda.body.clone(),
            })
        }
        Function::Builtin(builtin) => {
            if contains_reactive(&argument) {
                if let Some(rule) = builtin.reactive {
                    let ty = rule(&argument)
                        .map_err(|err| err.located(loc))?;
                    return Ok(Entered::Value(reactive::call(function, &argument, ty, loc)));
                }
            }
            (builtin.func)(&argument, loc)
                .map(Entered::Value)
                .map_err(|err| err.located(loc))
        }
        Function::Piecewise(arms) => {
            for arm in arms.iter() {
                match arm {
                    Function::Closure(closure) => {
                        let mut frame =
                            Frame::new(system, closure.lambda.nslots, closure.nonlocals.clone());
                        if closure
                            .lambda
                            .pattern
                            .try_exec(argument.clone(), &mut frame, Target::Frame)?
                        {
                            return Ok(Entered::Body {
                                frame,
                                body: closure.lambda.body.clone(),
                            });
                        }
                    }
                    other => return enter(system, other, argument, loc),
                }
            }
            Err(Exception::at(
                ErrorKind::PatternMismatch {
                    reason: format!("no function in the match accepts {argument}"),
                },
                loc,
            ))
        }
    }
}

/// Calls a function value. Tail calls made by the body are run in this loop,
/// so tail recursion uses constant stack.
pub fn call_function(
    system: &System,
    function: Value,
    argument: Value,
    loc: &Location,
) -> LangResult<Value> {
    let mut function = function;
    let mut argument = argument;
    let mut loc = loc.clone();
    loop {
        let entered = match &function {
            Value::Function(f) => enter(system, f, argument, &loc)?,
            Value::List(_) | Value::String(_) => {
                system.deprecate(Deprecation::IndexByCall, &loc)?;
                return index_value(&function, &argument, &loc);
            }
            other => {
                return Err(Exception::at(
                    ErrorKind::NotAFunction {
                        value: other.to_string(),
                    },
                    &loc,
                ))
            }
        };
        let (mut frame, body) = match entered {
            Entered::Value(value) => return Ok(value),
            Entered::Body { frame, body } => (frame, body),
        };
        match tail_eval(&body, &mut frame).map_err(|err| err.push_call_site(&loc))? {
            TailResult::Value(value) => return Ok(value),
            TailResult::Call {
                function: next,
                argument: next_argument,
                loc: next_loc,
            } => {
                trace!(call = %next_loc, "tail call");
                function = next;
                argument = next_argument;
                loc = next_loc;
            }
        }
    }
}

fn contains_reactive(value: &Value) -> bool {
    match value {
        Value::Reactive(_) => true,
        Value::List(items) => items.iter().any(contains_reactive),
        _ => false,
    }
}

fn number(value: &Value, what: &str, loc: &Location) -> LangResult<f64> {
    value
        .as_num()
        .ok_or_else(|| Exception::domain(format!("{value}: {what} is not a number"), loc))
}

fn display_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.to_string(),
        Value::Char(ch) => ch.to_string(),
        other => other.to_string(),
    }
}

pub fn get_field(base: &Value, field: &Symbol, loc: &Location) -> LangResult<Value> {
    if !base.is_record() {
        return Err(Exception::domain(format!("{base}: not a record"), loc));
    }
    base.field(field).ok_or_else(|| {
        Exception::domain(format!("{base}: no field named {field}"), loc)
    })
}

fn list_index(len: usize, index: f64, loc: &Location) -> LangResult<usize> {
    if index.fract() != 0.0 || index < 0.0 || index >= len as f64 {
        return Err(Exception::domain(
            format!("index {index} is out of range 0..<{len}"),
            loc,
        ));
    }
    Ok(index as usize)
}

/// `base.[index]`: a number selects one element, a list of indices gathers,
/// a symbol selects a record field.
pub fn index_value(base: &Value, index: &Value, loc: &Location) -> LangResult<Value> {
    match (base, index) {
        (Value::List(items), Value::Num(n)) => Ok(items[list_index(items.len(), *n, loc)?].clone()),
        (Value::String(text), Value::Num(n)) => {
            let chars: Vec<char> = text.chars().collect();
            Ok(Value::Char(chars[list_index(chars.len(), *n, loc)?]))
        }
        (_, Value::List(indices)) => indices
            .iter()
            .map(|i| index_value(base, i, loc))
            .collect::<LangResult<Vec<_>>>()
            .map(Value::list),
        (record, Value::Symbol(name)) if record.is_record() => get_field(record, name, loc),
        _ => Err(Exception::domain(
            format!("{base}.[{index}]: cannot index"),
            loc,
        )),
    }
}
