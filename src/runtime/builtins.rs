//! The builtin namespace: constants and functions implemented in Rust.
//! Functions of several arguments take them as a list, `max(a, b)`.

use crate::{
    error::{ErrorKind, Exception, LangResult},
    language::{
        ast::BinaryOp,
        span::{Location, Source, Span},
    },
    runtime::{
        function::{Builtin, BuiltinFn, Function, ReactiveRule},
        primitive, reactive,
        value::Value,
    },
    sc::types::ScType,
};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;

pub type Namespace = HashMap<String, Value>;

fn builtin_location() -> Location {
    Location::new(Source::new("<builtin>", "time"), Span::new(0, 4))
}

pub fn namespace() -> Namespace {
    let mut names = Namespace::new();
    let constants = [
        ("true", Value::Bool(true)),
        ("false", Value::Bool(false)),
        ("null", Value::Null),
        ("pi", Value::Num(PI)),
        ("tau", Value::Num(2.0 * PI)),
        ("inf", Value::Num(f64::INFINITY)),
        ("X", Value::Num(0.0)),
        ("Y", Value::Num(1.0)),
        ("Z", Value::Num(2.0)),
        ("T", Value::Num(3.0)),
        ("time", reactive::time(builtin_location())),
    ];
    for (name, value) in constants {
        names.insert(name.to_string(), value);
    }
    let functions: [(&'static str, BuiltinFn, Option<ReactiveRule>); 33] = [
        ("sqrt", |a, l| map_num(a, l, "sqrt", f64::sqrt), Some(same_type)),
        ("abs", |a, l| map_num(a, l, "abs", f64::abs), Some(same_type)),
        ("floor", |a, l| map_num(a, l, "floor", f64::floor), Some(same_type)),
        ("ceil", |a, l| map_num(a, l, "ceil", f64::ceil), Some(same_type)),
        ("round", |a, l| map_num(a, l, "round", f64::round), Some(same_type)),
        ("sin", |a, l| map_num(a, l, "sin", f64::sin), Some(same_type)),
        ("cos", |a, l| map_num(a, l, "cos", f64::cos), Some(same_type)),
        ("tan", |a, l| map_num(a, l, "tan", f64::tan), Some(same_type)),
        ("exp", |a, l| map_num(a, l, "exp", f64::exp), Some(same_type)),
        ("log", |a, l| map_num(a, l, "log", f64::ln), Some(same_type)),
        ("sign", |a, l| map_num(a, l, "sign", sign), Some(same_type)),
        ("fract", |a, l| map_num(a, l, "fract", |x| x - x.floor()), Some(same_type)),
        ("atan2", |a, l| fold_pair(a, l, "atan2", f64::atan2), Some(unified_args)),
        ("max", |a, l| fold_num(a, l, "max", f64::max), Some(unified_args)),
        ("min", |a, l| fold_num(a, l, "min", f64::min), Some(unified_args)),
        ("mod", |a, l| fold_pair(a, l, "mod", |x, y| x - y * (x / y).floor()), Some(unified_args)),
        ("clamp", clamp, Some(unified_args)),
        ("mix", mix, Some(unified_args)),
        ("mag", mag, Some(vector_to_num)),
        ("dot", dot, Some(vectors_to_num)),
        ("cross", cross, Some(unified_args)),
        ("normalize", normalize, Some(same_type)),
        ("count", count, None),
        ("sum", sum, None),
        ("is_num", |a, _| Ok(Value::Bool(matches!(a, Value::Num(_)))), None),
        ("is_bool", |a, _| Ok(Value::Bool(matches!(a, Value::Bool(_)))), None),
        ("is_list", |a, _| Ok(Value::Bool(matches!(a, Value::List(_)))), None),
        ("is_record", |a, _| Ok(Value::Bool(a.is_record())), None),
        ("is_fun", |a, _| Ok(Value::Bool(matches!(a, Value::Function(_)))), None),
        ("is_symbol", |a, _| Ok(Value::Bool(matches!(a, Value::Symbol(_)))), None),
        ("is_string", |a, _| Ok(Value::Bool(matches!(a, Value::String(_)))), None),
        ("error", error, None),
        ("match", piecewise, None),
    ];
    for (name, func, rule) in functions {
        let builtin = Builtin {
            name,
            func,
            reactive: rule,
        };
        names.insert(name.to_string(), Value::Function(Function::Builtin(Arc::new(builtin))));
    }
    names
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn domain(name: &str, arg: &Value, loc: &Location) -> Exception {
    Exception::domain(format!("{name}({arg}): domain error"), loc)
}

/// Applies `f` to a number, or to every number in a nested list.
fn map_num(arg: &Value, loc: &Location, name: &str, f: fn(f64) -> f64) -> LangResult<Value> {
    match arg {
        Value::Num(n) => Ok(Value::Num(f(*n))),
        Value::List(items) => items
            .iter()
            .map(|item| map_num(item, loc, name, f))
            .collect::<LangResult<Vec<_>>>()
            .map(Value::list),
        _ => Err(domain(name, arg, loc)),
    }
}

/// Combines two values elementwise, broadcasting numbers over lists.
fn zip_num(a: &Value, b: &Value, loc: &Location, name: &str, f: fn(f64, f64) -> f64) -> LangResult<Value> {
    match (a, b) {
        (Value::Num(x), Value::Num(y)) => Ok(Value::Num(f(*x, *y))),
        (Value::List(xs), Value::List(ys)) if xs.len() == ys.len() => xs
            .iter()
            .zip(ys.iter())
            .map(|(x, y)| zip_num(x, y, loc, name, f))
            .collect::<LangResult<Vec<_>>>()
            .map(Value::list),
        (Value::List(xs), y @ Value::Num(_)) => xs
            .iter()
            .map(|x| zip_num(x, y, loc, name, f))
            .collect::<LangResult<Vec<_>>>()
            .map(Value::list),
        (x @ Value::Num(_), Value::List(ys)) => ys
            .iter()
            .map(|y| zip_num(x, y, loc, name, f))
            .collect::<LangResult<Vec<_>>>()
            .map(Value::list),
        _ => Err(Exception::domain(format!("{name}({a}, {b}): domain error"), loc)),
    }
}

fn args<'v>(arg: &'v Value, count: usize, name: &str, loc: &Location) -> LangResult<&'v [Value]> {
    match arg.as_list() {
        Some(items) if items.len() == count => Ok(items),
        _ => Err(Exception::domain(
            format!("{name}: expected a list of {count} arguments, got {arg}"),
            loc,
        )),
    }
}

fn fold_pair(arg: &Value, loc: &Location, name: &str, f: fn(f64, f64) -> f64) -> LangResult<Value> {
    let items = args(arg, 2, name, loc)?;
    zip_num(&items[0], &items[1], loc, name, f)
}

/// `max[a, b, ...]`: folds over the list, elementwise for vectors.
fn fold_num(arg: &Value, loc: &Location, name: &str, f: fn(f64, f64) -> f64) -> LangResult<Value> {
    let Some((first, rest)) = arg.as_list().and_then(|items| items.split_first()) else {
        return Err(domain(name, arg, loc));
    };
    rest.iter()
        .try_fold(first.clone(), |acc, item| zip_num(&acc, item, loc, name, f))
}

fn clamp(arg: &Value, loc: &Location) -> LangResult<Value> {
    let items = args(arg, 3, "clamp", loc)?;
    let low = zip_num(&items[0], &items[1], loc, "clamp", f64::max)?;
    zip_num(&low, &items[2], loc, "clamp", f64::min)
}

/// `mix[a, b, t]` = `a + (b - a) * t`
fn mix(arg: &Value, loc: &Location) -> LangResult<Value> {
    let items = args(arg, 3, "mix", loc)?;
    let delta = primitive::binary(BinaryOp::Sub, &items[1], &items[0], loc)?;
    let scaled = primitive::binary(BinaryOp::Mul, &delta, &items[2], loc)?;
    primitive::binary(BinaryOp::Add, &items[0], &scaled, loc)
}

fn numbers(value: &Value, name: &str, loc: &Location) -> LangResult<Vec<f64>> {
    value
        .as_list()
        .and_then(|items| items.iter().map(Value::as_num).collect::<Option<Vec<_>>>())
        .ok_or_else(|| domain(name, value, loc))
}

fn mag(arg: &Value, loc: &Location) -> LangResult<Value> {
    let v = numbers(arg, "mag", loc)?;
    Ok(Value::Num(v.iter().map(|x| x * x).sum::<f64>().sqrt()))
}

fn dot(arg: &Value, loc: &Location) -> LangResult<Value> {
    let items = args(arg, 2, "dot", loc)?;
    let a = numbers(&items[0], "dot", loc)?;
    let b = numbers(&items[1], "dot", loc)?;
    if a.len() != b.len() {
        return Err(domain("dot", arg, loc));
    }
    Ok(Value::Num(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()))
}

fn cross(arg: &Value, loc: &Location) -> LangResult<Value> {
    let items = args(arg, 2, "cross", loc)?;
    let a = numbers(&items[0], "cross", loc)?;
    let b = numbers(&items[1], "cross", loc)?;
    if a.len() != 3 || b.len() != 3 {
        return Err(domain("cross", arg, loc));
    }
    Ok(Value::list(
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
        .into_iter()
        .map(Value::Num)
        .collect(),
    ))
}

fn normalize(arg: &Value, loc: &Location) -> LangResult<Value> {
    let length = mag(arg, loc)?;
    primitive::binary(BinaryOp::Div, arg, &length, loc)
}

fn count(arg: &Value, loc: &Location) -> LangResult<Value> {
    let n = match arg {
        Value::List(items) => items.len(),
        Value::String(text) => text.chars().count(),
        record if record.is_record() => record.fields().map_or(0, |fields| fields.len()),
        _ => return Err(domain("count", arg, loc)),
    };
    Ok(Value::Num(n as f64))
}

fn sum(arg: &Value, loc: &Location) -> LangResult<Value> {
    let Some(items) = arg.as_list() else {
        return Err(domain("sum", arg, loc));
    };
    let Some((first, rest)) = items.split_first() else {
        return Ok(Value::Num(0.0));
    };
    rest.iter().try_fold(first.clone(), |acc, item| {
        primitive::binary(BinaryOp::Add, &acc, item, loc)
    })
}

fn error(arg: &Value, loc: &Location) -> LangResult<Value> {
    let message = match arg {
        Value::String(text) => text.to_string(),
        other => other.to_string(),
    };
    Err(Exception::at(ErrorKind::Custom(message), loc))
}

/// `match [f, g, ...]`: a function that tries each arm in turn.
fn piecewise(arg: &Value, loc: &Location) -> LangResult<Value> {
    let Some(items) = arg.as_list() else {
        return Err(domain("match", arg, loc));
    };
    let mut arms = Vec::new();
    for item in items {
        match item {
            Value::Function(Function::Piecewise(inner)) => arms.extend(inner.iter().cloned()),
            Value::Function(function) => arms.push(function.clone()),
            other => {
                return Err(Exception::at(
                    ErrorKind::NotAFunction {
                        value: other.to_string(),
                    },
                    loc,
                ))
            }
        }
    }
    Ok(Value::Function(Function::Piecewise(Arc::new(arms))))
}

fn type_of(value: &Value) -> LangResult<ScType> {
    ScType::of_value(value)
        .ok_or_else(|| Exception::new(ErrorKind::Domain(format!("{value}: not a valid reactive argument"))))
}

fn mismatch(left: &ScType, right: &ScType) -> Exception {
    Exception::new(ErrorKind::TypeMismatch {
        left: left.to_string(),
        right: right.to_string(),
    })
}

fn same_type(arg: &Value) -> LangResult<ScType> {
    let ty = type_of(arg)?;
    if ty.is_plex() {
        Ok(ty)
    } else {
        Err(mismatch(&ty, &ScType::num()))
    }
}

fn arg_types(arg: &Value) -> LangResult<Vec<ScType>> {
    match arg {
        Value::List(items) => items.iter().map(type_of).collect(),
        other => Ok(vec![type_of(other)?]),
    }
}

/// The common type of every argument.
fn unified_args(arg: &Value) -> LangResult<ScType> {
    let types = arg_types(arg)?;
    let Some((first, rest)) = types.split_first() else {
        return Err(Exception::new(ErrorKind::Domain("missing arguments".into())));
    };
    rest.iter().try_fold(first.clone(), |acc, ty| {
        ScType::unify_plex(&acc, ty).ok_or_else(|| mismatch(&acc, ty))
    })
}

fn vector_to_num(arg: &Value) -> LangResult<ScType> {
    let ty = type_of(arg)?;
    if ty.is_vec() {
        Ok(ScType::num())
    } else {
        Err(mismatch(&ty, &ScType::vec(3)))
    }
}

fn vectors_to_num(arg: &Value) -> LangResult<ScType> {
    let ty = unified_args(arg)?;
    if ty.is_vec() {
        Ok(ScType::num())
    } else {
        Err(mismatch(&ty, &ScType::vec(3)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arg: Value) -> LangResult<Value> {
        let names = namespace();
        let Some(Value::Function(Function::Builtin(builtin))) = names.get(name) else {
            panic!("{name} is not a builtin function");
        };
        (builtin.func)(&arg, &builtin_location())
    }

    fn nums(items: &[f64]) -> Value {
        Value::list(items.iter().map(|n| Value::Num(*n)).collect())
    }

    #[test]
    fn vector_builtins() {
        assert_eq!(call("mag", nums(&[3.0, 4.0])).expect("mag").to_string(), "5");
        let d = call("dot", Value::list(vec![nums(&[1.0, 2.0, 3.0]), nums(&[4.0, 5.0, 6.0])]));
        assert_eq!(d.expect("dot").to_string(), "32");
        let c = call("cross", Value::list(vec![nums(&[1.0, 0.0, 0.0]), nums(&[0.0, 1.0, 0.0])]));
        assert_eq!(c.expect("cross").to_string(), "[0,0,1]");
    }

    #[test]
    fn max_and_min_broadcast() {
        let m = call("max", Value::list(vec![nums(&[1.0, 5.0]), Value::Num(2.0)])).expect("max");
        assert_eq!(m.to_string(), "[2,5]");
        assert_eq!(call("min", nums(&[3.0, 1.0, 2.0])).expect("min").to_string(), "1");
        assert!(call("max", Value::Num(1.0)).is_err());
    }

    #[test]
    fn abs_maps_over_lists() {
        assert_eq!(call("abs", nums(&[-1.0, 2.0])).expect("abs").to_string(), "[1,2]");
        assert_eq!(call("sum", nums(&[1.0, 2.0, 3.0])).expect("sum").to_string(), "6");
        assert_eq!(call("sum", nums(&[])).expect("sum").to_string(), "0");
    }

    #[test]
    fn error_raises_its_message() {
        let err = call("error", Value::string("boom")).expect_err("error");
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn reactive_rules_unify_argument_types() {
        let arg = Value::list(vec![nums(&[1.0, 2.0, 3.0]), Value::Num(0.0)]);
        assert_eq!(unified_args(&arg).expect("unify"), ScType::vec(3));
        let bad = Value::list(vec![nums(&[1.0, 2.0]), nums(&[1.0, 2.0, 3.0])]);
        assert!(matches!(
            unified_args(&bad).expect_err("mismatch").kind,
            ErrorKind::TypeMismatch { .. }
        ));
    }
}
