//! Arithmetic, relational and logical primitives over values. Numeric
//! operators broadcast over lists; reactive operands produce reactive results.

use crate::{
    error::{Exception, LangResult},
    language::{
        ast::{BinaryOp, UnaryOp},
        span::Location,
    },
    runtime::{
        reactive,
        value::{Ternary, Value},
    },
};

fn domain_error(op: BinaryOp, left: &Value, right: &Value, loc: &Location) -> Exception {
    Exception::domain(format!("{left} {} {right}: domain error", op.symbol()), loc)
}

pub fn binary(op: BinaryOp, left: &Value, right: &Value, loc: &Location) -> LangResult<Value> {
    if left.is_reactive() || right.is_reactive() {
        return reactive::binary(op, left, right, loc);
    }
    match op {
        BinaryOp::Equal | BinaryOp::NotEqual => {
            let result = match left.equal(right) {
                Ternary::Unknown => return reactive::binary(op, left, right, loc),
                Ternary::True => true,
                Ternary::False => false,
            };
            Ok(Value::Bool(if op == BinaryOp::Equal { result } else { !result }))
        }
        BinaryOp::And | BinaryOp::Or => match (left, right) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == BinaryOp::And {
                *a && *b
            } else {
                *a || *b
            })),
            _ => Err(domain_error(op, left, right, loc)),
        },
        _ => elementwise(op, left, right, loc),
    }
}

fn scalar(op: BinaryOp, a: f64, b: f64) -> Value {
    match op {
        BinaryOp::Add => Value::Num(a + b),
        BinaryOp::Sub => Value::Num(a - b),
        BinaryOp::Mul => Value::Num(a * b),
        BinaryOp::Div => Value::Num(a / b),
        BinaryOp::Pow => Value::Num(a.powf(b)),
        BinaryOp::Less => Value::Bool(a < b),
        BinaryOp::LessEq => Value::Bool(a <= b),
        BinaryOp::Greater => Value::Bool(a > b),
        BinaryOp::GreaterEq => Value::Bool(a >= b),
        BinaryOp::Equal => Value::Bool(a == b),
        BinaryOp::NotEqual => Value::Bool(a != b),
        BinaryOp::And | BinaryOp::Or => Value::Null,
    }
}

fn elementwise(op: BinaryOp, left: &Value, right: &Value, loc: &Location) -> LangResult<Value> {
    match (left, right) {
        (Value::Num(a), Value::Num(b)) => Ok(scalar(op, *a, *b)),
        (Value::List(a), Value::List(b)) => {
            if a.len() != b.len() {
                return Err(Exception::domain(
                    format!(
                        "{left} {} {right}: mismatched list lengths {} and {}",
                        op.symbol(),
                        a.len(),
                        b.len()
                    ),
                    loc,
                ));
            }
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| binary(op, x, y, loc))
                .collect::<LangResult<Vec<_>>>()
                .map(Value::list)
        }
        (Value::List(a), b @ (Value::Num(_) | Value::Reactive(_))) => a
            .iter()
            .map(|x| binary(op, x, b, loc))
            .collect::<LangResult<Vec<_>>>()
            .map(Value::list),
        (a @ (Value::Num(_) | Value::Reactive(_)), Value::List(b)) => b
            .iter()
            .map(|y| binary(op, a, y, loc))
            .collect::<LangResult<Vec<_>>>()
            .map(Value::list),
        _ => Err(domain_error(op, left, right, loc)),
    }
}

pub fn unary(op: UnaryOp, operand: &Value, loc: &Location) -> LangResult<Value> {
    match (op, operand) {
        (_, Value::Reactive(_)) => reactive::unary(op, operand, loc),
        (UnaryOp::Neg, Value::Num(n)) => Ok(Value::Num(-n)),
        (UnaryOp::Pos, Value::Num(n)) => Ok(Value::Num(*n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (_, Value::List(items)) => items
            .iter()
            .map(|item| unary(op, item, loc))
            .collect::<LangResult<Vec<_>>>()
            .map(Value::list),
        _ => Err(Exception::domain(
            format!("{}{operand}: domain error", op.symbol()),
            loc,
        )),
    }
}

/// Interprets a value as a condition. Reactive conditions are returned as `None`.
pub fn condition(value: &Value, loc: &Location) -> LangResult<Option<bool>> {
    match value {
        Value::Bool(b) => Ok(Some(*b)),
        Value::Reactive(_) => Ok(None),
        other => Err(Exception::domain(
            format!("{other}: not a boolean value"),
            loc,
        )),
    }
}

/// Builds the list denoted by `first .. last by step`.
pub fn range(first: f64, last: f64, step: f64, half_open: bool, loc: &Location) -> LangResult<Value> {
    if step == 0.0 || !step.is_finite() || !first.is_finite() || !last.is_finite() {
        return Err(Exception::domain(
            format!("{first}..{last} by {step}: invalid range"),
            loc,
        ));
    }
    let count = ((last - first) / step).floor();
    if count < 0.0 {
        return Ok(Value::list(Vec::new()));
    }
    let mut items = Vec::new();
    for i in 0..=(count as u64) {
        let value = first + step * i as f64;
        if half_open && value == last {
            break;
        }
        items.push(Value::Num(value));
    }
    Ok(Value::list(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::{Source, Span};

    fn loc() -> Location {
        Location::new(Source::new("t", "x"), Span::new(0, 1))
    }

    fn nums(items: &[f64]) -> Value {
        Value::list(items.iter().map(|n| Value::Num(*n)).collect())
    }

    #[test]
    fn broadcasts_scalars_over_lists() {
        let sum = binary(BinaryOp::Add, &nums(&[1.0, 2.0]), &Value::Num(1.0), &loc()).expect("add");
        assert_eq!(sum.to_string(), "[2,3]");
        let err = binary(BinaryOp::Add, &nums(&[1.0, 2.0]), &nums(&[1.0]), &loc())
            .expect_err("length mismatch");
        assert!(err.message().contains("mismatched list lengths"));
    }

    #[test]
    fn ranges_honour_steps_and_half_open() {
        assert_eq!(range(1.0, 3.0, 1.0, false, &loc()).expect("range").to_string(), "[1,2,3]");
        assert_eq!(range(1.0, 3.0, 1.0, true, &loc()).expect("range").to_string(), "[1,2]");
        assert_eq!(range(3.0, 1.0, -1.0, false, &loc()).expect("range").to_string(), "[3,2,1]");
        assert_eq!(range(3.0, 1.0, 1.0, false, &loc()).expect("range").to_string(), "[]");
    }

    #[test]
    fn rejects_mixed_types() {
        assert!(binary(BinaryOp::Add, &Value::Bool(true), &Value::Num(1.0), &loc()).is_err());
        assert!(unary(UnaryOp::Not, &Value::Num(1.0), &loc()).is_err());
    }
}
