use crate::{
    error::{ErrorKind, Exception, LangResult},
    ir::{Op, OpKind, Operation},
    language::{
        ast::{BinaryOp, UnaryOp},
        span::Location,
    },
    runtime::{function::Function, value::Value},
    sc::types::ScType,
};
use std::sync::Arc;

/// A value that is only known when the shape is rendered. `op` is pure and
/// only refers to constants and uniforms.
#[derive(Debug)]
pub struct Reactive {
    pub op: Op,
    pub ty: ScType,
}

impl Reactive {
    pub fn value(op: Op, ty: ScType) -> Value {
        Value::Reactive(Arc::new(Reactive { op, ty }))
    }
}

/// The `time` uniform, in seconds.
pub fn time(loc: Location) -> Value {
    let ty = ScType::num();
    let op = Operation::new(
        OpKind::Uniform {
            name: "time".into(),
            ty: ty.clone(),
        },
        loc,
    );
    Reactive::value(op, ty)
}

/// The operation that recomputes `value`.
pub fn to_op(value: &Value, loc: &Location) -> Op {
    match value {
        Value::Reactive(reactive) => reactive.op.clone(),
        other => Operation::constant(other.clone(), loc.clone()),
    }
}

fn type_of(value: &Value, loc: &Location) -> LangResult<ScType> {
    ScType::of_value(value)
        .ok_or_else(|| Exception::domain(format!("{value}: not a valid reactive operand"), loc))
}

fn mismatch(left: &ScType, right: &ScType, loc: &Location) -> Exception {
    Exception::at(
        ErrorKind::TypeMismatch {
            left: left.to_string(),
            right: right.to_string(),
        },
        loc,
    )
}

pub fn binary(op: BinaryOp, left: &Value, right: &Value, loc: &Location) -> LangResult<Value> {
    let lt = type_of(left, loc)?;
    let rt = type_of(right, loc)?;
    let ty = match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => {
            ScType::unify_plex(&lt, &rt).ok_or_else(|| mismatch(&lt, &rt, loc))?
        }
        BinaryOp::Equal | BinaryOp::NotEqual => {
            if lt != rt && ScType::unify_plex(&lt, &rt).is_none() {
                return Err(mismatch(&lt, &rt, loc));
            }
            ScType::bool()
        }
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            if !lt.is_num() || !rt.is_num() {
                return Err(mismatch(&lt, &rt, loc));
            }
            ScType::bool()
        }
        BinaryOp::And | BinaryOp::Or => {
            if !lt.is_bool() || !rt.is_bool() {
                return Err(mismatch(&lt, &rt, loc));
            }
            ScType::bool()
        }
    };
    let op = Operation::new(
        OpKind::Binary {
            op,
            left: to_op(left, loc),
            right: to_op(right, loc),
        },
        loc.clone(),
    );
    Ok(Reactive::value(op, ty))
}

pub fn unary(op: UnaryOp, operand: &Value, loc: &Location) -> LangResult<Value> {
    let ty = type_of(operand, loc)?;
    let ok = match op {
        UnaryOp::Neg | UnaryOp::Pos => ty.is_plex(),
        UnaryOp::Not => ty.base == crate::sc::types::ScBase::Bool,
    };
    if !ok {
        return Err(Exception::domain(
            format!("{}{operand}: domain error", op.symbol()),
            loc,
        ));
    }
    let op = Operation::new(
        OpKind::Unary {
            op,
            operand: to_op(operand, loc),
        },
        loc.clone(),
    );
    Ok(Reactive::value(op, ty))
}

/// A deferred call to a builtin whose result type is `ty`.
pub fn call(function: &Function, argument: &Value, ty: ScType, loc: &Location) -> Value {
    let op = Operation::new(
        OpKind::Call {
            function: Operation::constant(Value::Function(function.clone()), loc.clone()),
            argument: to_op(argument, loc),
        },
        loc.clone(),
    );
    Reactive::value(op, ty)
}

/// A conditional on a reactive condition; both branches have been evaluated.
pub fn if_else(
    condition: &Value,
    then_value: &Value,
    else_value: &Value,
    loc: &Location,
) -> LangResult<Value> {
    let ct = type_of(condition, loc)?;
    if !ct.is_bool() {
        return Err(Exception::domain(
            format!("{condition}: condition is not a boolean"),
            loc,
        ));
    }
    let tt = type_of(then_value, loc)?;
    let et = type_of(else_value, loc)?;
    let ty = if tt == et {
        tt
    } else {
        ScType::unify_plex(&tt, &et).ok_or_else(|| mismatch(&tt, &et, loc))?
    };
    let op = Operation::new(
        OpKind::IfElse {
            condition: to_op(condition, loc),
            then_branch: to_op(then_value, loc),
            else_branch: to_op(else_value, loc),
        },
        loc.clone(),
    );
    Ok(Reactive::value(op, ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::{Source, Span};

    fn loc() -> Location {
        Location::new(Source::new("t", "1 + time"), Span::new(0, 8))
    }

    #[test]
    fn adding_a_number_stays_reactive() {
        let value = binary(BinaryOp::Add, &Value::Num(1.0), &time(loc()), &loc()).expect("add");
        let Value::Reactive(reactive) = value else {
            panic!("expected a reactive value");
        };
        assert_eq!(reactive.ty, ScType::num());
        assert!(matches!(reactive.op.kind, OpKind::Binary { op: BinaryOp::Add, .. }));
        assert!(reactive.op.pure);
    }

    #[test]
    fn vectors_broadcast_the_reactive_scalar() {
        let v = Value::list(vec![Value::Num(1.0), Value::Num(2.0), Value::Num(3.0)]);
        let value = binary(BinaryOp::Mul, &v, &time(loc()), &loc()).expect("mul");
        let Value::Reactive(reactive) = value else {
            panic!("expected a reactive value");
        };
        assert_eq!(reactive.ty, ScType::vec(3));
    }

    #[test]
    fn relations_need_scalars() {
        let v = Value::list(vec![Value::Num(1.0), Value::Num(2.0)]);
        let err = binary(BinaryOp::Less, &v, &time(loc()), &loc()).expect_err("vector relation");
        assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
    }
}
