//! Builtin functions applied to run-time values, spelled as GLSL built-ins
//! or their `glm::` counterparts.

use crate::{
    error::{Exception, LangResult},
    ir::{Op, OpKind},
    language::{ast::BinaryOp, span::Location},
    runtime::{
        function::{Builtin, Function},
        interpreter::call_function,
        value::Value,
    },
    sc::{
        compiler::ScCompiler,
        constify::all_const,
        ops::{not_supported, type_mismatch},
        types::ScType,
        value::{ScFrame, ScItem, ScValue},
    },
};
use std::sync::Arc;

/// Builtins of one argument that map elementwise onto a function of the
/// same name.
const ELEMENTWISE: [&str; 11] = [
    "sqrt", "abs", "floor", "ceil", "round", "sin", "cos", "tan", "exp", "log", "sign",
];

impl ScCompiler<'_> {
    /// `f [a, b, c]` passes its list items as separate arguments; any other
    /// argument is one value.
    pub(crate) fn sc_builtin_call(
        &mut self,
        builtin: &Arc<Builtin>,
        argument: &Op,
        loc: &Location,
        frame: &mut ScFrame,
    ) -> LangResult<ScItem> {
        let (items, spread) = match &argument.kind {
            OpKind::List(ops) if ops.iter().all(|op| op.is_expression()) => (
                ops.iter()
                    .map(|op| self.sc_item(op, frame))
                    .collect::<LangResult<Vec<_>>>()?,
                true,
            ),
            _ => (vec![self.sc_item(argument, frame)?], false),
        };
        if let Some(values) = all_const(&items) {
            let argument = if spread {
                Value::list(values)
            } else {
                values.into_iter().next().unwrap_or(Value::Null)
            };
            let function = Value::Function(Function::Builtin(builtin.clone()));
            return Ok(ScItem::Const(call_function(self.system, function, argument, loc)?));
        }
        let args = items
            .into_iter()
            .map(|item| self.to_value(item, &argument.loc))
            .collect::<LangResult<Vec<_>>>()?;
        Ok(ScItem::Value(self.sc_builtin(builtin.name, args, spread, loc)?))
    }

    /// A single argument made of several items is a vector.
    fn one_arg(&mut self, mut args: Vec<ScValue>, loc: &Location) -> LangResult<ScValue> {
        if args.len() == 1 {
            return Ok(args.remove(0));
        }
        let list = self.list_expr(args, loc)?;
        Ok(self.emit(list.ty, list.expr))
    }

    /// The arguments of a builtin taking `n` values, unified to one type.
    fn plex_args(
        &mut self,
        name: &str,
        args: Vec<ScValue>,
        n: usize,
        loc: &Location,
    ) -> LangResult<Vec<ScValue>> {
        if args.len() != n {
            return Err(Exception::domain(
                format!("{name} expects {n} arguments, got {}", args.len()),
                loc,
            ));
        }
        let mut ty = args[0].ty.clone();
        for arg in &args[1..] {
            if !arg.ty.is_plex() || !ty.is_plex() {
                return Err(type_mismatch(&ty, &arg.ty, loc));
            }
            ty = ScType::unify_plex(&ty, &arg.ty).ok_or_else(|| type_mismatch(&ty, &arg.ty, loc))?;
        }
        args.iter()
            .map(|arg| {
                self.sc_try_extend(arg, &ty)
                    .ok_or_else(|| type_mismatch(&arg.ty, &ty, loc))
            })
            .collect()
    }

    fn vector_arg(&self, name: &str, arg: &ScValue, loc: &Location) -> LangResult<()> {
        if arg.ty.is_vec() {
            Ok(())
        } else {
            Err(Exception::domain(format!("{name}: {} is not a vector", arg.ty), loc))
        }
    }

    /// Folds `max`, `min` or `sum` over the components of one vector.
    fn reduce(&mut self, name: &str, arg: &ScValue, loc: &Location) -> LangResult<ScValue> {
        self.vector_arg(name, arg, loc)?;
        let mut acc = self.element(arg, 0);
        for i in 1..arg.ty.dim1 {
            let next = self.element(arg, i);
            acc = if name == "sum" {
                self.sc_binary(BinaryOp::Add, &acc, &next, loc)?
            } else {
                let expr = self.math(name, &[&acc, &next]);
                self.emit(ScType::num(), expr)
            };
        }
        Ok(acc)
    }

    pub(crate) fn sc_builtin(
        &mut self,
        name: &str,
        args: Vec<ScValue>,
        spread: bool,
        loc: &Location,
    ) -> LangResult<ScValue> {
        match name {
            _ if ELEMENTWISE.contains(&name) || name == "fract" => {
                let arg = self.one_arg(args, loc)?;
                if !arg.ty.is_plex() || arg.ty.is_array() || arg.ty.is_mat() {
                    return Err(Exception::domain(format!("{name}: {} is not a number", arg.ty), loc));
                }
                let expr = self.math(name, &[&arg]);
                Ok(self.emit(arg.ty, expr))
            }
            "mag" | "normalize" => {
                let arg = self.one_arg(args, loc)?;
                self.vector_arg(name, &arg, loc)?;
                let (function, ty) = if name == "mag" {
                    ("length", ScType::num())
                } else {
                    ("normalize", arg.ty.clone())
                };
                let expr = self.math(function, &[&arg]);
                Ok(self.emit(ty, expr))
            }
            "dot" | "cross" => {
                let args = self.plex_args(name, args, 2, loc)?;
                self.vector_arg(name, &args[0], loc)?;
                let ty = if name == "dot" {
                    ScType::num()
                } else if args[0].ty == ScType::vec(3) {
                    ScType::vec(3)
                } else {
                    return Err(Exception::domain("cross: arguments must be 3-vectors", loc));
                };
                let expr = self.math(name, &[&args[0], &args[1]]);
                Ok(self.emit(ty, expr))
            }
            "atan2" | "mod" => {
                let args = self.plex_args(name, args, 2, loc)?;
                let function = if name == "atan2" { "atan" } else { "mod" };
                let expr = self.math(function, &[&args[0], &args[1]]);
                Ok(self.emit(args[0].ty.clone(), expr))
            }
            "max" | "min" | "sum" if !spread || args.len() == 1 => {
                let arg = self.one_arg(args, loc)?;
                self.reduce(name, &arg, loc)
            }
            "max" | "min" => {
                let n = args.len();
                let args = self.plex_args(name, args, n, loc)?;
                let mut acc = args[0].clone();
                for arg in &args[1..] {
                    let expr = self.math(name, &[&acc, arg]);
                    acc = self.emit(arg.ty.clone(), expr);
                }
                Ok(acc)
            }
            "sum" => {
                let mut acc = args[0].clone();
                for arg in &args[1..] {
                    acc = self.sc_binary(BinaryOp::Add, &acc, arg, loc)?;
                }
                Ok(acc)
            }
            "clamp" | "mix" => {
                let args = self.plex_args(name, args, 3, loc)?;
                let expr = self.math(name, &[&args[0], &args[1], &args[2]]);
                Ok(self.emit(args[0].ty.clone(), expr))
            }
            _ => Err(not_supported(format!("{name} of a run-time value"), loc)),
        }
    }
}
