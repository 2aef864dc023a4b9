//! Compiles the Operation IR of shape functions into GLSL or C++.
//!
//! Every function call is inlined at its call site. Values that are known at
//! compile time stay values (`ScItem::Const`) and fold; everything else is
//! emitted as one statement per operation, declaring a fresh `rN` variable.
//! Pure operations are emitted once per block and reused by fingerprint.

use crate::{
    analyser::{locative::Locative, pattern::Pattern},
    config::Target,
    error::{ErrorKind, Exception, LangResult},
    ir::{Op, OpKind, ScopeExec},
    language::{
        ast::{ActionKind, BinaryOp},
        span::Location,
    },
    runtime::{
        function::Function,
        interpreter::{get_field, index_value},
        primitive,
        value::{Record, Symbol, Value},
    },
    sc::{
        constify::all_const,
        ops::{not_supported, num_literal, type_mismatch},
        pattern::ScTarget,
        types::ScType,
        value::{DynamicModule, ScClosure, ScFrame, ScItem, ScModule, ScSlot, ScValue},
    },
    system::System,
};
use std::collections::BTreeSet;
use std::fmt::Write;
use std::rc::Rc;
use tracing::{debug, trace};

/// Inlining deeper than this is taken to be unbounded recursion.
const MAX_INLINE_DEPTH: usize = 64;

pub struct ScCompiler<'s> {
    pub(crate) system: &'s System,
    target: Target,
    body: String,
    indent: usize,
    next_id: usize,
    uniforms: BTreeSet<String>,
    functions: Vec<String>,
    depth: usize,
}

/// An entry point of the generated program.
pub struct ScEntry<'a> {
    pub name: &'a str,
    pub function: &'a Value,
    pub param: ScType,
    pub result: ScType,
}

impl<'s> ScCompiler<'s> {
    pub fn new(system: &'s System, target: Target) -> Self {
        Self {
            system,
            target,
            body: String::new(),
            indent: 1,
            next_id: 0,
            uniforms: BTreeSet::new(),
            functions: Vec::new(),
            depth: 0,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    fn fresh_name(&mut self) -> String {
        let name = format!("r{}", self.next_id);
        self.next_id += 1;
        name
    }

    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.body.push_str("  ");
        }
        self.body.push_str(text.as_ref());
        self.body.push('\n');
    }

    /// Emits `T rN = expr;` and returns the new variable.
    pub(crate) fn emit(&mut self, ty: ScType, expr: String) -> ScValue {
        let name = self.fresh_name();
        let decl = self.type_name(&ty);
        self.line(format!("{decl} {name} = {expr};"));
        ScValue::new(name, ty)
    }

    /// Emits an uninitialised declaration.
    fn declare(&mut self, ty: ScType) -> ScValue {
        let name = self.fresh_name();
        let decl = self.type_name(&ty);
        self.line(format!("{decl} {name};"));
        ScValue::new(name, ty)
    }

    /// Compiles into a separate, more deeply indented buffer and returns its
    /// text. Cached values from inside do not escape the block.
    fn nested<T>(
        &mut self,
        frame: &mut ScFrame,
        f: impl FnOnce(&mut Self, &mut ScFrame) -> LangResult<T>,
    ) -> LangResult<(T, String)> {
        let saved = std::mem::take(&mut self.body);
        self.indent += 1;
        frame.push_cache();
        let result = f(self, frame);
        frame.pop_cache();
        self.indent -= 1;
        let code = std::mem::replace(&mut self.body, saved);
        result.map(|value| (value, code))
    }

    /// Runs `f` against a scratch buffer and discards everything it emitted.
    pub(crate) fn scratch<T>(
        &mut self,
        frame: &mut ScFrame,
        f: impl FnOnce(&mut Self, &mut ScFrame) -> LangResult<T>,
    ) -> LangResult<T> {
        let next_id = self.next_id;
        let uniforms = self.uniforms.clone();
        let result = self.nested(frame, f);
        self.next_id = next_id;
        self.uniforms = uniforms;
        result.map(|(value, _)| value)
    }

    /// Compiles an expression to a run-time value.
    pub fn sc_eval(&mut self, op: &Op, frame: &mut ScFrame) -> LangResult<ScValue> {
        let item = self.sc_item(op, frame)?;
        self.to_value(item, &op.loc)
    }

    pub fn to_value(&mut self, item: ScItem, loc: &Location) -> LangResult<ScValue> {
        match item {
            ScItem::Value(value) => Ok(value),
            ScItem::Const(value) => self.value_to_sc(&value, loc),
            ScItem::Module(_) => Err(not_supported("record as a run-time value", loc)),
            ScItem::Closure(_) => Err(not_supported("function as a run-time value", loc)),
        }
    }

    /// Compiles an expression, keeping whatever is known at compile time.
    pub fn sc_item(&mut self, op: &Op, frame: &mut ScFrame) -> LangResult<ScItem> {
        let emits = matches!(
            op.kind,
            OpKind::Call { .. }
                | OpKind::List(_)
                | OpKind::Index { .. }
                | OpKind::Unary { .. }
                | OpKind::Binary { .. }
                | OpKind::IfElse { .. }
        );
        let key = if op.pure && emits { op.fingerprint() } else { None };
        if let Some(key) = &key {
            if let Some(value) = frame.cached(key) {
                trace!(op = op.name(), var = %value.expr, "reused");
                return Ok(ScItem::Value(value));
            }
        }
        let item = self.sc_item_uncached(op, frame)?;
        if let (Some(key), ScItem::Value(value)) = (key, &item) {
            frame.remember(key, value.clone());
        }
        Ok(item)
    }

    fn sc_item_uncached(&mut self, op: &Op, frame: &mut ScFrame) -> LangResult<ScItem> {
        let loc = &op.loc;
        match &op.kind {
            OpKind::Constant(value) => Ok(ScItem::Const(value.clone())),
            OpKind::LocalRef(slot) => frame.slot(*slot).cloned().ok_or_else(|| {
                Exception::at(
                    ErrorKind::Custom(format!("{}: used before it is defined", loc.text())),
                    loc,
                )
            }),
            OpKind::NonlocalRef(slot) => frame.nonlocals.get(*slot).ok_or_else(|| {
                Exception::at(
                    ErrorKind::IllegalRecursiveReference {
                        name: loc.text().to_string(),
                    },
                    loc,
                )
            }),
            OpKind::ModuleRef {
                module,
                index,
                name,
            } => {
                let module = match self.sc_item(module, frame)? {
                    ScItem::Module(module) => module,
                    ScItem::Const(Value::Module(module)) => ScModule::Const(module),
                    _ => return Err(not_supported("reference into a non-module", loc)),
                };
                module.get(*index).ok_or_else(|| {
                    Exception::at(
                        ErrorKind::IllegalRecursiveReference {
                            name: name.to_string(),
                        },
                        loc,
                    )
                })
            }
            OpKind::Dot { base, field } => match self.sc_item(base, frame)? {
                ScItem::Const(value) => Ok(ScItem::Const(get_field(&value, field, loc)?)),
                ScItem::Module(module) => module.field(field).ok_or_else(|| {
                    Exception::at(
                        ErrorKind::MissingField {
                            name: field.to_string(),
                        },
                        loc,
                    )
                }),
                ScItem::Value(value) => {
                    Err(not_supported(format!("field .{field} of a {}", value.ty), loc))
                }
                ScItem::Closure(_) => Err(Exception::domain(
                    format!("{}: a function has no field {field}", base.loc.text()),
                    loc,
                )),
            },
            OpKind::Index { base, indices } => {
                let mut current = self.sc_item(base, frame)?;
                let items = indices
                    .iter()
                    .map(|index| self.sc_item(index, frame))
                    .collect::<LangResult<Vec<_>>>()?;
                let mut rest = items.as_slice();
                while let Some(first) = rest.first() {
                    let (next, used) = match (current, first) {
                        (ScItem::Const(b), ScItem::Const(i)) if !b.is_reactive() && !i.is_reactive() => {
                            (ScItem::Const(index_value(&b, i, loc)?), 1)
                        }
                        (b, _) => {
                            let b = self.to_value(b, &base.loc)?;
                            let (value, used) = self.sc_index_path(&b, rest, loc)?;
                            (ScItem::Value(value), used)
                        }
                    };
                    current = next;
                    rest = &rest[used..];
                }
                Ok(current)
            }
            OpKind::List(items) => {
                if let Some(item) = items.iter().find(|item| !item.is_expression()) {
                    return Err(not_supported(
                        format!("{} inside a list", item.name()),
                        &item.loc,
                    ));
                }
                let items = items
                    .iter()
                    .map(|item| self.sc_item(item, frame))
                    .collect::<LangResult<Vec<_>>>()?;
                if let Some(values) = all_const(&items) {
                    return Ok(ScItem::Const(Value::list(values)));
                }
                let elements = items
                    .into_iter()
                    .map(|item| self.to_value(item, loc))
                    .collect::<LangResult<Vec<_>>>()?;
                let list = self.list_expr(elements, loc)?;
                Ok(ScItem::Value(self.emit(list.ty, list.expr)))
            }
            OpKind::Record(items) => {
                let mut record = Record::new();
                for item in items {
                    let OpKind::Field { key, value } = &item.kind else {
                        return Err(not_supported("record comprehension", &item.loc));
                    };
                    let key = match self.sc_constify(key, frame)? {
                        Value::Symbol(name) => name,
                        Value::String(text) => Symbol::new(&text),
                        other => {
                            return Err(Exception::domain(format!("{other}: not a field name"), &key.loc))
                        }
                    };
                    match self.sc_item(value, frame)? {
                        ScItem::Const(value) => {
                            record.insert(key, value);
                        }
                        _ => return Err(not_supported("record with run-time fields", loc)),
                    }
                }
                Ok(ScItem::Const(Value::record(record)))
            }
            OpKind::Unary { op: unary, operand } => match self.sc_item(operand, frame)? {
                ScItem::Const(value) => Ok(ScItem::Const(primitive::unary(*unary, &value, loc)?)),
                other => {
                    let value = self.to_value(other, &operand.loc)?;
                    Ok(ScItem::Value(self.sc_unary(*unary, &value, loc)?))
                }
            },
            OpKind::Binary {
                op: binary,
                left,
                right,
            } => self.sc_binary_op(*binary, left, right, loc, frame),
            OpKind::Range {
                first,
                last,
                step,
                half_open,
            } => {
                let first = self.constant_num(first, frame)?;
                let last = self.constant_num(last, frame)?;
                let step = match step {
                    Some(step) => self.constant_num(step, frame)?,
                    None => 1.0,
                };
                Ok(ScItem::Const(primitive::range(first, last, step, *half_open, loc)?))
            }
            OpKind::Lambda { lambda, captures } => {
                let items = captures
                    .iter()
                    .map(|capture| self.sc_item(capture, frame))
                    .collect::<LangResult<Vec<_>>>()?;
                Ok(ScItem::Closure(ScClosure {
                    lambda: lambda.clone(),
                    nonlocals: ScModule::Dynamic(DynamicModule::anonymous(items)),
                }))
            }
            OpKind::Module(scope) => Ok(ScItem::Module(ScModule::Dynamic(
                self.sc_module(scope, frame)?,
            ))),
            OpKind::Let { scope, body } => {
                self.sc_module(scope, frame)?;
                self.sc_item(body, frame)
            }
            OpKind::Block {
                stmts,
                body: Some(body),
            } => {
                for stmt in stmts {
                    self.sc_exec(stmt, frame)?;
                }
                self.sc_item(body, frame)
            }
            OpKind::IfElse {
                condition,
                then_branch,
                else_branch,
            } => self.sc_if_else(condition, then_branch, else_branch, loc, frame),
            OpKind::Call { function, argument } => self.sc_call(function, argument, loc, frame),
            OpKind::Uniform { name, ty } => {
                self.uniforms.insert(name.clone());
                Ok(ScItem::Value(ScValue::new(format!("rv_{name}"), ty.clone())))
            }
            _ => Err(Exception::at(
                ErrorKind::NotAnExpression {
                    what: op.name().to_string(),
                },
                loc,
            )),
        }
    }

    fn sc_binary_op(
        &mut self,
        op: BinaryOp,
        left: &Op,
        right: &Op,
        loc: &Location,
        frame: &mut ScFrame,
    ) -> LangResult<ScItem> {
        let a = self.sc_item(left, frame)?;
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            match (&a, op) {
                (ScItem::Const(Value::Bool(false)), BinaryOp::And) => {
                    return Ok(ScItem::Const(Value::Bool(false)))
                }
                (ScItem::Const(Value::Bool(true)), BinaryOp::Or) => {
                    return Ok(ScItem::Const(Value::Bool(true)))
                }
                (ScItem::Const(Value::Bool(_)), _) => return self.sc_item(right, frame),
                _ => {}
            }
        }
        let b = self.sc_item(right, frame)?;
        if let (ScItem::Const(x), ScItem::Const(y)) = (&a, &b) {
            return Ok(ScItem::Const(primitive::binary(op, x, y, loc)?));
        }
        let a = self.to_value(a, &left.loc)?;
        let b = self.to_value(b, &right.loc)?;
        Ok(ScItem::Value(self.sc_binary(op, &a, &b, loc)?))
    }

    fn sc_if_else(
        &mut self,
        condition: &Op,
        then_branch: &Op,
        else_branch: &Op,
        loc: &Location,
        frame: &mut ScFrame,
    ) -> LangResult<ScItem> {
        let cond = self.sc_item(condition, frame)?;
        if let ScItem::Const(value) = &cond {
            if let Some(chosen) = primitive::condition(value, &condition.loc)? {
                return self.sc_item(if chosen { then_branch } else { else_branch }, frame);
            }
        }
        let cond = self.to_value(cond, &condition.loc)?;
        if !cond.ty.is_bool() {
            return Err(Exception::domain(
                format!("{}: condition is not a boolean", cond.ty),
                &condition.loc,
            ));
        }
        let (a, then_code) = self.nested(frame, |c, f| c.sc_eval(then_branch, f))?;
        let (b, else_code) = self.nested(frame, |c, f| c.sc_eval(else_branch, f))?;
        let ty = if a.ty == b.ty {
            a.ty.clone()
        } else {
            ScType::unify_plex(&a.ty, &b.ty).ok_or_else(|| type_mismatch(&a.ty, &b.ty, loc))?
        };
        let a = self
            .sc_try_extend(&a, &ty)
            .ok_or_else(|| type_mismatch(&a.ty, &ty, loc))?;
        let b = self
            .sc_try_extend(&b, &ty)
            .ok_or_else(|| type_mismatch(&b.ty, &ty, loc))?;
        let result = self.declare(ty);
        self.line(format!("if ({}) {{", cond.expr));
        self.body.push_str(&then_code);
        self.indent += 1;
        self.line(format!("{} = {};", result.expr, a.expr));
        self.indent -= 1;
        self.line("} else {");
        self.body.push_str(&else_code);
        self.indent += 1;
        self.line(format!("{} = {};", result.expr, b.expr));
        self.indent -= 1;
        self.line("}");
        Ok(ScItem::Value(result))
    }

    /// Builds the module of a `let` or brace scope whose slots may hold
    /// generated values.
    fn sc_module(&mut self, scope: &ScopeExec, frame: &mut ScFrame) -> LangResult<Rc<DynamicModule>> {
        let module = DynamicModule::new(scope.dictionary.clone(), scope.size);
        frame.set_slot(
            scope.module_slot,
            ScItem::Module(ScModule::Dynamic(module.clone())),
        );
        for (slot, op) in &scope.captures {
            let item = self.sc_item(op, frame)?;
            module.set(*slot, ScSlot::Item(item));
        }
        for (slot, lambda) in &scope.lambdas {
            module.set(*slot, ScSlot::Lambda(lambda.clone()));
        }
        for init in &scope.inits {
            let item = self.sc_item(&init.value, frame)?;
            self.sc_bind(&init.pattern, item, ScTarget::Module(module.as_ref()), frame)?;
        }
        Ok(module)
    }

    fn sc_call(
        &mut self,
        function: &Op,
        argument: &Op,
        loc: &Location,
        frame: &mut ScFrame,
    ) -> LangResult<ScItem> {
        let closure = match self.sc_item(function, frame)? {
            ScItem::Const(Value::Function(Function::Builtin(builtin))) => {
                return self.sc_builtin_call(&builtin, argument, loc, frame)
            }
            ScItem::Const(Value::Function(Function::Closure(closure))) => ScClosure {
                lambda: closure.lambda,
                nonlocals: ScModule::Const(closure.nonlocals),
            },
            ScItem::Closure(closure) => closure,
            ScItem::Const(Value::Function(Function::Piecewise(_))) => {
                return Err(not_supported("piecewise function", loc))
            }
            ScItem::Const(other) => {
                return Err(Exception::at(
                    ErrorKind::NotAFunction {
                        value: other.to_string(),
                    },
                    loc,
                ))
            }
            ScItem::Value(value) => {
                return Err(Exception::at(
                    ErrorKind::NotAFunction {
                        value: value.ty.to_string(),
                    },
                    loc,
                ))
            }
            ScItem::Module(_) => {
                return Err(Exception::at(
                    ErrorKind::NotAFunction {
                        value: "record".into(),
                    },
                    loc,
                ))
            }
        };
        let argument = self.sc_item(argument, frame)?;
        self.sc_call_closure(&closure, argument, loc)
    }

    /// Inlines a call: binds the parameter pattern in a fresh frame, then
    /// compiles the body.
    pub fn sc_call_closure(
        &mut self,
        closure: &ScClosure,
        argument: ScItem,
        loc: &Location,
    ) -> LangResult<ScItem> {
        if self.depth >= MAX_INLINE_DEPTH {
            return Err(not_supported("recursive function", loc));
        }
        let lambda = &closure.lambda;
        let mut frame = ScFrame::new(lambda.nslots, closure.nonlocals.clone());
        self.depth += 1;
        let result = self
            .sc_bind(&lambda.pattern, argument, ScTarget::Frame, &mut frame)
            .and_then(|()| self.sc_item(&lambda.body, &mut frame));
        self.depth -= 1;
        result.map_err(|err| err.push_call_site(loc))
    }

    /// A fresh variable holding `item`, so that it can be assigned.
    fn variable(&mut self, item: ScItem, loc: &Location) -> LangResult<ScItem> {
        match item {
            ScItem::Value(value) => Ok(ScItem::Value(self.emit(value.ty, value.expr))),
            ScItem::Const(value) if ScType::of_value(&value).is_some() => {
                let value = self.value_to_sc(&value, loc)?;
                Ok(ScItem::Value(self.emit(value.ty, value.expr)))
            }
            other => Ok(other),
        }
    }

    /// Compiles a statement.
    pub fn sc_exec(&mut self, op: &Op, frame: &mut ScFrame) -> LangResult<()> {
        let loc = &op.loc;
        match &op.kind {
            OpKind::LocalDef { pattern, value } => {
                let item = self.sc_item(value, frame)?;
                let item = self.variable(item, &value.loc)?;
                self.sc_bind(pattern, item, ScTarget::Frame, frame)
            }
            OpKind::Assign { locative, value } => self.sc_assign(locative, value, frame),
            OpKind::If {
                condition,
                then_branch,
            } => {
                let cond = self.sc_item(condition, frame)?;
                if let ScItem::Const(value) = &cond {
                    if let Some(chosen) = primitive::condition(value, &condition.loc)? {
                        return if chosen {
                            self.sc_exec(then_branch, frame)
                        } else {
                            Ok(())
                        };
                    }
                }
                let cond = self.condition(cond, &condition.loc)?;
                let ((), code) = self.nested(frame, |c, f| c.sc_exec(then_branch, f))?;
                self.line(format!("if ({}) {{", cond.expr));
                self.body.push_str(&code);
                self.line("}");
                Ok(())
            }
            OpKind::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.sc_item(condition, frame)?;
                if let ScItem::Const(value) = &cond {
                    if let Some(chosen) = primitive::condition(value, &condition.loc)? {
                        return self.sc_exec(if chosen { then_branch } else { else_branch }, frame);
                    }
                }
                let cond = self.condition(cond, &condition.loc)?;
                let ((), then_code) = self.nested(frame, |c, f| c.sc_exec(then_branch, f))?;
                let ((), else_code) = self.nested(frame, |c, f| c.sc_exec(else_branch, f))?;
                self.line(format!("if ({}) {{", cond.expr));
                self.body.push_str(&then_code);
                self.line("} else {");
                self.body.push_str(&else_code);
                self.line("}");
                Ok(())
            }
            OpKind::For {
                pattern,
                list,
                until,
                body,
            } => self.sc_for(pattern, list, until.as_ref(), body, frame),
            OpKind::While { condition, body } => {
                if let Some(Value::Bool(false)) = condition.as_constant() {
                    return Ok(());
                }
                let ((), code) = self.nested(frame, |c, f| {
                    let cond = c.sc_item(condition, f)?;
                    let cond = c.condition(cond, &condition.loc)?;
                    c.line(format!("if (!{}) break;", cond.expr));
                    c.sc_exec(body, f)
                })?;
                self.line("while (true) {");
                self.body.push_str(&code);
                self.line("}");
                Ok(())
            }
            OpKind::Action {
                kind: ActionKind::Assert,
                argument,
            } => match self.sc_try_constify(argument, frame)? {
                Some(Value::Bool(true)) => Ok(()),
                Some(Value::Bool(false)) => Err(Exception::at(ErrorKind::AssertionFailed, loc)),
                Some(other) => Err(Exception::domain(
                    format!("{other}: assertion is not a boolean"),
                    loc,
                )),
                None => Err(not_supported("assert on a run-time value", loc)),
            },
            OpKind::Action { kind, .. } => {
                Err(not_supported(format!("{kind:?} statement").to_lowercase(), loc))
            }
            OpKind::Block { stmts, body } => {
                for stmt in stmts {
                    self.sc_exec(stmt, frame)?;
                }
                match body {
                    Some(body) => self.sc_exec(body, frame),
                    None => Ok(()),
                }
            }
            OpKind::Let { scope, body } => {
                self.sc_module(scope, frame)?;
                self.sc_exec(body, frame)
            }
            OpKind::Field { .. } | OpKind::Spread(_) => {
                Err(not_supported(format!("{} outside a list", op.name()), loc))
            }
            _ => Err(Exception::at(
                ErrorKind::NotAnAction {
                    what: op.name().to_string(),
                },
                loc,
            )),
        }
    }

    fn condition(&mut self, item: ScItem, loc: &Location) -> LangResult<ScValue> {
        let value = self.to_value(item, loc)?;
        if !value.ty.is_bool() {
            return Err(Exception::domain(
                format!("{}: condition is not a boolean", value.ty),
                loc,
            ));
        }
        Ok(value)
    }

    fn sc_assign(
        &mut self,
        locative: &Locative,
        value: &Op,
        frame: &mut ScFrame,
    ) -> LangResult<()> {
        let loc = locative.loc();
        let (slot, index) = match locative {
            Locative::Local { slot, .. } => (*slot, None),
            Locative::Index { base, index, .. } => match base.as_ref() {
                Locative::Local { slot, .. } => (*slot, Some(index)),
                _ => return Err(not_supported("nested indexed assignment", loc)),
            },
            _ => return Err(not_supported("this kind of assignment", loc)),
        };
        let Some(ScItem::Value(var)) = frame.slot(slot).cloned() else {
            return Err(not_supported("assignment to a compile-time value", loc));
        };
        let (target, ty) = match index {
            None => (var.expr.clone(), var.ty.clone()),
            Some(index) => {
                if var.ty.is_scalar() || var.ty.array.len() > 1 {
                    return Err(not_supported("indexed assignment to this type", loc));
                }
                let i = match self.sc_item(index, frame)? {
                    ScItem::Const(Value::Num(n)) if n.fract() == 0.0 && n >= 0.0 && n < f64::from(var.ty.count()) => {
                        format!("{}", n as u32)
                    }
                    ScItem::Value(i) if i.ty.is_num() => format!("int({})", i.expr),
                    _ => return Err(Exception::domain("not a valid index", &index.loc)),
                };
                (format!("{}[{i}]", var.expr), var.ty.elem())
            }
        };
        let new = self.sc_eval(value, frame)?;
        let new = self
            .sc_try_extend(&new, &ty)
            .ok_or_else(|| type_mismatch(&new.ty, &ty, &value.loc))?;
        self.line(format!("{target} = {};", new.expr));
        Ok(())
    }

    fn sc_for(
        &mut self,
        pattern: &Pattern,
        list: &Op,
        until: Option<&Op>,
        body: &Op,
        frame: &mut ScFrame,
    ) -> LangResult<()> {
        if let (
            OpKind::Range {
                first,
                last,
                step,
                half_open,
            },
            Pattern::Id { slot, .. },
        ) = (&list.kind, pattern)
        {
            let step = match step {
                Some(step) => self.constant_num(step, frame)?,
                None => 1.0,
            };
            if step == 0.0 || !step.is_finite() {
                return Err(Exception::domain(format!("{step}: invalid range step"), &list.loc));
            }
            let first = self.sc_eval(first, frame)?;
            let last = self.sc_eval(last, frame)?;
            if !first.ty.is_num() || !last.ty.is_num() {
                return Err(type_mismatch(&first.ty, &last.ty, &list.loc));
            }
            let cmp = match (step > 0.0, *half_open) {
                (true, false) => "<=",
                (true, true) => "<",
                (false, false) => ">=",
                (false, true) => ">",
            };
            let var = self.fresh_name();
            let ((), code) = self.nested(frame, |c, f| {
                f.set_slot(*slot, ScItem::Value(ScValue::new(var.clone(), ScType::num())));
                if let Some(until) = until {
                    let cond = c.sc_item(until, f)?;
                    let cond = c.condition(cond, &until.loc)?;
                    c.line(format!("if ({}) break;", cond.expr));
                }
                c.sc_exec(body, f)
            })?;
            self.line(format!(
                "for (float {var} = {}; {var} {cmp} {}; {var} += {}) {{",
                first.expr,
                last.expr,
                num_literal(step)
            ));
            self.body.push_str(&code);
            self.line("}");
            return Ok(());
        }
        // any other list is unrolled
        let items = match self.sc_item(list, frame)? {
            ScItem::Const(Value::List(values)) => {
                values.iter().cloned().map(ScItem::Const).collect::<Vec<_>>()
            }
            ScItem::Value(value) if !value.ty.is_scalar() => (0..value.ty.count())
                .map(|i| {
                    self.sc_index(&value, &ScItem::Const(Value::Num(f64::from(i))), &list.loc)
                        .map(ScItem::Value)
                })
                .collect::<LangResult<Vec<_>>>()?,
            _ => return Err(not_supported("for loop over this kind of list", &list.loc)),
        };
        for item in items {
            frame.push_cache();
            let finished = self.unrolled_iteration(pattern, item, until, body, frame);
            frame.pop_cache();
            if finished? {
                break;
            }
        }
        Ok(())
    }

    /// Returns true when the `until` condition ends the loop.
    fn unrolled_iteration(
        &mut self,
        pattern: &Pattern,
        item: ScItem,
        until: Option<&Op>,
        body: &Op,
        frame: &mut ScFrame,
    ) -> LangResult<bool> {
        self.sc_bind(pattern, item, ScTarget::Frame, frame)?;
        if let Some(until) = until {
            match self.sc_try_constify(until, frame)? {
                Some(Value::Bool(true)) => return Ok(true),
                Some(Value::Bool(false)) => {}
                _ => return Err(not_supported("run-time `until` in an unrolled loop", &until.loc)),
            }
        }
        self.sc_exec(body, frame)?;
        Ok(false)
    }

    /// Compiles `function` as an entry point taking `param` and returning
    /// `result`.
    pub fn compile_entry(&mut self, entry: &ScEntry, loc: &Location) -> LangResult<()> {
        let Value::Function(Function::Closure(closure)) = entry.function else {
            return Err(Exception::domain(
                format!("{}: {} is not a user-defined function", entry.name, entry.function),
                loc,
            ));
        };
        debug!(entry = entry.name, "compiling shape function");
        self.body.clear();
        self.next_id = 0;
        self.indent = 1;
        let param = ScValue::new(self.fresh_name(), entry.param.clone());
        let closure = ScClosure {
            lambda: closure.lambda.clone(),
            nonlocals: ScModule::Const(closure.nonlocals.clone()),
        };
        let result = self.sc_call_closure(&closure, ScItem::Value(param.clone()), loc)?;
        let result = self.to_value(result, &closure.lambda.body.loc)?;
        let result = self.sc_try_extend(&result, &entry.result).ok_or_else(|| {
            Exception::domain(
                format!(
                    "{} returns {}, expected {}",
                    entry.name, result.ty, entry.result
                ),
                loc,
            )
        })?;
        self.line(format!("return {};", result.expr));
        let linkage = match self.target {
            Target::Glsl => "",
            Target::Cpp => "extern \"C\" ",
        };
        let mut text = String::new();
        let _ = writeln!(
            text,
            "{linkage}{} {}({} {})\n{{",
            self.type_name(&entry.result),
            entry.name,
            self.type_name(&entry.param),
            param.expr
        );
        text.push_str(&self.body);
        text.push_str("}\n");
        self.functions.push(text);
        self.body.clear();
        Ok(())
    }

    /// The complete program: uniform declarations, then every entry point.
    pub fn finish(self) -> String {
        let mut out = String::new();
        if self.target == Target::Cpp {
            out.push_str("#include <glm/glm.hpp>\n\n");
        }
        for uniform in &self.uniforms {
            match self.target {
                Target::Glsl => {
                    let _ = writeln!(out, "uniform float rv_{uniform};");
                }
                Target::Cpp => {
                    let _ = writeln!(out, "float rv_{uniform};");
                }
            }
        }
        if !self.uniforms.is_empty() {
            out.push('\n');
        }
        out.push_str(&self.functions.join("\n"));
        out
    }
}

/// Compiles the two entry points of a shape: `float dist(vec4)` and
/// `vec3 colour(vec4)`.
pub fn export_shape(
    system: &System,
    target: Target,
    dist: &Value,
    colour: &Value,
    loc: &Location,
) -> LangResult<String> {
    let mut compiler = ScCompiler::new(system, target);
    for entry in [
        ScEntry {
            name: "dist",
            function: dist,
            param: ScType::vec(4),
            result: ScType::num(),
        },
        ScEntry {
            name: "colour",
            function: colour,
            param: ScType::vec(4),
            result: ScType::vec(3),
        },
    ] {
        compiler.compile_entry(&entry, loc)?;
    }
    Ok(compiler.finish())
}

