//! Semantic analysis: turns phrases into the operation tree.
//!
//! The analyser decides what each phrase means from where it appears (an
//! expression, a statement, a definition or a pattern), resolves every name
//! to a frame slot, a non-local slot, a module slot or a constant, and
//! decides which values each closure captures.

pub mod definition;
pub mod deprecation;
pub(crate) mod environ;
pub mod locative;
pub mod pattern;

#[cfg(test)]
mod tests;

use crate::{
    analyser::{
        definition::{function_syntax, is_definition_list},
        deprecation::Deprecation,
        environ::{FrameInfo, Interp, LambdaScope, Scope, ScopeKind},
        locative::Locative,
        pattern::Pattern,
    },
    error::{ErrorKind, Exception, LangResult},
    ir::{Op, OpKind, Operation},
    language::{
        ast::{BinaryOp, Phrase, PhraseKind, Separator},
        span::{Location, Source, Span},
    },
    runtime::{
        function::Lambda,
        primitive,
        value::{Record, Symbol, Value},
    },
    system::System,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// The analysed program and the number of slots its frame needs.
pub struct Analysis {
    pub op: Op,
    pub nslots: usize,
}

pub struct Analyser<'a> {
    system: &'a System,
    source: Arc<Source>,
    scopes: Vec<Scope<'a>>,
    frames: Vec<FrameInfo>,
}

impl<'a> Analyser<'a> {
    pub fn new(system: &'a System, source: Arc<Source>) -> Self {
        let mut analyser = Self {
            system,
            source,
            scopes: Vec::new(),
            frames: vec![FrameInfo::default()],
        };
        analyser.push_scope(ScopeKind::Root, 0);
        analyser
    }

    pub fn location(&self, span: Span) -> Location {
        Location::new(self.source.clone(), span)
    }

    /// A program made only of definitions evaluates to a module. A statement
    /// list is run in order; if it ends with an expression, that is the value
    /// of the program.
    pub fn analyse_program(mut self, phrase: &'a Phrase) -> LangResult<Analysis> {
        let loc = self.location(phrase.span);
        let op = if is_definition_list(std::slice::from_ref(phrase)) {
            self.push_recursive(std::slice::from_ref(phrase), 0)?;
            Operation::new(OpKind::Module(self.finish_recursive()?), loc)
        } else if let PhraseKind::Paren {
            items,
            separator: Separator::Semicolon,
        } = &phrase.kind
        {
            self.push_scope(ScopeKind::Block(HashMap::new()), 0);
            let mut stmts = items
                .iter()
                .map(|item| self.analyse(item, Interp::statement(0)))
                .collect::<LangResult<Vec<_>>>()?;
            self.pop_scope();
            let body = match stmts.last() {
                Some(last) if last.is_expression() => stmts.pop(),
                _ => None,
            };
            Operation::new(OpKind::Block { stmts, body }, loc)
        } else {
            self.analyse(phrase, Interp::expression(0))?
        };
        let nslots = self.frames.first().map_or(0, |frame| frame.nslots);
        debug!(source = %self.source.name, nslots, "analysed program");
        Ok(Analysis { op, nslots })
    }

    /// An operand of the phrase currently being analysed.
    pub(crate) fn analyse_operand(&mut self, phrase: &'a Phrase) -> LangResult<Op> {
        let edepth = self.scopes.last().map_or(0, |scope| scope.edepth);
        self.analyse(phrase, Interp::expression(edepth + 1))
    }

    pub(crate) fn analyse(&mut self, phrase: &'a Phrase, interp: Interp) -> LangResult<Op> {
        let loc = self.location(phrase.span);
        let statement_only = |what: &str| {
            Exception::at(
                ErrorKind::NotAnExpression {
                    what: what.to_string(),
                },
                &loc,
            )
        };
        match &phrase.kind {
            PhraseKind::Identifier(name) => self.lookup(name, &loc),
            PhraseKind::Numeral(n) => Ok(Operation::constant(Value::Num(*n), loc)),
            PhraseKind::String(text) => Ok(Operation::constant(Value::string(text), loc)),
            PhraseKind::Symbol(name) => Ok(Operation::constant(Value::symbol(name), loc)),
            PhraseKind::Underscore => Err(statement_only("`_`")),
            PhraseKind::Paren { items, separator } => match separator {
                Separator::None if items.len() == 1 => self.analyse(&items[0], interp),
                Separator::None | Separator::Comma => self.analyse_list(items, interp, loc),
                Separator::Semicolon if interp.is_expression() => Err(statement_only("statement list")
                    .with_help("use `do statements in expression` inside an expression")),
                Separator::Semicolon => {
                    self.push_scope(ScopeKind::Block(HashMap::new()), interp.edepth);
                    let stmts = items
                        .iter()
                        .map(|item| self.analyse(item, Interp::statement(interp.edepth)))
                        .collect::<LangResult<Vec<_>>>();
                    self.pop_scope();
                    Ok(Operation::new(OpKind::Block { stmts: stmts?, body: None }, loc))
                }
            },
            PhraseKind::Bracket(items) => self.analyse_list(items, interp, loc),
            PhraseKind::Brace(items) => self.analyse_brace(items, interp, loc),
            PhraseKind::Unary { op, operand } => {
                let operand = self.analyse(operand, interp.deeper())?;
                match operand.as_constant() {
                    Some(value) if !value.is_reactive() => {
                        Ok(Operation::constant(primitive::unary(*op, value, &loc)?, loc))
                    }
                    _ => Ok(Operation::new(OpKind::Unary { op: *op, operand }, loc)),
                }
            }
            PhraseKind::Binary {
                op,
                op_span,
                left,
                right,
            } => {
                if *op == BinaryOp::Sub
                    && self.source.space_before(op_span.start)
                    && !self.source.space_after(op_span.end)
                {
                    self.system.warning(
                        Exception::at(
                            ErrorKind::Custom(format!(
                                "ambiguous expression: `{}` is a subtraction",
                                loc.text()
                            )),
                            &self.location(*op_span),
                        )
                        .with_help("write `f (-x)` to pass a negative argument, or `a - x` to subtract"),
                    );
                }
                let left = self.analyse(left, interp.deeper())?;
                let right = self.analyse(right, interp.deeper())?;
                Ok(Operation::new(OpKind::Binary { op: *op, left, right }, loc))
            }
            PhraseKind::Call { function, argument } => {
                let function = self.analyse(function, interp.deeper())?;
                let argument = self.analyse(argument, interp.deeper())?;
                Ok(Operation::new(OpKind::Call { function, argument }, loc))
            }
            PhraseKind::Dot { base, field, .. } => {
                if let PhraseKind::Call { function, argument } = &base.kind {
                    if self.source.space_before(argument.span.start)
                        && !self.source.space_after(argument.span.end)
                    {
                        self.system.warning(
                            Exception::at(
                                ErrorKind::Custom(format!(
                                    "ambiguous expression: `{}` selects field {field} of a call's result",
                                    loc.text()
                                )),
                                &loc,
                            )
                            .with_help(format!(
                                "write `{} ({}.{field})` if the field belongs to the argument",
                                self.source.slice(function.span),
                                self.source.slice(argument.span),
                            )),
                        );
                    }
                }
                let base = self.analyse(base, interp.deeper())?;
                Ok(Operation::new(
                    OpKind::Dot {
                        base,
                        field: Symbol::new(field),
                    },
                    loc,
                ))
            }
            PhraseKind::Index { base, indices } => {
                let base = self.analyse(base, interp.deeper())?;
                let indices = indices
                    .iter()
                    .map(|index| self.analyse(index, interp.deeper()))
                    .collect::<LangResult<Vec<_>>>()?;
                Ok(Operation::new(OpKind::Index { base, indices }, loc))
            }
            PhraseKind::Range {
                first,
                last,
                step,
                half_open,
            } => {
                let first = self.analyse(first, interp.deeper())?;
                let last = self.analyse(last, interp.deeper())?;
                let step = step
                    .as_ref()
                    .map(|step| self.analyse(step, interp.deeper()))
                    .transpose()?;
                Ok(Operation::new(
                    OpKind::Range {
                        first,
                        last,
                        step,
                        half_open: *half_open,
                    },
                    loc,
                ))
            }
            PhraseKind::Lambda { param, body } => {
                let (lambda, captures) = self.build_lambda(&[param.as_ref()], body, None, false, &loc)?;
                Ok(Operation::new(OpKind::Lambda { lambda, captures }, loc))
            }
            PhraseKind::Predicate { .. } => Err(statement_only("predicate pattern")
                .with_help("`pattern :: predicate` is only valid where a pattern is expected")),
            PhraseKind::Definition { .. } if interp.is_expression() => Err(statement_only("definition")
                .with_help("`a = b` is a definition; write `a == b` to test equality")),
            PhraseKind::Definition { .. } => Err(Exception::at(ErrorKind::MixedDefinitionsAndStatements, &loc)
                .with_help("use `local a = b` to define a variable in a statement list")),
            PhraseKind::Assignment { .. } if interp.is_expression() => Err(statement_only("assignment")
                .with_help("assignments are statements; use `do statements in expression`")),
            PhraseKind::Assignment { left, right } => {
                let locative = self.analyse_locative(left, interp.edepth)?;
                let value = self.analyse(right, interp.deeper())?;
                Ok(Operation::new(OpKind::Assign { locative, value }, loc))
            }
            PhraseKind::Colon { .. } if interp.is_expression() => Err(statement_only("field specifier")),
            PhraseKind::Colon { key, value } => {
                let key = match &key.kind {
                    PhraseKind::Identifier(name) => {
                        Operation::constant(Value::symbol(name), self.location(key.span))
                    }
                    _ => self.analyse(key, interp.deeper())?,
                };
                let value = self.analyse(value, interp.deeper())?;
                Ok(Operation::new(OpKind::Field { key, value }, loc))
            }
            PhraseKind::Local(_) if interp.is_expression() => Err(statement_only("local definition")),
            PhraseKind::Local(definition) => self.analyse_local(definition, interp, loc),
            PhraseKind::Spread(_) if interp.is_expression() => Err(statement_only("spread")),
            PhraseKind::Spread(source) => {
                let source = self.analyse(source, interp.deeper())?;
                Ok(Operation::new(OpKind::Spread(source), loc))
            }
            PhraseKind::Action { .. } if interp.is_expression() => Err(statement_only(phrase.describe())),
            PhraseKind::Action { kind, argument } => {
                let argument = self.analyse(argument, interp.deeper())?;
                Ok(Operation::new(OpKind::Action { kind: *kind, argument }, loc))
            }
            PhraseKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.analyse(condition, interp.deeper())?;
                let then_branch = self.analyse(then_branch, interp)?;
                match else_branch {
                    Some(else_branch) => {
                        let else_branch = self.analyse(else_branch, interp)?;
                        Ok(Operation::new(
                            OpKind::IfElse {
                                condition,
                                then_branch,
                                else_branch,
                            },
                            loc,
                        ))
                    }
                    None if interp.is_expression() => Err(statement_only("if without else")),
                    None => Ok(Operation::new(
                        OpKind::If {
                            condition,
                            then_branch,
                        },
                        loc,
                    )),
                }
            }
            PhraseKind::For { .. } | PhraseKind::While { .. } if interp.is_expression() => {
                Err(statement_only(phrase.describe()))
            }
            PhraseKind::For {
                pattern,
                list,
                until,
                body,
            } => self.analyse_for(pattern, list, until.as_deref(), body, interp, loc),
            PhraseKind::While { condition, body } => {
                let condition = self.analyse(condition, interp.deeper())?;
                let body = self.analyse(body, Interp::statement(interp.edepth))?;
                Ok(Operation::new(OpKind::While { condition, body }, loc))
            }
            PhraseKind::Let { items, body } => self.analyse_let(items, body, interp, loc),
            PhraseKind::Where { body, items } => {
                self.system.deprecate(Deprecation::WhereClause, &loc)?;
                self.analyse_let(items, body, interp, loc)
            }
            PhraseKind::Do { items, body } => {
                self.push_scope(ScopeKind::Block(HashMap::new()), interp.edepth);
                let result = self.analyse_do(items, body, interp);
                self.pop_scope();
                let (stmts, body) = result?;
                Ok(Operation::new(
                    OpKind::Block {
                        stmts,
                        body: Some(body),
                    },
                    loc,
                ))
            }
        }
    }

    fn analyse_do(&mut self, items: &'a [Phrase], body: &'a Phrase, interp: Interp) -> LangResult<(Vec<Op>, Op)> {
        let stmts = items
            .iter()
            .map(|item| self.analyse(item, Interp::statement(interp.edepth)))
            .collect::<LangResult<Vec<_>>>()?;
        let body = self.analyse(body, interp)?;
        Ok((stmts, body))
    }

    /// A list comprehension. Items are generators: statements that push
    /// zero or more elements.
    fn analyse_list(&mut self, items: &'a [Phrase], interp: Interp, loc: Location) -> LangResult<Op> {
        let edepth = interp.edepth + 1;
        self.push_scope(ScopeKind::Block(HashMap::new()), edepth);
        let ops = items
            .iter()
            .map(|item| self.analyse(item, Interp::statement(edepth)))
            .collect::<LangResult<Vec<_>>>();
        self.pop_scope();
        let ops = ops?;
        let constants: Option<Vec<Value>> = ops
            .iter()
            .map(|op| op.as_constant().cloned())
            .collect();
        match constants {
            Some(values) => Ok(Operation::constant(Value::list(values), loc)),
            None => Ok(Operation::new(OpKind::List(ops), loc)),
        }
    }

    /// `{...}` is a module if every item is a definition, and a record
    /// comprehension otherwise.
    fn analyse_brace(&mut self, items: &'a [Phrase], interp: Interp, loc: Location) -> LangResult<Op> {
        let edepth = interp.edepth + 1;
        if items.is_empty() {
            return Ok(Operation::constant(Value::record(Record::new()), loc));
        }
        if is_definition_list(items) {
            self.push_recursive(items, edepth)?;
            return Ok(Operation::new(OpKind::Module(self.finish_recursive()?), loc));
        }
        self.push_scope(ScopeKind::Block(HashMap::new()), edepth);
        let ops = items
            .iter()
            .map(|item| self.analyse(item, Interp::statement(edepth)))
            .collect::<LangResult<Vec<_>>>();
        self.pop_scope();
        Ok(Operation::new(OpKind::Record(ops?), loc))
    }

    fn analyse_let(&mut self, items: &'a [Phrase], body: &'a Phrase, interp: Interp, loc: Location) -> LangResult<Op> {
        if !is_definition_list(items) {
            return Err(Exception::at(ErrorKind::MixedDefinitionsAndStatements, &loc)
                .with_help("`let` takes definitions only; use `do` for statements"));
        }
        self.push_recursive(items, interp.edepth)?;
        let body = self.analyse(body, interp)?;
        let scope = self.finish_recursive()?;
        Ok(Operation::new(OpKind::Let { scope, body }, loc))
    }

    fn analyse_local(&mut self, definition: &'a Phrase, interp: Interp, loc: Location) -> LangResult<Op> {
        let PhraseKind::Definition { left, right } = &definition.kind else {
            return Err(Exception::at(
                ErrorKind::NotAnAction {
                    what: definition.describe().to_string(),
                },
                &loc,
            )
            .with_help("`local` must be followed by a definition"));
        };
        let (mut pattern, value) = match function_syntax(left, right) {
            Some((name, params, body)) => {
                let (lambda, captures) = self.build_lambda(&params, body, Some(name), false, &loc)?;
                let value = Operation::new(OpKind::Lambda { lambda, captures }, loc.clone());
                let pattern = Pattern::Id {
                    name: name.to_string(),
                    slot: 0,
                    loc: self.location(left.span),
                };
                (pattern, value)
            }
            None => {
                let value = self.analyse(right, interp.deeper())?;
                (Pattern::analyse(left, self)?, value)
            }
        };
        pattern.add_to_scope(&mut |name, loc| self.bind_local(name, loc, true))?;
        Ok(Operation::new(
            OpKind::LocalDef {
                pattern: Arc::new(pattern),
                value,
            },
            loc,
        ))
    }

    fn analyse_for(
        &mut self,
        pattern: &'a Phrase,
        list: &'a Phrase,
        until: Option<&'a Phrase>,
        body: &'a Phrase,
        interp: Interp,
        loc: Location,
    ) -> LangResult<Op> {
        let list = self.analyse(list, interp.deeper())?;
        self.push_scope(ScopeKind::Block(HashMap::new()), interp.edepth);
        let result = self.analyse_for_body(pattern, until, body, interp);
        self.pop_scope();
        let (pattern, until, body) = result?;
        Ok(Operation::new(
            OpKind::For {
                pattern: Arc::new(pattern),
                list,
                until,
                body,
            },
            loc,
        ))
    }

    fn analyse_for_body(
        &mut self,
        pattern: &'a Phrase,
        until: Option<&'a Phrase>,
        body: &'a Phrase,
        interp: Interp,
    ) -> LangResult<(Pattern, Option<Op>, Op)> {
        let mut pattern = Pattern::analyse(pattern, self)?;
        pattern.add_to_scope(&mut |name, loc| self.bind_local(name, loc, true))?;
        let until = until
            .map(|until| self.analyse(until, interp.deeper()))
            .transpose()?;
        let body = self.analyse(body, Interp::statement(interp.edepth))?;
        Ok((pattern, until, body))
    }

    fn analyse_locative(&mut self, phrase: &'a Phrase, edepth: usize) -> LangResult<Locative> {
        let loc = self.location(phrase.span);
        match &phrase.kind {
            PhraseKind::Identifier(name) => Ok(Locative::Local {
                slot: self.lookup_lvar(name, edepth, &loc)?,
                loc,
            }),
            PhraseKind::Paren {
                items,
                separator: Separator::None,
            } if items.len() == 1 => self.analyse_locative(&items[0], edepth),
            PhraseKind::Dot { base, field, .. } => Ok(Locative::Field {
                base: Box::new(self.analyse_locative(base, edepth)?),
                field: Symbol::new(field),
                loc,
            }),
            PhraseKind::Index { base, indices } => {
                let mut locative = self.analyse_locative(base, edepth)?;
                for index in indices {
                    let index = self.analyse(index, Interp::expression(edepth + 1))?;
                    locative = Locative::Index {
                        base: Box::new(locative),
                        index,
                        loc: loc.clone(),
                    };
                }
                Ok(locative)
            }
            PhraseKind::Paren {
                items,
                separator: Separator::Comma,
            }
            | PhraseKind::Bracket(items) => {
                let items = items
                    .iter()
                    .map(|item| self.analyse_locative(item, edepth))
                    .collect::<LangResult<Vec<_>>>()?;
                Ok(Locative::List { items, loc })
            }
            _ => Err(Exception::at(
                ErrorKind::NotAssignable {
                    name: loc.text().to_string(),
                },
                &loc,
            )),
        }
    }

    /// Analyses `p1 -> p2 -> ... -> body`. A `shared` lambda is the outer
    /// lambda of a function definition and captures nothing itself.
    pub(crate) fn build_lambda(
        &mut self,
        params: &[&'a Phrase],
        body: &'a Phrase,
        name: Option<&str>,
        shared: bool,
        loc: &Location,
    ) -> LangResult<(Arc<Lambda>, Vec<Op>)> {
        self.frames.push(FrameInfo::default());
        self.push_scope(
            ScopeKind::Lambda(LambdaScope {
                params: HashMap::new(),
                shared,
                nonlocals: HashMap::new(),
                captures: Vec::new(),
            }),
            0,
        );
        let result = self.lambda_body(params, body, name, loc);
        let scope = self.pop_scope();
        let frame = self.frames.pop().unwrap_or_default();
        let (pattern, body) = result?;
        let captures = match scope.map(|scope| scope.kind) {
            Some(ScopeKind::Lambda(lambda)) => lambda.captures,
            _ => Vec::new(),
        };
        let lambda = Lambda {
            pattern,
            body,
            nslots: frame.nslots,
            name: name.map(str::to_string),
            loc: loc.clone(),
        };
        Ok((Arc::new(lambda), captures))
    }

    fn lambda_body(
        &mut self,
        params: &[&'a Phrase],
        body: &'a Phrase,
        name: Option<&str>,
        loc: &Location,
    ) -> LangResult<(Pattern, Op)> {
        let Some((first, rest)) = params.split_first() else {
            return Err(Exception::at(
                ErrorKind::NotAPattern {
                    what: "empty parameter list".into(),
                },
                loc,
            ));
        };
        let mut pattern = Pattern::analyse(first, self)?;
        pattern.add_to_scope(&mut |name, loc| self.bind_param(name, loc))?;
        let body = if rest.is_empty() {
            self.analyse(body, Interp::expression(0))?
        } else {
            let (lambda, captures) = self.build_lambda(rest, body, name, false, loc)?;
            Operation::new(OpKind::Lambda { lambda, captures }, loc.clone())
        };
        Ok((pattern, body))
    }
}
