//! Recursive scopes: `let` definitions, brace modules and the top level of a
//! definition-only program.
//!
//! Every definition is a unit. Units are analysed lazily, the first time one
//! of their names is referenced, so the order of data initialisation follows
//! dependencies rather than source order. Function units may refer to each
//! other (and to themselves) freely; a data unit that depends on itself is
//! an illegal recursive reference.

use crate::{
    analyser::{
        environ::{Interp, ScopeKind},
        pattern::{pattern_names, Pattern},
        Analyser,
    },
    error::{ErrorKind, Exception, LangResult},
    ir::{Op, OpKind, Operation, ScopeExec, UnitInit},
    language::{
        ast::{Phrase, PhraseKind, Separator},
        span::{Location, Span},
    },
    runtime::{
        function::Lambda,
        module::Dictionary,
        value::{Symbol, Value},
    },
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone)]
pub(crate) enum UnitSyntax<'a> {
    /// `f x y = body`, or `f = x -> body`.
    Function {
        name: &'a str,
        slot: usize,
        params: Vec<&'a Phrase>,
        body: &'a Phrase,
    },
    Data {
        pattern: &'a Phrase,
        value: &'a Phrase,
    },
}

pub(crate) enum UnitState {
    Pending,
    InProgress,
    /// `constant` is set for a data unit binding a single name to a constant,
    /// which references then inline.
    Done { constant: Option<Value> },
}

pub(crate) struct Unit<'a> {
    pub syntax: UnitSyntax<'a>,
    pub state: UnitState,
    pub span: Span,
}

pub(crate) struct RecursiveScope<'a> {
    /// Frame slot holding the module at run time.
    pub module_slot: usize,
    pub units: Vec<Unit<'a>>,
    /// name -> (unit, module slot)
    pub slots: HashMap<String, (usize, usize)>,
    pub dictionary: Dictionary,
    pub size: usize,
    pub captures: Vec<(usize, Op)>,
    pub capture_slots: HashMap<String, usize>,
    pub lambdas: Vec<(usize, Arc<Lambda>)>,
    pub inits: Vec<UnitInit>,
}

impl RecursiveScope<'_> {
    pub fn defines(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }
}

/// Splits nested `(a = 1; b = 2)` groups into single definitions.
fn flatten<'a>(items: &'a [Phrase], out: &mut Vec<&'a Phrase>) {
    for item in items {
        match &item.kind {
            PhraseKind::Paren {
                items,
                separator: Separator::Semicolon,
            } => flatten(items, out),
            _ => out.push(item.ungrouped()),
        }
    }
}

/// True if `items` form a definition list: every item is `a = b` or `a: b`.
pub(crate) fn is_definition_list(items: &[Phrase]) -> bool {
    let mut flat = Vec::new();
    flatten(items, &mut flat);
    !flat.is_empty()
        && flat.iter().all(|item| match &item.kind {
            PhraseKind::Definition { .. } => true,
            PhraseKind::Colon { key, .. } => key.as_identifier().is_some(),
            _ => false,
        })
}

pub(crate) fn function_syntax<'a>(left: &'a Phrase, right: &'a Phrase) -> Option<(&'a str, Vec<&'a Phrase>, &'a Phrase)> {
    let left = left.ungrouped();
    match &left.kind {
        PhraseKind::Call { .. } => {
            let mut params = Vec::new();
            let mut head = left;
            while let PhraseKind::Call { function, argument } = &head.kind {
                params.push(argument.as_ref());
                head = function.ungrouped();
            }
            params.reverse();
            Some((head.as_identifier()?, params, right))
        }
        PhraseKind::Identifier(name) => match &right.ungrouped().kind {
            PhraseKind::Lambda { param, body } => Some((name.as_str(), vec![param.as_ref()], body.as_ref())),
            _ => None,
        },
        _ => None,
    }
}

impl<'a> Analyser<'a> {
    fn recursive(&self, r: usize) -> LangResult<&RecursiveScope<'a>> {
        match self.scopes.get(r).map(|scope| &scope.kind) {
            Some(ScopeKind::Recursive(scope)) => Ok(scope),
            _ => Err(Exception::new(ErrorKind::Custom(format!(
                "scope {r} is not a definition scope"
            )))),
        }
    }

    fn recursive_mut(&mut self, r: usize) -> LangResult<&mut RecursiveScope<'a>> {
        match self.scopes.get_mut(r).map(|scope| &mut scope.kind) {
            Some(ScopeKind::Recursive(scope)) => Ok(scope),
            _ => Err(Exception::new(ErrorKind::Custom(format!(
                "scope {r} is not a definition scope"
            )))),
        }
    }

    /// Registers every name defined by `items` and pushes the scope. Nothing
    /// is analysed yet.
    pub(crate) fn push_recursive(&mut self, items: &'a [Phrase], edepth: usize) -> LangResult<()> {
        let mut definitions = Vec::new();
        flatten(items, &mut definitions);
        let mut scope = RecursiveScope {
            module_slot: self.new_slot(),
            units: Vec::new(),
            slots: HashMap::new(),
            dictionary: Dictionary::new(),
            size: 0,
            captures: Vec::new(),
            capture_slots: HashMap::new(),
            lambdas: Vec::new(),
            inits: Vec::new(),
        };
        for phrase in definitions {
            let (left, right) = match &phrase.kind {
                PhraseKind::Definition { left, right } => (left.as_ref(), right.as_ref()),
                PhraseKind::Colon { key, value } => (key.as_ref(), value.as_ref()),
                _ => {
                    return Err(Exception::at(
                        ErrorKind::MixedDefinitionsAndStatements,
                        &self.location(phrase.span),
                    ))
                }
            };
            let function = function_syntax(left, right);
            let names = match &function {
                Some((name, ..)) => vec![(name.to_string(), left.span)],
                None => pattern_names(left)
                    .map_err(|(kind, span)| Exception::at(kind, &self.location(span)))?,
            };
            let unit = scope.units.len();
            let mut first_slot = None;
            for (name, span) in names {
                if scope.slots.contains_key(&name) {
                    return Err(Exception::at(
                        ErrorKind::MultiplyDefined { name },
                        &self.location(span),
                    ));
                }
                let slot = scope.size;
                scope.size += 1;
                first_slot.get_or_insert(slot);
                scope.dictionary.insert(Symbol::new(&name), slot);
                scope.slots.insert(name, (unit, slot));
            }
            let syntax = match function {
                Some((name, params, body)) => UnitSyntax::Function {
                    name,
                    slot: first_slot.unwrap_or_default(),
                    params,
                    body,
                },
                None => UnitSyntax::Data {
                    pattern: left,
                    value: right,
                },
            };
            scope.units.push(Unit {
                syntax,
                state: UnitState::Pending,
                span: phrase.span,
            });
        }
        self.push_scope(ScopeKind::Recursive(scope), edepth);
        Ok(())
    }

    /// Analyses any units not referenced yet, pops the scope, and returns
    /// the instructions that build its module.
    pub(crate) fn finish_recursive(&mut self) -> LangResult<Arc<ScopeExec>> {
        let r = self.scopes.len().saturating_sub(1);
        let count = self.recursive(r)?.units.len();
        for unit in 0..count {
            let loc = self.location(self.recursive(r)?.units[unit].span);
            self.ensure_unit(r, unit, "", &loc)?;
        }
        match self.pop_scope().map(|scope| scope.kind) {
            Some(ScopeKind::Recursive(scope)) => Ok(Arc::new(ScopeExec {
                dictionary: Arc::new(scope.dictionary),
                module_slot: scope.module_slot,
                size: scope.size,
                captures: scope.captures,
                lambdas: scope.lambdas,
                inits: scope.inits,
            })),
            _ => Err(Exception::new(ErrorKind::Custom(
                "unbalanced definition scope".into(),
            ))),
        }
    }

    /// A reference to `name`, defined in `scopes[r]`. Inside one of the
    /// scope's own functions the module is the non-local environment;
    /// anywhere else it is read from the frame slot holding the module.
    pub(crate) fn unit_ref(&mut self, r: usize, name: &str, loc: &Location, from_function: bool) -> LangResult<Op> {
        let (unit, slot) = self.recursive(r)?.slots.get(name).copied().ok_or_else(|| {
            Exception::at(
                ErrorKind::NotDefined {
                    name: name.to_string(),
                },
                loc,
            )
        })?;
        self.ensure_unit(r, unit, name, loc)?;
        let scope = self.recursive(r)?;
        if let UnitState::Done {
            constant: Some(value),
        } = &scope.units[unit].state
        {
            return Ok(Operation::constant(value.clone(), loc.clone()));
        }
        if from_function {
            return Ok(Operation::new(OpKind::NonlocalRef(slot), loc.clone()));
        }
        let module = Operation::new(OpKind::LocalRef(scope.module_slot), loc.clone());
        Ok(Operation::new(
            OpKind::ModuleRef {
                module,
                index: slot,
                name: Symbol::new(name),
            },
            loc.clone(),
        ))
    }

    fn ensure_unit(&mut self, r: usize, unit: usize, name: &str, loc: &Location) -> LangResult<()> {
        let scope = self.recursive(r)?;
        match (&scope.units[unit].state, &scope.units[unit].syntax) {
            (UnitState::Done { .. }, _) | (UnitState::InProgress, UnitSyntax::Function { .. }) => Ok(()),
            (UnitState::InProgress, UnitSyntax::Data { .. }) => Err(Exception::at(
                ErrorKind::IllegalRecursiveReference {
                    name: name.to_string(),
                },
                loc,
            )),
            (UnitState::Pending, _) => self.analyse_unit(r, unit),
        }
    }

    /// Analyses one unit with only the scopes up to and including its own
    /// recursive scope visible.
    fn analyse_unit(&mut self, r: usize, unit: usize) -> LangResult<()> {
        let (syntax, span) = {
            let scope = self.recursive_mut(r)?;
            scope.units[unit].state = UnitState::InProgress;
            (scope.units[unit].syntax.clone(), scope.units[unit].span)
        };
        let frame = self.scopes[r].frame;
        let saved_scopes = self.scopes.split_off(r + 1);
        let saved_frames = self.frames.split_off(frame + 1);
        let result = self.analyse_unit_syntax(r, syntax, span);
        self.scopes.extend(saved_scopes);
        self.frames.extend(saved_frames);
        let constant = result?;
        self.recursive_mut(r)?.units[unit].state = UnitState::Done { constant };
        Ok(())
    }

    fn analyse_unit_syntax(&mut self, r: usize, syntax: UnitSyntax<'a>, span: Span) -> LangResult<Option<Value>> {
        match syntax {
            UnitSyntax::Function {
                name,
                slot,
                params,
                body,
            } => {
                trace!(function = name, "analysing function definition");
                let loc = self.location(span);
                let (lambda, _) = self.build_lambda(&params, body, Some(name), true, &loc)?;
                self.recursive_mut(r)?.lambdas.push((slot, lambda));
                Ok(None)
            }
            UnitSyntax::Data { pattern, value } => {
                let edepth = self.scopes[r].edepth + 1;
                let value = self.analyse(value, Interp::expression(edepth))?;
                let mut pattern = Pattern::analyse(pattern, self)?;
                pattern.add_to_scope(&mut |name, loc| {
                    self.recursive(r)?.slots.get(name).map(|(_, slot)| *slot).ok_or_else(|| {
                        Exception::at(
                            ErrorKind::NotDefined {
                                name: name.to_string(),
                            },
                            loc,
                        )
                    })
                })?;
                let constant = match (&pattern, value.as_constant()) {
                    (Pattern::Id { .. }, Some(constant)) => Some(constant.clone()),
                    _ => None,
                };
                self.recursive_mut(r)?.inits.push(UnitInit { pattern, value });
                Ok(constant)
            }
        }
    }
}
