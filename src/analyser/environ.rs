//! Compile-time environments: the scope stack, slot allocation and name
//! resolution.

use crate::{
    analyser::{definition::RecursiveScope, Analyser},
    error::{ErrorKind, Exception, LangResult},
    ir::{Op, OpKind, Operation},
    language::span::Location,
};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Context {
    Expression,
    Statement,
}

/// How a phrase is being interpreted. `edepth` grows by one for every
/// enclosing sub-expression; assignments may only reach variables whose
/// scope has the same depth.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Interp {
    pub context: Context,
    pub edepth: usize,
}

impl Interp {
    pub fn expression(edepth: usize) -> Self {
        Self {
            context: Context::Expression,
            edepth,
        }
    }

    pub fn statement(edepth: usize) -> Self {
        Self {
            context: Context::Statement,
            edepth,
        }
    }

    /// An operand of this phrase.
    pub fn deeper(self) -> Self {
        Self::expression(self.edepth + 1)
    }

    pub fn is_expression(&self) -> bool {
        self.context == Context::Expression
    }
}

pub(crate) struct LocalBinding {
    pub slot: usize,
    pub mutable: bool,
}

pub(crate) struct LambdaScope {
    pub params: HashMap<String, usize>,
    /// Set for the outer lambda of a function definition: it reads its
    /// non-locals directly from the module of the recursive scope below it.
    pub shared: bool,
    pub nonlocals: HashMap<String, usize>,
    pub captures: Vec<Op>,
}

pub(crate) enum ScopeKind<'a> {
    Root,
    Block(HashMap<String, LocalBinding>),
    Lambda(LambdaScope),
    Recursive(RecursiveScope<'a>),
}

pub(crate) struct Scope<'a> {
    pub kind: ScopeKind<'a>,
    pub edepth: usize,
    /// Index of the frame whose slots this scope allocates.
    pub frame: usize,
}

#[derive(Default)]
pub(crate) struct FrameInfo {
    pub nslots: usize,
}

impl<'a> Analyser<'a> {
    pub(crate) fn push_scope(&mut self, kind: ScopeKind<'a>, edepth: usize) {
        let frame = self.frames.len().saturating_sub(1);
        self.scopes.push(Scope {
            kind,
            edepth,
            frame,
        });
    }

    pub(crate) fn pop_scope(&mut self) -> Option<Scope<'a>> {
        self.scopes.pop()
    }

    /// Slots are never reused within a frame.
    pub(crate) fn new_slot(&mut self) -> usize {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.nslots += 1;
                frame.nslots - 1
            }
            None => 0,
        }
    }

    /// Adds a variable to the innermost block scope.
    pub(crate) fn bind_local(&mut self, name: &str, loc: &Location, mutable: bool) -> LangResult<usize> {
        let slot = self.new_slot();
        match self.scopes.last_mut().map(|scope| &mut scope.kind) {
            Some(ScopeKind::Block(bindings)) => {
                if bindings.contains_key(name) {
                    return Err(Exception::at(
                        ErrorKind::MultiplyDefined {
                            name: name.to_string(),
                        },
                        loc,
                    ));
                }
                bindings.insert(name.to_string(), LocalBinding { slot, mutable });
                Ok(slot)
            }
            _ => Err(Exception::at(
                ErrorKind::NotAnAction {
                    what: format!("local definition of {name}"),
                },
                loc,
            )
            .with_help("`local` is only allowed in a statement list")),
        }
    }

    /// Adds a parameter to the innermost lambda scope.
    pub(crate) fn bind_param(&mut self, name: &str, loc: &Location) -> LangResult<usize> {
        let slot = self.new_slot();
        match self.scopes.last_mut().map(|scope| &mut scope.kind) {
            Some(ScopeKind::Lambda(lambda)) => {
                if lambda.params.insert(name.to_string(), slot).is_some() {
                    return Err(Exception::at(
                        ErrorKind::MultiplyDefined {
                            name: name.to_string(),
                        },
                        loc,
                    ));
                }
                Ok(slot)
            }
            _ => Err(Exception::new(ErrorKind::Custom(format!(
                "parameter {name} outside of a function"
            )))
            .located(loc)),
        }
    }

    pub(crate) fn lookup(&mut self, name: &str, loc: &Location) -> LangResult<Op> {
        self.resolve(self.scopes.len(), name, loc)?.ok_or_else(|| {
            Exception::at(
                ErrorKind::NotDefined {
                    name: name.to_string(),
                },
                loc,
            )
        })
    }

    /// Searches `scopes[..depth]` from the top down.
    fn resolve(&mut self, depth: usize, name: &str, loc: &Location) -> LangResult<Option<Op>> {
        let Some(i) = depth.checked_sub(1) else {
            return Ok(None);
        };
        match &self.scopes[i].kind {
            ScopeKind::Root => Ok(self
                .system
                .namespace()
                .get(name)
                .map(|value| Operation::constant(value.clone(), loc.clone()))),
            ScopeKind::Block(bindings) => match bindings.get(name) {
                Some(binding) if binding.mutable => {
                    Ok(Some(Operation::mutable_ref(binding.slot, loc.clone())))
                }
                Some(binding) => Ok(Some(Operation::new(OpKind::LocalRef(binding.slot), loc.clone()))),
                None => self.resolve(i, name, loc),
            },
            ScopeKind::Lambda(lambda) => {
                if let Some(slot) = lambda.params.get(name) {
                    return Ok(Some(Operation::new(OpKind::LocalRef(*slot), loc.clone())));
                }
                if lambda.shared {
                    return self.resolve_in_group(i - 1, name, loc);
                }
                if let Some(slot) = lambda.nonlocals.get(name) {
                    return Ok(Some(Operation::new(OpKind::NonlocalRef(*slot), loc.clone())));
                }
                let Some(outer) = self.resolve(i, name, loc)? else {
                    return Ok(None);
                };
                if outer.as_constant().is_some() {
                    return Ok(Some(outer));
                }
                Ok(Some(self.capture(i, name, outer, loc)))
            }
            ScopeKind::Recursive(scope) if scope.defines(name) => self.unit_ref(i, name, loc, false).map(Some),
            ScopeKind::Recursive(_) => self.resolve(i, name, loc),
        }
    }

    /// Records that the lambda at `scopes[i]` captures `outer`.
    fn capture(&mut self, i: usize, name: &str, outer: Op, loc: &Location) -> Op {
        match &mut self.scopes[i].kind {
            ScopeKind::Lambda(lambda) => {
                let slot = lambda.captures.len();
                lambda.captures.push(outer);
                lambda.nonlocals.insert(name.to_string(), slot);
                Operation::new(OpKind::NonlocalRef(slot), loc.clone())
            }
            _ => outer,
        }
    }

    /// Resolution from inside a function definition whose recursive scope
    /// is `scopes[r]`. Everything the function needs from outside is read
    /// from that scope's module.
    fn resolve_in_group(&mut self, r: usize, name: &str, loc: &Location) -> LangResult<Option<Op>> {
        let known = match &self.scopes[r].kind {
            ScopeKind::Recursive(scope) if scope.defines(name) => {
                return self.unit_ref(r, name, loc, true).map(Some)
            }
            ScopeKind::Recursive(scope) => scope.capture_slots.get(name).copied(),
            _ => return self.resolve(r + 1, name, loc),
        };
        if let Some(slot) = known {
            return Ok(Some(Operation::new(OpKind::NonlocalRef(slot), loc.clone())));
        }
        let Some(outer) = self.resolve(r, name, loc)? else {
            return Ok(None);
        };
        if outer.as_constant().is_some() {
            return Ok(Some(outer));
        }
        match &mut self.scopes[r].kind {
            ScopeKind::Recursive(scope) => {
                let slot = scope.size;
                scope.size += 1;
                scope.captures.push((slot, outer));
                scope.capture_slots.insert(name.to_string(), slot);
                Ok(Some(Operation::new(OpKind::NonlocalRef(slot), loc.clone())))
            }
            _ => Ok(Some(outer)),
        }
    }

    /// Finds the frame slot of an assignable variable.
    pub(crate) fn lookup_lvar(&self, name: &str, edepth: usize, loc: &Location) -> LangResult<usize> {
        let not_assignable = |help: &str| {
            Exception::at(
                ErrorKind::NotAssignable {
                    name: name.to_string(),
                },
                loc,
            )
            .with_help(help)
        };
        let mut crossed_function = false;
        for scope in self.scopes.iter().rev() {
            match &scope.kind {
                ScopeKind::Block(bindings) => {
                    let Some(binding) = bindings.get(name) else {
                        continue;
                    };
                    if crossed_function {
                        return Err(not_assignable(
                            "a function cannot assign variables defined outside of it",
                        ));
                    }
                    if !binding.mutable {
                        return Err(not_assignable(
                            "only variables defined by `local` or `for` can be assigned",
                        ));
                    }
                    if scope.edepth < edepth {
                        return Err(Exception::at(
                            ErrorKind::NotAssignableFromExpression {
                                name: name.to_string(),
                            },
                            loc,
                        ));
                    }
                    return Ok(binding.slot);
                }
                ScopeKind::Lambda(lambda) => {
                    if lambda.params.contains_key(name) {
                        return Err(not_assignable("function parameters cannot be assigned"));
                    }
                    crossed_function = true;
                }
                ScopeKind::Recursive(recursive) => {
                    if recursive.defines(name) {
                        return Err(not_assignable(
                            "definitions are immutable; use `local` to define a variable",
                        ));
                    }
                }
                ScopeKind::Root => {
                    if self.system.namespace().contains_key(name) {
                        return Err(not_assignable("builtin names cannot be assigned"));
                    }
                }
            }
        }
        Err(Exception::at(
            ErrorKind::NotDefined {
                name: name.to_string(),
            },
            loc,
        ))
    }
}
