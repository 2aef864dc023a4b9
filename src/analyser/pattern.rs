//! Patterns: the left side of definitions, function parameters and `for`
//! loop variables.

use crate::{
    analyser::Analyser,
    error::{ErrorKind, Exception, LangResult},
    ir::Op,
    language::{
        ast::{Phrase, PhraseKind, Separator},
        span::{Location, Span},
    },
    runtime::{
        frame::Frame,
        interpreter::{call_function, eval},
        module::Module,
        value::{Symbol, Ternary, Value},
    },
};
use std::sync::Arc;

#[derive(Debug)]
pub enum Pattern {
    /// `_`
    Skip { loc: Location },
    Id {
        name: String,
        slot: usize,
        loc: Location,
    },
    /// A literal that the value must equal.
    Const { value: Value, loc: Location },
    List { items: Vec<Pattern>, loc: Location },
    /// Fields are sorted by name.
    Record {
        fields: Vec<FieldPattern>,
        loc: Location,
    },
    /// `pattern :: predicate`
    Predicate {
        pattern: Box<Pattern>,
        predicate: Op,
        loc: Location,
    },
}

#[derive(Debug)]
pub struct FieldPattern {
    pub name: Symbol,
    pub pattern: Pattern,
    pub default: Option<Op>,
    pub loc: Location,
}

/// Where the variables bound by a pattern are stored.
#[derive(Clone, Copy)]
pub enum Target<'m> {
    Frame,
    Module(&'m Arc<Module>),
}

enum Outcome {
    Matched,
    Failed(Exception),
}

fn not_a_pattern(phrase: &Phrase) -> ErrorKind {
    ErrorKind::NotAPattern {
        what: phrase.describe().to_string(),
    }
}

/// The variables a pattern phrase binds, found without analysing it. Used to
/// populate recursive scopes before any definition is analysed.
pub fn pattern_names(phrase: &Phrase) -> Result<Vec<(String, Span)>, (ErrorKind, Span)> {
    let mut names = Vec::new();
    collect_names(phrase, &mut names)?;
    Ok(names)
}

fn collect_names(phrase: &Phrase, out: &mut Vec<(String, Span)>) -> Result<(), (ErrorKind, Span)> {
    match &phrase.kind {
        PhraseKind::Identifier(name) => out.push((name.clone(), phrase.span)),
        PhraseKind::Underscore
        | PhraseKind::Numeral(_)
        | PhraseKind::String(_)
        | PhraseKind::Symbol(_) => {}
        PhraseKind::Paren { items, separator } if *separator != Separator::Semicolon => {
            for item in items {
                collect_names(item, out)?;
            }
        }
        PhraseKind::Bracket(items) => {
            for item in items {
                collect_names(item, out)?;
            }
        }
        PhraseKind::Brace(items) => {
            for item in items {
                let field = parse_field(item).ok_or((not_a_pattern(item), item.span))?;
                match field.pattern {
                    Some(pattern) => collect_names(pattern, out)?,
                    None => out.push((field.name.to_string(), field.name_span)),
                }
            }
        }
        PhraseKind::Predicate { pattern, .. } => collect_names(pattern, out)?,
        _ => return Err((not_a_pattern(phrase), phrase.span)),
    }
    Ok(())
}

/// The pieces of one item in a record pattern.
struct FieldSyntax<'p> {
    name: &'p str,
    name_span: Span,
    /// `None` binds a variable with the field's name.
    pattern: Option<&'p Phrase>,
    default: Option<&'p Phrase>,
}

fn field_name(phrase: &Phrase) -> Option<&str> {
    match &phrase.kind {
        PhraseKind::Identifier(name) | PhraseKind::Symbol(name) | PhraseKind::String(name) => {
            Some(name)
        }
        _ => None,
    }
}

fn parse_field(item: &Phrase) -> Option<FieldSyntax<'_>> {
    match &item.kind {
        PhraseKind::Identifier(name) => Some(FieldSyntax {
            name,
            name_span: item.span,
            pattern: None,
            default: None,
        }),
        PhraseKind::Predicate { pattern, .. } => {
            let name = pattern.as_identifier()?;
            Some(FieldSyntax {
                name,
                name_span: pattern.span,
                pattern: Some(item),
                default: None,
            })
        }
        PhraseKind::Colon { key, value } => Some(FieldSyntax {
            name: field_name(key)?,
            name_span: key.span,
            pattern: Some(value),
            default: None,
        }),
        PhraseKind::Definition { left, right } => {
            let mut field = parse_field(left)?;
            field.default = Some(right);
            Some(field)
        }
        _ => None,
    }
}

impl Pattern {
    /// Builds a pattern. Predicates and default values are analysed in the
    /// current environment, before the pattern's own variables are added.
    pub(crate) fn analyse<'a>(phrase: &'a Phrase, analyser: &mut Analyser<'a>) -> LangResult<Pattern> {
        let loc = analyser.location(phrase.span);
        match &phrase.kind {
            PhraseKind::Identifier(name) => Ok(Pattern::Id {
                name: name.clone(),
                slot: 0,
                loc,
            }),
            PhraseKind::Underscore => Ok(Pattern::Skip { loc }),
            PhraseKind::Numeral(n) => Ok(Pattern::Const {
                value: Value::Num(*n),
                loc,
            }),
            PhraseKind::String(text) => Ok(Pattern::Const {
                value: Value::string(text),
                loc,
            }),
            PhraseKind::Symbol(name) => Ok(Pattern::Const {
                value: Value::symbol(name),
                loc,
            }),
            PhraseKind::Paren {
                items,
                separator: Separator::None,
            } if items.len() == 1 => Pattern::analyse(&items[0], analyser),
            PhraseKind::Paren {
                items,
                separator: Separator::Comma,
            }
            | PhraseKind::Bracket(items) => {
                let items = items
                    .iter()
                    .map(|item| Pattern::analyse(item, analyser))
                    .collect::<LangResult<Vec<_>>>()?;
                Ok(Pattern::List { items, loc })
            }
            PhraseKind::Brace(items) => {
                let mut fields: Vec<FieldPattern> = Vec::new();
                for item in items {
                    let syntax = parse_field(item)
                        .ok_or_else(|| Exception::at(not_a_pattern(item), &analyser.location(item.span)))?;
                    let name = Symbol::new(syntax.name);
                    let field_loc = analyser.location(item.span);
                    if fields.iter().any(|field| field.name == name) {
                        return Err(Exception::at(
                            ErrorKind::MultiplyDefined {
                                name: name.to_string(),
                            },
                            &field_loc,
                        ));
                    }
                    let pattern = match syntax.pattern {
                        Some(pattern) => Pattern::analyse(pattern, analyser)?,
                        None => Pattern::Id {
                            name: syntax.name.to_string(),
                            slot: 0,
                            loc: analyser.location(syntax.name_span),
                        },
                    };
                    let default = syntax
                        .default
                        .map(|default| analyser.analyse_operand(default))
                        .transpose()?;
                    fields.push(FieldPattern {
                        name,
                        pattern,
                        default,
                        loc: field_loc,
                    });
                }
                fields.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(Pattern::Record { fields, loc })
            }
            PhraseKind::Predicate { pattern, predicate } => {
                let predicate = analyser.analyse_operand(predicate)?;
                let pattern = Pattern::analyse(pattern, analyser)?;
                Ok(Pattern::Predicate {
                    pattern: Box::new(pattern),
                    predicate,
                    loc,
                })
            }
            _ => Err(Exception::at(not_a_pattern(phrase), &loc)),
        }
    }

    /// Assigns a slot to every variable. `bind` allocates the slot and
    /// reports duplicates.
    pub fn add_to_scope(
        &mut self,
        bind: &mut dyn FnMut(&str, &Location) -> LangResult<usize>,
    ) -> LangResult<()> {
        match self {
            Pattern::Id { name, slot, loc } => *slot = bind(name, loc)?,
            Pattern::List { items, .. } => {
                for item in items {
                    item.add_to_scope(bind)?;
                }
            }
            Pattern::Record { fields, .. } => {
                for field in fields {
                    field.pattern.add_to_scope(bind)?;
                }
            }
            Pattern::Predicate { pattern, .. } => pattern.add_to_scope(bind)?,
            Pattern::Skip { .. } | Pattern::Const { .. } => {}
        }
        Ok(())
    }

    pub fn loc(&self) -> &Location {
        match self {
            Pattern::Skip { loc }
            | Pattern::Id { loc, .. }
            | Pattern::Const { loc, .. }
            | Pattern::List { loc, .. }
            | Pattern::Record { loc, .. }
            | Pattern::Predicate { loc, .. } => loc,
        }
    }

    /// Binds `value`, failing with a pattern mismatch if it does not fit.
    pub fn exec(&self, value: Value, frame: &mut Frame, target: Target) -> LangResult<()> {
        match self.matches(value, frame, target)? {
            Outcome::Matched => Ok(()),
            Outcome::Failed(err) => Err(err),
        }
    }

    /// Like `exec`, but a mismatch returns `false`. Errors that are not
    /// mismatches, such as a reactive comparison, still propagate.
    pub fn try_exec(&self, value: Value, frame: &mut Frame, target: Target) -> LangResult<bool> {
        Ok(matches!(self.matches(value, frame, target)?, Outcome::Matched))
    }

    fn matches(&self, value: Value, frame: &mut Frame, target: Target) -> LangResult<Outcome> {
        match self {
            Pattern::Skip { .. } => Ok(Outcome::Matched),
            Pattern::Id { slot, .. } => {
                match target {
                    Target::Frame => frame.set_slot(*slot, value),
                    Target::Module(module) => {
                        module.set(*slot, value);
                    }
                }
                Ok(Outcome::Matched)
            }
            Pattern::Const {
                value: expected,
                loc,
            } => match value.equal(expected) {
                Ternary::True => Ok(Outcome::Matched),
                Ternary::False => Ok(mismatch(format!("{value} is not {expected}"), loc)),
                Ternary::Unknown => Err(Exception::at(
                    ErrorKind::NotProvablyEqual {
                        left: value.to_string(),
                        right: expected.to_string(),
                    },
                    loc,
                )),
            },
            Pattern::List { items, loc } => {
                let Value::List(values) = &value else {
                    return Ok(mismatch(format!("{value} is not a list"), loc));
                };
                if values.len() != items.len() {
                    return Ok(mismatch(
                        format!(
                            "list has {} elements, pattern expects {}",
                            values.len(),
                            items.len()
                        ),
                        loc,
                    ));
                }
                for (item, value) in items.iter().zip(values.iter()) {
                    if let Outcome::Failed(err) = item.matches(value.clone(), frame, target)? {
                        return Ok(Outcome::Failed(err));
                    }
                }
                Ok(Outcome::Matched)
            }
            Pattern::Record { fields, loc } => {
                let Some(values) = value.fields() else {
                    return Ok(mismatch(format!("{value} is not a record"), loc));
                };
                let mut values = values.into_iter().peekable();
                for field in fields {
                    if let Some((extra, _)) = values.next_if(|(name, _)| *name < field.name) {
                        return Ok(Outcome::Failed(Exception::at(
                            ErrorKind::UnmatchedField {
                                name: extra.to_string(),
                            },
                            loc,
                        )));
                    }
                    let field_value = match values.next_if(|(name, _)| *name == field.name) {
                        Some((_, field_value)) => field_value,
                        None => match &field.default {
                            Some(default) => eval(default, frame)?,
                            None => {
                                return Ok(Outcome::Failed(Exception::at(
                                    ErrorKind::MissingField {
                                        name: field.name.to_string(),
                                    },
                                    loc,
                                )))
                            }
                        },
                    };
                    if let Outcome::Failed(err) = field.pattern.matches(field_value, frame, target)? {
                        return Ok(Outcome::Failed(err));
                    }
                }
                if let Some((extra, _)) = values.next() {
                    return Ok(Outcome::Failed(Exception::at(
                        ErrorKind::UnmatchedField {
                            name: extra.to_string(),
                        },
                        loc,
                    )));
                }
                Ok(Outcome::Matched)
            }
            Pattern::Predicate {
                pattern,
                predicate,
                loc,
            } => {
                let function = eval(predicate, frame)?;
                let verdict = call_function(frame.system, function, value.clone(), loc)?;
                match verdict {
                    Value::Bool(true) => pattern.matches(value, frame, target),
                    Value::Bool(false) => Ok(mismatch(
                        format!("predicate {} failed for {value}", predicate.loc.text()),
                        loc,
                    )),
                    other => Err(Exception::domain(
                        format!("predicate returned {other}, not a boolean"),
                        loc,
                    )),
                }
            }
        }
    }
}

fn mismatch(reason: String, loc: &Location) -> Outcome {
    Outcome::Failed(Exception::at(ErrorKind::PatternMismatch { reason }, loc))
}
