use crate::{
    analyser::pattern::Pattern,
    error::{ErrorKind, Exception, LangResult},
    runtime::{
        interpreter::call_function,
        value::{Symbol, Ternary, Value},
    },
    sc::{
        compiler::ScCompiler,
        ops::not_supported,
        value::{DynamicModule, ScFrame, ScItem, ScModule, ScSlot},
    },
};

/// Where `sc_bind` stores the variables of a pattern.
#[derive(Clone, Copy)]
pub enum ScTarget<'m> {
    Frame,
    Module(&'m DynamicModule),
}

fn mismatch(reason: String, pattern: &Pattern) -> Exception {
    Exception::at(ErrorKind::PatternMismatch { reason }, pattern.loc())
}

impl ScCompiler<'_> {
    /// Binds a compile-time item to a pattern. Patterns over run-time values
    /// must be decidable while compiling: a list pattern needs a value of
    /// known length, and constants and predicates need constant values.
    pub fn sc_bind(
        &mut self,
        pattern: &Pattern,
        item: ScItem,
        target: ScTarget,
        frame: &mut ScFrame,
    ) -> LangResult<()> {
        match pattern {
            Pattern::Skip { .. } => Ok(()),
            Pattern::Id { slot, .. } => {
                match target {
                    ScTarget::Frame => frame.set_slot(*slot, item),
                    ScTarget::Module(module) => module.set(*slot, ScSlot::Item(item)),
                }
                Ok(())
            }
            Pattern::Const { value: expected, loc } => match item {
                ScItem::Const(value) if !value.is_reactive() => {
                    if value.equal(expected) == Ternary::True {
                        Ok(())
                    } else {
                        Err(mismatch(format!("{value} is not {expected}"), pattern))
                    }
                }
                _ => Err(not_supported("constant pattern on a run-time value", loc)),
            },
            Pattern::List { items, loc } => {
                let elements: Vec<ScItem> = match item {
                    ScItem::Const(Value::List(values)) => {
                        values.iter().cloned().map(ScItem::Const).collect()
                    }
                    ScItem::Const(value) if !value.is_reactive() => {
                        return Err(mismatch(format!("{value} is not a list"), pattern))
                    }
                    other => {
                        let value = self.to_value(other, loc)?;
                        if value.ty.is_scalar() {
                            return Err(mismatch(format!("{} is not a list", value.ty), pattern));
                        }
                        (0..value.ty.count())
                            .map(|i| {
                                let index = ScItem::Const(Value::Num(f64::from(i)));
                                self.sc_index(&value, &index, loc).map(ScItem::Value)
                            })
                            .collect::<LangResult<_>>()?
                    }
                };
                if elements.len() != items.len() {
                    return Err(mismatch(
                        format!(
                            "list has {} elements, pattern expects {}",
                            elements.len(),
                            items.len()
                        ),
                        pattern,
                    ));
                }
                for (item_pattern, element) in items.iter().zip(elements) {
                    self.sc_bind(item_pattern, element, target, frame)?;
                }
                Ok(())
            }
            Pattern::Record { fields, loc } => {
                let lookup = |name: &Symbol| -> Option<ScItem> {
                    match &item {
                        ScItem::Const(value) => value.field(name).map(ScItem::Const),
                        ScItem::Module(module) => module.field(name),
                        _ => None,
                    }
                };
                let names: Vec<_> = match &item {
                    ScItem::Const(value) if value.is_record() => value
                        .fields()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(name, _)| name)
                        .collect(),
                    ScItem::Module(ScModule::Const(module)) => {
                        module.dictionary().keys().cloned().collect()
                    }
                    ScItem::Module(ScModule::Dynamic(module)) => {
                        module.dictionary.keys().cloned().collect()
                    }
                    _ => return Err(not_supported("record pattern on a run-time value", loc)),
                };
                if let Some(extra) = names
                    .iter()
                    .find(|name| !fields.iter().any(|field| field.name == **name))
                {
                    return Err(Exception::at(
                        ErrorKind::UnmatchedField {
                            name: extra.to_string(),
                        },
                        loc,
                    ));
                }
                for field in fields {
                    let value = match lookup(&field.name) {
                        Some(value) => value,
                        None => match &field.default {
                            Some(default) => self.sc_item(default, frame)?,
                            None => {
                                return Err(Exception::at(
                                    ErrorKind::MissingField {
                                        name: field.name.to_string(),
                                    },
                                    loc,
                                ))
                            }
                        },
                    };
                    self.sc_bind(&field.pattern, value, target, frame)?;
                }
                Ok(())
            }
            Pattern::Predicate {
                pattern: inner,
                predicate,
                loc,
            } => {
                let value = match &item {
                    ScItem::Const(value) if !value.is_reactive() => value.clone(),
                    _ => return Err(not_supported("predicate pattern on a run-time value", loc)),
                };
                let function = self.sc_constify(predicate, frame)?;
                match call_function(self.system, function, value.clone(), loc)? {
                    Value::Bool(true) => self.sc_bind(inner, item, target, frame),
                    Value::Bool(false) => Err(mismatch(
                        format!("predicate {} failed for {value}", predicate.loc.text()),
                        pattern,
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
