use crate::{
    error::{Exception, LangResult},
    ir::Op,
    language::span::Location,
    runtime::{
        frame::Frame,
        interpreter::{eval, get_field},
        value::{Record, Symbol, Value},
    },
};

/// The target of an assignment `locative := value`.
///
/// Only `local` and `for` variables can be assigned; field and element
/// updates build a new aggregate and store it back into the variable.
#[derive(Debug)]
pub enum Locative {
    Local {
        slot: usize,
        loc: Location,
    },
    Field {
        base: Box<Locative>,
        field: Symbol,
        loc: Location,
    },
    Index {
        base: Box<Locative>,
        index: Op,
        loc: Location,
    },
    List {
        items: Vec<Locative>,
        loc: Location,
    },
}

impl Locative {
    pub fn loc(&self) -> &Location {
        match self {
            Locative::Local { loc, .. }
            | Locative::Field { loc, .. }
            | Locative::Index { loc, .. }
            | Locative::List { loc, .. } => loc,
        }
    }

    pub fn fetch(&self, frame: &mut Frame) -> LangResult<Value> {
        match self {
            Locative::Local { slot, .. } => Ok(frame.slot(*slot)),
            Locative::Field { base, field, loc } => {
                let base = base.fetch(frame)?;
                get_field(&base, field, loc)
            }
            Locative::Index { base, index, loc } => {
                let base = base.fetch(frame)?;
                let index = eval(index, frame)?;
                let items = list_of(&base, loc)?;
                let i = element(&index, items.len(), loc)?;
                Ok(items[i].clone())
            }
            Locative::List { items, .. } => items
                .iter()
                .map(|item| item.fetch(frame))
                .collect::<LangResult<Vec<_>>>()
                .map(Value::list),
        }
    }

    pub fn store(&self, frame: &mut Frame, value: Value) -> LangResult<()> {
        match self {
            Locative::Local { slot, .. } => {
                frame.set_slot(*slot, value);
                Ok(())
            }
            Locative::Field { base, field, loc } => {
                let record = base.fetch(frame)?;
                let Some(fields) = record.fields() else {
                    return Err(Exception::domain(format!("{record}: not a record"), loc));
                };
                let mut fields: Record = fields.into_iter().collect();
                if !fields.contains_key(field) {
                    return Err(Exception::domain(
                        format!("{record}: no field named {field}"),
                        loc,
                    ));
                }
                fields.insert(field.clone(), value);
                base.store(frame, Value::record(fields))
            }
            Locative::Index { base, index, loc } => {
                let list = base.fetch(frame)?;
                let index = eval(index, frame)?;
                let mut items = list_of(&list, loc)?.to_vec();
                let i = element(&index, items.len(), loc)?;
                items[i] = value;
                base.store(frame, Value::list(items))
            }
            Locative::List { items, loc } => {
                let values = match &value {
                    Value::List(values) if values.len() == items.len() => values.clone(),
                    _ => {
                        return Err(Exception::domain(
                            format!("{value}: expected a list of {} values", items.len()),
                            loc,
                        ))
                    }
                };
                for (item, value) in items.iter().zip(values.iter()) {
                    item.store(frame, value.clone())?;
                }
                Ok(())
            }
        }
    }
}

fn list_of<'v>(value: &'v Value, loc: &Location) -> LangResult<&'v [Value]> {
    value
        .as_list()
        .ok_or_else(|| Exception::domain(format!("{value}: not a list"), loc))
}

fn element(index: &Value, len: usize, loc: &Location) -> LangResult<usize> {
    match index.as_num() {
        Some(n) if n.fract() == 0.0 && n >= 0.0 && n < len as f64 => Ok(n as usize),
        _ => Err(Exception::domain(
            format!("{index}: not a valid index for a list of length {len}"),
            loc,
        )),
    }
}
