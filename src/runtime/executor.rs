use crate::{
    error::{ErrorKind, Exception, LangResult},
    language::span::Location,
    runtime::value::{Record, Symbol, Value},
};

/// Receives what a statement generates.
pub trait Executor {
    fn push_value(&mut self, value: Value, loc: &Location) -> LangResult<()>;
    fn push_field(&mut self, name: Symbol, value: Value, loc: &Location) -> LangResult<()>;
}

/// Statement lists of `do` blocks and loop bodies: only actions are allowed.
pub struct ActionExecutor;

impl Executor for ActionExecutor {
    fn push_value(&mut self, value: Value, loc: &Location) -> LangResult<()> {
        Err(Exception::at(
            ErrorKind::NotAnAction {
                what: value.to_string(),
            },
            loc,
        )
        .with_help("a statement may not produce a value here"))
    }

    fn push_field(&mut self, name: Symbol, _value: Value, loc: &Location) -> LangResult<()> {
        Err(Exception::at(
            ErrorKind::NotAnAction {
                what: format!("field {name}"),
            },
            loc,
        ))
    }
}

#[derive(Default)]
pub struct ListExecutor {
    pub items: Vec<Value>,
}

impl Executor for ListExecutor {
    fn push_value(&mut self, value: Value, _loc: &Location) -> LangResult<()> {
        self.items.push(value);
        Ok(())
    }

    fn push_field(&mut self, name: Symbol, _value: Value, loc: &Location) -> LangResult<()> {
        Err(Exception::domain(
            format!("field {name}: fields are not allowed in a list"),
            loc,
        ))
    }
}

#[derive(Default)]
pub struct RecordExecutor {
    pub fields: Record,
}

impl Executor for RecordExecutor {
    fn push_value(&mut self, value: Value, loc: &Location) -> LangResult<()> {
        Err(Exception::domain(
            format!("{value}: a record may only contain fields"),
            loc,
        ))
    }

    fn push_field(&mut self, name: Symbol, value: Value, _loc: &Location) -> LangResult<()> {
        self.fields.insert(name, value);
        Ok(())
    }
}
