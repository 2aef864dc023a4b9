use crate::{
    error::{ErrorKind, Exception, LangResult},
    ir::{Op, OpKind},
    runtime::value::Value,
    sc::{
        compiler::ScCompiler,
        value::{ScFrame, ScItem},
    },
};

/// The values of `items` if every one is known at compile time.
pub fn all_const(items: &[ScItem]) -> Option<Vec<Value>> {
    items
        .iter()
        .map(|item| match item {
            ScItem::Const(value) if !value.is_reactive() => Some(value.clone()),
            _ => None,
        })
        .collect()
}

/// Reads a value straight off the op tree, for constants, variables bound to
/// constants and lists of those.
fn fold(op: &Op, frame: &ScFrame) -> Option<Value> {
    let value = match &op.kind {
        OpKind::Constant(value) => value.clone(),
        OpKind::LocalRef(slot) => match frame.slot(*slot)? {
            ScItem::Const(value) => value.clone(),
            _ => return None,
        },
        OpKind::NonlocalRef(slot) => match frame.nonlocals.get(*slot)? {
            ScItem::Const(value) => value,
            _ => return None,
        },
        OpKind::List(items) => Value::list(
            items
                .iter()
                .map(|item| fold(item, frame))
                .collect::<Option<Vec<_>>>()?,
        ),
        _ => return None,
    };
    (!value.is_reactive()).then_some(value)
}

impl ScCompiler<'_> {
    /// Reduces `op` to a value known at compile time. Constants, references
    /// resolved against evaluated modules, field access, indexing, list
    /// construction and operators over constants all fold.
    pub fn sc_constify(&mut self, op: &Op, frame: &mut ScFrame) -> LangResult<Value> {
        match self.sc_try_constify(op, frame)? {
            Some(value) => Ok(value),
            None => Err(Exception::at(
                ErrorKind::NotConstant {
                    what: op.loc.text().to_string(),
                },
                &op.loc,
            )),
        }
    }

    /// Like `sc_constify`, but a value only known at run time gives `None`.
    /// Never leaves code behind: anything emitted while trying is dropped.
    pub fn sc_try_constify(&mut self, op: &Op, frame: &mut ScFrame) -> LangResult<Option<Value>> {
        if let Some(value) = fold(op, frame) {
            return Ok(Some(value));
        }
        let item = self.scratch(frame, |compiler, frame| compiler.sc_item(op, frame))?;
        Ok(match item {
            ScItem::Const(value) if !value.is_reactive() => Some(value),
            _ => None,
        })
    }

    /// A number known at compile time.
    pub(crate) fn constant_num(&mut self, op: &Op, frame: &mut ScFrame) -> LangResult<f64> {
        match self.sc_constify(op, frame)? {
            Value::Num(n) => Ok(n),
            other => Err(Exception::domain(format!("{other}: not a number"), &op.loc)),
        }
    }
}
