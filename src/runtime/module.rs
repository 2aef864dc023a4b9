use crate::runtime::{
    function::{Closure, Function},
    value::{Symbol, Value},
};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Maps public field names of a module to slot indices.
pub type Dictionary = BTreeMap<Symbol, usize>;

/// A fixed-size array of values produced by a scope: a brace module, a `let`
/// block, the prelude, or the captured variables of a closure.
///
/// Slots are written once while the module is being constructed and are
/// read-only afterwards. Slots past the dictionary hold values captured from
/// enclosing scopes and have no public name.
#[derive(Debug)]
pub struct Module {
    dictionary: Arc<Dictionary>,
    slots: Vec<OnceLock<Value>>,
}

impl Module {
    pub fn new(dictionary: Arc<Dictionary>, size: usize) -> Arc<Self> {
        Arc::new(Self {
            dictionary,
            slots: (0..size).map(|_| OnceLock::new()).collect(),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(Arc::new(Dictionary::new()), 0)
    }

    /// An anonymous module, used for the non-locals of a lambda expression.
    pub fn from_values(values: Vec<Value>) -> Arc<Self> {
        let module = Self::new(Arc::new(Dictionary::new()), values.len());
        for (index, value) in values.into_iter().enumerate() {
            module.set(index, value);
        }
        module
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Initialises a slot. Returns false if the slot was already set.
    ///
    /// A closure over this very module is stored as its bare lambda, so the
    /// module never owns a reference to itself.
    pub fn set(self: &Arc<Self>, index: usize, value: Value) -> bool {
        let Some(slot) = self.slots.get(index) else {
            return false;
        };
        let value = match value {
            Value::Function(Function::Closure(closure))
                if Arc::ptr_eq(&closure.nonlocals, self) =>
            {
                Value::Lambda(closure.lambda)
            }
            other => other,
        };
        slot.set(value).is_ok()
    }

    /// Reads a slot, materialising stored lambdas as closures over this
    /// module. `None` means the slot has not been initialised yet.
    pub fn get(self: &Arc<Self>, index: usize) -> Option<Value> {
        match self.slots.get(index)?.get()? {
            Value::Lambda(lambda) => Some(Value::Function(Function::Closure(Closure {
                lambda: lambda.clone(),
                nonlocals: self.clone(),
            }))),
            other => Some(other.clone()),
        }
    }

    pub fn field(self: &Arc<Self>, name: &Symbol) -> Option<Value> {
        let index = *self.dictionary.get(name)?;
        self.get(index)
    }

    pub fn fields(self: &Arc<Self>) -> Vec<(Symbol, Value)> {
        self.dictionary
            .iter()
            .filter_map(|(name, index)| Some((name.clone(), self.get(*index)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_written_once() {
        let mut dict = Dictionary::new();
        dict.insert(Symbol::new("a"), 0);
        let module = Module::new(Arc::new(dict), 2);
        assert!(module.get(0).is_none());
        assert!(module.set(0, Value::Num(1.0)));
        assert!(!module.set(0, Value::Num(2.0)));
        assert!(module.set(1, Value::Num(3.0)));
        assert_eq!(module.field(&Symbol::new("a")).and_then(|v| v.as_num()), Some(1.0));
        // hidden slots are not fields
        assert_eq!(module.fields().len(), 1);
    }
}
