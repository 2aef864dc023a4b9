use crate::{
    runtime::{module::Module, value::Value},
    system::System,
};
use std::sync::Arc;

/// The activation record of one function call (or of a whole program).
pub struct Frame<'a> {
    pub system: &'a System,
    pub slots: Vec<Value>,
    pub nonlocals: Arc<Module>,
}

impl<'a> Frame<'a> {
    pub fn new(system: &'a System, nslots: usize, nonlocals: Arc<Module>) -> Self {
        Self {
            system,
            slots: vec![Value::Null; nslots],
            nonlocals,
        }
    }

    pub fn slot(&self, index: usize) -> Value {
        self.slots.get(index).cloned().unwrap_or(Value::Null)
    }

    pub fn set_slot(&mut self, index: usize, value: Value) {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, Value::Null);
        }
        self.slots[index] = value;
    }
}
