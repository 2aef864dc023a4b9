//! Compile-time values of the shape compiler.

use crate::{
    runtime::{
        function::Lambda,
        module::{Dictionary, Module},
        value::{Symbol, Value},
    },
    sc::types::ScType,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// A target-language expression and its type. Most are the name of a
/// variable holding an intermediate result.
#[derive(Clone, Debug, PartialEq)]
pub struct ScValue {
    pub expr: String,
    pub ty: ScType,
}

impl ScValue {
    pub fn new(expr: impl Into<String>, ty: ScType) -> Self {
        Self {
            expr: expr.into(),
            ty,
        }
    }
}

/// What an operation denotes while compiling: a value computed by the
/// generated code, or something known at compile time.
#[derive(Clone)]
pub enum ScItem {
    Value(ScValue),
    Const(Value),
    Module(ScModule),
    Closure(ScClosure),
}

#[derive(Clone)]
pub struct ScClosure {
    pub lambda: Arc<Lambda>,
    pub nonlocals: ScModule,
}

#[derive(Clone)]
pub enum ScSlot {
    Empty,
    Item(ScItem),
    /// A function definition of the module holding this slot.
    Lambda(Arc<Lambda>),
}

pub struct DynamicModule {
    pub dictionary: Arc<Dictionary>,
    pub slots: RefCell<Vec<ScSlot>>,
}

/// A module whose slots may hold generated values.
#[derive(Clone)]
pub enum ScModule {
    Const(Arc<Module>),
    Dynamic(Rc<DynamicModule>),
}

impl DynamicModule {
    pub fn new(dictionary: Arc<Dictionary>, size: usize) -> Rc<Self> {
        Rc::new(Self {
            dictionary,
            slots: RefCell::new(vec![ScSlot::Empty; size]),
        })
    }

    /// The non-locals of a lambda expression.
    pub fn anonymous(items: Vec<ScItem>) -> Rc<Self> {
        Rc::new(Self {
            dictionary: Arc::new(Dictionary::new()),
            slots: RefCell::new(items.into_iter().map(ScSlot::Item).collect()),
        })
    }

    pub fn set(&self, index: usize, slot: ScSlot) {
        let mut slots = self.slots.borrow_mut();
        if index >= slots.len() {
            slots.resize(index + 1, ScSlot::Empty);
        }
        slots[index] = slot;
    }
}

impl ScModule {
    pub fn get(&self, index: usize) -> Option<ScItem> {
        match self {
            ScModule::Const(module) => module.get(index).map(ScItem::Const),
            ScModule::Dynamic(module) => match module.slots.borrow().get(index)? {
                ScSlot::Empty => None,
                ScSlot::Item(item) => Some(item.clone()),
                ScSlot::Lambda(lambda) => Some(ScItem::Closure(ScClosure {
                    lambda: lambda.clone(),
                    nonlocals: self.clone(),
                })),
            },
        }
    }

    pub fn field(&self, name: &Symbol) -> Option<ScItem> {
        let index = match self {
            ScModule::Const(module) => *module.dictionary().get(name)?,
            ScModule::Dynamic(module) => *module.dictionary.get(name)?,
        };
        self.get(index)
    }
}

/// The compile-time counterpart of a call frame.
pub struct ScFrame {
    pub slots: Vec<Option<ScItem>>,
    pub nonlocals: ScModule,
    /// Values of pure operations already emitted, keyed by fingerprint; one
    /// level per enclosing block of generated code.
    cache: Vec<HashMap<String, ScValue>>,
}

impl ScFrame {
    pub fn new(nslots: usize, nonlocals: ScModule) -> Self {
        Self {
            slots: vec![None; nslots],
            nonlocals,
            cache: vec![HashMap::new()],
        }
    }

    pub fn empty() -> Self {
        Self::new(0, ScModule::Const(Module::empty()))
    }

    pub fn slot(&self, index: usize) -> Option<&ScItem> {
        self.slots.get(index)?.as_ref()
    }

    pub fn set_slot(&mut self, index: usize, item: ScItem) {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(item);
    }

    pub fn push_cache(&mut self) {
        self.cache.push(HashMap::new());
    }

    pub fn pop_cache(&mut self) {
        if self.cache.len() > 1 {
            self.cache.pop();
        }
    }

    pub fn cached(&self, key: &str) -> Option<ScValue> {
        self.cache.iter().rev().find_map(|level| level.get(key).cloned())
    }

    pub fn remember(&mut self, key: String, value: ScValue) {
        if let Some(level) = self.cache.last_mut() {
            level.insert(key, value);
        }
    }
}
