use crate::runtime::{
    function::{Function, Lambda},
    module::Module,
    reactive::Reactive,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An interned-by-value field or symbol name. Ordering is lexicographic, which
/// gives records their canonical field order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

pub type Record = BTreeMap<Symbol, Value>;

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Num(f64),
    Symbol(Symbol),
    String(Arc<str>),
    List(Arc<Vec<Value>>),
    Record(Arc<Record>),
    Module(Arc<Module>),
    Function(Function),
    Reactive(Arc<Reactive>),
    /// A function definition stored in a recursive module. Reading it back out
    /// of the module yields a closure over that module.
    Lambda(Arc<Lambda>),
}

/// Result of comparing values that may be reactive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ternary {
    False,
    True,
    Unknown,
}

impl Ternary {
    pub fn and(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::False, _) | (_, Ternary::False) => Ternary::False,
            (Ternary::True, Ternary::True) => Ternary::True,
            _ => Ternary::Unknown,
        }
    }

    pub fn not(self) -> Ternary {
        match self {
            Ternary::False => Ternary::True,
            Ternary::True => Ternary::False,
            Ternary::Unknown => Ternary::Unknown,
        }
    }
}

impl From<bool> for Ternary {
    fn from(value: bool) -> Self {
        if value {
            Ternary::True
        } else {
            Ternary::False
        }
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(items))
    }

    pub fn string(text: &str) -> Value {
        Value::String(Arc::from(text))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::new(name))
    }

    pub fn record(fields: Record) -> Value {
        Value::Record(Arc::new(fields))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Num(_) => "number",
            Value::Symbol(_) => "symbol",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) | Value::Module(_) => "record",
            Value::Function(_) | Value::Lambda(_) => "function",
            Value::Reactive(_) => "reactive value",
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_reactive(&self) -> bool {
        matches!(self, Value::Reactive(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Value::Record(_) | Value::Module(_))
    }

    /// Fields of a record or module, in symbol order.
    pub fn fields(&self) -> Option<Vec<(Symbol, Value)>> {
        match self {
            Value::Record(record) => Some(
                record
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
            ),
            Value::Module(module) => Some(module.fields()),
            _ => None,
        }
    }

    pub fn field(&self, name: &Symbol) -> Option<Value> {
        match self {
            Value::Record(record) => record.get(name).cloned(),
            Value::Module(module) => module.field(name),
            _ => None,
        }
    }

    /// Structural equality. Reactive operands compare as `Unknown`.
    pub fn equal(&self, other: &Value) -> Ternary {
        match (self, other) {
            (Value::Reactive(_), _) | (_, Value::Reactive(_)) => Ternary::Unknown,
            (Value::Null, Value::Null) => Ternary::True,
            (Value::Bool(a), Value::Bool(b)) => (a == b).into(),
            (Value::Char(a), Value::Char(b)) => (a == b).into(),
            (Value::Num(a), Value::Num(b)) => (a == b).into(),
            (Value::Symbol(a), Value::Symbol(b)) => (a == b).into(),
            (Value::String(a), Value::String(b)) => (a == b).into(),
            (Value::List(a), Value::List(b)) => {
                if a.len() != b.len() {
                    return Ternary::False;
                }
                let mut result = Ternary::True;
                for (x, y) in a.iter().zip(b.iter()) {
                    result = result.and(x.equal(y));
                    if result == Ternary::False {
                        break;
                    }
                }
                result
            }
            (Value::Function(a), Value::Function(b)) => a.same_as(b).into(),
            (a, b) if a.is_record() && b.is_record() => {
                let (Some(fa), Some(fb)) = (a.fields(), b.fields()) else {
                    return Ternary::False;
                };
                if fa.len() != fb.len() {
                    return Ternary::False;
                }
                let mut result = Ternary::True;
                for ((na, va), (nb, vb)) in fa.iter().zip(fb.iter()) {
                    if na != nb {
                        return Ternary::False;
                    }
                    result = result.and(va.equal(vb));
                    if result == Ternary::False {
                        break;
                    }
                }
                result
            }
            _ => Ternary::False,
        }
    }
}

fn write_string(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in text.chars() {
        match ch {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            other => write!(f, "{other}")?,
        }
    }
    write!(f, "\"")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(c) => write_string(f, &c.to_string()),
            Value::Num(v) => write!(f, "{v}"),
            Value::Symbol(name) => write!(f, "#{name}"),
            Value::String(text) => write_string(f, text),
            Value::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Record(_) | Value::Module(_) => {
                write!(f, "{{")?;
                for (idx, (name, value)) in self.fields().unwrap_or_default().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{name}:{value}")?;
                }
                write!(f, "}}")
            }
            Value::Function(function) => write!(f, "{function}"),
            Value::Lambda(_) => write!(f, "<function>"),
            Value::Reactive(reactive) => write!(f, "<reactive {}>", reactive.ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(items: &[f64]) -> Value {
        Value::list(items.iter().map(|n| Value::Num(*n)).collect())
    }

    #[test]
    fn records_print_in_symbol_order() {
        let mut fields = Record::new();
        fields.insert(Symbol::new("b"), Value::Num(2.0));
        fields.insert(Symbol::new("a"), nums(&[1.0, 0.5]));
        assert_eq!(Value::record(fields).to_string(), "{a:[1,0.5],b:2}");
        assert_eq!(Value::string("a\"b").to_string(), r#""a\"b""#);
        assert_eq!(Value::symbol("x").to_string(), "#x");
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(nums(&[1.0, 2.0]).equal(&nums(&[1.0, 2.0])), Ternary::True);
        assert_eq!(nums(&[1.0, 2.0]).equal(&nums(&[1.0])), Ternary::False);
        assert_eq!(Value::Num(1.0).equal(&Value::Bool(true)), Ternary::False);
    }

    #[test]
    fn ternary_logic() {
        assert_eq!(Ternary::Unknown.and(Ternary::False), Ternary::False);
        assert_eq!(Ternary::Unknown.and(Ternary::True), Ternary::Unknown);
        assert_eq!(Ternary::Unknown.not(), Ternary::Unknown);
    }
}
