//! Typed emission of literals, conversions, operators and indexing.

use crate::{
    config::Target,
    error::{ErrorKind, Exception, LangResult},
    language::{
        ast::{BinaryOp, UnaryOp},
        span::Location,
    },
    runtime::value::Value,
    sc::{
        compiler::ScCompiler,
        types::{ScBase, ScType},
        value::{ScFrame, ScItem, ScValue},
    },
};

const COMPONENTS: [&str; 4] = ["x", "y", "z", "w"];

/// Spells a number as a floating point literal of the target language.
pub fn num_literal(n: f64) -> String {
    if n.is_nan() {
        "(0.0/0.0)".into()
    } else if n.is_infinite() {
        if n > 0.0 {
            "(1.0/0.0)".into()
        } else {
            "(-1.0/0.0)".into()
        }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.1}")
    } else {
        format!("{n:?}")
    }
}

/// Wraps anything but a plain name or literal in parentheses.
fn paren(expr: &str) -> String {
    let simple = expr
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if simple {
        expr.to_string()
    } else {
        format!("({expr})")
    }
}

pub fn type_mismatch(left: &ScType, right: &ScType, loc: &Location) -> Exception {
    Exception::at(
        ErrorKind::TypeMismatch {
            left: left.to_string(),
            right: right.to_string(),
        },
        loc,
    )
}

pub fn not_supported(what: impl Into<String>, loc: &Location) -> Exception {
    Exception::at(ErrorKind::NotSupported { what: what.into() }, loc)
}

fn static_index(n: f64, count: u32, loc: &Location) -> LangResult<u32> {
    if n.fract() != 0.0 || n < 0.0 || n >= f64::from(count) {
        return Err(Exception::domain(
            format!("index {n} is out of range 0..<{count}"),
            loc,
        ));
    }
    Ok(n as u32)
}

impl ScCompiler<'_> {
    pub fn type_name(&self, ty: &ScType) -> String {
        ty.name(self.target())
    }

    /// A call spelled for the target: `length(v)` or `glm::length(v)`.
    pub(crate) fn math(&self, name: &str, args: &[&ScValue]) -> String {
        let args: Vec<&str> = args.iter().map(|a| a.expr.as_str()).collect();
        match self.target() {
            Target::Glsl => format!("{name}({})", args.join(", ")),
            Target::Cpp => format!("glm::{name}({})", args.join(", ")),
        }
    }

    fn construct(&self, ty: &ScType, args: &[String]) -> String {
        format!("{}({})", self.type_name(ty), args.join(", "))
    }

    /// The `i`th element of a vector, matrix or one-dimensional array.
    pub(crate) fn element(&self, value: &ScValue, i: u32) -> ScValue {
        let ty = value.ty.elem();
        if value.ty.is_vec() {
            ScValue::new(format!("{}.{}", paren(&value.expr), COMPONENTS[i as usize]), ty)
        } else {
            ScValue::new(format!("{}[{i}]", paren(&value.expr)), ty)
        }
    }

    /// Converts a compile-time value into a literal expression.
    pub fn value_to_sc(&mut self, value: &Value, loc: &Location) -> LangResult<ScValue> {
        match value {
            Value::Num(n) => Ok(ScValue::new(num_literal(*n), ScType::num())),
            Value::Bool(b) => Ok(ScValue::new(b.to_string(), ScType::bool())),
            Value::Reactive(reactive) => self.sc_eval(&reactive.op, &mut ScFrame::empty()),
            Value::List(items) => {
                if let Some(ty) = ScType::of_value(value).filter(|ty| ty.array.len() > 1) {
                    if self.target() == Target::Cpp {
                        return Err(not_supported("arrays in C++ output", loc));
                    }
                    let mut leaves = Vec::new();
                    flatten_rows(value, ty.array.len(), &mut leaves);
                    let args = leaves
                        .into_iter()
                        .map(|leaf| self.value_to_sc(leaf, loc).map(|leaf| leaf.expr))
                        .collect::<LangResult<Vec<_>>>()?;
                    return Ok(ScValue::new(self.construct(&ty, &args), ty));
                }
                let elements = items
                    .iter()
                    .map(|item| self.value_to_sc(item, loc))
                    .collect::<LangResult<Vec<_>>>()?;
                self.list_expr(elements, loc)
            }
            other => Err(not_supported(format!("{} value {other}", other.type_name()), loc)),
        }
    }

    /// Builds a vector, matrix or array from its elements without emitting.
    pub fn list_expr(&mut self, elements: Vec<ScValue>, loc: &Location) -> LangResult<ScValue> {
        let Some(first) = elements.first() else {
            return Err(not_supported("empty list", loc));
        };
        let elem = first.ty.clone();
        if let Some(other) = elements.iter().find(|e| e.ty != elem) {
            return Err(type_mismatch(&elem, &other.ty, loc));
        }
        let n = u32::try_from(elements.len()).map_err(|_| not_supported("huge list", loc))?;
        let ty = if elem.is_num() && (2..=4).contains(&n) {
            ScType::vec(n)
        } else if elem.is_bool() && (2..=4).contains(&n) {
            ScType::bvec(n)
        } else if elem.is_vec() && elem.base == ScBase::Num && elem.dim1 == n {
            ScType::mat(n)
        } else {
            if self.target() == Target::Cpp {
                return Err(not_supported("arrays in C++ output", loc));
            }
            ScType::array_of(&elem, n)
        };
        // arrays are stored flattened, so nested arrays contribute their elements
        let args: Vec<String> = if elem.is_array() {
            elements
                .iter()
                .flat_map(|e| (0..elem.flat_len()).map(move |i| format!("{}[{i}]", paren(&e.expr))))
                .collect()
        } else {
            elements.into_iter().map(|e| e.expr).collect()
        };
        Ok(ScValue::new(self.construct(&ty, &args), ty))
    }

    /// Broadcasts or extends `value` to `ty`, if that is possible.
    pub fn sc_try_extend(&self, value: &ScValue, ty: &ScType) -> Option<ScValue> {
        if value.ty == *ty {
            return Some(value.clone());
        }
        if !value.ty.extends_to(ty) {
            return None;
        }
        if ty.is_array() {
            let mut base = ty.clone();
            base.array.clear();
            let elem = self.sc_try_extend(value, &base)?;
            let args = vec![elem.expr; ty.flat_len() as usize];
            return Some(ScValue::new(self.construct(ty, &args), ty.clone()));
        }
        let column = ScType::vec(ty.dim1);
        let expr = if ty.is_vec() {
            self.construct(ty, &[value.expr.clone()])
        } else if value.ty.is_num() {
            let col = self.construct(&column, &[value.expr.clone()]);
            self.construct(ty, &vec![col; ty.dim2 as usize])
        } else {
            // a vector spreads one component over each column
            let cols: Vec<String> = (0..ty.dim2)
                .map(|i| {
                    let c = self.element(value, i);
                    self.construct(&column, &[c.expr])
                })
                .collect();
            self.construct(ty, &cols)
        };
        Some(ScValue::new(expr, ty.clone()))
    }

    pub fn sc_try_unify(&self, a: &ScValue, b: &ScValue) -> Option<(ScValue, ScValue)> {
        let ty = ScType::unify_plex(&a.ty, &b.ty)?;
        Some((self.sc_try_extend(a, &ty)?, self.sc_try_extend(b, &ty)?))
    }

    /// Converts two arithmetic operands to their common type.
    pub fn sc_plex_unify(
        &self,
        a: &ScValue,
        b: &ScValue,
        loc: &Location,
    ) -> LangResult<(ScValue, ScValue)> {
        if !a.ty.is_plex() || !b.ty.is_plex() {
            return Err(type_mismatch(&a.ty, &b.ty, loc));
        }
        self.sc_try_unify(a, b)
            .ok_or_else(|| type_mismatch(&a.ty, &b.ty, loc))
    }

    fn arith_expr(&self, op: BinaryOp, a: &ScValue, b: &ScValue) -> String {
        let ty = &a.ty;
        if ty.is_array() {
            let mut base = ty.clone();
            base.array.clear();
            let args: Vec<String> = (0..ty.flat_len())
                .map(|i| {
                    let x = ScValue::new(format!("{}[{i}]", paren(&a.expr)), base.clone());
                    let y = ScValue::new(format!("{}[{i}]", paren(&b.expr)), base.clone());
                    self.arith_expr(op, &x, &y)
                })
                .collect();
            return self.construct(ty, &args);
        }
        match op {
            BinaryOp::Pow => self.math("pow", &[a, b]),
            BinaryOp::Mul if ty.is_mat() => self.math("matrixCompMult", &[a, b]),
            _ => format!("{} {} {}", paren(&a.expr), op.symbol(), paren(&b.expr)),
        }
    }

    pub fn sc_binary(
        &mut self,
        op: BinaryOp,
        a: &ScValue,
        b: &ScValue,
        loc: &Location,
    ) -> LangResult<ScValue> {
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => {
                let (a, b) = self.sc_plex_unify(a, b, loc)?;
                let expr = self.arith_expr(op, &a, &b);
                Ok(self.emit(a.ty.clone(), expr))
            }
            BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
                if !a.ty.is_num() || !b.ty.is_num() {
                    return Err(Exception::domain(
                        format!(
                            "{} {} {}: relational operators need numbers",
                            a.ty,
                            op.symbol(),
                            b.ty
                        ),
                        loc,
                    ));
                }
                let expr = format!("{} {} {}", paren(&a.expr), op.symbol(), paren(&b.expr));
                Ok(self.emit(ScType::bool(), expr))
            }
            BinaryOp::Equal | BinaryOp::NotEqual => {
                let (a, b) = if a.ty == b.ty {
                    (a.clone(), b.clone())
                } else {
                    self.sc_plex_unify(a, b, loc)?
                };
                let expr = format!("{} {} {}", paren(&a.expr), op.symbol(), paren(&b.expr));
                Ok(self.emit(ScType::bool(), expr))
            }
            BinaryOp::And | BinaryOp::Or => {
                if !a.ty.is_bool() || !b.ty.is_bool() {
                    return Err(type_mismatch(&a.ty, &b.ty, loc));
                }
                let expr = format!("{} {} {}", paren(&a.expr), op.symbol(), paren(&b.expr));
                Ok(self.emit(ScType::bool(), expr))
            }
        }
    }

    pub fn sc_unary(&mut self, op: UnaryOp, a: &ScValue, loc: &Location) -> LangResult<ScValue> {
        match op {
            UnaryOp::Pos if a.ty.is_plex() => Ok(a.clone()),
            UnaryOp::Neg if a.ty.is_plex() && !a.ty.is_array() => {
                Ok(self.emit(a.ty.clone(), format!("-{}", paren(&a.expr))))
            }
            UnaryOp::Neg if a.ty.is_plex() => {
                let zero = ScValue::new("0.0", ScType::num());
                self.sc_binary(BinaryOp::Sub, &zero, a, loc)
            }
            UnaryOp::Not if a.ty.is_bool() => {
                Ok(self.emit(ScType::bool(), format!("!{}", paren(&a.expr))))
            }
            _ => Err(Exception::domain(
                format!("{}{}: domain error", op.symbol(), a.ty),
                loc,
            )),
        }
    }

    /// `base.[index]` where the index is known or computed at run time.
    pub fn sc_index(&mut self, base: &ScValue, index: &ScItem, loc: &Location) -> LangResult<ScValue> {
        if base.ty.is_scalar() {
            return Err(Exception::domain(format!("{}: cannot index", base.ty), loc));
        }
        let count = base.ty.count();
        match index {
            ScItem::Const(Value::Num(n)) => {
                let i = static_index(*n, count, loc)?;
                self.flat_element(base, i, loc)
            }
            ScItem::Const(Value::List(indices)) => {
                let picked = indices
                    .iter()
                    .map(|i| match i {
                        Value::Num(n) => static_index(*n, count, loc),
                        other => Err(Exception::domain(format!("{other}: not an index"), loc)),
                    })
                    .collect::<LangResult<Vec<_>>>()?;
                if base.ty.is_vec() && (2..=4).contains(&picked.len()) {
                    let ty = ScType::vec(picked.len() as u32);
                    let expr = match self.target() {
                        Target::Glsl => {
                            let swizzle: String =
                                picked.iter().map(|&i| COMPONENTS[i as usize]).collect();
                            format!("{}.{swizzle}", paren(&base.expr))
                        }
                        Target::Cpp => {
                            let args: Vec<String> =
                                picked.iter().map(|&i| self.element(base, i).expr).collect();
                            self.construct(&ty, &args)
                        }
                    };
                    return Ok(self.emit(ty, expr));
                }
                let elements = picked
                    .iter()
                    .map(|&i| self.flat_element(base, i, loc))
                    .collect::<LangResult<Vec<_>>>()?;
                let gathered = self.list_expr(elements, loc)?;
                Ok(self.emit(gathered.ty, gathered.expr))
            }
            ScItem::Value(i) if i.ty.is_num() => {
                if base.ty.array.len() > 1 {
                    return self.flat_index(base, std::slice::from_ref(index), loc);
                }
                let expr = format!("{}[int({})]", paren(&base.expr), i.expr);
                Ok(self.emit(base.ty.elem(), expr))
            }
            ScItem::Const(other) => {
                Err(Exception::domain(format!("{other}: not an index"), loc))
            }
            _ => Err(not_supported("this kind of index", loc)),
        }
    }

    /// `base.[i, j, ...]`: consumes as many leading indices as it can and
    /// returns how many it used. Scalar indices into a nested array combine
    /// into one row-major offset.
    pub fn sc_index_path(
        &mut self,
        base: &ScValue,
        indices: &[ScItem],
        loc: &Location,
    ) -> LangResult<(ScValue, usize)> {
        let Some(first) = indices.first() else {
            return Ok((base.clone(), 0));
        };
        let used = indices
            .iter()
            .take(base.ty.array.len())
            .take_while(|index| is_scalar_index(index))
            .count();
        if base.ty.array.len() < 2 || used == 0 {
            return Ok((self.sc_index(base, first, loc)?, 1));
        }
        Ok((self.flat_index(base, &indices[..used], loc)?, used))
    }

    /// Element `i` of the outermost dimension.
    fn flat_element(&mut self, base: &ScValue, i: u32, loc: &Location) -> LangResult<ScValue> {
        if base.ty.array.len() > 1 {
            return self.flat_index(base, &[ScItem::Const(Value::Num(f64::from(i)))], loc);
        }
        if base.ty.is_array() && self.target() == Target::Cpp {
            return Err(not_supported("arrays in C++ output", loc));
        }
        Ok(self.element(base, i))
    }

    /// Indexes the leading dimensions of a flattened array. A partial index
    /// gathers the remaining sub-array back into an array value.
    fn flat_index(&mut self, base: &ScValue, indices: &[ScItem], loc: &Location) -> LangResult<ScValue> {
        if self.target() == Target::Cpp {
            return Err(not_supported("arrays in C++ output", loc));
        }
        let dims = &base.ty.array;
        if indices.len() > dims.len() {
            return Err(not_supported("too many array indices", loc));
        }
        let mut offset = FlatOffset::default();
        for (depth, index) in indices.iter().enumerate() {
            let stride: u32 = dims[depth + 1..].iter().product();
            match index {
                ScItem::Const(Value::Num(n)) => {
                    offset.constant += static_index(*n, dims[depth], loc)? * stride;
                }
                ScItem::Value(i) if i.ty.is_num() => offset.terms.push(if stride == 1 {
                    format!("int({})", i.expr)
                } else {
                    format!("int({}) * {stride}", i.expr)
                }),
                _ => return Err(not_supported("this kind of index", loc)),
            }
        }
        let mut ty = base.ty.clone();
        ty.array.drain(..indices.len());
        let array = paren(&base.expr);
        if ty.is_array() {
            let args: Vec<String> = (0..ty.flat_len())
                .map(|j| format!("{array}[{}]", offset.at(j)))
                .collect();
            let expr = self.construct(&ty, &args);
            return Ok(self.emit(ty, expr));
        }
        let expr = format!("{array}[{}]", offset.at(0));
        if offset.terms.is_empty() {
            Ok(ScValue::new(expr, ty))
        } else {
            Ok(self.emit(ty, expr))
        }
    }
}

/// Collects the elements `depth` list levels down, in row-major order.
fn flatten_rows<'v>(value: &'v Value, depth: usize, out: &mut Vec<&'v Value>) {
    match value {
        Value::List(items) if depth > 0 => {
            for item in items.iter() {
                flatten_rows(item, depth - 1, out);
            }
        }
        leaf => out.push(leaf),
    }
}

fn is_scalar_index(index: &ScItem) -> bool {
    match index {
        ScItem::Const(value) => matches!(value, Value::Num(_)),
        ScItem::Value(value) => value.ty.is_num(),
        _ => false,
    }
}

/// A row-major position in flattened array storage: `int(i) * stride` terms
/// for run-time indices plus the sum of the constant ones.
#[derive(Default)]
struct FlatOffset {
    terms: Vec<String>,
    constant: u32,
}

impl FlatOffset {
    fn at(&self, extra: u32) -> String {
        let constant = self.constant + extra;
        if self.terms.is_empty() {
            return constant.to_string();
        }
        let mut expr = self.terms.join(" + ");
        if constant > 0 {
            expr.push_str(&format!(" + {constant}"));
        }
        expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_are_floating_point() {
        assert_eq!(num_literal(1.0), "1.0");
        assert_eq!(num_literal(-2.0), "-2.0");
        assert_eq!(num_literal(0.25), "0.25");
        assert_eq!(num_literal(f64::INFINITY), "(1.0/0.0)");
        assert_eq!(num_literal(f64::NEG_INFINITY), "(-1.0/0.0)");
    }

    #[test]
    fn compound_expressions_are_parenthesised() {
        assert_eq!(paren("r3"), "r3");
        assert_eq!(paren("r3.x"), "r3.x");
        assert_eq!(paren("r1 + r2"), "(r1 + r2)");
        assert_eq!(paren("vec3(1.0, 2.0, 3.0)"), "(vec3(1.0, 2.0, 3.0))");
    }

    #[test]
    fn offsets_are_row_major() {
        let offset = FlatOffset {
            terms: vec!["int(r3) * 5".into(), "int(r4)".into()],
            constant: 0,
        };
        assert_eq!(offset.at(0), "int(r3) * 5 + int(r4)");
        assert_eq!(offset.at(2), "int(r3) * 5 + int(r4) + 2");
        let constant = FlatOffset {
            terms: Vec::new(),
            constant: 8,
        };
        assert_eq!(constant.at(0), "8");
    }
}
