use crate::{config::Target, runtime::value::Value};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScBase {
    Error,
    Bool,
    /// 32 booleans packed into an unsigned integer.
    Bool32,
    Num,
}

/// A shape compiler type: a scalar, vector or matrix over `base`, optionally
/// wrapped in array dimensions (outermost first).
///
/// `dim1` is the vector length and `dim2` the number of matrix columns; a
/// scalar has both set to 1.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScType {
    pub base: ScBase,
    pub dim1: u32,
    pub dim2: u32,
    pub array: Vec<u32>,
}

impl ScType {
    fn plain(base: ScBase, dim1: u32, dim2: u32) -> Self {
        Self {
            base,
            dim1,
            dim2,
            array: Vec::new(),
        }
    }

    pub fn error() -> Self {
        Self::plain(ScBase::Error, 1, 1)
    }

    pub fn num() -> Self {
        Self::plain(ScBase::Num, 1, 1)
    }

    pub fn bool() -> Self {
        Self::plain(ScBase::Bool, 1, 1)
    }

    pub fn vec(n: u32) -> Self {
        Self::plain(ScBase::Num, n, 1)
    }

    pub fn bvec(n: u32) -> Self {
        Self::plain(ScBase::Bool, n, 1)
    }

    pub fn mat(n: u32) -> Self {
        Self::plain(ScBase::Num, n, n)
    }

    pub fn array_of(elem: &ScType, count: u32) -> Self {
        let mut ty = elem.clone();
        ty.array.insert(0, count);
        ty
    }

    pub fn is_error(&self) -> bool {
        self.base == ScBase::Error
    }

    pub fn is_array(&self) -> bool {
        !self.array.is_empty()
    }

    pub fn is_scalar(&self) -> bool {
        self.array.is_empty() && self.dim1 == 1 && self.dim2 == 1
    }

    pub fn is_num(&self) -> bool {
        self.base == ScBase::Num && self.is_scalar()
    }

    pub fn is_bool(&self) -> bool {
        self.base == ScBase::Bool && self.is_scalar()
    }

    pub fn is_vec(&self) -> bool {
        self.array.is_empty() && self.dim1 > 1 && self.dim2 == 1
    }

    pub fn is_mat(&self) -> bool {
        self.array.is_empty() && self.dim2 > 1
    }

    /// Number-like types that may be broadcast and combined arithmetically.
    pub fn is_plex(&self) -> bool {
        self.base == ScBase::Num
    }

    pub fn rank(&self) -> usize {
        let inner = if self.dim2 > 1 {
            2
        } else if self.dim1 > 1 {
            1
        } else {
            0
        };
        self.array.len() + inner
    }

    /// Number of elements along the outermost dimension.
    pub fn count(&self) -> u32 {
        if let Some(first) = self.array.first() {
            *first
        } else if self.dim2 > 1 {
            self.dim2
        } else {
            self.dim1
        }
    }

    /// The type of `x.[i]`.
    pub fn elem(&self) -> ScType {
        if self.is_array() {
            let mut ty = self.clone();
            ty.array.remove(0);
            ty
        } else if self.dim2 > 1 {
            Self::plain(self.base, self.dim1, 1)
        } else if self.dim1 > 1 {
            Self::plain(self.base, 1, 1)
        } else {
            Self::error()
        }
    }

    /// Total number of scalar-or-vector elements in the flattened array storage.
    pub fn flat_len(&self) -> u32 {
        self.array.iter().product()
    }

    fn inner_name(&self, target: Target) -> String {
        let prefix = match target {
            Target::Glsl => "",
            Target::Cpp => "glm::",
        };
        match self.base {
            ScBase::Error => "error".into(),
            ScBase::Bool32 => match target {
                Target::Glsl => "uint".into(),
                Target::Cpp => "unsigned".into(),
            },
            ScBase::Bool if self.dim1 > 1 => format!("{prefix}bvec{}", self.dim1),
            ScBase::Bool => "bool".into(),
            ScBase::Num if self.dim2 > 1 => format!("{prefix}mat{}", self.dim2),
            ScBase::Num if self.dim1 > 1 => format!("{prefix}vec{}", self.dim1),
            ScBase::Num => "float".into(),
        }
    }

    /// The target spelling; multi-dimensional arrays are flattened.
    pub fn name(&self, target: Target) -> String {
        let inner = self.inner_name(target);
        if self.is_array() {
            format!("{inner}[{}]", self.flat_len())
        } else {
            inner
        }
    }

    /// True if a value of this type converts to `target` by broadcasting or by
    /// extending each element.
    pub fn extends_to(&self, target: &ScType) -> bool {
        if self == target {
            return true;
        }
        if !self.is_plex() || !target.is_plex() || self.rank() >= target.rank() {
            return false;
        }
        if self.is_num() {
            return true;
        }
        if self.is_vec() && target.is_mat() {
            return self.dim1 == target.dim1;
        }
        target.is_array() && self.extends_to(&target.elem())
    }

    /// The common type of two arithmetic operands.
    pub fn unify_plex(a: &ScType, b: &ScType) -> Option<ScType> {
        if a.extends_to(b) {
            Some(b.clone())
        } else if b.extends_to(a) {
            Some(a.clone())
        } else {
            None
        }
    }

    /// Infers the type of a value, if it is representable.
    pub fn of_value(value: &Value) -> Option<ScType> {
        match value {
            Value::Num(_) => Some(Self::num()),
            Value::Bool(_) => Some(Self::bool()),
            Value::Reactive(reactive) => Some(reactive.ty.clone()),
            Value::List(items) => {
                let first = Self::of_value(items.first()?)?;
                if items.iter().skip(1).any(|item| Self::of_value(item).as_ref() != Some(&first)) {
                    return None;
                }
                let n = u32::try_from(items.len()).ok()?;
                if first.is_num() && (2..=4).contains(&n) {
                    Some(Self::vec(n))
                } else if first.is_bool() && (2..=4).contains(&n) {
                    Some(Self::bvec(n))
                } else if first.is_vec() && first.dim1 == n {
                    Some(Self::mat(n))
                } else if first.is_error() {
                    None
                } else {
                    Some(Self::array_of(&first, n))
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for ScType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner_name(Target::Glsl))?;
        for dim in &self.array {
            write!(f, "[{dim}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(items: &[f64]) -> Value {
        Value::list(items.iter().map(|n| Value::Num(*n)).collect())
    }

    #[test]
    fn infers_vectors_matrices_and_arrays() {
        assert_eq!(ScType::of_value(&nums(&[1.0, 2.0, 3.0])), Some(ScType::vec(3)));
        let mat = Value::list(vec![nums(&[1.0, 0.0]), nums(&[0.0, 1.0])]);
        assert_eq!(ScType::of_value(&mat), Some(ScType::mat(2)));
        let arr = ScType::of_value(&nums(&[1.0, 2.0, 3.0, 4.0, 5.0])).expect("array");
        assert_eq!(arr.name(Target::Glsl), "float[5]");
        assert_eq!(arr.count(), 5);
        assert_eq!(ScType::of_value(&Value::list(vec![])), None);
    }

    #[test]
    fn scalars_broadcast_to_vectors() {
        let ty = ScType::unify_plex(&ScType::num(), &ScType::vec(3));
        assert_eq!(ty, Some(ScType::vec(3)));
        assert_eq!(ScType::unify_plex(&ScType::vec(2), &ScType::vec(3)), None);
        assert_eq!(
            ScType::unify_plex(&ScType::vec(3), &ScType::mat(3)),
            Some(ScType::mat(3))
        );
    }

    #[test]
    fn names_follow_the_target() {
        assert_eq!(ScType::vec(3).name(Target::Cpp), "glm::vec3");
        assert_eq!(ScType::mat(4).name(Target::Glsl), "mat4");
        assert_eq!(ScType::bvec(2).to_string(), "bvec2");
        assert_eq!(ScType::mat(3).elem(), ScType::vec(3));
        assert_eq!(ScType::mat(3).rank(), 2);
        let packed = ScType {
            base: ScBase::Bool32,
            ..ScType::num()
        };
        assert_eq!(packed.name(Target::Glsl), "uint");
        assert_eq!(packed.name(Target::Cpp), "unsigned");
    }
}
