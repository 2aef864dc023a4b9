//! Recognises a shape among evaluated values and exports it through the
//! shape compiler.

use crate::{
    config::Target,
    error::{Exception, LangResult},
    language::span::Location,
    runtime::value::{Symbol, Value},
    sc,
    system::System,
};
use std::fmt;
use tracing::debug;

const FIELDS: [&str; 5] = ["is_2d", "is_3d", "bbox", "dist", "colour"];

/// Axis-aligned bounds. Components that are not known numbers are unbounded.
#[derive(Clone, Debug, PartialEq)]
pub struct BBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.min;
        let [x, y, z] = self.max;
        write!(f, "[[{a}, {b}, {c}], [{x}, {y}, {z}]]")
    }
}

/// A record with the fields `is_2d`, `is_3d`, `bbox`, `dist` and `colour`.
pub struct ShapeProgram {
    pub is_2d: bool,
    pub is_3d: bool,
    pub bbox: BBox,
    pub dist: Value,
    pub colour: Value,
    loc: Location,
}

fn corner(value: &Value, unbounded: f64, loc: &Location) -> LangResult<[f64; 3]> {
    let items = value
        .as_list()
        .filter(|items| items.len() == 2 || items.len() == 3)
        .ok_or_else(|| Exception::domain(format!("bbox corner {value} is not a 2D or 3D point"), loc))?;
    let mut point = [0.0; 3];
    for (coord, item) in point.iter_mut().zip(items) {
        *coord = match item {
            Value::Num(n) => *n,
            Value::Reactive(_) => unbounded,
            other => return Err(Exception::domain(format!("bbox: {other} is not a number"), loc)),
        };
    }
    Ok(point)
}

impl ShapeProgram {
    /// Returns `None` if `value` is not shaped like a shape at all, and an
    /// error if it has the shape fields but one of them is malformed.
    pub fn recognize(value: &Value, loc: &Location) -> LangResult<Option<Self>> {
        if !value.is_record() {
            return Ok(None);
        }
        let mut fields = Vec::with_capacity(FIELDS.len());
        for name in FIELDS {
            match value.field(&Symbol::new(name)) {
                Some(field) => fields.push(field),
                None => return Ok(None),
            }
        }
        let [is_2d, is_3d, bbox, dist, colour]: [Value; 5] = fields
            .try_into()
            .map_err(|_| Exception::domain("malformed shape", loc))?;
        let flag = |name: &str, value: &Value| match value {
            Value::Bool(b) => Ok(*b),
            other => Err(Exception::domain(
                format!("{name} = {other}: not a boolean"),
                loc,
            )),
        };
        let is_2d = flag("is_2d", &is_2d)?;
        let is_3d = flag("is_3d", &is_3d)?;
        if !is_2d && !is_3d {
            return Err(Exception::domain("a shape must be 2D or 3D", loc));
        }
        let bbox = match bbox.as_list() {
            Some([min, max]) => BBox {
                min: corner(min, f64::NEG_INFINITY, loc)?,
                max: corner(max, f64::INFINITY, loc)?,
            },
            _ => {
                return Err(Exception::domain(
                    format!("bbox = {bbox}: expected [min, max]"),
                    loc,
                ))
            }
        };
        for (name, function) in [("dist", &dist), ("colour", &colour)] {
            if !matches!(function, Value::Function(_)) {
                return Err(Exception::domain(
                    format!("{name} = {function}: not a function"),
                    loc,
                ));
            }
        }
        debug!(is_2d, is_3d, %bbox, "recognised shape");
        Ok(Some(Self {
            is_2d,
            is_3d,
            bbox,
            dist,
            colour,
            loc: loc.clone(),
        }))
    }

    /// The program text defining `dist` and `colour` for `target`.
    pub fn export(&self, system: &System, target: Target) -> LangResult<String> {
        sc::export_shape(system, target, &self.dist, &self.colour, &self.loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SystemConfig,
        error::ErrorKind,
        program::Program,
        system::CaptureSink,
    };
    use std::sync::Arc;

    fn shape_of(text: &str) -> LangResult<Option<ShapeProgram>> {
        let system =
            System::with_sink(SystemConfig::default(), Arc::new(CaptureSink::default())).expect("system");
        let mut program = Program::from_text("test", text, &system);
        program.compile().expect("compile");
        program.shape()
    }

    #[test]
    fn prelude_shapes_are_recognised() {
        let sphere = shape_of("sphere 2").expect("shape").expect("a sphere");
        assert!(sphere.is_3d);
        assert!(!sphere.is_2d);
        assert_eq!(sphere.bbox.min, [-2.0, -2.0, -2.0]);
        assert_eq!(sphere.bbox.max, [2.0, 2.0, 2.0]);

        let moved = shape_of("translate [1, 0, 0] (cube 2)").expect("shape").expect("a cube");
        assert_eq!(moved.bbox.min, [0.0, -1.0, -1.0]);
        assert_eq!(moved.bbox.max, [2.0, 1.0, 1.0]);
    }

    #[test]
    fn union_bounds_cover_both_shapes() {
        let shape = shape_of("union [sphere 1, translate [3, 0, 0] (sphere 1)]")
            .expect("shape")
            .expect("a union");
        assert_eq!(shape.bbox.to_string(), "[[-1, -1, -1], [4, 1, 1]]");
    }

    #[test]
    fn other_values_are_not_shapes() {
        assert!(shape_of("1 + 2").expect("value").is_none());
        assert!(shape_of("{is_2d: true, dist: 1}").expect("value").is_none());
    }

    #[test]
    fn malformed_shapes_are_errors() {
        let text = "{is_2d = 1; is_3d = true; bbox = [[0,0,0],[1,1,1]]; dist p = 0; colour p = [1,1,1]}";
        let err = shape_of(text).err().expect("is_2d must be a boolean");
        assert!(matches!(err.kind, ErrorKind::Domain(_)));
        assert!(err.message().contains("is_2d"));
    }
}
