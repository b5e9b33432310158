//! Element sets, per-element fields and edge sets.

use rustc_hash::FxHashMap;
use tangle_intern::Symbol;

use crate::GraphError;

/// A handle to one element of a [`Set`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementRef(u32);

impl ElementRef {
    /// The element's position within its set.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

enum FieldData {
    Float(Vec<f64>),
    Int(Vec<i64>),
}

impl FieldData {
    fn grow(&mut self) {
        match self {
            Self::Float(v) => v.push(0.0),
            Self::Int(v) => v.push(0),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Int(_) => "int",
        }
    }
}

/// A set of elements with typed scalar fields.
///
/// Fields are declared before elements are added; every element carries one
/// component per field, zero-initialized.
pub struct Set {
    name: Symbol,
    len: u32,
    fields: Vec<FieldData>,
    field_names: FxHashMap<Symbol, usize>,
}

impl Set {
    /// Create an empty set.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Symbol::intern(name),
            len: 0,
            fields: Vec::new(),
            field_names: FxHashMap::default(),
        }
    }

    /// The set's name.
    #[must_use]
    pub fn name(&self) -> Symbol {
        self.name
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Check whether the set has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Declare a float field. Existing elements get zeroes.
    pub fn add_float_field(&mut self, name: &str) {
        self.add_field(name, FieldData::Float(vec![0.0; self.len()]));
    }

    /// Declare an int field. Existing elements get zeroes.
    pub fn add_int_field(&mut self, name: &str) {
        self.add_field(name, FieldData::Int(vec![0; self.len()]));
    }

    fn add_field(&mut self, name: &str, data: FieldData) {
        let name = Symbol::intern(name);
        if self.field_names.contains_key(&name) {
            return;
        }
        self.field_names.insert(name, self.fields.len());
        self.fields.push(data);
    }

    /// Add an element, zero-initializing its fields.
    pub fn add_element(&mut self) -> ElementRef {
        let handle = ElementRef(self.len);
        self.len += 1;
        for field in &mut self.fields {
            field.grow();
        }
        handle
    }

    fn check_element(&self, element: ElementRef) -> Result<usize, GraphError> {
        if element.index() < self.len() {
            Ok(element.index())
        } else {
            Err(GraphError::InvalidElement {
                set: self.name.as_str().to_string(),
                element: element.0,
                len: self.len(),
            })
        }
    }

    fn field(&self, name: &str) -> Result<&FieldData, GraphError> {
        self.field_names
            .get(&Symbol::intern(name))
            .map(|&i| &self.fields[i])
            .ok_or_else(|| GraphError::UnknownField {
                set: self.name.as_str().to_string(),
                field: name.to_string(),
            })
    }

    fn field_mut(&mut self, name: &str) -> Result<&mut FieldData, GraphError> {
        let Some(&i) = self.field_names.get(&Symbol::intern(name)) else {
            return Err(GraphError::UnknownField {
                set: self.name.as_str().to_string(),
                field: name.to_string(),
            });
        };
        Ok(&mut self.fields[i])
    }

    /// Write a float component.
    pub fn set_float(
        &mut self,
        field: &str,
        element: ElementRef,
        value: f64,
    ) -> Result<(), GraphError> {
        let at = self.check_element(element)?;
        match self.field_mut(field)? {
            FieldData::Float(v) => {
                v[at] = value;
                Ok(())
            }
            other => Err(GraphError::FieldTypeMismatch {
                field: field.to_string(),
                actual: other.type_name(),
                requested: "float",
            }),
        }
    }

    /// Read a float component.
    pub fn float(&self, field: &str, element: ElementRef) -> Result<f64, GraphError> {
        let at = self.check_element(element)?;
        match self.field(field)? {
            FieldData::Float(v) => Ok(v[at]),
            other => Err(GraphError::FieldTypeMismatch {
                field: field.to_string(),
                actual: other.type_name(),
                requested: "float",
            }),
        }
    }

    /// The whole float field, one component per element.
    pub fn float_field(&self, field: &str) -> Result<&[f64], GraphError> {
        match self.field(field)? {
            FieldData::Float(v) => Ok(v),
            other => Err(GraphError::FieldTypeMismatch {
                field: field.to_string(),
                actual: other.type_name(),
                requested: "float",
            }),
        }
    }

    /// Write an int component.
    pub fn set_int(
        &mut self,
        field: &str,
        element: ElementRef,
        value: i64,
    ) -> Result<(), GraphError> {
        let at = self.check_element(element)?;
        match self.field_mut(field)? {
            FieldData::Int(v) => {
                v[at] = value;
                Ok(())
            }
            other => Err(GraphError::FieldTypeMismatch {
                field: field.to_string(),
                actual: other.type_name(),
                requested: "int",
            }),
        }
    }

    /// The whole int field, one component per element.
    pub fn int_field(&self, field: &str) -> Result<&[i64], GraphError> {
        match self.field(field)? {
            FieldData::Int(v) => Ok(v),
            other => Err(GraphError::FieldTypeMismatch {
                field: field.to_string(),
                actual: other.type_name(),
                requested: "int",
            }),
        }
    }

    /// Iterate element handles in insertion order.
    pub fn elements(&self) -> impl Iterator<Item = ElementRef> {
        (0..self.len).map(ElementRef)
    }
}

/// A set whose elements each connect a fixed number of endpoints in a
/// target set (e.g. springs over points).
pub struct EdgeSet {
    set: Set,
    arity: usize,
    endpoints: Vec<u32>,
}

impl EdgeSet {
    /// Create an empty edge set whose edges have `arity` endpoints.
    #[must_use]
    pub fn new(name: &str, arity: usize) -> Self {
        Self {
            set: Set::new(name),
            arity,
            endpoints: Vec::new(),
        }
    }

    /// The underlying element set (fields, length, handles).
    #[must_use]
    pub fn set(&self) -> &Set {
        &self.set
    }

    /// Mutable access to the underlying element set.
    pub fn set_mut(&mut self) -> &mut Set {
        &mut self.set
    }

    /// Endpoints per edge.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Add an edge over the given endpoint elements.
    pub fn add_edge(&mut self, endpoints: &[ElementRef]) -> Result<ElementRef, GraphError> {
        if endpoints.len() != self.arity {
            return Err(GraphError::ArityMismatch {
                set: self.set.name().as_str().to_string(),
                expected: self.arity,
                got: endpoints.len(),
            });
        }
        let edge = self.set.add_element();
        self.endpoints
            .extend(endpoints.iter().map(|e| e.index() as u32));
        Ok(edge)
    }

    /// The endpoints of one edge, in declaration order.
    pub fn endpoints(&self, edge: ElementRef) -> Result<&[u32], GraphError> {
        let at = self.set.check_element(edge)?;
        Ok(&self.endpoints[at * self.arity..(at + 1) * self.arity])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_grow_with_elements() {
        let mut points = Set::new("points");
        points.add_float_field("a");
        let p0 = points.add_element();
        let p1 = points.add_element();

        points.set_float("a", p0, 1.5).unwrap();
        assert_eq!(points.float("a", p0).unwrap(), 1.5);
        assert_eq!(points.float("a", p1).unwrap(), 0.0);
        assert_eq!(points.float_field("a").unwrap(), &[1.5, 0.0]);
    }

    #[test]
    fn unknown_field_and_type_mismatch_error() {
        let mut points = Set::new("points");
        points.add_int_field("id");
        let p = points.add_element();

        assert!(matches!(
            points.float("a", p),
            Err(GraphError::UnknownField { .. })
        ));
        assert!(matches!(
            points.set_float("id", p, 1.0),
            Err(GraphError::FieldTypeMismatch { .. })
        ));
    }

    #[test]
    fn edges_record_their_endpoints() {
        let mut points = Set::new("points");
        let p0 = points.add_element();
        let p1 = points.add_element();
        let p2 = points.add_element();

        let mut springs = EdgeSet::new("springs", 2);
        let s0 = springs.add_edge(&[p0, p1]).unwrap();
        let s1 = springs.add_edge(&[p1, p2]).unwrap();

        assert_eq!(springs.endpoints(s0).unwrap(), &[0, 1]);
        assert_eq!(springs.endpoints(s1).unwrap(), &[1, 2]);
        assert!(matches!(
            springs.add_edge(&[p0]),
            Err(GraphError::ArityMismatch { .. })
        ));
    }
}
