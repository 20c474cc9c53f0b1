//! Individuals and the parameter codec
//! ---
//!
//! An optimizee describes a candidate solution as a set of named parameters,
//! each either a scalar or an n-dimensional array.  The optimizers work on flat
//! `f64` vectors instead, so a `ParamSpec` fixes the order and shape of every
//! field and converts between the two representations.
extern crate hashbrown;

use std::fmt;
use std::iter::FromIterator;

use self::hashbrown::HashMap;

use crate::error::{LtlError, Result};

/// Shape of a single named parameter
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// A single value
    Scalar,
    /// Row-major array with the given dimensions
    Array(Vec<usize>),
}

impl Shape {
    /// Number of values the shape occupies once flattened
    pub fn size(&self) -> usize {
        match self {
            Shape::Scalar => 1,
            Shape::Array(dims) => dims.iter().product(),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Shape::Scalar => write!(f, "scalar"),
            Shape::Array(dims) => write!(f, "{:?}", dims),
        }
    }
}

/// Value of a single named parameter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// A single value
    Scalar(f64),
    /// Row-major array
    Array {
        /// Dimensions of the array
        shape: Vec<usize>,
        /// Values, `shape.iter().product()` of them
        values: Vec<f64>,
    },
}

impl ParamValue {
    /// One dimensional array
    pub fn vector(values: Vec<f64>) -> Self {
        ParamValue::Array {
            shape: vec![values.len()],
            values: values,
        }
    }

    /// Array with an explicit shape.  Fails when the number of values does not
    /// match the shape.
    pub fn array(shape: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(LtlError::shape(
                "array",
                format!("{} values for {:?}", expected, shape),
                format!("{} values", values.len()),
            ));
        }
        Ok(ParamValue::Array {
            shape: shape,
            values: values,
        })
    }

    /// Shape of the value
    pub fn shape(&self) -> Shape {
        match self {
            ParamValue::Scalar(_) => Shape::Scalar,
            ParamValue::Array { shape, .. } => Shape::Array(shape.clone()),
        }
    }

    /// Values in row-major order
    pub fn values(&self) -> &[f64] {
        match self {
            ParamValue::Scalar(v) => std::slice::from_ref(v),
            ParamValue::Array { values, .. } => values,
        }
    }

    /// Mutable values in row-major order
    pub fn values_mut(&mut self) -> &mut [f64] {
        match self {
            ParamValue::Scalar(v) => std::slice::from_mut(v),
            ParamValue::Array { values, .. } => values,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Scalar(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::vector(v)
    }
}

/// One candidate parameter assignment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    params: HashMap<String, ParamValue>,
}

impl Individual {
    /// Returns an empty individual
    pub fn new() -> Self {
        Individual {
            params: HashMap::new(),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a parameter, returning the previous value if any
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Option<ParamValue> {
        self.params.insert(name.into(), value.into())
    }

    #[inline]
    /// Gets a parameter
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    #[inline]
    /// Gets a parameter mutably
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ParamValue> {
        self.params.get_mut(name)
    }

    /// Number of named parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True when no parameters are set
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates over the parameters in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.params.iter()
    }
}

impl FromIterator<(String, ParamValue)> for Individual {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Individual {
            params: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut data: Vec<(&String, &[f64])> =
            self.params.iter().map(|(k, v)| (k, v.values())).collect();
        data.sort_by_key(|(k, _v)| *k);
        write!(f, "{:?}", data)
    }
}

/// Ordered description of the fields of an individual.
///
/// The order is fixed at construction, so `flatten` and `unflatten` always
/// agree on where each field lives within the flat vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    fields: Vec<(String, Shape)>,
    size: usize,
}

impl ParamSpec {
    /// Creates a spec from an explicit field order.  Field names must be unique.
    pub fn new(fields: Vec<(String, Shape)>) -> Result<Self> {
        for (i, (name, _)) in fields.iter().enumerate() {
            if fields[..i].iter().any(|(other, _)| other == name) {
                return Err(LtlError::config(format!(
                    "parameter '{}' appears twice in the spec",
                    name
                )));
            }
        }
        let size = fields.iter().map(|(_, s)| s.size()).sum();
        Ok(ParamSpec {
            fields: fields,
            size: size,
        })
    }

    /// Derives a spec from a template individual, ordering fields by name.
    pub fn from_individual(individual: &Individual) -> Self {
        let mut fields: Vec<(String, Shape)> = individual
            .iter()
            .map(|(name, value)| (name.clone(), value.shape()))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        let size = fields.iter().map(|(_, s)| s.size()).sum();
        ParamSpec {
            fields: fields,
            size: size,
        }
    }

    /// Length of the flattened vector
    pub fn len(&self) -> usize {
        self.size
    }

    /// True when the spec has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in encoding order
    pub fn fields(&self) -> &[(String, Shape)] {
        &self.fields
    }

    /// Encodes an individual into a flat vector
    pub fn flatten(&self, individual: &Individual) -> Result<Vec<f64>> {
        if individual.len() != self.fields.len() {
            let unknown = individual
                .iter()
                .map(|(name, _)| name)
                .find(|name| !self.fields.iter().any(|(f, _)| f == *name));
            if let Some(name) = unknown {
                return Err(LtlError::shape(name.as_str(), "absent", "present"));
            }
        }

        let mut out = Vec::with_capacity(self.size);
        for (name, shape) in self.fields.iter() {
            let value = individual
                .get(name)
                .ok_or_else(|| LtlError::shape(name.as_str(), shape, "missing"))?;
            let actual = value.shape();
            if actual != *shape {
                return Err(LtlError::shape(name.as_str(), shape, actual));
            }
            out.extend_from_slice(value.values());
        }
        Ok(out)
    }

    /// Decodes a flat vector back into an individual
    pub fn unflatten(&self, values: &[f64]) -> Result<Individual> {
        if values.len() != self.size {
            return Err(LtlError::shape(
                "<vector>",
                format!("{} values", self.size),
                format!("{} values", values.len()),
            ));
        }

        let mut offset = 0;
        let mut individual = Individual::new();
        for (name, shape) in self.fields.iter() {
            let n = shape.size();
            let chunk = &values[offset..offset + n];
            let value = match shape {
                Shape::Scalar => ParamValue::Scalar(chunk[0]),
                Shape::Array(dims) => ParamValue::Array {
                    shape: dims.clone(),
                    values: chunk.to_vec(),
                },
            };
            individual.insert(name.clone(), value);
            offset += n;
        }
        Ok(individual)
    }
}

/// Encodes `individual` under `spec`.
pub fn flatten(individual: &Individual, spec: &ParamSpec) -> Result<Vec<f64>> {
    spec.flatten(individual)
}

/// Decodes `values` under `spec`.
pub fn unflatten(values: &[f64], spec: &ParamSpec) -> Result<Individual> {
    spec.unflatten(values)
}
