//! Search space definitions.
//!
//! A [`SearchSpace`] is an ordered list of named parameters, each with a
//! finite, ordered list of candidate values. Insertion order is significant:
//! grid enumeration walks parameters in the order they were added.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::{HsError, HsResult};

/// A concrete hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A single named dimension of the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name as understood by the trainable (e.g. "learning_rate").
    pub name: String,
    /// Candidate values, in the order they are enumerated.
    pub values: Vec<ParamValue>,
}

/// The full search space. Always holds at least one parameter, and every
/// parameter has at least one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSearchSpace")]
pub struct SearchSpace {
    parameters: Vec<ParameterDef>,
}

#[derive(Deserialize)]
struct RawSearchSpace {
    parameters: Vec<ParameterDef>,
}

impl TryFrom<RawSearchSpace> for SearchSpace {
    type Error = HsError;

    fn try_from(raw: RawSearchSpace) -> HsResult<Self> {
        Self::from_definitions(raw.parameters)
    }
}

impl SearchSpace {
    pub fn builder() -> SearchSpaceBuilder {
        SearchSpaceBuilder::default()
    }

    /// Build a space from `(name, candidates)` pairs, keeping their order.
    pub fn from_pairs<I, K, V, T>(pairs: I) -> HsResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoIterator<Item = T>,
        T: Into<ParamValue>,
    {
        let parameters = pairs
            .into_iter()
            .map(|(name, values)| ParameterDef {
                name: name.into(),
                values: values.into_iter().map(Into::into).collect(),
            })
            .collect();
        Self::from_definitions(parameters)
    }

    fn from_definitions(parameters: Vec<ParameterDef>) -> HsResult<Self> {
        if parameters.is_empty() {
            return Err(HsError::Configuration(
                "search space must contain at least one parameter".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for param in &parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(HsError::Configuration(format!(
                    "duplicate parameter in search space: {}",
                    param.name
                )));
            }
            if param.values.is_empty() {
                return Err(HsError::Configuration(format!(
                    "parameter {} has no candidate values",
                    param.name
                )));
            }
        }

        Ok(Self { parameters })
    }

    pub fn parameters(&self) -> &[ParameterDef] {
        &self.parameters
    }

    /// Parameter names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    pub fn values(&self, name: &str) -> Option<&[ParamValue]> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.values.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.name == name)
    }

    pub fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    /// Number of points in the Cartesian product, or `None` on overflow.
    pub fn grid_size(&self) -> Option<usize> {
        self.parameters
            .iter()
            .try_fold(1usize, |total, param| total.checked_mul(param.values.len()))
    }
}

/// Incremental builder for [`SearchSpace`]; validation happens in `build`.
#[derive(Debug, Clone, Default)]
pub struct SearchSpaceBuilder {
    parameters: Vec<ParameterDef>,
}

impl SearchSpaceBuilder {
    pub fn add_values<V, T>(mut self, name: impl Into<String>, values: V) -> Self
    where
        V: IntoIterator<Item = T>,
        T: Into<ParamValue>,
    {
        self.parameters.push(ParameterDef {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn build(self) -> HsResult<SearchSpace> {
        SearchSpace::from_definitions(self.parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_space_is_rejected() {
        let err = SearchSpace::builder().build().unwrap_err();
        assert!(matches!(err, HsError::Configuration(_)));

        let pairs: Vec<(&str, Vec<i64>)> = Vec::new();
        assert!(SearchSpace::from_pairs(pairs).is_err());
    }

    #[test]
    fn empty_candidate_list_is_rejected() {
        let err = SearchSpace::builder()
            .add_values("a", [1, 2])
            .add_values("b", Vec::<i64>::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("b has no candidate values"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = SearchSpace::from_pairs([("a", vec![1]), ("a", vec![2])]).unwrap_err();
        assert!(err.to_string().contains("duplicate parameter"));
    }

    #[test]
    fn insertion_order_is_kept() {
        let space = SearchSpace::builder()
            .add_values("zeta", [1, 2])
            .add_values("alpha", ["x", "y", "z"])
            .add_values("mid", [0.5])
            .build()
            .unwrap();
        let names: Vec<&str> = space.names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(space.grid_size(), Some(6));
        assert_eq!(space.num_parameters(), 3);
    }

    #[test]
    fn grid_size_overflow_is_none() {
        let wide: Vec<i64> = (0..1024).collect();
        let mut builder = SearchSpace::builder();
        for i in 0..8 {
            builder = builder.add_values(format!("p{i}"), wide.clone());
        }
        let space = builder.build().unwrap();
        assert_eq!(space.grid_size(), None);
    }

    #[test]
    fn caller_input_is_copied() {
        let mut values = vec![1, 2, 3];
        let space = SearchSpace::from_pairs([("a", values.clone())]).unwrap();
        values.push(4);
        assert_eq!(space.values("a").map(<[ParamValue]>::len), Some(3));
    }

    #[test]
    fn deserialization_validates() {
        let ok: SearchSpace = serde_json::from_str(
            r#"{"parameters":[{"name":"C","values":[0.1,1,"auto",true]}]}"#,
        )
        .unwrap();
        assert_eq!(
            ok.values("C").unwrap(),
            &[
                ParamValue::Float(0.1),
                ParamValue::Int(1),
                ParamValue::Text("auto".into()),
                ParamValue::Bool(true),
            ]
        );

        let empty = serde_json::from_str::<SearchSpace>(r#"{"parameters":[]}"#);
        assert!(empty.is_err());
    }

    #[test]
    fn param_value_accessors() {
        assert_eq!(ParamValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(ParamValue::Float(0.5).as_i64(), None);
        assert_eq!(ParamValue::from("rbf").as_str(), Some("rbf"));
        assert_eq!(ParamValue::from(false).as_bool(), Some(false));
        assert_eq!(ParamValue::Float(0.25).to_string(), "0.25");
    }
}
