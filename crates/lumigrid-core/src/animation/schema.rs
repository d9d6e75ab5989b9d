//! Parameter schema types for animation plugins.
//!
//! A plugin describes its tunable parameters declaratively so UIs can build
//! controls without knowing anything about the plugin itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Live parameter values for an animation instance.
pub type ParameterMap = BTreeMap<String, Value>;

/// Declared parameter set, keyed by parameter name.
pub type ParameterSchema = BTreeMap<String, ParameterSpec>;

/// Value kind of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Float,
    Int,
    Bool,
}

/// Declaration of a single tunable parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub default: Value,
    pub description: String,
}

impl ParameterSpec {
    /// A bounded floating-point parameter.
    pub fn float(min: f64, max: f64, default: f64, description: impl Into<String>) -> Self {
        Self {
            kind: ParameterKind::Float,
            min: Some(min),
            max: Some(max),
            default: Value::from(default),
            description: description.into(),
        }
    }

    /// A bounded integer parameter.
    pub fn int(min: i64, max: i64, default: i64, description: impl Into<String>) -> Self {
        Self {
            kind: ParameterKind::Int,
            min: Some(min as f64),
            max: Some(max as f64),
            default: Value::from(default),
            description: description.into(),
        }
    }
}

/// Build the live parameter map for a schema: declared defaults overlaid
/// with any caller-provided values.
pub fn defaults_with_overrides(schema: &ParameterSchema, overrides: &ParameterMap) -> ParameterMap {
    let mut params: ParameterMap = schema
        .iter()
        .map(|(name, spec)| (name.clone(), spec.default.clone()))
        .collect();
    for (name, value) in overrides {
        params.insert(name.clone(), value.clone());
    }
    params
}

/// Read a parameter as f64, accepting both int and float JSON values.
pub fn param_f64(params: &ParameterMap, name: &str) -> Option<f64> {
    params.get(name).and_then(Value::as_f64)
}
