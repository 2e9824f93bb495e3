use alloc::borrow::ToOwned;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::Color;

/// A tagged parameter value.
///
/// Numeric accessors coerce between the two numeric tags; every other
/// mismatch falls back to the caller's default.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    F32(f32),
    I32(i32),
    Bool(bool),
    Str(String),
    Color(Color),
    ColorList(Vec<Color>),
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::F32(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::I32(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_owned())
    }
}

impl From<Color> for ParamValue {
    fn from(value: Color) -> Self {
        ParamValue::Color(value)
    }
}

impl From<Vec<Color>> for ParamValue {
    fn from(value: Vec<Color>) -> Self {
        ParamValue::ColorList(value)
    }
}

/// An immutable bag of named, typed effect parameters.
///
/// `with` and `merge` return a new bag; equality is structural.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffectParams {
    values: BTreeMap<String, ParamValue>,
}

impl EffectParams {
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    /// A copy of this bag with `key` set to `value`.
    pub fn with(&self, key: &str, value: impl Into<ParamValue>) -> Self {
        let mut values = self.values.clone();
        values.insert(key.to_owned(), value.into());
        Self { values }
    }

    /// A copy of this bag with every entry of `other` layered on top.
    pub fn merge(&self, other: &EffectParams) -> Self {
        let mut values = self.values.clone();
        for (key, value) in &other.values {
            values.insert(key.clone(), value.clone());
        }
        Self { values }
    }

    pub fn get_f32(&self, key: &str, default: f32) -> f32 {
        match self.values.get(key) {
            Some(ParamValue::F32(v)) => *v,
            Some(ParamValue::I32(v)) => *v as f32,
            _ => default,
        }
    }

    pub fn get_i32(&self, key: &str, default: i32) -> i32 {
        match self.values.get(key) {
            Some(ParamValue::I32(v)) => *v,
            Some(ParamValue::F32(v)) => *v as i32,
            _ => default,
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(ParamValue::Bool(v)) => *v,
            _ => default,
        }
    }

    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.values.get(key) {
            Some(ParamValue::Str(v)) => v,
            _ => default,
        }
    }

    pub fn get_color(&self, key: &str, default: Color) -> Color {
        match self.values.get(key) {
            Some(ParamValue::Color(v)) => *v,
            _ => default,
        }
    }

    pub fn get_colors<'a>(&'a self, key: &str, default: &'a [Color]) -> &'a [Color] {
        match self.values.get(key) {
            Some(ParamValue::ColorList(v)) if !v.is_empty() => v,
            _ => default,
        }
    }
}
