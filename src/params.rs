//! Keyword parameters passed to metric, preprocessor and report bodies.

use crate::value::Value;
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    pub fn new() -> Self { Self::default() }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) { self.0.insert(key.into(), value.into()); }
    pub fn get(&self, key: &str) -> Option<&Value> { self.0.get(key).filter(|v| !v.is_null()) }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> { self.0.iter() }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Str(s)) => Ok(s),
            Some(other) => Err(anyhow!("parameter '{key}' must be a string, got {other}")),
        }
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(Value::Str(s)) => Ok(s),
            Some(other) => Err(anyhow!("parameter '{key}' must be a string, got {other}")),
            None => Err(anyhow!("missing required parameter '{key}'")),
        }
    }

    pub fn i64_or(&self, key: &str, default: i64) -> Result<i64> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.as_i64().ok_or_else(|| anyhow!("parameter '{key}' must be an integer, got {v}")),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(v) => Err(anyhow!("parameter '{key}' must be a boolean, got {v}")),
        }
    }

    /// String list; a single string is accepted as a one-element list.
    pub fn str_list(&self, key: &str) -> Result<Vec<String>> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Str(s)) => Ok(vec![s.clone()]),
            Some(Value::List(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).ok_or_else(|| anyhow!("parameter '{key}' must list strings, got {v}")))
                .collect(),
            Some(v) => Err(anyhow!("parameter '{key}' must be a list of strings, got {v}")),
        }
    }

    /// `self` overlaid with `other` (other wins).
    pub fn merged(&self, other: &Params) -> Params {
        let mut out = self.clone();
        for (k, v) in &other.0 {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 { f.write_str(", ")?; }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Params(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
