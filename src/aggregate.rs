//! Summary statistics over numeric samples, named `<agg> <name>`.
//!
//! Mirrors the usual dataframe reducers: nulls are skipped, `std`/`var` use one degree of
//! freedom, an empty sample has a sum of 0 and undefined (null) everything else.

use crate::metric::Fields;
use crate::value::{Key, Value};
use std::collections::BTreeMap;

pub const AGGREGATES: [&str; 6] = ["mean", "min", "max", "std", "var", "sum"];

/// Accumulates a sample; `merge` combines partial samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sample {
    values: Vec<f64>,
}

impl Sample {
    pub fn ingest(&mut self, v: &Value) {
        if let Some(x) = v.as_f64() {
            if x.is_finite() {
                self.values.push(x);
            }
        }
    }

    pub fn merge(&mut self, other: Sample) { self.values.extend(other.values); }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn sum(&self) -> f64 { self.values.iter().sum() }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() { None } else { Some(self.sum() / self.values.len() as f64) }
    }

    pub fn min(&self) -> Option<f64> { self.values.iter().copied().reduce(f64::min) }
    pub fn max(&self) -> Option<f64> { self.values.iter().copied().reduce(f64::max) }

    pub fn var(&self) -> Option<f64> {
        let n = self.values.len();
        if n < 2 { return None; }
        let mean = self.mean()?;
        Some(self.values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0))
    }

    pub fn std(&self) -> Option<f64> { self.var().map(f64::sqrt) }

    /// `{mean,min,max,std,var,sum} <name>` fields.
    pub fn summarize(&self, name: &str) -> Fields {
        let mut out = Fields::new();
        for agg in AGGREGATES {
            let v = match agg {
                "mean" => self.mean(),
                "min" => self.min(),
                "max" => self.max(),
                "std" => self.std(),
                "var" => self.var(),
                _ => Some(self.sum()),
            };
            out.insert(format!("{agg} {name}"), Value::from(v));
        }
        out
    }
}

impl<'a> FromIterator<&'a Value> for Sample {
    fn from_iter<I: IntoIterator<Item = &'a Value>>(iter: I) -> Self {
        let mut s = Sample::default();
        for v in iter {
            s.ingest(v);
        }
        s
    }
}

impl FromIterator<f64> for Sample {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Sample { values: iter.into_iter().filter(|x| x.is_finite()).collect() }
    }
}

/// Shorthand for `Sample::from_iter(values).summarize(name)`.
pub fn aggregate<I: IntoIterator<Item = f64>>(values: I, name: &str) -> Fields {
    values.into_iter().collect::<Sample>().summarize(name)
}

/// Count per key.
pub fn count_by<'a, I: IntoIterator<Item = &'a Key>>(keys: I) -> BTreeMap<Key, u64> {
    let mut m = BTreeMap::new();
    for k in keys {
        *m.entry(k.clone()).or_insert(0) += 1;
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_uses_sample_variance() {
        let f = aggregate([1.0, 2.0, 3.0, 4.0], "posts per topic");
        assert_eq!(f.scalar("mean posts per topic"), Some(&Value::Float(2.5)));
        assert_eq!(f.scalar("sum posts per topic"), Some(&Value::Float(10.0)));
        let var = f.scalar("var posts per topic").and_then(Value::as_f64).unwrap();
        assert!((var - 1.6666666666666667).abs() < 1e-12);
    }

    #[test]
    fn empty_sample_only_has_a_sum() {
        let f = aggregate(std::iter::empty(), "x");
        assert_eq!(f.scalar("sum x"), Some(&Value::Float(0.0)));
        assert_eq!(f.scalar("mean x"), Some(&Value::Null));
        assert_eq!(f.scalar("std x"), Some(&Value::Null));
    }
}
