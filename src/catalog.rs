//! The table of known metrics, preprocessors and reports.
//!
//! Built once through [`CatalogBuilder`], then immutable and shared behind an `Arc`.

use crate::datatypes::{CommunityDataLevel, MetricReturnType};
use crate::error::{Error, Result};
use crate::metric::MetricDef;
use crate::preprocessors::PreprocessorDef;
use crate::report::ReportDef;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Selects metrics by declared metadata; `None` matches anything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricFilter {
    pub level: Option<CommunityDataLevel>,
    pub returntype: Option<MetricReturnType>,
}

impl MetricFilter {
    pub fn any() -> Self { Self::default() }
    pub fn with_level(mut self, level: CommunityDataLevel) -> Self { self.level = Some(level); self }
    pub fn with_returntype(mut self, rt: MetricReturnType) -> Self { self.returntype = Some(rt); self }

    pub fn matches(&self, def: &MetricDef) -> bool {
        self.level.map_or(true, |l| l == def.level()) && self.returntype.map_or(true, |r| r == def.returntype())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MetricCatalog {
    metrics: BTreeMap<String, MetricDef>,
    preprocessors: BTreeMap<String, PreprocessorDef>,
    reports: BTreeMap<String, ReportDef>,
}

impl MetricCatalog {
    pub fn builder() -> CatalogBuilder { CatalogBuilder::default() }

    /// Catalog with every builtin metric, preprocessor and report.
    pub fn builtin() -> Self { CatalogBuilder::default().with_builtins().build() }

    pub fn shared_builtin() -> Arc<Self> { Arc::new(Self::builtin()) }

    pub fn metric(&self, name: &str) -> Result<&MetricDef> {
        self.metrics.get(name).ok_or_else(|| self.not_found(name, "metric"))
    }

    pub fn preprocessor(&self, name: &str) -> Result<&PreprocessorDef> {
        self.preprocessors.get(name).ok_or_else(|| self.not_found(name, "preprocessor"))
    }

    pub fn report(&self, name: &str) -> Result<&ReportDef> {
        self.reports.get(name).ok_or_else(|| self.not_found(name, "report"))
    }

    /// Metrics matching `filter`, by name.
    pub fn get_all(&self, filter: &MetricFilter) -> Vec<&MetricDef> {
        self.metrics.values().filter(|m| filter.matches(m)).collect()
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> { self.metrics.keys().map(String::as_str) }
    pub fn preprocessor_names(&self) -> impl Iterator<Item = &str> { self.preprocessors.keys().map(String::as_str) }
    pub fn report_names(&self) -> impl Iterator<Item = &str> { self.reports.keys().map(String::as_str) }

    /// Unknown name, or a name registered under another kind.
    fn not_found(&self, name: &str, kind: &'static str) -> Error {
        let found = if self.metrics.contains_key(name) {
            Some("metric")
        } else if self.reports.contains_key(name) {
            Some("report")
        } else if self.preprocessors.contains_key(name) {
            Some("preprocessor")
        } else {
            None
        };
        match found {
            Some(found) if found != kind => Error::WrongKind { name: name.to_string(), expected: kind, found },
            _ => Error::Unknown { kind, name: name.to_string() },
        }
    }
}

/// Collects definitions; later registrations under the same name replace earlier ones.
#[derive(Default)]
pub struct CatalogBuilder {
    catalog: MetricCatalog,
}

impl CatalogBuilder {
    pub fn with_builtins(self) -> Self {
        let b = crate::metrics::register(self);
        let b = crate::preprocessors::register(b);
        crate::metrics::reports::register(b)
    }

    pub fn metric(mut self, def: MetricDef) -> Self {
        self.catalog.metrics.insert(def.name().to_string(), def);
        self
    }

    pub fn preprocessor(mut self, def: PreprocessorDef) -> Self {
        self.catalog.preprocessors.insert(def.name().to_string(), def);
        self
    }

    pub fn report(mut self, def: ReportDef) -> Self {
        self.catalog.reports.insert(def.name().to_string(), def);
        self
    }

    pub fn build(self) -> MetricCatalog { self.catalog }
}
