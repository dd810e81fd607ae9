//! Name-based access to metrics, preprocessors and reports with their first argument bound.

use crate::catalog::{MetricCatalog, MetricFilter};
use crate::community::Community;
use crate::error::Result;
use crate::metric::{Fields, Metric, MetricDef};
use crate::params::Params;
use crate::pici::Pici;
use crate::report::Report;

/// Metrics of the catalog bound to one community.
pub struct MetricRegistry<'a> {
    catalog: &'a MetricCatalog,
    community: &'a Community,
}

impl<'a> MetricRegistry<'a> {
    pub fn new(catalog: &'a MetricCatalog, community: &'a Community) -> Self { Self { catalog, community } }

    pub fn community(&self) -> &Community { self.community }

    /// Evaluate `name` and assemble its result.
    pub fn call(&self, name: &str, params: &Params) -> Result<Metric> {
        self.catalog.metric(name)?.evaluate(self.community, params)
    }

    /// The raw field map of `name`, without assembly.
    pub fn unwrapped(&self, name: &str, params: &Params) -> Result<Fields> {
        self.catalog.metric(name)?.compute(self.community, params)
    }

    pub fn get_all(&self, filter: &MetricFilter) -> Vec<&'a MetricDef> { self.catalog.get_all(filter) }
}

/// Preprocessors of the catalog bound to one community they may modify.
pub struct PreprocessorRegistry<'a> {
    catalog: &'a MetricCatalog,
    community: &'a mut Community,
}

impl<'a> PreprocessorRegistry<'a> {
    pub fn new(catalog: &'a MetricCatalog, community: &'a mut Community) -> Self { Self { catalog, community } }

    pub fn call(&mut self, name: &str, params: &Params) -> Result<()> {
        self.catalog.preprocessor(name)?.apply(self.community, params)
    }
}

/// Reports runnable on every community of a session.
pub struct ReportRegistry<'a> {
    pici: &'a Pici,
}

impl<'a> ReportRegistry<'a> {
    pub fn new(pici: &'a Pici) -> Self { Self { pici } }

    pub fn call(&self, name: &str, params: &Params) -> Result<Report> { self.pici.run_report(name, params) }

    /// Ad-hoc and catalog report names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pici.report_names();
        names.sort();
        names.dedup();
        names
    }
}
