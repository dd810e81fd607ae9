//! Reports: named bundles of metric calls run across all communities.

use crate::catalog::MetricCatalog;
use crate::combine::{check_homogeneous, run_metrics, CombinedData, MetricCall};
use crate::community::Community;
use crate::datatypes::{CommunityDataLevel, MetricReturnType};
use crate::error::{Error, Result};
use crate::frame::{Frame, COMMUNITY_NAME};
use crate::labelling::LabelCollection;
use crate::metric::Fields;
use crate::params::Params;
use crate::progress::maybe_count_progress;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

pub type ReportFn = Arc<dyn Fn(&Params) -> anyhow::Result<Vec<MetricCall>> + Send + Sync>;

/// A report body turns parameters into an ordered list of metric calls.
#[derive(Clone)]
pub struct ReportDef {
    name: String,
    body: ReportFn,
    level: Option<CommunityDataLevel>,
    returntype: Option<MetricReturnType>,
}

impl ReportDef {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Params) -> anyhow::Result<Vec<MetricCall>> + Send + Sync + 'static,
    {
        Self { name: name.into(), body: Arc::new(body), level: None, returntype: None }
    }

    /// Report over a fixed list of calls.
    pub fn fixed(name: impl Into<String>, calls: Vec<MetricCall>) -> Self {
        Self::new(name, move |_| Ok(calls.clone()))
    }

    /// Declare the level and return type the report must produce.
    pub fn expecting(mut self, level: CommunityDataLevel, returntype: MetricReturnType) -> Self {
        self.level = Some(level);
        self.returntype = Some(returntype);
        self
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn expected(&self) -> Option<(CommunityDataLevel, MetricReturnType)> { self.level.zip(self.returntype) }

    pub fn calls(&self, params: &Params) -> Result<Vec<MetricCall>> {
        (self.body)(params).map_err(|e| Error::Invalid(format!("report '{}': {e:#}", self.name)))
    }
}

impl fmt::Debug for ReportDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportDef")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("returntype", &self.returntype)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReportData {
    /// Stacked per-community tables.
    Frame(Frame),
    /// `community_name -> raw field maps` for plain metrics.
    Plain(BTreeMap<String, Vec<Fields>>),
}

impl ReportData {
    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            ReportData::Frame(f) => Some(f),
            ReportData::Plain(_) => None,
        }
    }

    pub fn as_plain(&self) -> Option<&BTreeMap<String, Vec<Fields>>> {
        match self {
            ReportData::Plain(m) => Some(m),
            ReportData::Frame(_) => None,
        }
    }
}

/// Result of running a report over every community.
#[derive(Clone, Debug)]
pub struct Report {
    name: String,
    data: ReportData,
    level: CommunityDataLevel,
    returntype: MetricReturnType,
    fields: BTreeSet<String>,
    labels: Option<Frame>,
}

impl Report {
    pub fn name(&self) -> &str { &self.name }
    pub fn data(&self) -> &ReportData { &self.data }
    pub fn level(&self) -> CommunityDataLevel { self.level }
    pub fn returntype(&self) -> MetricReturnType { self.returntype }
    pub fn fields(&self) -> &BTreeSet<String> { &self.fields }

    pub fn frame(&self) -> Option<&Frame> { self.data.as_frame() }

    /// Data projected to `community_name` and the metric fields (entity columns dropped).
    pub fn results(&self) -> ReportData {
        match &self.data {
            ReportData::Frame(f) => {
                let mut keep: Vec<&str> = vec![COMMUNITY_NAME];
                keep.extend(self.fields.iter().map(String::as_str));
                ReportData::Frame(f.select(&keep))
            }
            plain => plain.clone(),
        }
    }

    /// Data left-joined with the labels at the report's level: on `(id, community_name)` for
    /// entity tables, on `community_name` for community tables.
    /// Without labels (or for plain reports) the data comes back unjoined.
    pub fn labelled_data(&self) -> Result<ReportData> { self.with_labels(self.data.clone()) }

    pub fn labelled_results(&self) -> Result<ReportData> { self.with_labels(self.results()) }

    fn with_labels(&self, data: ReportData) -> Result<ReportData> {
        match (data, &self.labels) {
            (ReportData::Frame(f), Some(labels)) => Ok(ReportData::Frame(f.left_join_labels(labels)?)),
            (data, _) => Ok(data),
        }
    }
}

/// Run `calls` on every community (in the given order) and stack the results.
/// One failing metric fails the whole report.
pub fn run_report(
    name: &str,
    catalog: &MetricCatalog,
    communities: &[&Community],
    calls: &[MetricCall],
    labels: &LabelCollection,
    expected: Option<(CommunityDataLevel, MetricReturnType)>,
    progress: bool,
) -> Result<Report> {
    let defs = calls.iter().map(|c| catalog.metric(&c.metric)).collect::<Result<Vec<_>>>()?;
    let (level, returntype) =
        check_homogeneous(defs.iter().map(|d| (d.name(), d.level(), d.returntype())), &format!("report '{name}'"))?;
    if let Some((el, er)) = expected {
        if (el, er) != (level, returntype) {
            return Err(Error::IncompatibleMetrics {
                context: format!("report '{name}' is declared as ({el}, {er})"),
                details: defs.iter().map(|d| format!("{} ({}, {})", d.name(), d.level(), d.returntype())).collect::<Vec<_>>().join(", "),
            });
        }
    }
    tracing::info!("running report '{}' ({} metrics) on {} communities", name, calls.len(), communities.len());

    let pb = maybe_count_progress(progress, communities.len() as u64, &format!("Report: {name}"));
    let mut frames = Vec::new();
    let mut plain = BTreeMap::new();
    let mut fields = BTreeSet::new();
    for community in communities {
        let combined = run_metrics(catalog, community, calls)?;
        if (combined.level, combined.returntype) != (level, returntype) {
            return Err(Error::IncompatibleMetrics {
                context: format!("report '{name}' across communities"),
                details: format!("{} ({}, {})", combined.community, combined.level, combined.returntype),
            });
        }
        fields.extend(combined.fields);
        match combined.data {
            CombinedData::Frame(f) => frames.push(f),
            CombinedData::Plain(p) => {
                plain.insert(combined.community, p);
            }
        }
        if let Some(pb) = &pb { pb.inc(1); }
    }
    if let Some(pb) = pb { pb.finish_with_message(format!("Report: {name} done")); }

    let data = if returntype.is_tabular() { ReportData::Frame(Frame::concat(&frames)?) } else { ReportData::Plain(plain) };
    Ok(Report { name: name.to_string(), data, level, returntype, fields, labels: labels.by_level(level)? })
}
