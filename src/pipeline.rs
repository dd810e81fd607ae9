//! Feature matrices: one row per entity, one column per metric field, stacked across communities.

use crate::catalog::MetricCatalog;
use crate::community::Community;
use crate::concurrency::map_limited;
use crate::datatypes::CommunityDataLevel;
use crate::error::{Error, Result};
use crate::frame::{Frame, COMMUNITY_NAME};
use crate::metric::{to_frame_coerced, Fields, FieldValue};
use crate::params::Params;
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct FeaturePipeline {
    catalog: Arc<MetricCatalog>,
    level: CommunityDataLevel,
    metrics: Vec<String>,
    keep: Vec<String>,
    communities: Option<Vec<String>>,
    metric_params: BTreeMap<String, Params>,
    community_params: BTreeMap<(String, String), Params>,
    concurrency: usize,
}

impl FeaturePipeline {
    pub fn new(catalog: Arc<MetricCatalog>, level: CommunityDataLevel) -> Self {
        Self {
            catalog,
            level,
            metrics: Vec::new(),
            keep: Vec::new(),
            communities: None,
            metric_params: BTreeMap::new(),
            community_params: BTreeMap::new(),
            concurrency: 1,
        }
    }

    // -------- Builder methods --------
    pub fn with_metric(mut self, name: impl Into<String>) -> Self { self.metrics.push(name.into()); self }
    pub fn with_metrics<I, S>(mut self, names: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> { self.metrics.extend(names.into_iter().map(Into::into)); self }
    /// View columns passed through unchanged.
    pub fn with_keep<I, S>(mut self, columns: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> { self.keep.extend(columns.into_iter().map(Into::into)); self }
    /// Restrict to (and order by) these communities.
    pub fn with_communities<I, S>(mut self, names: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> { self.communities = Some(names.into_iter().map(Into::into).collect()); self }
    /// Parameters of `metric` in every community.
    pub fn with_params(mut self, metric: impl Into<String>, params: Params) -> Self { self.metric_params.insert(metric.into(), params); self }
    /// Parameters of `metric` in one community; overlays the ones set by `with_params`.
    pub fn with_community_params(mut self, community: impl Into<String>, metric: impl Into<String>, params: Params) -> Self { self.community_params.insert((community.into(), metric.into()), params); self }
    pub fn with_concurrency(mut self, n: usize) -> Self { self.concurrency = n.max(1); self }

    pub fn level(&self) -> CommunityDataLevel { self.level }
    pub fn metrics(&self) -> &[String] { &self.metrics }
    pub fn keep(&self) -> &[String] { &self.keep }

    /// Effective parameters of `metric` in `community`.
    pub fn params_for(&self, community: &str, metric: &str) -> Params {
        let base = self.metric_params.get(metric).cloned().unwrap_or_default();
        match self.community_params.get(&(community.to_string(), metric.to_string())) {
            Some(specific) => base.merged(specific),
            None => base,
        }
    }

    /// Feature table of one community, indexed like its view at the pipeline's level.
    /// Field names already produced by an earlier metric are skipped.
    pub fn features(&self, community: &Community) -> Result<Frame> {
        let mut fields = Fields::new();
        for name in &self.metrics {
            let def = self.catalog.metric(name)?;
            if def.level() != self.level {
                return Err(Error::IncompatibleMetrics {
                    context: format!("{} pipeline", self.level),
                    details: format!("{} ({}, {})", def.name(), def.level(), def.returntype()),
                });
            }
            let params = self.params_for(community.name(), name);
            fields.chain(def.compute(community, &params)?);
        }

        let view = community.view(self.level);
        if !self.keep.is_empty() {
            let Some(view) = view else {
                return Err(Error::Invalid(format!("nothing to keep at the {} level", self.level)));
            };
            let mut kept = Fields::new();
            for column in &self.keep {
                let series = view
                    .series(column)
                    .ok_or_else(|| Error::missing_column(column, format!("{} of '{}'", self.level, community.name())))?;
                kept.insert(column.clone(), FieldValue::Series(series));
            }
            fields.chain(kept);
        }

        let frame = to_frame_coerced(&fields)?;
        tracing::debug!("features of '{}': {} rows x {} columns", community.name(), frame.height(), frame.width());
        Ok(match view {
            Some(view) => frame.rename_index(view.index_name())?,
            None => frame,
        })
    }

    /// Features of every selected community, each block tagged with `community_name`,
    /// stacked in selection order (name order when no selection is set).
    pub fn transform(&self, communities: &BTreeMap<String, Community>) -> Result<Frame> {
        let selected: Vec<&Community> = match &self.communities {
            Some(names) => names
                .iter()
                .map(|n| communities.get(n).ok_or_else(|| Error::Unknown { kind: "community", name: n.clone() }))
                .collect::<Result<_>>()?,
            None => communities.values().collect(),
        };
        tracing::info!(
            "building {} features ({} metrics) for {} communities",
            self.level,
            self.metrics.len(),
            selected.len()
        );
        let frames = map_limited(&selected, self.concurrency, |c| {
            let mut frame = self.features(c)?;
            frame.set_constant(COMMUNITY_NAME, Value::from(c.name()))?;
            Ok::<_, Error>(frame)
        })?;
        Frame::concat(&frames)
    }
}
