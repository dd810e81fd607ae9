//! The session object: communities, the catalog, labels and ad-hoc reports in one place.

use crate::catalog::{MetricCatalog, MetricFilter};
use crate::combine::MetricCall;
use crate::community::{Community, CommunitySchema};
use crate::config::LoadOptions;
use crate::datatypes::{CommunityDataLevel, MetricReturnType};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::labelling::{LabelCollection, Labels, ID, LABELLER};
use crate::loader::load_communities;
use crate::metric::MetricDef;
use crate::params::Params;
use crate::pipeline::FeaturePipeline;
use crate::registry::{MetricRegistry, PreprocessorRegistry, ReportRegistry};
use crate::report::{run_report, Report, ReportDef};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Name under which `generate_report` runs its calls.
pub const GENERATED_REPORT: &str = "generated";

#[derive(Default)]
pub struct PiciBuilder {
    catalog: Option<Arc<MetricCatalog>>,
    communities: Vec<Community>,
    labels: Vec<Labels>,
    load: Option<(LoadOptions, CommunitySchema)>,
    progress: bool,
}

impl PiciBuilder {
    // -------- Builder methods --------
    pub fn with_catalog(mut self, catalog: Arc<MetricCatalog>) -> Self { self.catalog = Some(catalog); self }
    pub fn with_community(mut self, community: Community) -> Self { self.communities.push(community); self }
    pub fn with_communities(mut self, communities: impl IntoIterator<Item = Community>) -> Self { self.communities.extend(communities); self }
    pub fn with_labels(mut self, labels: Labels) -> Self { self.labels.push(labels); self }
    pub fn with_progress(mut self, yes: bool) -> Self { self.progress = yes; self }
    /// Load communities from an NDJSON snapshot when building.
    pub fn load(mut self, opts: LoadOptions, schema: CommunitySchema) -> Self { self.load = Some((opts, schema)); self }

    pub fn build(self) -> Result<Pici> {
        let catalog = self.catalog.unwrap_or_else(MetricCatalog::shared_builtin);
        let mut all = self.communities;
        if let Some((opts, schema)) = &self.load {
            let opts = opts.clone().with_progress(opts.progress || self.progress);
            all.extend(load_communities(&opts, schema)?);
        }

        let mut communities = BTreeMap::new();
        for c in all {
            let name = c.name().to_string();
            if communities.insert(name.clone(), c).is_some() {
                return Err(Error::Invalid(format!("community '{name}' given twice")));
            }
        }

        let mut labels = LabelCollection::new();
        for set in self.labels {
            labels.add(set)?;
        }

        tracing::info!(
            "pici session: {} communities, {} metrics, {} label sets",
            communities.len(),
            catalog.metric_names().count(),
            labels.labels().len()
        );
        Ok(Pici { communities, catalog, labels, reports: BTreeMap::new(), progress: self.progress })
    }
}

pub struct Pici {
    communities: BTreeMap<String, Community>,
    catalog: Arc<MetricCatalog>,
    labels: LabelCollection,
    reports: BTreeMap<String, ReportDef>,
    progress: bool,
}

impl fmt::Debug for Pici {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pici")
            .field("communities", &self.communities.keys().collect::<Vec<_>>())
            .field("metrics", &self.catalog.metric_names().count())
            .field("labels", &self.labels.labels())
            .field("reports", &self.reports.keys().collect::<Vec<_>>())
            .field("progress", &self.progress)
            .finish()
    }
}

impl Pici {
    pub fn builder() -> PiciBuilder { PiciBuilder::default() }

    pub fn catalog(&self) -> &Arc<MetricCatalog> { &self.catalog }
    pub fn communities(&self) -> &BTreeMap<String, Community> { &self.communities }
    pub fn labels(&self) -> &LabelCollection { &self.labels }

    pub fn community(&self, name: &str) -> Result<&Community> {
        self.communities.get(name).ok_or_else(|| Error::Unknown { kind: "community", name: name.to_string() })
    }

    pub fn add_labels(&mut self, labels: Labels) -> Result<()> { self.labels.add(labels) }

    // -------- Metrics --------

    /// Catalog metrics bound to community `name`.
    pub fn metrics(&self, name: &str) -> Result<MetricRegistry<'_>> {
        Ok(MetricRegistry::new(&self.catalog, self.community(name)?))
    }

    /// Metrics matching `filter` that every community can compute.
    pub fn get_metrics(&self, filter: &MetricFilter) -> Vec<&MetricDef> {
        self.catalog
            .get_all(filter)
            .into_iter()
            .filter(|m| self.communities.values().all(|c| m.is_available_for(c)))
            .collect()
    }

    // -------- Preprocessing --------

    pub fn preprocess(&mut self, community: &str, preprocessor: &str, params: &Params) -> Result<()> {
        let c = self
            .communities
            .get_mut(community)
            .ok_or_else(|| Error::Unknown { kind: "community", name: community.to_string() })?;
        PreprocessorRegistry::new(&self.catalog, c).call(preprocessor, params)
    }

    /// Run `preprocessor` on every community, in name order.
    pub fn preprocess_all(&mut self, preprocessor: &str, params: &Params) -> Result<()> {
        tracing::info!("preprocessing {} communities with '{}'", self.communities.len(), preprocessor);
        for c in self.communities.values_mut() {
            PreprocessorRegistry::new(&self.catalog, c).call(preprocessor, params)?;
        }
        Ok(())
    }

    // -------- Reports --------

    pub fn reports(&self) -> ReportRegistry<'_> { ReportRegistry::new(self) }

    /// Names of the ad-hoc and catalog reports.
    pub fn report_names(&self) -> Vec<String> {
        self.reports.keys().cloned().chain(self.catalog.report_names().map(str::to_string)).collect()
    }

    /// Register a report over fixed calls. Every call must name a known metric.
    pub fn add_report(
        &mut self,
        name: impl Into<String>,
        calls: Vec<MetricCall>,
        level: CommunityDataLevel,
        returntype: MetricReturnType,
    ) -> Result<()> {
        for call in &calls {
            self.catalog.metric(&call.metric)?;
        }
        let name = name.into();
        tracing::debug!("adding report '{}' ({} metrics)", name, calls.len());
        self.reports.insert(name.clone(), ReportDef::fixed(name, calls).expecting(level, returntype));
        Ok(())
    }

    /// Run `calls` once as an unnamed report.
    pub fn generate_report(&self, calls: &[MetricCall]) -> Result<Report> {
        run_report(GENERATED_REPORT, &self.catalog, &self.community_refs(), calls, &self.labels, None, self.progress)
    }

    /// Run report `name`; ad-hoc reports shadow catalog reports of the same name.
    pub fn run_report(&self, name: &str, params: &Params) -> Result<Report> {
        let def = match self.reports.get(name) {
            Some(def) => def,
            None => self.catalog.report(name)?,
        };
        let calls = def.calls(params)?;
        run_report(name, &self.catalog, &self.community_refs(), &calls, &self.labels, def.expected(), self.progress)
    }

    fn community_refs(&self) -> Vec<&Community> { self.communities.values().collect() }

    // -------- Features --------

    /// Pipeline over every topic dataframe metric available in all communities.
    pub fn topic_pipeline(&self, keep: &[&str], params: &BTreeMap<String, Params>) -> FeaturePipeline {
        let filter = MetricFilter::any()
            .with_level(CommunityDataLevel::Topics)
            .with_returntype(MetricReturnType::DataFrame);
        let metrics: Vec<String> = self.get_metrics(&filter).into_iter().map(|m| m.name().to_string()).collect();
        params.iter().fold(
            FeaturePipeline::new(self.catalog.clone(), CommunityDataLevel::Topics).with_metrics(metrics).with_keep(keep.iter().copied()),
            |pipe, (metric, p)| pipe.with_params(metric.clone(), p.clone()),
        )
    }

    /// Topic features of all communities, indexed by `id`. With `add_labels`, the features
    /// are inner-joined with the topic labels on `(id, community_name)` and returned as
    /// `(features, labels)` with matching rows.
    pub fn topic_features(
        &self,
        add_labels: bool,
        keep: &[&str],
        params: &BTreeMap<String, Params>,
    ) -> Result<(Frame, Option<Frame>)> {
        let features = self.topic_pipeline(keep, params).transform(&self.communities)?.rename_index(ID)?;
        if !add_labels {
            return Ok((features, None));
        }
        let Some(labels) = self.labels.by_level(CommunityDataLevel::Topics)? else {
            tracing::warn!("no topic labels loaded; returning unlabelled features");
            return Ok((features, None));
        };

        let feature_names: Vec<String> = features.column_names().into_iter().map(str::to_string).collect();
        let mut label_names = vec![LABELLER.to_string()];
        label_names.extend(
            self.labels
                .labels()
                .iter()
                .filter(|l| l.level() == CommunityDataLevel::Topics)
                .flat_map(|l| l.label_names())
                .map(str::to_string),
        );
        let joined = features.inner_join_on_id_and_community(&labels)?;
        tracing::info!("{} labelled topic rows out of {} feature rows", joined.height(), features.height());
        Ok((joined.select(&feature_names), Some(joined.select(&label_names))))
    }
}
