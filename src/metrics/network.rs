//! Contributor network metrics.

use crate::catalog::CatalogBuilder;
use crate::community::Community;
use crate::datatypes::{CommunityDataLevel, MetricReturnType};
use crate::graph::{ContributorGraph, GraphKind};
use crate::metric::{Fields, MetricDef};
use crate::params::Params;
use crate::frame::Series;
use anyhow::bail;
use std::sync::Arc;

pub(crate) fn register(b: CatalogBuilder) -> CatalogBuilder {
    use CommunityDataLevel::Contributors;
    use MetricReturnType::DataFrame;
    b.metric(MetricDef::new("contributor_degree", Contributors, DataFrame, contributor_degree))
        .metric(MetricDef::new("contributor_centralities", Contributors, DataFrame, contributor_centralities))
}

/// `kind` parameter: `co_contributor` (default) or `commenter`.
fn graph(c: &Community, params: &Params) -> anyhow::Result<Arc<ContributorGraph>> {
    Ok(match params.str_or("kind", "co_contributor")? {
        "co_contributor" => c.co_contributor_graph(),
        "commenter" => c.temporal_graph(None, None, GraphKind::Commenter),
        other => bail!("unknown network kind '{other}' (expected co_contributor or commenter)"),
    })
}

/// Number of contributors each contributor shares at least one topic with.
fn contributor_degree(c: &Community, params: &Params) -> anyhow::Result<Fields> {
    let degrees: Series = graph(c, params)?.degrees().into_iter().collect();
    Ok(Fields::new().with("degree", degrees))
}

fn contributor_centralities(c: &Community, params: &Params) -> anyhow::Result<Fields> {
    let g = graph(c, params)?;
    let mut fields = Fields::new().with("degree_centrality", g.degree_centrality().into_iter().collect::<Series>());
    fields.insert("betweenness_centrality", g.betweenness_centrality().into_iter().collect::<Series>());
    let Some(eigenvector) = g.eigenvector_centrality() else {
        bail!("eigenvector centrality did not converge in '{}'", c.name());
    };
    fields.insert("eigenvector_centrality", eigenvector.into_iter().collect::<Series>());
    if g.is_directed() {
        fields.insert("in_degree_centrality", g.in_degree_centrality().into_iter().collect::<Series>());
        fields.insert("out_degree_centrality", g.out_degree_centrality().into_iter().collect::<Series>());
    }
    Ok(fields)
}
