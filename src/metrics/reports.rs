//! Builtin reports: fixed bundles of builtin metrics.

use crate::catalog::CatalogBuilder;
use crate::combine::MetricCall;
use crate::datatypes::{CommunityDataLevel, MetricReturnType};
use crate::params::Params;
use crate::report::ReportDef;

pub(crate) fn register(b: CatalogBuilder) -> CatalogBuilder {
    use CommunityDataLevel::{Community, Posts, Topics};
    use MetricReturnType::{DataFrame, Table};
    let interval = |i: &str| Params::new().with("interval", i);

    b.report(
        ReportDef::fixed(
            "summary",
            vec![
                MetricCall::bare("number_of_posts"),
                MetricCall::new("agg_number_of_posts_per_interval", interval("1d")),
                MetricCall::new("agg_number_of_posts_per_interval", interval("1M")),
                MetricCall::bare("agg_posts_per_topic"),
            ],
        )
        .expecting(Community, Table),
    )
    .report(
        ReportDef::fixed(
            "topics_summary",
            vec![
                MetricCall::bare("number_of_contributors_per_topic"),
                MetricCall::bare("post_delays_per_topic"),
                MetricCall::bare("number_of_posts_per_topic"),
            ],
        )
        .expecting(Topics, DataFrame),
    )
    .report(
        ReportDef::new("posts_contributors_per_interval", |params: &Params| {
            let interval = Params::new().with("interval", params.require_str("interval")?);
            Ok(vec![
                MetricCall::new("posts_per_interval", interval.clone()),
                MetricCall::new("contributors_per_interval", interval),
            ])
        })
        .expecting(Community, DataFrame),
    )
    .report(ReportDef::fixed("post_length", vec![MetricCall::bare("number_of_words")]).expecting(Posts, DataFrame))
    .report(ReportDef::fixed("lorenz_curve", vec![MetricCall::bare("lorenz")]).expecting(Community, DataFrame))
}
