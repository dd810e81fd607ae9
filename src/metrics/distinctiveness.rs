//! Distinctiveness of an idea: how far its initial post's text is from earlier initial posts.

use crate::catalog::CatalogBuilder;
use crate::community::Community;
use crate::metric::{Fields, MetricDef};
use crate::metrics::cached::{similarity_network, TOKEN_SORT_RATIO};
use crate::metrics::{day_of, initial_posts, per_topic};
use crate::params::Params;
use crate::preprocessors::POST_POSITION;
use crate::value::Value;

pub(crate) fn register(b: CatalogBuilder) -> CatalogBuilder {
    b.metric(MetricDef::topics("initial_post_text_distance", initial_post_text_distance).requires_posts_column(POST_POSITION))
}

/// Mean and minimum text distance (1 - similarity) of each initial post to the initial posts
/// of the same or earlier days. Null for the first idea of a community.
fn initial_post_text_distance(c: &Community, params: &Params) -> anyhow::Result<Fields> {
    let metric = params.str_or("similarity_metric", TOKEN_SORT_RATIO)?;
    let text_column = params.str_or("text_column", c.text_column())?;
    let network = similarity_network(c, text_column, metric)?;
    let rows = c.post_rows();
    let initial = initial_posts(c, &rows)?;

    let previous = |p: &crate::community::PostRow| network.similarities_until(&p.id, day_of(p.date)).unwrap_or_default();
    let mean = per_topic(&initial, |p| {
        let sims = previous(p);
        if sims.is_empty() {
            Value::Null
        } else {
            Value::float(1.0 - sims.iter().sum::<f64>() / sims.len() as f64)
        }
    });
    let min = per_topic(&initial, |p| {
        previous(p).into_iter().reduce(f64::max).map_or(Value::Null, |best| Value::float(1.0 - best))
    });
    Ok(Fields::new()
        .with(format!("distinctiveness: mean text-distance of initial post to previous initial posts ({metric})"), mean)
        .with(format!("distinctiveness: min text-distance of initial post to previous initial posts ({metric})"), min))
}
