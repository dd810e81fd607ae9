//! Counts and dates of posts per topic, contributor, interval and community.

use crate::aggregate::{aggregate, count_by};
use crate::catalog::CatalogBuilder;
use crate::community::{Community, PostRow};
use crate::datatypes::{CommunityDataLevel, MetricReturnType};
use crate::date::{bucketize, days_between, Interval};
use crate::frame::Series;
use crate::metric::{Fields, MetricDef};
use crate::params::Params;
use crate::value::{Key, Value};
use ahash::AHashSet;
use std::collections::BTreeMap;
use time::OffsetDateTime;

pub(crate) fn register(b: CatalogBuilder) -> CatalogBuilder {
    use CommunityDataLevel::{Community as C, Contributors};
    use MetricReturnType::DataFrame;
    b.metric(MetricDef::community("number_of_posts", number_of_posts))
        .metric(MetricDef::community("number_of_contributors", number_of_contributors))
        .metric(MetricDef::community("agg_posts_per_topic", agg_posts_per_topic))
        .metric(MetricDef::community("agg_number_of_posts_per_interval", agg_number_of_posts_per_interval))
        .metric(MetricDef::new("posts_per_interval", C, DataFrame, posts_per_interval))
        .metric(MetricDef::new("contributors_per_interval", C, DataFrame, contributors_per_interval))
        .metric(MetricDef::new("lorenz", C, DataFrame, lorenz))
        .metric(MetricDef::topics("number_of_contributors_per_topic", number_of_contributors_per_topic))
        .metric(MetricDef::topics("number_of_posts_per_topic", number_of_posts_per_topic))
        .metric(MetricDef::topics("post_delays_per_topic", post_delays_per_topic))
        .metric(MetricDef::topics("post_dates_per_topic", post_dates_per_topic))
        .metric(MetricDef::new("number_of_posts_per_contributor", Contributors, DataFrame, number_of_posts_per_contributor))
}

/// Sorted post dates per topic.
fn dates_by_topic(rows: &[PostRow]) -> BTreeMap<&Key, Vec<OffsetDateTime>> {
    let mut m: BTreeMap<&Key, Vec<OffsetDateTime>> = BTreeMap::new();
    for r in rows {
        m.entry(&r.topic).or_default().push(r.date);
    }
    for dates in m.values_mut() {
        dates.sort();
    }
    m
}

fn interval_param(params: &Params) -> anyhow::Result<(String, Interval)> {
    let raw = params.require_str("interval")?;
    Ok((raw.to_string(), raw.parse()?))
}

fn number_of_posts(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    Ok(Fields::new().with("number of posts", c.posts().height()))
}

fn number_of_contributors(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    let rows = c.post_rows();
    let distinct: AHashSet<&Key> = rows.iter().map(|r| &r.contributor).collect();
    Ok(Fields::new().with("number of contributors", distinct.len()))
}

fn agg_posts_per_topic(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    let rows = c.post_rows();
    let counts = count_by(rows.iter().map(|r| &r.topic));
    Ok(aggregate(counts.values().map(|&n| n as f64), "posts per topic"))
}

fn agg_number_of_posts_per_interval(c: &Community, params: &Params) -> anyhow::Result<Fields> {
    let (name, interval) = interval_param(params)?;
    let rows = c.post_rows();
    let bins = bucketize(rows.iter().map(|r| (r.date, ())), interval);
    Ok(aggregate(bins.iter().map(|(_, posts)| posts.len() as f64), &format!("number of posts per {name}")))
}

fn posts_per_interval(c: &Community, params: &Params) -> anyhow::Result<Fields> {
    let (name, interval) = interval_param(params)?;
    let rows = c.post_rows();
    let counts: Series = bucketize(rows.iter().map(|r| (r.date, ())), interval)
        .into_iter()
        .map(|(label, posts)| (label, posts.len()))
        .collect();
    Ok(Fields::new().with(format!("number of posts per {name}"), counts).with_index_name(c.date_column()))
}

fn contributors_per_interval(c: &Community, params: &Params) -> anyhow::Result<Fields> {
    let (name, interval) = interval_param(params)?;
    let rows = c.post_rows();
    let counts: Series = bucketize(rows.iter().map(|r| (r.date, &r.contributor)), interval)
        .into_iter()
        .map(|(label, contributors)| (label, contributors.into_iter().collect::<AHashSet<_>>().len()))
        .collect();
    Ok(Fields::new().with(format!("number of contributors per {name}"), counts).with_index_name(c.date_column()))
}

/// Share of posts written by the least active share of contributors.
fn lorenz(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    let rows = c.post_rows();
    let mut per_contributor: Vec<u64> = count_by(rows.iter().map(|r| &r.contributor)).into_values().collect();
    per_contributor.sort_unstable();
    let total: u64 = per_contributor.iter().sum();

    let mut y = vec![0.0];
    let mut acc = 0u64;
    for n in &per_contributor {
        acc += n;
        y.push(if total > 0 { acc as f64 / total as f64 * 100.0 } else { 0.0 });
    }
    let steps = (y.len() - 1).max(1) as f64;
    let x: Vec<f64> = (0..y.len()).map(|i| i as f64 / steps * 100.0).collect();
    Ok(Fields::new().with("% contributors", Series::from_values(x)).with("% posts", Series::from_values(y)))
}

fn number_of_contributors_per_topic(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    let rows = c.post_rows();
    let mut per_topic: BTreeMap<&Key, AHashSet<&Key>> = BTreeMap::new();
    for r in rows.iter() {
        per_topic.entry(&r.topic).or_default().insert(&r.contributor);
    }
    let counts: Series = per_topic.into_iter().map(|(t, cs)| (t.clone(), cs.len())).collect();
    Ok(Fields::new().with("number of contributors", counts))
}

fn number_of_posts_per_topic(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    let rows = c.post_rows();
    let counts: Series = count_by(rows.iter().map(|r| &r.topic)).into_iter().map(|(t, n)| (t, n as i64)).collect();
    Ok(Fields::new().with("number of posts", counts))
}

/// Whole days between the first and second, and the first and last post of each topic.
/// A topic with a single post has delays of 0.
fn post_delays_per_topic(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    let rows = c.post_rows();
    let mut first_last = Series::new();
    let mut first_second = Series::new();
    for (topic, dates) in dates_by_topic(&rows) {
        let (first, last) = (dates[0], dates[dates.len() - 1]);
        let second = dates.get(1).copied().unwrap_or(first);
        first_last.push(topic.clone(), days_between(first, last));
        first_second.push(topic.clone(), days_between(first, second));
    }
    Ok(Fields::new().with("delay first last post", first_last).with("delay first second post", first_second))
}

fn post_dates_per_topic(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    let rows = c.post_rows();
    let (mut first, mut second, mut last) = (Series::new(), Series::new(), Series::new());
    for (topic, dates) in dates_by_topic(&rows) {
        first.push(topic.clone(), dates[0]);
        second.push(topic.clone(), dates.get(1).copied().unwrap_or(dates[0]));
        last.push(topic.clone(), Value::Date(dates[dates.len() - 1]));
    }
    Ok(Fields::new().with("first post date", first).with("second post date", second).with("last post date", last))
}

fn number_of_posts_per_contributor(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    let rows = c.post_rows();
    let counts: Series =
        count_by(rows.iter().map(|r| &r.contributor)).into_iter().map(|(k, n)| (k, n as i64)).collect();
    Ok(Fields::new().with("number of posts", counts))
}
