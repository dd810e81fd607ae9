//! Topic indicators describing the initial post and its author: popularity, experience,
//! helpfulness and prestige of the initiator.
//!
//! By default the initiator's history is taken over the whole community; with
//! `ignore_temporal_dependency = false` only activity from days before the topic started counts.

use crate::catalog::CatalogBuilder;
use crate::community::Community;
use crate::graph::GraphKind;
use crate::metric::{Fields, MetricDef};
use crate::metrics::cached::{contributor_activity, temporal_centrality};
use crate::metrics::{day_of, initial_posts, per_topic};
use crate::params::Params;
use crate::preprocessors::POST_POSITION;
use crate::value::{Key, Value};
use ahash::{AHashMap, AHashSet};
use time::Duration;

pub(crate) fn register(b: CatalogBuilder) -> CatalogBuilder {
    let topics = |name: &str, f: fn(&Community, &Params) -> anyhow::Result<Fields>| {
        MetricDef::topics(name, f).requires_posts_column(POST_POSITION)
    };
    b.metric(topics("idea_popularity_by_number_of_unique_users_commenting", idea_popularity))
        .metric(topics("initiator_experience_by_past_contributions", experience))
        .metric(topics("initiator_helpfulness_by_contribution_regularity", helpfulness))
        .metric(topics("number_of_replies_to_topics_initiated_by_thread_initiator", replies_to_own_topics))
        .metric(topics("initiator_prestige_by_commenter_network_in_deg_centrality", commenter_in_degree))
        .metric(topics("initiator_experience_by_commenter_network_out_deg_centrality", commenter_out_degree))
}

fn ignore_temporal_dependency(params: &Params) -> anyhow::Result<bool> { params.bool_or("ignore_temporal_dependency", true) }

/// Comments and distinct commenters (the initiator excluded) per topic.
fn idea_popularity(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    let rows = c.post_rows();
    let initial = initial_posts(c, &rows)?;
    let mut posts: AHashMap<&Key, usize> = AHashMap::new();
    let mut contributors: AHashMap<&Key, AHashSet<&Key>> = AHashMap::new();
    for r in rows.iter() {
        *posts.entry(&r.topic).or_insert(0) += 1;
        contributors.entry(&r.topic).or_default().insert(&r.contributor);
    }
    let comments = per_topic(&initial, |p| Value::from(posts.get(&p.topic).map_or(0, |n| n.saturating_sub(1))));
    let commenters =
        per_topic(&initial, |p| Value::from(contributors.get(&p.topic).map_or(0, |s| s.len().saturating_sub(1))));
    Ok(Fields::new()
        .with("idea popularity: number of unique commenters", commenters)
        .with("idea popularity: number of comments", comments))
}

/// Past initial posts and comments of the initiator, absolute and per day since their first post.
fn experience(c: &Community, params: &Params) -> anyhow::Result<Fields> {
    let ignore_time = ignore_temporal_dependency(params)?;
    let rows = c.post_rows();
    let initial = initial_posts(c, &rows)?;
    let activity = contributor_activity(c)?;

    let limit = |p: &crate::community::PostRow| if ignore_time { None } else { Some(day_of(p.date)) };
    let days_since_first = |p: &crate::community::PostRow| {
        activity.date_of_first_post(&p.contributor).map(|first| (day_of(p.date) - first).whole_days())
    };
    let per_day = |count: usize, days: Option<i64>| match days {
        Some(d) if d != 0 => Value::float(count as f64 / d as f64),
        _ => Value::Null,
    };

    let threads = per_topic(&initial, |p| Value::from(activity.threads_by_contributor(&p.contributor, limit(p)).len()));
    let threads_per_day = per_topic(&initial, |p| {
        per_day(activity.threads_by_contributor(&p.contributor, limit(p)).len(), days_since_first(p))
    });
    let comments = per_topic(&initial, |p| Value::from(activity.comments_by_contributor(&p.contributor, limit(p)).len()));
    let comments_per_day = per_topic(&initial, |p| {
        per_day(activity.comments_by_contributor(&p.contributor, limit(p)).len(), days_since_first(p))
    });
    let days = per_topic(&initial, |p| Value::from(days_since_first(p)));

    Ok(Fields::new()
        .with("initiator experience: number of past initial posts", threads)
        .with("initiator experience: number of past initial posts (per day)", threads_per_day)
        .with("initiator experience: number of past comments", comments)
        .with("initiator experience: number of past comments (per day)", comments_per_day)
        .with("initiator experience: days since first post", days))
}

/// Share of the `lookback_days` before the topic started on which the initiator posted.
fn helpfulness(c: &Community, params: &Params) -> anyhow::Result<Fields> {
    let lookback = params.i64_or("lookback_days", 100)?;
    anyhow::ensure!(lookback > 0, "lookback_days must be positive, got {lookback}");
    let rows = c.post_rows();
    let initial = initial_posts(c, &rows)?;
    let span = lookback
        .checked_mul(86_400)
        .map(Duration::seconds)
        .ok_or_else(|| anyhow::anyhow!("lookback_days {lookback} is out of range"))?;
    if let Some(p) = initial.iter().find(|p| day_of(p.date).checked_sub(span).is_none()) {
        anyhow::bail!("lookback_days {lookback} reaches past the earliest date for topic {}", p.topic);
    }
    let activity = contributor_activity(c)?;
    let regularity = per_topic(&initial, |p| {
        let end = day_of(p.date);
        match end.checked_sub(span) {
            Some(start) => Value::from(activity.contribution_regularity(&p.contributor, start, end)),
            None => Value::Null,
        }
    });
    Ok(Fields::new().with(format!("initiator helpfulness: past ({lookback} days) contribution regularity"), regularity))
}

/// Replies received in all topics the initiator started.
fn replies_to_own_topics(c: &Community, params: &Params) -> anyhow::Result<Fields> {
    let ignore_time = ignore_temporal_dependency(params)?;
    let rows = c.post_rows();
    let initial = initial_posts(c, &rows)?;
    let activity = contributor_activity(c)?;
    let replies = per_topic(&initial, |p| {
        let limit = if ignore_time { None } else { Some(day_of(p.date)) };
        Value::from(activity.replies_to_own_topics(&p.contributor, limit).iter().sum::<usize>())
    });
    Ok(Fields::new().with("initiator prestige: replies to topics by initial contributor", replies))
}

/// In-degree centrality of the initiator in the commenter network of the days before the topic.
fn commenter_in_degree(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    let centrality = initiator_centrality(c, "in_degree_centrality")?;
    Ok(Fields::new().with("initiator prestige: commenter network in-degree centrality", centrality))
}

/// Out-degree centrality of the initiator, i.e. how many other initiators they had commented on.
fn commenter_out_degree(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    let centrality = initiator_centrality(c, "out_degree_centrality")?;
    Ok(Fields::new().with("initiator experience: commenter network out-degree centrality", centrality))
}

fn initiator_centrality(c: &Community, metric: &str) -> anyhow::Result<crate::frame::Series> {
    let rows = c.post_rows();
    let initial = initial_posts(c, &rows)?;
    let mut centrality = crate::frame::Series::new();
    for p in &initial {
        let day = day_of(p.date);
        let values = temporal_centrality(c, metric, day, GraphKind::Commenter)?;
        let value = values.get(&p.contributor).copied();
        if value.is_none() {
            tracing::debug!("contributor {} not in the commenter network of '{}' on {}", p.contributor, c.name(), day.date());
        }
        centrality.push(p.topic.clone(), value);
    }
    Ok(centrality)
}
