//! Memoized building blocks shared by several metrics.
//!
//! Everything here is stored in the community's cache and computed at most once per
//! community (per key), so metrics that ask the same question per initial post stay cheap.

use crate::community::Community;
use crate::graph::GraphKind;
use crate::metrics::{day_of, initial_posts, is_initial, thread_positions};
use crate::util::sorted_tokens;
use crate::value::Key;
use ahash::AHashMap;
use anyhow::bail;
use rayon::prelude::*;
use std::sync::Arc;
use time::OffsetDateTime;

/// The only text similarity implemented.
pub const TOKEN_SORT_RATIO: &str = "token_sort_ratio";

// ---- contributor activity ----

/// Per-contributor index of initiated threads, comments and active days.
#[derive(Debug, Default)]
pub struct ContributorActivity {
    /// `(topic, day of the initial post)` per initiator, in date order.
    threads: AHashMap<Key, Vec<(Key, OffsetDateTime)>>,
    /// `(post id, day)` of every non-initial post, per contributor.
    comments: AHashMap<Key, Vec<(Key, OffsetDateTime)>>,
    /// Day of every post of a topic.
    topic_days: AHashMap<Key, Vec<OffsetDateTime>>,
    /// Distinct days with at least one post (Julian day numbers), ascending.
    active_days: AHashMap<Key, Vec<i32>>,
}

impl ContributorActivity {
    fn build(c: &Community) -> anyhow::Result<Self> {
        let rows = c.post_rows();
        let positions = thread_positions(c)?;
        let mut out = ContributorActivity::default();
        for post in crate::preprocessors::by_date(&rows) {
            let day = day_of(post.date);
            if is_initial(&positions, post) {
                out.threads.entry(post.contributor.clone()).or_default().push((post.topic.clone(), day));
            } else {
                out.comments.entry(post.contributor.clone()).or_default().push((post.id.clone(), day));
            }
            out.topic_days.entry(post.topic.clone()).or_default().push(day);
            let days = out.active_days.entry(post.contributor.clone()).or_default();
            let j = day.date().to_julian_day();
            if days.last() != Some(&j) {
                days.push(j);
            }
        }
        Ok(out)
    }

    /// Topics initiated by `contributor` on a day before `date_limit` (all when `None`).
    pub fn threads_by_contributor(&self, contributor: &Key, date_limit: Option<OffsetDateTime>) -> Vec<Key> {
        before(self.threads.get(contributor), date_limit)
    }

    /// Non-initial posts by `contributor` on a day before `date_limit` (all when `None`).
    pub fn comments_by_contributor(&self, contributor: &Key, date_limit: Option<OffsetDateTime>) -> Vec<Key> {
        before(self.comments.get(contributor), date_limit)
    }

    /// Number of replies in each topic initiated by `contributor`. With a `date_limit`,
    /// only topics and replies from days before it count.
    pub fn replies_to_own_topics(&self, contributor: &Key, date_limit: Option<OffsetDateTime>) -> Vec<usize> {
        self.threads_by_contributor(contributor, date_limit)
            .iter()
            .map(|topic| {
                let posts = self
                    .topic_days
                    .get(topic)
                    .map_or(0, |days| days.iter().filter(|d| date_limit.map_or(true, |l| **d < l)).count());
                posts.saturating_sub(1)
            })
            .collect()
    }

    /// Day of the first post by `contributor`.
    pub fn date_of_first_post(&self, contributor: &Key) -> Option<OffsetDateTime> {
        let first = *self.active_days.get(contributor)?.first()?;
        let date = time::Date::from_julian_day(first).ok()?;
        Some(date.midnight().assume_utc())
    }

    /// Share of the days between `start` and `end` on which `contributor` posted.
    /// Both ends count as active days; the share is over the whole days from `start` to `end`.
    pub fn contribution_regularity(&self, contributor: &Key, start: OffsetDateTime, end: OffsetDateTime) -> Option<f64> {
        let span = crate::date::days_between(start, end);
        if span <= 0 {
            return None;
        }
        let (s, e) = (start.date().to_julian_day(), end.date().to_julian_day());
        let active = self.active_days.get(contributor).map_or(0, |days| days.iter().filter(|d| (s..=e).contains(*d)).count());
        Some(active as f64 / span as f64)
    }
}

fn before(entries: Option<&Vec<(Key, OffsetDateTime)>>, limit: Option<OffsetDateTime>) -> Vec<Key> {
    entries
        .map(|v| v.iter().filter(|(_, d)| limit.map_or(true, |l| *d < l)).map(|(k, _)| k.clone()).collect())
        .unwrap_or_default()
}

pub fn contributor_activity(c: &Community) -> anyhow::Result<Arc<ContributorActivity>> {
    c.cache().activity.get_or_try_insert_with((), || ContributorActivity::build(c))
}

// ---- text similarity ----

/// Pairwise text similarity between the initial posts of a community.
#[derive(Debug)]
pub struct SimilarityNetwork {
    posts: Vec<Key>,
    days: Vec<OffsetDateTime>,
    position: AHashMap<Key, usize>,
    /// Row-major `n x n`; the diagonal is 1.
    weights: Vec<f64>,
}

impl SimilarityNetwork {
    fn build(c: &Community, text_column: &str, metric: &str) -> anyhow::Result<Self> {
        if metric != TOKEN_SORT_RATIO {
            bail!("unknown similarity metric '{metric}' (supported: {TOKEN_SORT_RATIO})");
        }
        let Some(texts) = c.posts().column(text_column) else {
            bail!("posts of '{}' have no text column '{text_column}'", c.name());
        };
        let rows = c.post_rows();
        let initial = initial_posts(c, &rows)?;
        let docs: Vec<String> = initial.iter().map(|p| texts[p.pos].as_str().map(sorted_tokens).unwrap_or_default()).collect();
        let n = docs.len();
        tracing::debug!("similarity network for '{}': {} initial posts", c.name(), n);
        let weights: Vec<f64> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let docs = &docs;
                (0..n).map(move |j| if i == j { 1.0 } else { strsim::normalized_levenshtein(&docs[i], &docs[j]) })
            })
            .collect();
        let posts: Vec<Key> = initial.iter().map(|p| p.id.clone()).collect();
        let position = posts.iter().enumerate().map(|(i, k)| (k.clone(), i)).collect();
        Ok(Self { posts, days: initial.iter().map(|p| day_of(p.date)).collect(), position, weights })
    }

    pub fn len(&self) -> usize { self.posts.len() }
    pub fn is_empty(&self) -> bool { self.posts.is_empty() }
    pub fn contains(&self, post: &Key) -> bool { self.position.contains_key(post) }

    pub fn similarity(&self, a: &Key, b: &Key) -> Option<f64> {
        let (i, j) = (*self.position.get(a)?, *self.position.get(b)?);
        Some(self.weights[i * self.len() + j])
    }

    /// Similarities of `post` to every other initial post dated on or before `day`.
    /// `None` when `post` is not in the network.
    pub fn similarities_until(&self, post: &Key, day: OffsetDateTime) -> Option<Vec<f64>> {
        let i = *self.position.get(post)?;
        let n = self.len();
        Some((0..n).filter(|&j| j != i && self.days[j] <= day).map(|j| self.weights[i * n + j]).collect())
    }
}

pub fn similarity_network(c: &Community, text_column: &str, metric: &str) -> anyhow::Result<Arc<SimilarityNetwork>> {
    c.cache()
        .similarity
        .get_or_try_insert_with((text_column.to_string(), metric.to_string()), || SimilarityNetwork::build(c, text_column, metric))
}

// ---- temporal network centralities ----

/// Degree centralities in the `kind` network of posts before `end`, memoized per
/// `(metric, end, kind)`. Metrics: `degree_centrality`, `in_degree_centrality`,
/// `out_degree_centrality`.
pub fn temporal_centrality(
    c: &Community,
    metric: &str,
    end: OffsetDateTime,
    kind: GraphKind,
) -> anyhow::Result<Arc<AHashMap<Key, f64>>> {
    c.cache().centralities.get_or_try_insert_with((metric.to_string(), end, kind), || {
        let graph = c.temporal_graph(None, Some(end), kind);
        let values = match metric {
            "degree_centrality" => graph.degree_centrality(),
            "in_degree_centrality" => graph.in_degree_centrality(),
            "out_degree_centrality" => graph.out_degree_centrality(),
            "betweenness_centrality" => graph.betweenness_centrality(),
            "eigenvector_centrality" => match graph.eigenvector_centrality() {
                Some(values) => values,
                None => bail!("eigenvector centrality did not converge for the network up to {}", end.date()),
            },
            other => bail!("the network metric '{other}' is not defined"),
        };
        Ok(values.into_iter().collect())
    })
}
