//! A loaded forum: posts, contributors and topics, plus lazily built networks.
//!
//! Posts are the source of truth. Every post must resolve to an existing contributor row and
//! an existing topic row; `Community::new` refuses data that does not.

use crate::cache::CommunityCache;
use crate::datatypes::CommunityDataLevel;
use crate::error::{Error, Result};
use crate::frame::{Frame, Row, Series};
use crate::graph::{ContributorGraph, GraphKind};
use crate::value::{Key, Value};
use ahash::AHashSet;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};
use time::OffsetDateTime;

/// Column names of the posts table. Contributors are indexed by the contributor column,
/// topics by the topic column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommunitySchema {
    pub post_index: String,
    pub date_column: String,
    pub contributor_column: String,
    pub topic_column: String,
    pub text_column: String,
}

impl Default for CommunitySchema {
    fn default() -> Self {
        Self {
            post_index: "id".into(),
            date_column: "date".into(),
            contributor_column: "contributor".into(),
            topic_column: "topic".into(),
            text_column: "text".into(),
        }
    }
}

impl CommunitySchema {
    pub fn with_post_index(mut self, v: impl Into<String>) -> Self { self.post_index = v.into(); self }
    pub fn with_date_column(mut self, v: impl Into<String>) -> Self { self.date_column = v.into(); self }
    pub fn with_contributor_column(mut self, v: impl Into<String>) -> Self { self.contributor_column = v.into(); self }
    pub fn with_topic_column(mut self, v: impl Into<String>) -> Self { self.topic_column = v.into(); self }
    pub fn with_text_column(mut self, v: impl Into<String>) -> Self { self.text_column = v.into(); self }

    fn core_post_columns(&self) -> [&str; 3] {
        [&self.date_column, &self.contributor_column, &self.topic_column]
    }
}

/// Typed projection of one post.
#[derive(Clone, Debug, PartialEq)]
pub struct PostRow {
    /// Row position in the posts table.
    pub pos: usize,
    pub id: Key,
    pub date: OffsetDateTime,
    pub contributor: Key,
    pub topic: Key,
    pub text: Option<String>,
}

pub struct Community {
    name: String,
    schema: CommunitySchema,
    posts: Frame,
    contributors: Frame,
    topics: Frame,
    rows: OnceLock<Arc<Vec<PostRow>>>,
    cache: CommunityCache,
}

impl Community {
    /// Validate and assemble a community. The contributors and topics frames must be indexed
    /// by contributor and topic id respectively.
    pub fn new(
        name: impl Into<String>,
        schema: CommunitySchema,
        posts: Frame,
        contributors: Frame,
        topics: Frame,
    ) -> Result<Self> {
        let name = name.into();
        let posts = posts.rename_index(schema.post_index.clone())?;
        let contributors = contributors.rename_index(schema.contributor_column.clone())?;
        let topics = topics.rename_index(schema.topic_column.clone())?;
        let rows = extract_rows(&name, &schema, &posts)?;

        let known_contributors: AHashSet<Key> = contributors.index().into_iter().collect();
        let known_topics: AHashSet<Key> = topics.index().into_iter().collect();
        for r in &rows {
            if !known_contributors.contains(&r.contributor) {
                return Err(Error::Integrity {
                    community: name,
                    reason: format!("post {} references unknown contributor {}", r.id, r.contributor),
                });
            }
            if !known_topics.contains(&r.topic) {
                return Err(Error::Integrity {
                    community: name,
                    reason: format!("post {} references unknown topic {}", r.id, r.topic),
                });
            }
        }
        if !posts.has_unique_index() {
            return Err(Error::Integrity { community: name, reason: "duplicate post ids".into() });
        }

        let community = Self {
            name,
            schema,
            posts,
            contributors,
            topics,
            rows: OnceLock::new(),
            cache: CommunityCache::default(),
        };
        let _ = community.rows.set(Arc::new(rows));
        tracing::debug!(
            "community '{}': {} posts, {} contributors, {} topics",
            community.name,
            community.posts.height(),
            community.contributors.height(),
            community.topics.height()
        );
        Ok(community)
    }

    /// Community whose contributors and topics tables are derived from the posts (ids only).
    pub fn from_posts(name: impl Into<String>, schema: CommunitySchema, posts: Frame) -> Result<Self> {
        let name = name.into();
        let rows = extract_rows(&name, &schema, &posts)?;
        let contributors: BTreeSet<Key> = rows.iter().map(|r| r.contributor.clone()).collect();
        let topics: BTreeSet<Key> = rows.iter().map(|r| r.topic.clone()).collect();
        let contributors = Frame::new(schema.contributor_column.clone(), contributors.into_iter().collect());
        let topics = Frame::new(schema.topic_column.clone(), topics.into_iter().collect());
        Self::new(name, schema, posts, contributors, topics)
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn schema(&self) -> &CommunitySchema { &self.schema }
    pub fn posts(&self) -> &Frame { &self.posts }
    pub fn contributors(&self) -> &Frame { &self.contributors }
    pub fn topics(&self) -> &Frame { &self.topics }

    pub fn date_column(&self) -> &str { &self.schema.date_column }
    pub fn contributor_column(&self) -> &str { &self.schema.contributor_column }
    pub fn topic_column(&self) -> &str { &self.schema.topic_column }
    pub fn text_column(&self) -> &str { &self.schema.text_column }

    /// The entity table at `level`; the community level has none.
    pub fn view(&self, level: CommunityDataLevel) -> Option<&Frame> {
        match level {
            CommunityDataLevel::Posts => Some(&self.posts),
            CommunityDataLevel::Topics => Some(&self.topics),
            CommunityDataLevel::Contributors => Some(&self.contributors),
            CommunityDataLevel::Community => None,
        }
    }

    /// Typed posts in table order.
    pub fn post_rows(&self) -> Arc<Vec<PostRow>> {
        self.rows
            .get_or_init(|| Arc::new(extract_rows(&self.name, &self.schema, &self.posts).unwrap_or_default()))
            .clone()
    }

    pub(crate) fn cache(&self) -> &CommunityCache { &self.cache }

    /// Add (or replace) a derived posts column. Core columns cannot be replaced.
    pub fn set_posts_column(&mut self, name: &str, values: &Series) -> Result<()> {
        if self.schema.core_post_columns().contains(&name) || name == self.schema.text_column {
            return Err(Error::Invalid(format!("posts column '{name}' is part of the community schema")));
        }
        self.posts.set_series(name, values)
    }

    /// Add (or replace) a derived topics column.
    pub fn set_topics_column(&mut self, name: &str, values: &Series) -> Result<()> {
        self.topics.set_series(name, values)
    }

    /// Copy of the community restricted to posts with `start <= date < end`.
    /// Contributors and topics are restricted to the ones still referenced.
    pub fn timeslice(&self, start: Option<OffsetDateTime>, end: Option<OffsetDateTime>) -> Result<Community> {
        let rows = self.post_rows();
        let keep: AHashSet<usize> = rows.iter().filter(|r| in_range(r.date, start, end)).map(|r| r.pos).collect();
        let posts = self.posts.filter_rows(|r| keep.contains(&r.position()))?;
        let contributors: AHashSet<&Key> =
            rows.iter().filter(|r| keep.contains(&r.pos)).map(|r| &r.contributor).collect();
        let topics: AHashSet<&Key> = rows.iter().filter(|r| keep.contains(&r.pos)).map(|r| &r.topic).collect();
        Community::new(
            self.name.clone(),
            self.schema.clone(),
            posts,
            self.contributors.filter_rows(|r| contributors.contains(r.key()))?,
            self.topics.filter_rows(|r| topics.contains(r.key()))?,
        )
    }

    /// Contributor row of the author of post `post_id`.
    pub fn contributor_by_post_id(&self, post_id: &Key) -> Option<Row<'_>> {
        let rows = self.post_rows();
        let post = rows.iter().find(|r| &r.id == post_id)?;
        self.contributors.row(&post.contributor)
    }

    /// Distinct contributors of a topic, in order of their first post.
    pub fn contributors_by_topic_id(&self, topic_id: &Key) -> Vec<Key> {
        let mut posts: Vec<&PostRow> = Vec::new();
        let rows = self.post_rows();
        posts.extend(rows.iter().filter(|r| &r.topic == topic_id));
        posts.sort_by_key(|r| r.date);
        let mut out: Vec<Key> = Vec::new();
        for p in posts {
            if !out.contains(&p.contributor) {
                out.push(p.contributor.clone());
            }
        }
        out
    }

    pub fn co_contributor_graph(&self) -> Arc<ContributorGraph> {
        self.temporal_graph(None, None, GraphKind::CoContributor)
    }

    pub fn commenter_graph(&self) -> Arc<ContributorGraph> {
        self.temporal_graph(None, None, GraphKind::Commenter)
    }

    /// Network over posts with `start <= date < end`, cached per `(start, end, kind)`.
    pub fn temporal_graph(
        &self,
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
        kind: GraphKind,
    ) -> Arc<ContributorGraph> {
        self.cache.graphs.get_or_insert_with((start, end, kind), || {
            let rows = self.post_rows();
            let window: Vec<PostRow> = rows.iter().filter(|r| in_range(r.date, start, end)).cloned().collect();
            tracing::debug!("building {} graph for '{}' over {} posts", kind, self.name, window.len());
            ContributorGraph::build(kind, &window)
        })
    }
}

impl fmt::Debug for Community {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Community")
            .field("name", &self.name)
            .field("posts", &self.posts.height())
            .field("contributors", &self.contributors.height())
            .field("topics", &self.topics.height())
            .finish()
    }
}

fn in_range(date: OffsetDateTime, start: Option<OffsetDateTime>, end: Option<OffsetDateTime>) -> bool {
    start.map_or(true, |s| date >= s) && end.map_or(true, |e| date < e)
}

fn extract_rows(name: &str, schema: &CommunitySchema, posts: &Frame) -> Result<Vec<PostRow>> {
    let dates = required_column(posts, &schema.date_column, name)?;
    let contributors = required_column(posts, &schema.contributor_column, name)?;
    let topics = required_column(posts, &schema.topic_column, name)?;
    let texts = posts.column(&schema.text_column);
    let index = posts.index();

    let integrity = |reason: String| Error::Integrity { community: name.to_string(), reason };
    let mut rows = Vec::with_capacity(posts.height());
    for (pos, id) in index.iter().enumerate() {
        let date = dates[pos]
            .as_date()
            .ok_or_else(|| integrity(format!("post {id} has no valid date ({})", dates[pos])))?;
        let contributor = Key::from_value(&contributors[pos])
            .ok_or_else(|| integrity(format!("post {id} has no contributor")))?;
        let topic = Key::from_value(&topics[pos]).ok_or_else(|| integrity(format!("post {id} has no topic")))?;
        let text = texts.as_ref().and_then(|t| match &t[pos] {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        });
        rows.push(PostRow { pos, id: id.clone(), date, contributor, topic, text });
    }
    Ok(rows)
}

fn required_column(posts: &Frame, column: &str, community: &str) -> Result<Vec<Value>> {
    posts
        .column(column)
        .ok_or_else(|| Error::missing_column(column, format!("posts of community '{community}'")))
}
