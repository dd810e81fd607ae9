//! Preprocessors derive one column on the posts or topics table.
//!
//! Running a preprocessor again replaces its column, so repeated runs leave the
//! community unchanged.

use crate::catalog::CatalogBuilder;
use crate::community::{Community, PostRow};
use crate::error::{Error, Result};
use crate::frame::Series;
use crate::params::Params;
use crate::util::count_words;
use crate::value::{Key, Value};
use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;
use time::Time;

/// Posts column written by `post_position_in_thread` (1 for the initial post of a topic).
pub const POST_POSITION: &str = "post_position_in_thread";
pub const NUMBER_OF_WORDS: &str = "number_of_words";
pub const ROUNDED_DATE: &str = "rounded_date";
pub const THREAD_TEXT: &str = "thread_text";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreprocessorTarget {
    Posts,
    Topics,
}

pub type PreprocessorFn = Arc<dyn Fn(&Community, &Params) -> anyhow::Result<Series> + Send + Sync>;

#[derive(Clone)]
pub struct PreprocessorDef {
    name: String,
    target: PreprocessorTarget,
    func: PreprocessorFn,
}

impl PreprocessorDef {
    pub fn new<F>(name: impl Into<String>, target: PreprocessorTarget, func: F) -> Self
    where
        F: Fn(&Community, &Params) -> anyhow::Result<Series> + Send + Sync + 'static,
    {
        Self { name: name.into(), target, func: Arc::new(func) }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn target(&self) -> PreprocessorTarget { self.target }

    /// Compute the column and store it under the preprocessor's name.
    pub fn apply(&self, community: &mut Community, params: &Params) -> Result<()> {
        let values = (self.func)(community, params).map_err(|e| Error::preprocessor(&self.name, community.name(), e))?;
        tracing::debug!("preprocessor '{}' on '{}': {} values", self.name, community.name(), values.len());
        match self.target {
            PreprocessorTarget::Posts => community.set_posts_column(&self.name, &values),
            PreprocessorTarget::Topics => community.set_topics_column(&self.name, &values),
        }
    }
}

impl fmt::Debug for PreprocessorDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreprocessorDef").field("name", &self.name).field("target", &self.target).finish()
    }
}

pub(crate) fn register(b: CatalogBuilder) -> CatalogBuilder {
    b.preprocessor(PreprocessorDef::new(POST_POSITION, PreprocessorTarget::Posts, post_position_in_thread))
        .preprocessor(PreprocessorDef::new(NUMBER_OF_WORDS, PreprocessorTarget::Posts, number_of_words))
        .preprocessor(PreprocessorDef::new(ROUNDED_DATE, PreprocessorTarget::Posts, rounded_date))
        .preprocessor(PreprocessorDef::new(THREAD_TEXT, PreprocessorTarget::Topics, thread_text))
}

/// Posts ordered by date; ties keep table order.
pub(crate) fn by_date(rows: &[PostRow]) -> Vec<&PostRow> {
    let mut sorted: Vec<&PostRow> = rows.iter().collect();
    sorted.sort_by_key(|r| r.date);
    sorted
}

/// Position of each post in its topic by date, starting at 1.
fn post_position_in_thread(c: &Community, _: &Params) -> anyhow::Result<Series> {
    let rows = c.post_rows();
    let mut seen: AHashMap<&Key, i64> = AHashMap::new();
    let mut out = Series::new();
    for r in by_date(&rows) {
        let n = seen.entry(&r.topic).or_insert(0);
        *n += 1;
        out.push(r.id.clone(), *n);
    }
    Ok(out)
}

fn number_of_words(c: &Community, _: &Params) -> anyhow::Result<Series> {
    Ok(c.post_rows()
        .iter()
        .map(|r| (r.id.clone(), r.text.as_deref().map(count_words).map_or(Value::Null, Value::from)))
        .collect())
}

/// Post date truncated to midnight.
fn rounded_date(c: &Community, _: &Params) -> anyhow::Result<Series> {
    Ok(c.post_rows().iter().map(|r| (r.id.clone(), Value::Date(r.date.replace_time(Time::MIDNIGHT)))).collect())
}

/// Texts of each topic's posts in date order.
fn thread_text(c: &Community, _: &Params) -> anyhow::Result<Series> {
    let rows = c.post_rows();
    let mut texts: AHashMap<&Key, Vec<Value>> = AHashMap::new();
    let mut order: Vec<&Key> = Vec::new();
    for r in by_date(&rows) {
        let entry = texts.entry(&r.topic).or_insert_with(|| {
            order.push(&r.topic);
            Vec::new()
        });
        entry.push(r.text.clone().map_or(Value::Null, Value::Str));
    }
    Ok(order.into_iter().map(|t| (t.clone(), Value::List(texts.remove(t).unwrap_or_default()))).collect())
}
