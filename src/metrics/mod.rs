//! Builtin metrics and reports.
//!
//! Metrics reading thread positions require the `post_position_in_thread` preprocessor to
//! have run; they declare it so that `Pici::get_metrics` can tell which are available.

pub mod basic;
pub mod cached;
pub mod distinctiveness;
pub mod initiator;
pub mod network;
pub mod reports;
pub mod text;

use crate::catalog::CatalogBuilder;
use crate::community::{Community, PostRow};
use crate::frame::Series;
use crate::preprocessors::{by_date, POST_POSITION};
use crate::value::{Key, Value};
use ahash::AHashSet;
use anyhow::Context;
use time::{OffsetDateTime, Time};

pub(crate) fn register(b: CatalogBuilder) -> CatalogBuilder {
    let b = basic::register(b);
    let b = initiator::register(b);
    let b = distinctiveness::register(b);
    let b = network::register(b);
    text::register(b)
}

/// Date truncated to midnight.
pub(crate) fn day_of(d: OffsetDateTime) -> OffsetDateTime { d.replace_time(Time::MIDNIGHT) }

/// The `post_position_in_thread` column.
pub(crate) fn thread_positions(c: &Community) -> anyhow::Result<Vec<Value>> {
    c.posts()
        .column(POST_POSITION)
        .with_context(|| format!("posts of '{}' have no '{POST_POSITION}' column; run that preprocessor first", c.name()))
}

pub(crate) fn is_initial(positions: &[Value], post: &PostRow) -> bool { positions[post.pos].as_i64() == Some(1) }

/// The initial post of every topic in date order (the earliest one if a topic has several).
pub(crate) fn initial_posts<'a>(c: &Community, rows: &'a [PostRow]) -> anyhow::Result<Vec<&'a PostRow>> {
    let positions = thread_positions(c)?;
    let mut seen: AHashSet<&Key> = AHashSet::new();
    let mut out = Vec::new();
    for post in by_date(rows) {
        if is_initial(&positions, post) && seen.insert(&post.topic) {
            out.push(post);
        }
    }
    Ok(out)
}

/// Topic-keyed series with one value per initial post.
pub(crate) fn per_topic(initial: &[&PostRow], mut f: impl FnMut(&PostRow) -> Value) -> Series {
    initial.iter().map(|p| (p.topic.clone(), f(p))).collect()
}
