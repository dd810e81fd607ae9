//! NDJSON snapshot loader.
//!
//! Layout: `<data_dir>/<community>/{posts,contributors,topics}.jsonl` (each optionally
//! `.jsonl.zst`). Posts are filtered to the configured date range; contributors and topics
//! are restricted to the ones the remaining posts reference.

use crate::community::{Community, CommunitySchema};
use crate::concurrency::map_limited;
use crate::config::LoadOptions;
use crate::date::parse_datetime;
use crate::error::Result;
use crate::frame::Frame;
use crate::ndjson::{find_table, NdjsonReader};
use crate::progress::maybe_count_progress;
use crate::util::init_tracing_once;
use crate::value::{Key, Value};
use ahash::AHashSet;
use anyhow::{anyhow, Context};
use serde_json::{Map, Value as Json};
use std::path::Path;
use time::OffsetDateTime;
use walkdir::WalkDir;

type Record = Map<String, Json>;

/// Names of the community directories under `data_dir` that hold a posts table, sorted.
pub fn discover_communities(data_dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    if !data_dir.exists() {
        return names;
    }
    for entry in WalkDir::new(data_dir).min_depth(1).max_depth(1).into_iter().flatten() {
        if !entry.file_type().is_dir() || find_table(entry.path(), "posts").is_none() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    names
}

/// Load every selected community (all discovered ones when `opts.communities` is unset).
pub fn load_communities(opts: &LoadOptions, schema: &CommunitySchema) -> Result<Vec<Community>> {
    init_tracing_once();
    let mut names = match &opts.communities {
        Some(names) => names.clone(),
        None => discover_communities(&opts.data_dir),
    };
    names.sort();
    names.dedup();
    tracing::info!("loading {} communities from {}", names.len(), opts.data_dir.display());

    let pb = maybe_count_progress(opts.progress, names.len() as u64, "Loading communities");
    let communities = map_limited(&names, opts.concurrency, |name| {
        let c = load_community(&opts.data_dir.join(name), name, schema, opts);
        if let Some(pb) = &pb { pb.inc(1); }
        c
    })?;
    if let Some(pb) = pb { pb.finish_with_message("Loading communities done"); }
    Ok(communities)
}

/// Load one community directory.
pub fn load_community(dir: &Path, name: &str, schema: &CommunitySchema, opts: &LoadOptions) -> Result<Community> {
    let posts = read_table(dir, "posts", opts)?.ok_or_else(|| anyhow!("{}: no posts table", dir.display()))?;
    let contributors = read_table(dir, "contributors", opts)?.unwrap_or_default();
    let topics = read_table(dir, "topics", opts)?.unwrap_or_default();

    let (posts, contributor_ids, topic_ids) = filter_posts(name, posts, schema, opts.start, opts.end);
    let contributors = restrict(name, "contributors", contributors, &schema.contributor_column, &contributor_ids);
    let topics = restrict(name, "topics", topics, &schema.topic_column, &topic_ids);

    let posts = records_to_frame(&posts, &schema.post_index, Some(schema.date_column.as_str()))
        .with_context(|| format!("posts of '{name}'"))?;
    let contributors = records_to_frame(&contributors, &schema.contributor_column, None)
        .with_context(|| format!("contributors of '{name}'"))?;
    let topics =
        records_to_frame(&topics, &schema.topic_column, None).with_context(|| format!("topics of '{name}'"))?;
    tracing::info!("loaded '{}': {} posts, {} contributors, {} topics", name, posts.height(), contributors.height(), topics.height());
    Community::new(name, schema.clone(), posts, contributors, topics)
}

fn read_table(dir: &Path, stem: &str, opts: &LoadOptions) -> Result<Option<Vec<Record>>> {
    let Some(path) = find_table(dir, stem) else {
        tracing::debug!("{}: no {} table", dir.display(), stem);
        return Ok(None);
    };
    let reader = NdjsonReader::open(&path, opts.read_buffer_bytes).with_context(|| format!("open {}", path.display()))?;
    Ok(Some(reader.read_records(opts.nrows)?))
}

fn key_of(record: &Record, column: &str) -> Option<Key> {
    record.get(column).and_then(|v| Key::from_value(&Value::from_json(v)))
}

fn date_of(v: &Json) -> Option<OffsetDateTime> {
    match v {
        Json::String(s) => parse_datetime(s),
        Json::Number(n) => n.as_i64().and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok()),
        _ => None,
    }
}

/// Posts inside `[start, end)` with a usable date, contributor and topic, plus the ids they reference.
fn filter_posts(
    community: &str,
    posts: Vec<Record>,
    schema: &CommunitySchema,
    start: Option<OffsetDateTime>,
    end: Option<OffsetDateTime>,
) -> (Vec<Record>, Vec<Key>, Vec<Key>) {
    let mut kept = Vec::with_capacity(posts.len());
    let mut contributors = Vec::new();
    let mut topics = Vec::new();
    let (mut seen_c, mut seen_t) = (AHashSet::new(), AHashSet::new());
    let mut unusable = 0usize;
    for post in posts {
        let date = post.get(&schema.date_column).and_then(date_of);
        let contributor = key_of(&post, &schema.contributor_column);
        let topic = key_of(&post, &schema.topic_column);
        let (Some(date), Some(contributor), Some(topic)) = (date, contributor, topic) else {
            unusable += 1;
            continue;
        };
        if start.is_some_and(|s| date < s) || end.is_some_and(|e| date >= e) {
            continue;
        }
        if seen_c.insert(contributor.clone()) {
            contributors.push(contributor);
        }
        if seen_t.insert(topic.clone()) {
            topics.push(topic);
        }
        kept.push(post);
    }
    if unusable > 0 {
        tracing::warn!("'{}': skipped {} posts without date, contributor or topic", community, unusable);
    }
    (kept, contributors, topics)
}

/// Rows of `records` referenced by `ids`; referenced ids without a row get an empty stub row.
fn restrict(community: &str, table: &str, records: Vec<Record>, index: &str, ids: &[Key]) -> Vec<Record> {
    let wanted: AHashSet<&Key> = ids.iter().collect();
    let mut seen: AHashSet<Key> = AHashSet::new();
    let mut out: Vec<Record> = Vec::new();
    for r in records {
        match key_of(&r, index) {
            Some(k) if wanted.contains(&k) && seen.insert(k.clone()) => out.push(r),
            _ => {}
        }
    }
    let missing: Vec<&Key> = ids.iter().filter(|k| !seen.contains(*k)).collect();
    if !missing.is_empty() {
        tracing::warn!("'{}': {} {} referenced by posts are missing, adding empty rows", community, missing.len(), table);
        for k in missing {
            let mut stub = Record::new();
            stub.insert(index.to_string(), k.to_value().to_json());
            out.push(stub);
        }
    }
    out
}

/// Frame from JSON objects: `index_col` becomes the index, other keys become columns in order
/// of first appearance (absent cells are null). `date_col` cells are parsed as timestamps.
fn records_to_frame(records: &[Record], index_col: &str, date_col: Option<&str>) -> anyhow::Result<Frame> {
    let mut names: Vec<&str> = Vec::new();
    let mut seen: AHashSet<&str> = AHashSet::new();
    for r in records {
        for k in r.keys() {
            if k != index_col && seen.insert(k.as_str()) {
                names.push(k.as_str());
            }
        }
    }
    let mut index = Vec::with_capacity(records.len());
    for (i, r) in records.iter().enumerate() {
        index.push(key_of(r, index_col).with_context(|| format!("row {i} has no usable '{index_col}'"))?);
    }
    let mut frame = Frame::new(index_col, index);
    for name in names {
        let values = records
            .iter()
            .map(|r| match r.get(name) {
                None => Value::Null,
                Some(v) if date_col == Some(name) => date_of(v).map_or(Value::Null, Value::Date),
                Some(v) => Value::from_json(v),
            })
            .collect();
        frame.push_column(name, values)?;
    }
    Ok(frame)
}
