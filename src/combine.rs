//! Combining the results of several metrics on one community.

use crate::catalog::MetricCatalog;
use crate::community::Community;
use crate::datatypes::{CommunityDataLevel, MetricReturnType};
use crate::error::{Error, Result};
use crate::frame::{Frame, COMMUNITY_NAME};
use crate::metric::{Fields, Metric, MetricData};
use crate::params::Params;
use crate::value::{Key, Value};
use ahash::AHashSet;
use polars::prelude::{AnyValue, DataFrame, IntoLazy};
use polars_lazy::dsl::{coalesce, col};
use std::collections::BTreeSet;

/// A metric reference with its parameters, as listed by a report.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricCall {
    pub metric: String,
    pub params: Params,
}

impl MetricCall {
    pub fn new(metric: impl Into<String>, params: Params) -> Self { Self { metric: metric.into(), params } }
    pub fn bare(metric: impl Into<String>) -> Self { Self::new(metric, Params::new()) }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CombinedData {
    Frame(Frame),
    Plain(Vec<Fields>),
}

/// Combined results of several metrics on one community.
#[derive(Clone, Debug, PartialEq)]
pub struct Combined {
    pub community: String,
    pub data: CombinedData,
    pub level: CommunityDataLevel,
    pub returntype: MetricReturnType,
    pub fields: BTreeSet<String>,
}

/// The single `(level, returntype)` shared by all entries, or an error naming every entry.
pub fn check_homogeneous<'a, I>(entries: I, context: &str) -> Result<(CommunityDataLevel, MetricReturnType)>
where
    I: IntoIterator<Item = (&'a str, CommunityDataLevel, MetricReturnType)>,
{
    let entries: Vec<_> = entries.into_iter().collect();
    let levels: BTreeSet<CommunityDataLevel> = entries.iter().map(|e| e.1).collect();
    let returntypes: BTreeSet<MetricReturnType> = entries.iter().map(|e| e.2).collect();
    if levels.len() == 1 && returntypes.len() == 1 {
        let (_, level, returntype) = entries[0];
        return Ok((level, returntype));
    }
    if entries.is_empty() {
        return Err(Error::Invalid(format!("nothing to combine ({context})")));
    }
    let details = entries
        .iter()
        .map(|(name, level, rt)| format!("{name} ({level}, {rt})"))
        .collect::<Vec<_>>()
        .join(", ");
    Err(Error::IncompatibleMetrics { context: context.to_string(), details })
}

/// Look up, check and evaluate `calls` on `community`, then combine the results.
/// Metadata is checked before any metric body runs.
pub fn run_metrics(catalog: &MetricCatalog, community: &Community, calls: &[MetricCall]) -> Result<Combined> {
    let defs = calls.iter().map(|c| catalog.metric(&c.metric)).collect::<Result<Vec<_>>>()?;
    check_homogeneous(
        defs.iter().map(|d| (d.name(), d.level(), d.returntype())),
        &format!("community '{}'", community.name()),
    )?;
    let mut results = Vec::with_capacity(calls.len());
    for (def, call) in defs.iter().zip(calls) {
        tracing::debug!("evaluating '{}' on '{}' ({})", def.name(), community.name(), call.params);
        results.push(def.evaluate(community, &call.params)?);
    }
    combine(community.name(), results)
}

/// Combine evaluated metrics of one community:
/// dataframes are merged on their shared index and stamped with `community_name`,
/// tables are merged into one wider row, plain results are listed in order.
pub fn combine(community: &str, results: Vec<Metric>) -> Result<Combined> {
    let (level, returntype) = check_homogeneous(
        results.iter().map(|m| (m.metric(), m.level(), m.returntype())),
        &format!("community '{community}'"),
    )?;
    let fields: BTreeSet<String> = results.iter().flat_map(|m| m.fields().iter().cloned()).collect();

    let data = match returntype {
        MetricReturnType::Plain => CombinedData::Plain(
            results
                .into_iter()
                .filter_map(|m| match m.into_data() {
                    MetricData::Plain(f) => Some(f),
                    MetricData::Frame(_) => None,
                })
                .collect(),
        ),
        MetricReturnType::Table | MetricReturnType::DataFrame => {
            let mut frames: Vec<Frame> = results
                .into_iter()
                .filter_map(|m| match m.into_data() {
                    MetricData::Frame(f) => Some(f),
                    MetricData::Plain(_) => None,
                })
                .collect();
            let mut frame = if frames.len() == 1 { frames.remove(0) } else { merge_frames(&frames, false)? };
            if returntype == MetricReturnType::DataFrame {
                frame.set_constant(COMMUNITY_NAME, Value::from(community))?;
            }
            CombinedData::Frame(frame)
        }
    };
    Ok(Combined { community: community.to_string(), data, level, returntype, fields })
}

/// Outer-merge frames on their index.
///
/// Columns present in every frame are duplicates and are taken from the first frame with a
/// value on the row (dropped entirely with `only_unique`). Every other column is joined in;
/// a column produced by several frames must agree wherever both have a value.
pub fn merge_frames(frames: &[Frame], only_unique: bool) -> Result<Frame> {
    let Some(first) = frames.first() else {
        return Err(Error::Invalid("merge_frames needs at least one frame".into()));
    };
    for f in frames {
        if !f.has_unique_index() {
            return Err(Error::Shape(format!("cannot merge on non-unique index '{}'", f.index_name())));
        }
    }
    let index_name = first.index_name();

    let duplicates: Vec<String> = first
        .column_names()
        .into_iter()
        .filter(|c| frames.iter().all(|f| f.has_column(c)))
        .map(str::to_string)
        .collect();

    let mut keys: Vec<Key> = Vec::new();
    let mut seen = AHashSet::new();
    for f in frames {
        for k in f.index() {
            if seen.insert(k.clone()) {
                keys.push(k);
            }
        }
    }

    // every frame joined onto the union of keys, its columns tagged with the frame position
    let mut merged = Frame::new(index_name, keys);
    let mut sources: Vec<(String, Vec<String>)> =
        if only_unique { Vec::new() } else { duplicates.iter().map(|c| (c.clone(), Vec::new())).collect() };
    for (i, f) in frames.iter().enumerate() {
        let mut tagged = f.dataframe().clone();
        for c in f.column_names() {
            let name = format!("{c}#{i}");
            tagged.rename(c, &name)?;
            let is_duplicate = duplicates.iter().any(|d| d == c);
            if only_unique && is_duplicate {
                continue;
            }
            match sources.iter_mut().find(|(n, _)| n == c) {
                Some((_, candidates)) => candidates.push(name),
                None => sources.push((c.to_string(), vec![name])),
            }
        }
        let tagged = Frame::from_dataframe(f.index_name(), tagged)?.rename_index(index_name)?;
        merged = merged.left_join(&tagged)?;
    }

    for (name, candidates) in &sources {
        if duplicates.contains(name) {
            continue;
        }
        if let Some((a, b)) = first_conflict(merged.dataframe(), candidates)? {
            return Err(Error::FieldCollision {
                field: name.clone(),
                context: format!("merging on '{index_name}', frames {a} and {b} disagree"),
            });
        }
    }

    let mut exprs = vec![col(index_name)];
    exprs.extend(sources.iter().map(|(name, candidates)| {
        coalesce(&candidates.iter().map(|c| col(c)).collect::<Vec<_>>()).alias(name)
    }));
    let df = merged.into_dataframe().lazy().select(exprs).collect()?;
    Frame::from_dataframe(index_name, df)
}

/// The first pair of tagged columns holding different non-null values on some row.
fn first_conflict(df: &DataFrame, candidates: &[String]) -> Result<Option<(String, String)>> {
    for (i, a) in candidates.iter().enumerate() {
        for b in &candidates[i + 1..] {
            let clash = df
                .clone()
                .lazy()
                .select([col(a).is_not_null().and(col(b).is_not_null()).and(col(a).neq(col(b))).any(true)])
                .collect()?;
            let flagged = clash.get_columns().first().and_then(|s| s.get(0).ok());
            if matches!(flagged, Some(AnyValue::Boolean(true))) {
                return Ok(Some((tag_of(a), tag_of(b))));
            }
        }
    }
    Ok(None)
}

fn tag_of(column: &str) -> String { column.rsplit('#').next().unwrap_or(column).to_string() }
