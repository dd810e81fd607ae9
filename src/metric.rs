//! Metric declarations and the assembly of raw metric output into result tables.
//!
//! A metric body returns [`Fields`]: an ordered `name -> scalar | series` map. The declared
//! return type decides what happens next:
//! * `Plain`: the map is kept as is;
//! * `Table`: one row indexed by the community name (scalars only);
//! * `DataFrame`: one row per entity, left-joined onto the community's view at the metric's
//!   level when there is one.

use crate::community::Community;
use crate::datatypes::{CommunityDataLevel, MetricReturnType};
use crate::error::{Error, Result};
use crate::frame::{Frame, Series, COMMUNITY_NAME};
use crate::params::Params;
use crate::value::{Key, Value};
use ahash::AHashSet;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Index name used when a community-level dataframe does not name its index.
pub const DEFAULT_INDEX_NAME: &str = "index";

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    Series(Series),
}

impl From<Series> for FieldValue {
    fn from(s: Series) -> Self { FieldValue::Series(s) }
}

macro_rules! scalar_field {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(v: $t) -> Self { FieldValue::Scalar(Value::from(v)) }
        })*
    };
}

scalar_field!(Value, bool, i64, i32, usize, f64, &str, String, time::OffsetDateTime, Option<f64>, Option<i64>);

/// Ordered field map returned by a metric body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
    index_name: Option<String>,
}

impl Fields {
    pub fn new() -> Self { Self::default() }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Name for the index of a bare (unjoined) dataframe, e.g. `date` for interval bins.
    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Insert or replace a field, keeping its original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Append the fields of `other` whose names are not present yet (first occurrence wins).
    pub fn chain(&mut self, other: Fields) {
        if self.index_name.is_none() {
            self.index_name = other.index_name;
        }
        for (name, value) in other.entries {
            if !self.contains(&name) {
                self.entries.push((name, value));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool { self.entries.iter().any(|(n, _)| n == name) }
    pub fn names(&self) -> impl Iterator<Item = &str> { self.entries.iter().map(|(n, _)| n.as_str()) }
    pub fn iter(&self) -> impl Iterator<Item = &(String, FieldValue)> { self.entries.iter() }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn index_name(&self) -> Option<&str> { self.index_name.as_deref() }

    /// Scalar value of a field.
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            FieldValue::Scalar(v) => Some(v),
            FieldValue::Series(_) => None,
        }
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        match self.get(name)? {
            FieldValue::Series(s) => Some(s),
            FieldValue::Scalar(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (name, value) in &self.entries {
            let v = match value {
                FieldValue::Scalar(v) => v.to_json(),
                FieldValue::Series(s) => {
                    let mut inner = serde_json::Map::new();
                    for (k, v) in s.iter() {
                        inner.insert(k.as_string(), v.to_json());
                    }
                    serde_json::Value::Object(inner)
                }
            };
            obj.insert(name.clone(), v);
        }
        serde_json::Value::Object(obj)
    }
}

impl Extend<(String, FieldValue)> for Fields {
    fn extend<I: IntoIterator<Item = (String, FieldValue)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

/// Signature of a metric body.
pub type MetricFn = Arc<dyn Fn(&Community, &Params) -> anyhow::Result<Fields> + Send + Sync>;

/// A named metric with its declared level and return type.
#[derive(Clone)]
pub struct MetricDef {
    name: String,
    level: CommunityDataLevel,
    returntype: MetricReturnType,
    requires: Vec<String>,
    func: MetricFn,
}

impl MetricDef {
    pub fn new<F>(name: impl Into<String>, level: CommunityDataLevel, returntype: MetricReturnType, func: F) -> Self
    where
        F: Fn(&Community, &Params) -> anyhow::Result<Fields> + Send + Sync + 'static,
    {
        Self { name: name.into(), level, returntype, requires: Vec::new(), func: Arc::new(func) }
    }

    /// Topics-level dataframe metric.
    pub fn topics<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Community, &Params) -> anyhow::Result<Fields> + Send + Sync + 'static,
    {
        Self::new(name, CommunityDataLevel::Topics, MetricReturnType::DataFrame, func)
    }

    /// Community-level table metric.
    pub fn community<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Community, &Params) -> anyhow::Result<Fields> + Send + Sync + 'static,
    {
        Self::new(name, CommunityDataLevel::Community, MetricReturnType::Table, func)
    }

    /// Declare a posts column (usually added by a preprocessor) the body reads.
    pub fn requires_posts_column(mut self, column: impl Into<String>) -> Self {
        self.requires.push(column.into());
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn level(&self) -> CommunityDataLevel { self.level }
    pub fn returntype(&self) -> MetricReturnType { self.returntype }
    pub fn required_columns(&self) -> &[String] { &self.requires }

    pub fn is_available_for(&self, community: &Community) -> bool {
        self.requires.iter().all(|c| community.posts().has_column(c))
    }

    /// Run the body only (the unwrapped metric).
    pub fn compute(&self, community: &Community, params: &Params) -> Result<Fields> {
        if let Some(missing) = self.requires.iter().find(|c| !community.posts().has_column(c)) {
            return Err(Error::missing_column(
                missing,
                format!("posts of '{}', required by metric '{}'", community.name(), self.name),
            ));
        }
        (self.func)(community, params).map_err(|e| Error::metric(&self.name, community.name(), e))
    }

    /// Run the body and assemble its output according to the declared return type.
    pub fn evaluate(&self, community: &Community, params: &Params) -> Result<Metric> {
        let fields = self.compute(community, params)?;
        let names: BTreeSet<String> = fields.names().map(str::to_string).collect();
        let data = assemble(fields, self.level, self.returntype, community)
            .map_err(|e| annotate(e, &self.name))?;
        Ok(Metric {
            community: community.name().to_string(),
            metric: self.name.clone(),
            data,
            fields: names,
            level: self.level,
            returntype: self.returntype,
        })
    }
}

impl fmt::Debug for MetricDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricDef")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("returntype", &self.returntype)
            .field("requires", &self.requires)
            .finish()
    }
}

fn annotate(e: Error, metric: &str) -> Error {
    match e {
        Error::FieldCollision { field, context } => {
            Error::FieldCollision { field, context: format!("metric '{metric}': {context}") }
        }
        Error::Shape(msg) => Error::Shape(format!("metric '{metric}': {msg}")),
        other => other,
    }
}

/// Assembled metric output.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricData {
    Plain(Fields),
    Frame(Frame),
}

impl MetricData {
    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            MetricData::Frame(f) => Some(f),
            MetricData::Plain(_) => None,
        }
    }

    pub fn as_fields(&self) -> Option<&Fields> {
        match self {
            MetricData::Plain(f) => Some(f),
            MetricData::Frame(_) => None,
        }
    }
}

/// Result of evaluating one metric on one community.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    community: String,
    metric: String,
    data: MetricData,
    fields: BTreeSet<String>,
    level: CommunityDataLevel,
    returntype: MetricReturnType,
}

impl Metric {
    pub fn community(&self) -> &str { &self.community }
    pub fn metric(&self) -> &str { &self.metric }
    pub fn data(&self) -> &MetricData { &self.data }
    pub fn into_data(self) -> MetricData { self.data }
    pub fn fields(&self) -> &BTreeSet<String> { &self.fields }
    pub fn level(&self) -> CommunityDataLevel { self.level }
    pub fn returntype(&self) -> MetricReturnType { self.returntype }

    pub fn frame(&self) -> Option<&Frame> { self.data.as_frame() }
}

/// Shape raw fields according to `returntype`.
pub fn assemble(
    fields: Fields,
    level: CommunityDataLevel,
    returntype: MetricReturnType,
    community: &Community,
) -> Result<MetricData> {
    match returntype {
        MetricReturnType::Plain => Ok(MetricData::Plain(fields)),
        MetricReturnType::Table => as_table(&fields, community.name()).map(MetricData::Frame),
        MetricReturnType::DataFrame => {
            let table = to_frame_coerced(&fields)?;
            match community.view(level) {
                Some(view) => join_onto_view(view, &table).map(MetricData::Frame),
                None => Ok(MetricData::Frame(table)),
            }
        }
    }
}

/// One row indexed by the community name.
fn as_table(fields: &Fields, community: &str) -> Result<Frame> {
    let mut frame = Frame::new(COMMUNITY_NAME, vec![Key::from(community)]);
    for (name, value) in fields.iter() {
        match value {
            FieldValue::Scalar(v) => frame.push_column(name.clone(), vec![v.clone()])?,
            FieldValue::Series(_) => {
                return Err(Error::Shape(format!("table field '{name}' must be a scalar, got a series")));
            }
        }
    }
    Ok(frame)
}

/// Per-entity table from series fields (scalars are broadcast). Index keys are sorted.
/// Fails with `MixedIndex` when integer and string keys meet.
pub fn to_frame(fields: &Fields) -> Result<Frame> {
    let index_name = fields.index_name().unwrap_or(DEFAULT_INDEX_NAME);
    let series: Vec<(&String, &Series)> = fields
        .iter()
        .filter_map(|(n, v)| match v {
            FieldValue::Series(s) => Some((n, s)),
            FieldValue::Scalar(_) => None,
        })
        .collect();
    if series.is_empty() && !fields.is_empty() {
        return Err(Error::Shape("dataframe fields are all scalars; at least one series is needed for an index".into()));
    }

    let mut keys: BTreeSet<&Key> = BTreeSet::new();
    for (name, s) in &series {
        let mut seen: AHashSet<&Key> = AHashSet::with_capacity(s.len());
        for k in s.keys() {
            if !seen.insert(k) {
                return Err(Error::Shape(format!("field '{name}' has duplicate key {k}")));
            }
            keys.insert(k);
        }
    }
    let has_int = keys.iter().any(|k| !k.is_str());
    let has_str = keys.iter().any(|k| k.is_str());
    if has_int && has_str {
        let field = series
            .iter()
            .find(|(_, s)| s.keys().any(Key::is_str))
            .map_or_else(String::new, |(n, _)| (*n).clone());
        return Err(Error::MixedIndex { field, reason: "integer and string keys".into() });
    }

    let mut frame = Frame::new(index_name, keys.into_iter().cloned().collect());
    for (name, value) in fields.iter() {
        match value {
            FieldValue::Series(s) => frame.set_series(name, s)?,
            FieldValue::Scalar(v) => frame.set_constant(name, v.clone())?,
        }
    }
    Ok(frame)
}

/// [`to_frame`], retried once with string keys when integer and string keys are mixed.
pub fn to_frame_coerced(fields: &Fields) -> Result<Frame> {
    match to_frame(fields) {
        Err(Error::MixedIndex { field, reason }) => {
            tracing::debug!("mixed index kinds in field '{}' ({}), retrying with string keys", field, reason);
            to_frame(&coerce_keys(fields)?)
        }
        other => other,
    }
}

/// Every series key in string form. Two keys collapsing onto the same string is an error.
fn coerce_keys(fields: &Fields) -> Result<Fields> {
    let mut out = Fields { entries: Vec::with_capacity(fields.len()), index_name: fields.index_name.clone() };
    for (name, value) in fields.iter() {
        let value = match value {
            FieldValue::Series(s) => {
                let mut seen: AHashSet<Key> = AHashSet::with_capacity(s.len());
                let mut coerced = Series::new();
                for (k, v) in s.iter() {
                    let k = k.to_str_key();
                    if !seen.insert(k.clone()) {
                        return Err(Error::MixedIndex {
                            field: name.clone(),
                            reason: format!("key {k} collides after string coercion"),
                        });
                    }
                    coerced.push(k, v.clone());
                }
                FieldValue::Series(coerced)
            }
            scalar => scalar.clone(),
        };
        out.entries.push((name.clone(), value));
    }
    Ok(out)
}

/// Left-join metric columns onto the entity view. A column already present in the view is
/// dropped when its values agree with the view, and is a collision otherwise.
fn join_onto_view(view: &Frame, table: &Frame) -> Result<Frame> {
    let overlapping: Vec<String> =
        table.column_names().into_iter().filter(|c| view.has_column(c)).map(str::to_string).collect();
    let index = view.index();
    for column in &overlapping {
        let produced = table.series(column).unwrap_or_default();
        let aligned: Vec<Value> =
            index.iter().map(|k| produced.get(k).cloned().unwrap_or(Value::Null)).collect();
        if Some(aligned) != view.column(column) {
            return Err(Error::FieldCollision { field: column.clone(), context: "differs from the view column".into() });
        }
    }
    let table = table.drop_columns(&overlapping).rename_index(view.index_name())?;
    view.left_join(&table)
}
