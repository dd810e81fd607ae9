//! Keyed tables over polars dataframes, used for community views and metric results.
//!
//! A `Frame` is a [`DataFrame`] whose first column is the row index (entity ids, bin labels
//! or community names) stored under the frame's index name, followed by the data columns.
//! Indices are unique for views and assembled metric tables, but stacked report tables
//! repeat entity ids across communities (rows are then told apart by `community_name`).
//!
//! Cells cross the boundary as [`Value`]s. Integers are `Int64`, dates `Datetime(us)` and
//! lists `List`; a column mixing kinds without a common numeric type is stored as strings.

use crate::error::{Error, Result};
use crate::value::{Key, Value};
use ahash::{AHashMap, AHashSet};
use polars::prelude::*;
use polars::prelude::Series as PlSeries;
use polars_lazy::dsl::col;
use time::OffsetDateTime;

/// Column name stamped on combined and stacked results.
pub const COMMUNITY_NAME: &str = "community_name";

const JOIN_KEY: &str = "__pici_key";
const LEFT_ROW: &str = "__pici_left_row";

/// Ordered `key -> value` pairs. Produced by metrics (per-entity fields) and preprocessors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Series {
    entries: Vec<(Key, Value)>,
}

impl Series {
    pub fn new() -> Self { Self::default() }

    /// Positional series (keys 0..n), used for plain arrays.
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self { entries: values.into_iter().enumerate().map(|(i, v)| (Key::Int(i as i64), v.into())).collect() }
    }

    pub fn push(&mut self, key: impl Into<Key>, value: impl Into<Value>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = &(Key, Value)> { self.entries.iter() }
    pub fn keys(&self) -> impl Iterator<Item = &Key> { self.entries.iter().map(|(k, _)| k) }
    pub fn values(&self) -> impl Iterator<Item = &Value> { self.entries.iter().map(|(_, v)| v) }

    /// First value stored under `key`.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Numeric values, nulls and non-numbers skipped.
    pub fn numbers(&self) -> Vec<f64> {
        self.entries.iter().filter_map(|(_, v)| v.as_f64()).collect()
    }

    fn lookup(&self) -> AHashMap<&Key, &Value> {
        let mut m = AHashMap::with_capacity(self.entries.len());
        for (k, v) in &self.entries {
            m.entry(k).or_insert(v);
        }
        m
    }
}

impl<K: Into<Key>, V: Into<Value>> FromIterator<(K, V)> for Series {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Frame {
    index_name: String,
    df: DataFrame,
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.index_name == other.index_name
            && self.df.get_column_names() == other.df.get_column_names()
            && self.df.equals_missing(&other.df)
    }
}

/// One frame row, addressed by position.
#[derive(Clone, Debug)]
pub struct Row<'a> {
    frame: &'a Frame,
    pos: usize,
    key: Key,
}

impl<'a> Row<'a> {
    pub fn key(&self) -> &Key { &self.key }
    pub fn position(&self) -> usize { self.pos }

    pub fn get(&self, column: &str) -> Option<Value> {
        if column == self.frame.index_name {
            return None;
        }
        let cell = self.frame.df.column(column).ok()?.get(self.pos).ok()?;
        Some(from_any(cell))
    }
}

impl Frame {
    /// Frame with the given index and no columns.
    pub fn new(index_name: impl Into<String>, index: Vec<Key>) -> Self {
        let index_name = index_name.into();
        let keys: Vec<Value> = index.into_iter().map(Value::from).collect();
        // keys never need a fallible cast
        let df = to_column(&index_name, &keys).map(PlSeries::into_frame).unwrap_or_default();
        Self { index_name, df }
    }

    /// Wrap a dataframe holding its index in column `index_name`.
    pub fn from_dataframe(index_name: impl Into<String>, df: DataFrame) -> Result<Self> {
        let index_name = index_name.into();
        let Some(pos) = df.get_column_index(&index_name) else {
            return Err(Error::missing_column(&index_name, "index of a wrapped dataframe"));
        };
        let df = if pos == 0 {
            df
        } else {
            let mut order: Vec<String> = vec![index_name.clone()];
            order.extend(df.get_column_names().into_iter().filter(|n| *n != index_name).map(str::to_string));
            df.select(order)?
        };
        Ok(Self { index_name, df })
    }

    pub fn index_name(&self) -> &str { &self.index_name }
    pub fn dataframe(&self) -> &DataFrame { &self.df }
    pub fn into_dataframe(self) -> DataFrame { self.df }
    pub fn height(&self) -> usize { self.df.height() }
    pub fn is_empty(&self) -> bool { self.df.height() == 0 }
    pub fn width(&self) -> usize { self.df.width().saturating_sub(1) }

    /// Data column names in frame order (the index is not a data column).
    pub fn column_names(&self) -> Vec<&str> {
        self.df.get_column_names().into_iter().filter(|n| *n != self.index_name).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        name != self.index_name && self.df.get_column_index(name).is_some()
    }

    pub fn index(&self) -> Vec<Key> {
        match self.df.column(&self.index_name) {
            Ok(s) => column_values(s).iter().map(key_of).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        if name == self.index_name {
            return None;
        }
        self.df.column(name).ok().map(column_values)
    }

    /// Column as a keyed series.
    pub fn series(&self, name: &str) -> Option<Series> {
        let values = self.column(name)?;
        Some(self.index().into_iter().zip(values).collect())
    }

    /// Rename the index column. A data column of that name is a collision.
    pub fn rename_index(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name == self.index_name {
            return Ok(self);
        }
        if self.has_column(&name) {
            return Err(Error::FieldCollision { field: name, context: format!("renaming index '{}'", self.index_name) });
        }
        if self.df.get_column_index(&self.index_name).is_some() {
            self.df.rename(&self.index_name, &name)?;
        }
        self.index_name = name;
        Ok(self)
    }

    /// Position of the first row stored under `key`.
    pub fn position(&self, key: &Key) -> Option<usize> { self.index().iter().position(|k| k == key) }

    pub fn row(&self, key: &Key) -> Option<Row<'_>> {
        self.position(key).map(|pos| Row { frame: self, pos, key: key.clone() })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.index().into_iter().enumerate().map(move |(pos, key)| Row { frame: self, pos, key })
    }

    pub fn value(&self, key: &Key, column: &str) -> Option<Value> { self.row(key)?.get(column) }

    /// First-occurrence lookup table from key to row position.
    pub fn positions(&self) -> AHashMap<Key, usize> {
        let index = self.index();
        let mut m = AHashMap::with_capacity(index.len());
        for (i, k) in index.into_iter().enumerate() {
            m.entry(k).or_insert(i);
        }
        m
    }

    pub fn has_unique_index(&self) -> bool {
        let index = self.index();
        index.iter().collect::<AHashSet<_>>().len() == index.len()
    }

    /// Append a column. Fails on a length mismatch or a name that already exists.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if values.len() != self.height() {
            return Err(Error::Shape(format!("column '{}' has {} values for {} rows", name, values.len(), self.height())));
        }
        if name == self.index_name || self.has_column(&name) {
            return Err(Error::FieldCollision { field: name, context: "push_column".into() });
        }
        self.df.with_column(to_column(&name, &values)?)?;
        Ok(())
    }

    /// Add or replace a column, aligning `series` on the index. Missing keys become null.
    pub fn set_series(&mut self, name: &str, series: &Series) -> Result<()> {
        let lookup = series.lookup();
        let values: Vec<Value> =
            self.index().iter().map(|k| lookup.get(k).map_or(Value::Null, |v| (*v).clone())).collect();
        self.replace_column(name, &values)
    }

    /// Add or replace a column holding the same value on every row.
    pub fn set_constant(&mut self, name: &str, value: Value) -> Result<()> {
        let values = vec![value; self.height()];
        self.replace_column(name, &values)
    }

    fn replace_column(&mut self, name: &str, values: &[Value]) -> Result<()> {
        if name == self.index_name {
            return Err(Error::FieldCollision { field: name.to_string(), context: "the index cannot be replaced".into() });
        }
        self.df.with_column(to_column(name, values)?)?;
        Ok(())
    }

    /// Keep the listed columns that exist, in frame order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Frame {
        let dropped: Vec<&str> =
            self.column_names().into_iter().filter(|c| !names.iter().any(|n| n.as_ref() == *c)).collect();
        self.drop_columns(&dropped)
    }

    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Frame {
        let dropped: Vec<&str> =
            names.iter().map(AsRef::as_ref).filter(|n| *n != self.index_name.as_str()).collect();
        Frame { index_name: self.index_name.clone(), df: self.df.drop_many(&dropped) }
    }

    /// Keep rows for which `keep(row)` holds.
    pub fn filter_rows(&self, mut keep: impl FnMut(Row<'_>) -> bool) -> Result<Frame> {
        let mask: Vec<bool> = self.rows().map(|r| keep(r)).collect();
        let mask = BooleanChunked::from_slice("mask", &mask);
        Ok(Frame { index_name: self.index_name.clone(), df: self.df.filter(&mask)? })
    }

    /// Left join on the row index: every left row is kept; a left row matching several
    /// right rows is repeated once per match; unmatched rows get nulls.
    /// Column names present on both sides are a collision.
    pub fn left_join(&self, right: &Frame) -> Result<Frame> {
        self.join_on(right, &[self.index_name.as_str()], &[right.index_name.as_str()], JoinType::Left)
    }

    /// Left join keyed on `(id, community_name)`, ids compared in string form.
    /// Both frames must carry a `community_name` column.
    pub fn left_join_on_id_and_community(&self, right: &Frame) -> Result<Frame> {
        self.join_on(right, &[self.index_name.as_str(), COMMUNITY_NAME], &[right.index_name.as_str(), COMMUNITY_NAME], JoinType::Left)
    }

    /// Inner variant of [`Frame::left_join_on_id_and_community`].
    pub fn inner_join_on_id_and_community(&self, right: &Frame) -> Result<Frame> {
        self.join_on(right, &[self.index_name.as_str(), COMMUNITY_NAME], &[right.index_name.as_str(), COMMUNITY_NAME], JoinType::Inner)
    }

    /// Left join of label rows. A frame indexed by `community_name` (one row per community)
    /// is joined on the community alone, any other frame on `(id, community_name)`.
    pub fn left_join_labels(&self, labels: &Frame) -> Result<Frame> {
        if self.index_name == COMMUNITY_NAME {
            self.join_on(labels, &[COMMUNITY_NAME], &[COMMUNITY_NAME], JoinType::Left)
        } else {
            self.left_join_on_id_and_community(labels)
        }
    }

    /// Equi-join on string forms of the key columns. The right index and right key columns
    /// are dropped; left row order is kept.
    fn join_on(&self, right: &Frame, left_on: &[&str], right_on: &[&str], how: JoinType) -> Result<Frame> {
        let carried: Vec<&str> = right.column_names().into_iter().filter(|c| !right_on.contains(c)).collect();
        if let Some(c) = carried.iter().find(|c| **c == self.index_name || self.has_column(c)) {
            return Err(Error::FieldCollision { field: c.to_string(), context: "join".into() });
        }
        let keys: Vec<String> = (0..left_on.len()).map(|i| format!("{JOIN_KEY}{i}")).collect();

        let mut left = self.df.clone();
        for (column, key) in left_on.iter().zip(&keys) {
            left.with_column(self.string_key(column, key, "left")?)?;
        }
        left.with_column(PlSeries::new(LEFT_ROW, (0..self.height() as u64).collect::<Vec<_>>()))?;

        let mut right_columns = Vec::with_capacity(keys.len() + carried.len());
        for (column, key) in right_on.iter().zip(&keys) {
            right_columns.push(right.string_key(column, key, "right")?);
        }
        for c in &carried {
            right_columns.push(right.df.column(c)?.clone());
        }
        let right_df = DataFrame::new(right_columns)?;

        let on: Vec<Expr> = keys.iter().map(|k| col(k)).collect();
        let joined = left
            .lazy()
            .join(right_df.lazy(), on.clone(), on, JoinArgs::new(how))
            .sort([LEFT_ROW], SortMultipleOptions::default().with_maintain_order(true))
            .collect()?;

        let mut output: Vec<String> = self.df.get_column_names().into_iter().map(str::to_string).collect();
        output.extend(carried.iter().map(|c| c.to_string()));
        Ok(Frame { index_name: self.index_name.clone(), df: joined.select(output)? })
    }

    fn string_key(&self, column: &str, key: &str, side: &str) -> Result<PlSeries> {
        let source = self
            .df
            .column(column)
            .map_err(|_| Error::missing_column(column, format!("{side} side of a join on '{}'", self.index_name)))?;
        let mut s = source.cast(&DataType::String)?;
        s.rename(key);
        Ok(s)
    }

    /// Stack frames vertically. Columns are the union in order of first appearance;
    /// a frame lacking a column contributes nulls. The first frame names the index.
    /// Integer and float columns meet as floats, other mismatched kinds as strings.
    pub fn concat(frames: &[Frame]) -> Result<Frame> {
        let Some(first) = frames.first() else { return Ok(Frame::default()) };
        let mut names: Vec<String> = vec![first.index_name.clone()];
        let mut dtypes: Vec<DataType> = vec![DataType::Null];
        for f in frames {
            for s in f.df.get_columns() {
                let name = if s.name() == f.index_name { first.index_name.as_str() } else { s.name() };
                match names.iter().position(|n| n == name) {
                    Some(i) => dtypes[i] = common_dtype(&dtypes[i], s.dtype()),
                    None => {
                        names.push(name.to_string());
                        dtypes.push(s.dtype().clone());
                    }
                }
            }
        }

        let mut stacked: Option<DataFrame> = None;
        for f in frames {
            let mut columns = Vec::with_capacity(names.len());
            for (i, (name, dtype)) in names.iter().zip(&dtypes).enumerate() {
                let source = match i {
                    0 => f.df.column(&f.index_name).ok(),
                    _ if *name == f.index_name => None,
                    _ => f.df.column(name).ok(),
                };
                let mut s = match source {
                    Some(s) => s.cast(dtype)?,
                    None => PlSeries::full_null(name, f.height(), dtype),
                };
                s.rename(name);
                columns.push(s);
            }
            let df = DataFrame::new(columns)?;
            match stacked.as_mut() {
                Some(acc) => {
                    acc.vstack_mut(&df)?;
                }
                None => stacked = Some(df),
            }
        }
        Ok(Frame { index_name: first.index_name.clone(), df: stacked.unwrap_or_default() })
    }
}

fn common_dtype(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        (DataType::Null, t) | (t, DataType::Null) => t.clone(),
        (a, b) if a == b => a.clone(),
        (a, b) if a.is_numeric() && b.is_numeric() => DataType::Float64,
        _ => DataType::String,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Date,
    List,
}

impl Kind {
    fn of(v: &Value) -> Kind {
        match v {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Str(_) => Kind::Str,
            Value::Date(_) => Kind::Date,
            Value::List(_) => Kind::List,
        }
    }

    fn unify(self, other: Kind) -> Kind {
        match (self, other) {
            (Kind::Null, k) | (k, Kind::Null) => k,
            (a, b) if a == b => a,
            (Kind::Int, Kind::Float) | (Kind::Float, Kind::Int) => Kind::Float,
            _ => Kind::Str,
        }
    }
}

fn kind_of<'a>(values: impl IntoIterator<Item = &'a Value>) -> Kind {
    values.into_iter().fold(Kind::Null, |k, v| k.unify(Kind::of(v)))
}

/// Polars column holding `values`.
fn to_column(name: &str, values: &[Value]) -> Result<PlSeries> { build_column(name, values, kind_of(values)) }

fn build_column(name: &str, values: &[Value], kind: Kind) -> Result<PlSeries> {
    let s = match kind {
        Kind::Null => PlSeries::new_null(name, values.len()),
        Kind::Bool => PlSeries::new(name, values.iter().map(Value::as_bool).collect::<Vec<_>>()),
        Kind::Int => PlSeries::new(name, values.iter().map(Value::as_i64).collect::<Vec<_>>()),
        Kind::Float => PlSeries::new(name, values.iter().map(Value::as_f64).collect::<Vec<_>>()),
        Kind::Str => {
            let owned: Vec<Option<String>> = values
                .iter()
                .map(|v| match v {
                    Value::Null => None,
                    Value::Str(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect();
            let refs: Vec<Option<&str>> = owned.iter().map(Option::as_deref).collect();
            PlSeries::new(name, refs)
        }
        Kind::Date => {
            let micros: Vec<Option<i64>> = values.iter().map(|v| v.as_date().map(to_micros)).collect();
            PlSeries::new(name, micros).cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        }
        Kind::List => {
            let inner = kind_of(values.iter().flat_map(|v| match v {
                Value::List(items) => items.as_slice(),
                _ => &[],
            }));
            let lists = values
                .iter()
                .map(|v| match v {
                    Value::List(items) => build_column("", items, inner).map(Some),
                    _ => Ok(None),
                })
                .collect::<Result<Vec<Option<PlSeries>>>>()?;
            PlSeries::new(name, lists)
        }
    };
    Ok(s)
}

fn to_micros(d: OffsetDateTime) -> i64 { (d.unix_timestamp_nanos() / 1_000) as i64 }

fn from_timestamp(v: i64, unit: TimeUnit) -> Value {
    let nanos = match unit {
        TimeUnit::Nanoseconds => i128::from(v),
        TimeUnit::Microseconds => i128::from(v) * 1_000,
        TimeUnit::Milliseconds => i128::from(v) * 1_000_000,
    };
    OffsetDateTime::from_unix_timestamp_nanos(nanos).map_or(Value::Null, Value::Date)
}

fn from_any(v: AnyValue<'_>) -> Value {
    match v {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Int64(i) => Value::Int(i),
        AnyValue::Int32(i) => Value::Int(i64::from(i)),
        AnyValue::UInt32(i) => Value::Int(i64::from(i)),
        AnyValue::UInt64(i) => i64::try_from(i).map_or_else(|_| Value::float(i as f64), Value::Int),
        AnyValue::Float64(f) => Value::float(f),
        AnyValue::Float32(f) => Value::float(f64::from(f)),
        AnyValue::String(s) => Value::Str(s.to_string()),
        AnyValue::StringOwned(s) => Value::Str(s.to_string()),
        AnyValue::Datetime(v, unit, _) => from_timestamp(v, unit),
        AnyValue::List(s) => Value::List(column_values(&s)),
        other => Value::Str(other.to_string()),
    }
}

fn column_values(s: &PlSeries) -> Vec<Value> {
    let s = s.rechunk();
    s.iter().map(from_any).collect()
}

fn key_of(v: &Value) -> Key { Key::from_value(v).unwrap_or_else(|| Key::Str(v.to_string())) }

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(keys: &[&str]) -> Frame { Frame::new("topic", keys.iter().map(|k| Key::from(*k)).collect()) }

    #[test]
    fn cells_keep_their_kind() {
        let mut f = topics(&["t1", "t2"]);
        f.push_column("n", vec![Value::Int(1), Value::Null]).unwrap();
        f.push_column("share", vec![Value::Int(1), Value::float(0.5)]).unwrap();
        f.push_column("texts", vec![Value::List(vec![Value::from("a")]), Value::List(vec![])]).unwrap();
        assert_eq!(f.value(&Key::from("t2"), "n"), Some(Value::Null));
        assert_eq!(f.value(&Key::from("t1"), "share"), Some(Value::Float(1.0)));
        assert_eq!(f.value(&Key::from("t1"), "texts"), Some(Value::List(vec![Value::from("a")])));
        assert_eq!(f.dataframe().column("n").unwrap().dtype(), &DataType::Int64);
        assert!(matches!(f.push_column("n", vec![Value::Null, Value::Null]), Err(Error::FieldCollision { .. })));
        assert!(matches!(f.push_column("short", vec![Value::Null]), Err(Error::Shape(_))));
    }

    #[test]
    fn joins_keep_left_order_and_flag_collisions() {
        let mut left = topics(&["t3", "t1", "t2"]);
        left.push_column(COMMUNITY_NAME, vec![Value::from("a"); 3]).unwrap();
        let mut right = Frame::new("id", vec![Key::from("t1"), Key::from("t9")]);
        right.push_column(COMMUNITY_NAME, vec![Value::from("a"); 2]).unwrap();
        right.push_column("label", vec![Value::Bool(true), Value::Bool(false)]).unwrap();

        let joined = left.left_join_on_id_and_community(&right).unwrap();
        assert_eq!(joined.index(), vec![Key::from("t3"), Key::from("t1"), Key::from("t2")]);
        assert_eq!(joined.column("label").unwrap(), vec![Value::Null, Value::Bool(true), Value::Null]);
        assert_eq!(left.inner_join_on_id_and_community(&right).unwrap().height(), 1);

        let mut clash = topics(&["t1"]);
        clash.push_column(COMMUNITY_NAME, vec![Value::from("a")]).unwrap();
        assert!(matches!(left.left_join(&clash), Err(Error::FieldCollision { .. })));
    }

    #[test]
    fn concat_aligns_columns_and_kinds() {
        let mut a = topics(&["t1"]);
        a.push_column("n", vec![Value::Int(1)]).unwrap();
        let mut b = Frame::new("id", vec![Key::from("u1")]);
        b.push_column("n", vec![Value::float(2.5)]).unwrap();
        b.push_column("extra", vec![Value::from("x")]).unwrap();

        let f = Frame::concat(&[a, b]).unwrap();
        assert_eq!(f.index_name(), "topic");
        assert_eq!(f.column_names(), vec!["n", "extra"]);
        assert_eq!(f.column("n").unwrap(), vec![Value::Float(1.0), Value::Float(2.5)]);
        assert_eq!(f.value(&Key::from("t1"), "extra"), Some(Value::Null));
    }
}
