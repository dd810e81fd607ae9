//! Manual labels attached to entities (usually topics), and agreement statistics.
//!
//! A label set holds one row per labelled entity and labeller. Rows are identified by
//! `(community_name, id)`; the id is compared in string form when joined onto metric data.

use crate::datatypes::CommunityDataLevel;
use crate::error::{Error, Result};
use crate::frame::{Frame, COMMUNITY_NAME};
use crate::value::{Key, Value};
use ahash::AHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

pub const LABELLER: &str = "labeller";
pub const ID: &str = "id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelType {
    /// Missing values count as `false`.
    Bool,
    /// Ordered integer categories; values outside them become null.
    Ordinal(Vec<i64>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct LabelRow {
    pub community_name: String,
    pub id: Key,
    pub labeller: String,
    pub values: BTreeMap<String, Value>,
}

impl LabelRow {
    pub fn new(community_name: impl Into<String>, id: impl Into<Key>, labeller: impl Into<String>) -> Self {
        Self { community_name: community_name.into(), id: id.into(), labeller: labeller.into(), values: BTreeMap::new() }
    }

    pub fn with(mut self, label: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(label.into(), value.into());
        self
    }

    pub fn get(&self, label: &str) -> &Value { self.values.get(label).unwrap_or(&Value::Null) }

    fn case(&self) -> (String, String) { (self.community_name.clone(), self.id.as_string()) }
}

/// Computes derived labels from the normalized base labels of a row.
pub type DeriveFn = Arc<dyn Fn(&mut LabelRow) + Send + Sync>;

pub const INNOVATION_ACTIVITIES: [&str; 5] =
    ["label_idea", "label_evaluation", "label_implementation", "label_modification", "label_improvement"];

/// A set of labels of one kind, at one level.
#[derive(Clone)]
pub struct Labels {
    kind: String,
    level: CommunityDataLevel,
    types: Vec<(String, LabelType)>,
    rows: Vec<LabelRow>,
    labeller_filter: Option<BTreeSet<String>>,
    derive: Option<DeriveFn>,
}

impl Labels {
    pub fn new(kind: impl Into<String>, level: CommunityDataLevel, types: Vec<(String, LabelType)>) -> Self {
        Self { kind: kind.into(), level, types, rows: Vec::new(), labeller_filter: None, derive: None }
    }

    /// Register a derived label, computed by `derive` after the base labels are normalized.
    pub fn with_derived(mut self, label: impl Into<String>, ty: LabelType, derive: DeriveFn) -> Self {
        self.types.push((label.into(), ty));
        let combined: DeriveFn = match self.derive.take() {
            None => derive,
            Some(prev) => Arc::new(move |row: &mut LabelRow| {
                prev(row);
                derive(row);
            }),
        };
        self.derive = Some(combined);
        self
    }

    /// Topic labels for innovation activities and potential (0..=2), with
    /// `label_any_activity` and `label_has_potential` derived.
    pub fn innovation() -> Self {
        let mut types: Vec<(String, LabelType)> =
            INNOVATION_ACTIVITIES.iter().map(|l| (l.to_string(), LabelType::Bool)).collect();
        types.push(("label_potential".into(), LabelType::Ordinal(vec![0, 1, 2])));
        Labels::new("innovation", CommunityDataLevel::Topics, types)
            .with_derived(
                "label_any_activity",
                LabelType::Bool,
                Arc::new(|row: &mut LabelRow| {
                    let any = INNOVATION_ACTIVITIES.iter().any(|l| row.get(l).as_bool().unwrap_or(false));
                    row.values.insert("label_any_activity".into(), Value::Bool(any));
                }),
            )
            .with_derived(
                "label_has_potential",
                LabelType::Bool,
                Arc::new(|row: &mut LabelRow| {
                    let has = row.get("label_potential").as_i64().map_or(false, |p| p > 0);
                    row.values.insert("label_has_potential".into(), Value::Bool(has));
                }),
            )
    }

    /// Normalize and add rows, skipping rows by the labellers in `drop_labellers`.
    pub fn append(&mut self, rows: impl IntoIterator<Item = LabelRow>, drop_labellers: &[&str]) -> &mut Self {
        let before = self.rows.len();
        for row in rows {
            if drop_labellers.contains(&row.labeller.as_str()) {
                continue;
            }
            let row = self.normalize(row);
            self.rows.push(row);
        }
        tracing::debug!("labels '{}': appended {} rows", self.kind, self.rows.len() - before);
        self
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = LabelRow>) -> Self {
        self.append(rows, &[]);
        self
    }

    fn normalize(&self, mut row: LabelRow) -> LabelRow {
        let mut values = BTreeMap::new();
        for (name, ty) in &self.types {
            let raw = row.values.remove(name).unwrap_or(Value::Null);
            let v = match ty {
                LabelType::Bool => match raw {
                    Value::Null => Value::Bool(false),
                    other => other.as_bool().map_or(Value::Null, Value::Bool),
                },
                LabelType::Ordinal(categories) => match raw.as_i64() {
                    Some(c) if categories.contains(&c) => Value::Int(c),
                    _ => Value::Null,
                },
            };
            values.insert(name.clone(), v);
        }
        row.values = values;
        if let Some(derive) = &self.derive {
            derive(&mut row);
        }
        row
    }

    /// Remove every row by the given labellers.
    pub fn drop_labellers(&mut self, labellers: &[&str]) {
        self.rows.retain(|r| !labellers.contains(&r.labeller.as_str()));
    }

    /// Restrict `data()` (and the statistics) to these labellers; `None` clears the filter.
    pub fn set_labeller_filter(&mut self, labellers: Option<&[&str]>) {
        self.labeller_filter = labellers.map(|ls| ls.iter().map(|s| s.to_string()).collect());
    }

    pub fn kind(&self) -> &str { &self.kind }
    pub fn level(&self) -> CommunityDataLevel { self.level }
    pub fn types(&self) -> &[(String, LabelType)] { &self.types }
    pub fn label_names(&self) -> Vec<&str> { self.types.iter().map(|(n, _)| n.as_str()).collect() }

    /// Rows passing the labeller filter.
    pub fn data(&self) -> Vec<&LabelRow> {
        self.rows
            .iter()
            .filter(|r| self.labeller_filter.as_ref().map_or(true, |f| f.contains(&r.labeller)))
            .collect()
    }

    pub fn data_by_community(&self, community: &str) -> Vec<&LabelRow> {
        self.data().into_iter().filter(|r| r.community_name == community).collect()
    }

    /// Distinct labellers in order of appearance.
    pub fn labellers(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for r in self.data() {
            if !out.contains(&r.labeller) {
                out.push(r.labeller.clone());
            }
        }
        out
    }

    /// Rows as a frame indexed by `id` with `community_name`, `labeller` and one column per label.
    pub fn to_frame(&self) -> Result<Frame> {
        let rows = self.data();
        let mut frame = Frame::new(ID, rows.iter().map(|r| r.id.clone()).collect());
        frame.push_column(COMMUNITY_NAME, rows.iter().map(|r| Value::from(r.community_name.as_str())).collect())?;
        frame.push_column(LABELLER, rows.iter().map(|r| Value::from(r.labeller.as_str())).collect())?;
        for (name, _) in &self.types {
            frame.push_column(name.clone(), rows.iter().map(|r| r.get(name).clone()).collect())?;
        }
        Ok(frame)
    }

    pub fn stats(&self) -> LabelStats<'_> { LabelStats { labels: self } }
}

impl fmt::Debug for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Labels")
            .field("kind", &self.kind)
            .field("level", &self.level)
            .field("types", &self.types)
            .field("rows", &self.rows.len())
            .finish()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        let communities: BTreeSet<&str> = data.iter().map(|r| r.community_name.as_str()).collect();
        writeln!(f, "{} labels", self.kind)?;
        writeln!(f, "   Level: {}", self.level)?;
        writeln!(f, "   Labelled entities: {}", data.len())?;
        writeln!(f, "   Labels (cols): {}", self.types.len())?;
        writeln!(f, "   Labellers: {}", self.labellers().len())?;
        writeln!(f, "   Communities: {}", communities.len())
    }
}

/// Label sets with unique label names.
#[derive(Clone, Debug, Default)]
pub struct LabelCollection {
    sets: Vec<Labels>,
}

impl LabelCollection {
    pub fn new() -> Self { Self::default() }

    pub fn labels(&self) -> &[Labels] { &self.sets }
    pub fn is_empty(&self) -> bool { self.sets.is_empty() }

    pub fn all_label_names(&self) -> Vec<&str> { self.sets.iter().flat_map(|l| l.label_names()).collect() }

    /// Add a new set. Any label name already present in the collection is an error.
    pub fn add(&mut self, labels: Labels) -> Result<()> {
        let existing: BTreeSet<&str> = self.all_label_names().into_iter().collect();
        let duplicates: Vec<String> =
            labels.label_names().into_iter().filter(|n| existing.contains(n)).map(str::to_string).collect();
        if !duplicates.is_empty() {
            return Err(Error::DuplicateLabels(duplicates));
        }
        self.sets.push(labels);
        Ok(())
    }

    /// Merge rows into the set of the same kind and level, or add the set.
    /// Both sets must declare the same labels with the same types.
    pub fn append(&mut self, labels: Labels) -> Result<()> {
        match self.sets.iter_mut().find(|l| l.kind == labels.kind && l.level == labels.level) {
            Some(existing) => {
                if existing.types != labels.types {
                    return Err(Error::Invalid(format!(
                        "cannot append {} labels: declared {:?}, appended {:?}",
                        labels.kind, existing.types, labels.types
                    )));
                }
                existing.rows.extend(labels.rows);
                Ok(())
            }
            None => self.add(labels),
        }
    }

    /// Labels at `level` as one frame. Several sets are merged wide on
    /// `(community_name, id, labeller)`; rows missing from a set get nulls for its labels.
    pub fn by_level(&self, level: CommunityDataLevel) -> Result<Option<Frame>> {
        let sets: Vec<&Labels> = self.sets.iter().filter(|l| l.level == level).collect();
        match sets.as_slice() {
            [] => Ok(None),
            [one] => one.to_frame().map(Some),
            many => merge_label_sets(many).map(Some),
        }
    }
}

fn merge_label_sets(sets: &[&Labels]) -> Result<Frame> {
    type RowKey = (String, String, String);
    let mut order: Vec<(RowKey, Key)> = Vec::new();
    let mut values: AHashMap<RowKey, BTreeMap<String, Value>> = AHashMap::new();
    for set in sets {
        for r in set.data() {
            let key = (r.community_name.clone(), r.id.as_string(), r.labeller.clone());
            let slot = values.entry(key.clone()).or_insert_with(|| {
                order.push((key, r.id.clone()));
                BTreeMap::new()
            });
            slot.extend(r.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    let mut frame = Frame::new(ID, order.iter().map(|(_, id)| id.clone()).collect());
    frame.push_column(COMMUNITY_NAME, order.iter().map(|((c, _, _), _)| Value::from(c.as_str())).collect())?;
    frame.push_column(LABELLER, order.iter().map(|((_, _, l), _)| Value::from(l.as_str())).collect())?;
    for set in sets {
        for (name, _) in &set.types {
            let column = order
                .iter()
                .map(|(k, _)| values.get(k).and_then(|m| m.get(name)).cloned().unwrap_or(Value::Null))
                .collect();
            frame.push_column(name.clone(), column)?;
        }
    }
    Ok(frame)
}

/// Share of cases on which every labeller agreed, over cases with at least two labellers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agreement {
    /// `None` when no case has two labellers.
    pub share: Option<f64>,
    pub base: usize,
}

pub struct LabelStats<'a> {
    labels: &'a Labels,
}

impl LabelStats<'_> {
    pub fn labellers(&self) -> usize { self.labels.labellers().len() }

    pub fn unique_cases(&self) -> usize {
        self.labels.data().iter().map(|r| r.case()).collect::<BTreeSet<_>>().len()
    }

    /// Sum of every label over all rows; with `normalize`, divided by the row count.
    pub fn label_counts(&self, normalize: bool) -> BTreeMap<String, f64> {
        let rows = self.labels.data();
        counts(&rows, &self.labels.types, normalize)
    }

    /// `label_counts` per labeller.
    pub fn label_counts_by_labeller(&self, normalize: bool) -> BTreeMap<String, BTreeMap<String, f64>> {
        let mut by: BTreeMap<String, Vec<&LabelRow>> = BTreeMap::new();
        for r in self.labels.data() {
            by.entry(r.labeller.clone()).or_default().push(r);
        }
        by.into_iter().map(|(l, rows)| (l, counts(&rows, &self.labels.types, normalize))).collect()
    }

    /// Per label: the last rating of every `(case, labeller)` counts; cases rated by at least
    /// two labellers are valid; the share is the fraction of valid cases with a single value.
    pub fn complete_agreement(&self) -> BTreeMap<String, Agreement> {
        let mut latest: BTreeMap<((String, String), String), &LabelRow> = BTreeMap::new();
        for r in self.labels.data() {
            latest.insert((r.case(), r.labeller.clone()), r);
        }
        let mut out = BTreeMap::new();
        for (name, _) in &self.labels.types {
            let mut per_case: BTreeMap<&(String, String), Vec<&Value>> = BTreeMap::new();
            for ((case, _), r) in &latest {
                let v = r.get(name);
                let entry = per_case.entry(case).or_default();
                if !v.is_null() {
                    entry.push(v);
                }
            }
            let mut base = 0usize;
            let mut agree = 0usize;
            for values in per_case.values() {
                if values.len() < 2 {
                    continue;
                }
                base += 1;
                if values.iter().all(|v| *v == values[0]) {
                    agree += 1;
                }
            }
            let share = if base == 0 { None } else { Some(agree as f64 / base as f64) };
            out.insert(name.clone(), Agreement { share, base });
        }
        out
    }
}

fn counts(rows: &[&LabelRow], types: &[(String, LabelType)], normalize: bool) -> BTreeMap<String, f64> {
    types
        .iter()
        .map(|(name, _)| {
            let sum: f64 = rows.iter().filter_map(|r| r.get(name).as_f64()).sum();
            let v = if normalize && !rows.is_empty() { sum / rows.len() as f64 } else { sum };
            (name.clone(), v)
        })
        .collect()
}
