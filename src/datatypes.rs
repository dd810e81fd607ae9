//! Metric metadata: aggregation level and return type.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Granularity a metric's result is keyed by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommunityDataLevel {
    Posts,
    Topics,
    Contributors,
    Community,
}

impl CommunityDataLevel {
    pub const ALL: [CommunityDataLevel; 4] = [Self::Posts, Self::Topics, Self::Contributors, Self::Community];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Topics => "topics",
            Self::Contributors => "contributors",
            Self::Community => "community",
        }
    }
}

impl fmt::Display for CommunityDataLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for CommunityDataLevel {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Invalid(format!("unknown data level '{s}'")))
    }
}

/// Shape of a metric's assembled result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricReturnType {
    /// Raw field map, untouched.
    Plain,
    /// One row per community.
    Table,
    /// One row per entity at the metric's level.
    DataFrame,
}

impl MetricReturnType {
    pub const ALL: [MetricReturnType; 3] = [Self::Plain, Self::Table, Self::DataFrame];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Table => "table",
            Self::DataFrame => "dataframe",
        }
    }

    pub fn is_tabular(self) -> bool { !matches!(self, Self::Plain) }
}

impl fmt::Display for MetricReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for MetricReturnType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Invalid(format!("unknown return type '{s}'")))
    }
}
