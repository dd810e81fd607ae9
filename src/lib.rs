mod aggregate;
mod cache;
mod concurrency;
mod config;
mod date;
mod graph;
mod loader;
mod ndjson;
mod progress;
mod util;
mod value;

mod frame;
mod datatypes;
mod error;
mod params;
mod community;

mod metric;
mod combine;
mod catalog;
mod registry;
mod report;
mod labelling;
mod preprocessors;
mod pipeline;
mod pici;

pub mod metrics;

pub use crate::error::{Error, Result};
pub use crate::value::{Key, Value};
pub use crate::frame::{Frame, Row, Series, COMMUNITY_NAME};
pub use crate::datatypes::{CommunityDataLevel, MetricReturnType};
pub use crate::params::Params;
pub use crate::community::{Community, CommunitySchema, PostRow};
pub use crate::graph::{ContributorGraph, GraphKind};

pub use crate::metric::{assemble, to_frame, to_frame_coerced, FieldValue, Fields, Metric, MetricData, MetricDef, DEFAULT_INDEX_NAME};
pub use crate::combine::{check_homogeneous, combine, merge_frames, run_metrics, Combined, CombinedData, MetricCall};
pub use crate::catalog::{CatalogBuilder, MetricCatalog, MetricFilter};
pub use crate::registry::{MetricRegistry, PreprocessorRegistry, ReportRegistry};
pub use crate::report::{run_report, Report, ReportData, ReportDef};
pub use crate::preprocessors::{PreprocessorDef, PreprocessorTarget, NUMBER_OF_WORDS, POST_POSITION, ROUNDED_DATE, THREAD_TEXT};
pub use crate::pipeline::FeaturePipeline;
pub use crate::pici::{Pici, PiciBuilder, GENERATED_REPORT};

// Labels and their statistics.
pub use crate::labelling::{Agreement, LabelCollection, LabelRow, LabelStats, LabelType, Labels, ID, LABELLER};

pub use crate::aggregate::{aggregate, Sample, AGGREGATES};
pub use crate::date::{Interval, YearMonth};

// Snapshot loading.
pub use crate::config::{LoadOptions, DATA_DIR_ENV};
pub use crate::loader::{discover_communities, load_communities, load_community};
pub use crate::ndjson::NdjsonReader;

// Progress and logging helpers for application code.
pub use crate::progress::{make_count_progress, set_global_multiprogress};
pub use crate::util::{count_words, init_tracing_once, strip_html, token_sort_ratio, tokenize};
