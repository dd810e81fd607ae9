use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Environment variable overriding the default data directory.
pub const DATA_DIR_ENV: &str = "PICI_DATA_DIR";

/// Options for loading community snapshots, with builder chaining.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub data_dir: PathBuf,
    pub communities: Option<Vec<String>>, // None loads every community found under data_dir
    pub start: Option<OffsetDateTime>,    // inclusive
    pub end: Option<OffsetDateTime>,      // exclusive
    pub nrows: Option<usize>,             // row limit per table, applied before filtering
    pub concurrency: usize,               // communities loaded in parallel
    pub progress: bool,

    pub read_buffer_bytes: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        let data_dir = std::env::var_os(DATA_DIR_ENV).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data"));
        Self {
            data_dir,
            communities: None,
            start: None,
            end: None,
            nrows: None,
            concurrency: 1,
            progress: false,
            read_buffer_bytes: 256 * 1024,
        }
    }
}

impl LoadOptions {
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_communities<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.communities = Some(names.into_iter().map(Into::into).collect());
        self
    }
    pub fn with_date_range(mut self, start: Option<OffsetDateTime>, end: Option<OffsetDateTime>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
    pub fn with_nrows(mut self, n: usize) -> Self {
        self.nrows = Some(n);
        self
    }
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_io_read_buffer(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes.max(8 * 1024);
        self
    }
}
