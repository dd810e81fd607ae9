use anyhow::{Context, Result};
use serde_json::{Map, Value as Json};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use zstd::stream::read::Decoder;

/// Minimal NDJSON reader with buffering and empty-line skipping.
/// Files ending in `.zst` are decompressed on the fly.
pub struct NdjsonReader {
    path: PathBuf,
    rdr: Box<dyn BufRead>,
    line_no: usize,
}

impl NdjsonReader {
    pub fn open(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = File::open(path)?;
        let inner: Box<dyn Read> = if path.extension().is_some_and(|e| e == "zst") {
            let mut dec = Decoder::new(f)?;
            dec.window_log_max(31)?;
            Box::new(dec)
        } else {
            Box::new(f)
        };
        Ok(Self {
            path: path.to_path_buf(),
            rdr: Box::new(BufReader::with_capacity(buf_bytes.max(8 * 1024), inner)),
            line_no: 0,
        })
    }

    /// Read the next line into `buf`. Returns the number of bytes read (0 on EOF).
    /// Strips trailing `\r?\n`.
    pub fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        buf.clear();
        let n = self.rdr.read_line(buf)?;
        if n == 0 { return Ok(0); }
        self.line_no += 1;
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') { buf.pop(); }
        }
        Ok(n)
    }

    /// Next JSON object, skipping blank lines. `None` at end of file.
    pub fn next_record(&mut self) -> Result<Option<Map<String, Json>>> {
        let mut buf = String::new();
        loop {
            if self.read_line(&mut buf).with_context(|| format!("read {}", self.path.display()))? == 0 {
                return Ok(None);
            }
            if buf.trim().is_empty() {
                continue;
            }
            let record: Map<String, Json> = serde_json::from_str(&buf)
                .with_context(|| format!("{}:{}: invalid JSON object", self.path.display(), self.line_no))?;
            return Ok(Some(record));
        }
    }

    /// Read up to `limit` records (all when `None`).
    pub fn read_records(mut self, limit: Option<usize>) -> Result<Vec<Map<String, Json>>> {
        let mut out = Vec::new();
        while limit.map_or(true, |n| out.len() < n) {
            match self.next_record()? {
                Some(r) => out.push(r),
                None => break,
            }
        }
        Ok(out)
    }
}

/// `<dir>/<stem>.jsonl`, or its `.jsonl.zst` sibling when only that exists.
pub fn find_table(dir: &Path, stem: &str) -> Option<PathBuf> {
    [format!("{stem}.jsonl"), format!("{stem}.jsonl.zst")]
        .into_iter()
        .map(|f| dir.join(f))
        .find(|p| p.is_file())
}
