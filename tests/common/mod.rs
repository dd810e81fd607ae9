#![allow(dead_code)]

use pici::{Community, CommunitySchema, Frame, Key, LabelRow, Labels, Params, Pici, Value, POST_POSITION};
use serde_json::json;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// One post: `(id, topic, contributor, date, text)`; dates are `YYYY-MM-DD`.
pub type P = (&'static str, &'static str, &'static str, &'static str, &'static str);

pub fn date(day: &str) -> OffsetDateTime {
    OffsetDateTime::parse(&format!("{day}T00:00:00Z"), &Rfc3339).unwrap()
}

pub fn key(s: &str) -> Key { Key::from(s) }

pub fn posts_frame(posts: &[P]) -> Frame {
    let mut f = Frame::new("id", posts.iter().map(|p| Key::from(p.0)).collect());
    f.push_column("topic", posts.iter().map(|p| Value::from(p.1)).collect()).unwrap();
    f.push_column("contributor", posts.iter().map(|p| Value::from(p.2)).collect()).unwrap();
    f.push_column("date", posts.iter().map(|p| Value::Date(date(p.3))).collect()).unwrap();
    f.push_column("text", posts.iter().map(|p| Value::from(p.4)).collect()).unwrap();
    f
}

pub fn community(name: &str, posts: &[P]) -> Community {
    Community::from_posts(name, CommunitySchema::default(), posts_frame(posts)).unwrap()
}

/// Three topics, three contributors, six posts.
///
/// - t1: p1 alice (Jan 1), p2 bob (Jan 2), p3 carol (Jan 5)
/// - t2: p4 bob (Jan 3), p5 alice (Jan 4)
/// - t3: p6 alice (Jan 10)
pub const ALPHA: [P; 6] = [
    ("p1", "t1", "alice", "2021-01-01", "<p>A new idea for the <b>printer</b> holder</p>"),
    ("p2", "t1", "bob", "2021-01-02", "Nice idea!"),
    ("p3", "t1", "carol", "2021-01-05", "I built one, works well."),
    ("p4", "t2", "bob", "2021-01-03", "Printer holder needs a new idea"),
    ("p5", "t2", "alice", "2021-01-04", "Try my holder."),
    ("p6", "t3", "alice", "2021-01-10", "Another idea for a holder"),
];

/// Two topics, two contributors, three posts.
pub const BETA: [P; 3] = [
    ("q1", "u1", "dora", "2021-02-01", "Lamp design"),
    ("q2", "u1", "erik", "2021-02-03", "Looks good"),
    ("q3", "u2", "erik", "2021-02-04", "Shelf design"),
];

pub fn alpha() -> Community { community("alpha", &ALPHA) }
pub fn beta() -> Community { community("beta", &BETA) }

pub fn session() -> Pici {
    Pici::builder().with_community(alpha()).with_community(beta()).build().unwrap()
}

/// Session with `post_position_in_thread` computed everywhere.
pub fn preprocessed_session() -> Pici {
    let mut pici = session();
    pici.preprocess_all(POST_POSITION, &Params::new()).unwrap();
    pici
}

/// Innovation labels for t1 and t2 of `alpha` by two labellers, and u1 of `beta`.
pub fn innovation_labels() -> Labels {
    Labels::innovation().with_rows([
        LabelRow::new("alpha", "t1", "ann").with("label_idea", true).with("label_potential", 2i64),
        LabelRow::new("alpha", "t1", "ben").with("label_idea", true).with("label_potential", 1i64),
        LabelRow::new("alpha", "t2", "ann").with("label_evaluation", true).with("label_potential", 0i64),
        LabelRow::new("beta", "u1", "ann").with("label_potential", 7i64),
    ])
}

// -------- NDJSON snapshots --------

pub fn write_jsonl(path: &Path, rows: &[serde_json::Value]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    for r in rows {
        writeln!(f, "{}", r).unwrap();
    }
}

/// Same as `write_jsonl` but zstd-compressed.
pub fn write_zst_jsonl(path: &Path, rows: &[serde_json::Value]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for r in rows {
        writeln!(&mut enc, "{}", r).unwrap();
    }
    enc.finish().unwrap();
}

/// Snapshot directory with `alpha` (plain JSONL) and `beta` (posts zstd-compressed).
/// `alpha` also lists a contributor and a topic no post references.
pub fn make_snapshot() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().to_path_buf();

    let alpha = base.join("alpha");
    let posts: Vec<_> = ALPHA
        .iter()
        .map(|(id, topic, contributor, day, text)| {
            json!({"id": id, "topic": topic, "contributor": contributor, "date": format!("{day}T12:00:00Z"), "text": text})
        })
        .collect();
    write_jsonl(&alpha.join("posts.jsonl"), &posts);
    write_jsonl(
        &alpha.join("contributors.jsonl"),
        &[
            json!({"contributor": "alice", "country": "de"}),
            json!({"contributor": "bob", "country": "at"}),
            json!({"contributor": "carol"}),
            json!({"contributor": "zoe", "country": "ch"}),
        ],
    );
    write_jsonl(
        &alpha.join("topics.jsonl"),
        &[
            json!({"topic": "t1", "title": "Printer holder"}),
            json!({"topic": "t2", "title": "Holder"}),
            json!({"topic": "t3", "title": "Another"}),
            json!({"topic": "t9", "title": "Orphan"}),
        ],
    );

    let beta = base.join("beta");
    let posts: Vec<_> = BETA
        .iter()
        .map(|(id, topic, contributor, day, text)| {
            json!({"id": id, "topic": topic, "contributor": contributor, "date": day, "text": text})
        })
        .collect();
    write_zst_jsonl(&beta.join("posts.jsonl.zst"), &posts);

    // not a community: no posts table
    fs::create_dir_all(base.join("notes")).unwrap();
    (dir, base)
}
