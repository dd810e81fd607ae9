#[path = "common/mod.rs"]
mod common;

use common::*;
use pici::{discover_communities, load_communities, load_community, CommunitySchema, Error, LoadOptions, Pici, Value};

#[test]
fn discovers_directories_with_a_posts_table() {
    let (_dir, base) = make_snapshot();
    assert_eq!(discover_communities(&base), vec!["alpha".to_string(), "beta".to_string()]);
    assert!(discover_communities(&base.join("missing")).is_empty());
}

#[test]
fn loads_plain_and_compressed_tables() {
    let (_dir, base) = make_snapshot();
    let opts = LoadOptions::default().with_data_dir(&base).with_concurrency(2);
    let communities = load_communities(&opts, &CommunitySchema::default()).unwrap();
    assert_eq!(communities.len(), 2);

    let alpha = &communities[0];
    assert_eq!(alpha.name(), "alpha");
    assert_eq!(alpha.posts().height(), 6);
    assert_eq!(alpha.posts().value(&key("p3"), "date"), Some(Value::Date(date("2021-01-05").replace_hour(12).unwrap())));
    // zoe never posted and t9 has no posts
    assert_eq!(alpha.contributors().index(), vec![key("alice"), key("bob"), key("carol")]);
    assert_eq!(alpha.topics().height(), 3);
    assert_eq!(alpha.contributors().value(&key("bob"), "country"), Some(Value::from("at")));
    assert_eq!(alpha.contributors().value(&key("carol"), "country"), Some(Value::Null));

    let beta = &communities[1];
    assert_eq!(beta.posts().value(&key("q2"), "date"), Some(Value::Date(date("2021-02-03"))));
    // no contributors or topics files: rows are derived from the posts
    assert_eq!(beta.contributors().index(), vec![key("dora"), key("erik")]);
    assert_eq!(beta.topics().index(), vec![key("u1"), key("u2")]);
}

#[test]
fn date_range_and_row_limit() {
    let (_dir, base) = make_snapshot();
    let opts = LoadOptions::default()
        .with_data_dir(&base)
        .with_date_range(Some(date("2021-01-02")), Some(date("2021-01-05")));
    let alpha = load_community(&base.join("alpha"), "alpha", &CommunitySchema::default(), &opts).unwrap();
    assert_eq!(alpha.posts().index(), vec![key("p2"), key("p4"), key("p5")]);
    assert_eq!(alpha.topics().index(), vec![key("t1"), key("t2")]);
    assert_eq!(alpha.contributors().height(), 2);

    let opts = LoadOptions::default().with_data_dir(&base).with_nrows(2);
    let alpha = load_community(&base.join("alpha"), "alpha", &CommunitySchema::default(), &opts).unwrap();
    assert_eq!(alpha.posts().index(), vec![key("p1"), key("p2")]);
    assert_eq!(alpha.contributors().index(), vec![key("alice"), key("bob")]);
}

#[test]
fn directories_without_posts_fail() {
    let (_dir, base) = make_snapshot();
    let opts = LoadOptions::default().with_data_dir(&base);
    let err = load_community(&base.join("notes"), "notes", &CommunitySchema::default(), &opts).unwrap_err();
    assert!(matches!(err, Error::Load(_)), "{err}");
    assert!(err.to_string().contains("no posts table"), "{err}");
}

#[test]
fn malformed_lines_name_the_file() {
    let (_dir, base) = make_snapshot();
    let path = base.join("broken").join("posts.jsonl");
    write_jsonl(&path, &[serde_json::json!({"id": "x1", "topic": "t", "contributor": "c", "date": "2021-01-01"})]);
    std::fs::write(&path, format!("{}\n{{not json\n", std::fs::read_to_string(&path).unwrap())).unwrap();

    let opts = LoadOptions::default().with_data_dir(&base);
    let err = load_community(&base.join("broken"), "broken", &CommunitySchema::default(), &opts).unwrap_err();
    assert!(format!("{err:#}").contains("posts.jsonl:2"), "{err:#}");
}

#[test]
fn sessions_load_selected_communities() {
    let (_dir, base) = make_snapshot();
    let pici = Pici::builder()
        .load(LoadOptions::default().with_data_dir(&base).with_communities(["beta"]), CommunitySchema::default())
        .build()
        .unwrap();
    assert_eq!(pici.communities().keys().collect::<Vec<_>>(), vec!["beta"]);
    let debug = format!("{pici:?}");
    assert!(debug.starts_with("Pici {") && debug.contains("communities: [\"beta\"]"), "{debug}");

    let err = Pici::builder()
        .with_community(alpha())
        .load(LoadOptions::default().with_data_dir(&base).with_communities(["alpha"]), CommunitySchema::default())
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)), "{err}");
}
