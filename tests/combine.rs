#[path = "common/mod.rs"]
mod common;

use common::*;
use pici::{
    merge_frames, run_metrics, CombinedData, CommunityDataLevel, Error, Fields, Frame, Key, MetricCall, MetricCatalog,
    MetricDef, MetricReturnType, Series, Value, COMMUNITY_NAME,
};
use std::sync::Arc;

fn test_catalog() -> Arc<MetricCatalog> {
    Arc::new(
        MetricCatalog::builder()
            .metric(MetricDef::topics("partial_topic_counts", |_, _| {
                let n: Series = [("t1", 2i64), ("t2", 5i64)].into_iter().collect();
                Ok(Fields::new().with("n", n))
            }))
            .metric(MetricDef::community("posts", |_, _| Ok(Fields::new().with("posts", 10i64))))
            .metric(MetricDef::community("topics", |_, _| Ok(Fields::new().with("topics", 4i64))))
            .metric(MetricDef::community("posts_again", |_, _| Ok(Fields::new().with("posts", 11i64))))
            .metric(MetricDef::new("per_post", CommunityDataLevel::Posts, MetricReturnType::DataFrame, |c, _| {
                let ones: Series = c.posts().index().iter().map(|k| (k.clone(), 1i64)).collect();
                Ok(Fields::new().with("one", ones))
            }))
            .metric(MetricDef::new("raw", CommunityDataLevel::Community, MetricReturnType::Plain, |_, _| {
                Ok(Fields::new().with("hello", "world"))
            }))
            .metric(MetricDef::topics("mixed_keys", |_, _| {
                let mut s = Series::new();
                s.push(1i64, 1.0);
                s.push("t1", 2.0);
                Ok(Fields::new().with("mixed", s))
            }))
            .build(),
    )
}

#[test]
fn dataframe_metric_is_left_joined_onto_the_view() {
    let catalog = test_catalog();
    let c = alpha();
    let m = catalog.metric("partial_topic_counts").unwrap().evaluate(&c, &pici::Params::new()).unwrap();
    let f = m.frame().unwrap();

    assert_eq!(f.height(), 3);
    assert_eq!(f.value(&key("t1"), "n"), Some(Value::Int(2)));
    assert_eq!(f.value(&key("t2"), "n"), Some(Value::Int(5)));
    assert_eq!(f.value(&key("t3"), "n"), Some(Value::Null));
}

#[test]
fn unwrapped_metric_returns_the_raw_fields() {
    let catalog = test_catalog();
    let c = alpha();
    let fields = catalog.metric("partial_topic_counts").unwrap().compute(&c, &pici::Params::new()).unwrap();
    assert_eq!(fields.names().collect::<Vec<_>>(), vec!["n"]);
    assert_eq!(fields.series("n").unwrap().len(), 2);
}

#[test]
fn table_metrics_combine_into_one_row() {
    let catalog = test_catalog();
    let c = alpha();
    let combined = run_metrics(&catalog, &c, &[MetricCall::bare("posts"), MetricCall::bare("topics")]).unwrap();

    assert_eq!(combined.returntype, MetricReturnType::Table);
    assert_eq!(combined.fields.iter().map(String::as_str).collect::<Vec<_>>(), vec!["posts", "topics"]);
    let CombinedData::Frame(f) = combined.data else { panic!("expected a frame") };
    assert_eq!(f.index_name(), COMMUNITY_NAME);
    assert_eq!(f.index(), vec![Key::from("alpha")]);
    assert_eq!(f.value(&key("alpha"), "posts"), Some(Value::Int(10)));
    assert_eq!(f.value(&key("alpha"), "topics"), Some(Value::Int(4)));
}

#[test]
fn mixing_levels_names_every_metric() {
    let catalog = test_catalog();
    let c = alpha();
    let err = run_metrics(&catalog, &c, &[MetricCall::bare("per_post"), MetricCall::bare("posts")]).unwrap_err();
    match err {
        Error::IncompatibleMetrics { details, .. } => {
            assert!(details.contains("per_post (posts, dataframe)"), "{details}");
            assert!(details.contains("posts (community, table)"), "{details}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn differing_values_under_one_field_name_collide() {
    let catalog = test_catalog();
    let c = alpha();
    let err = run_metrics(&catalog, &c, &[MetricCall::bare("posts"), MetricCall::bare("topics"), MetricCall::bare("posts_again")])
        .unwrap_err();
    assert!(matches!(err, Error::FieldCollision { ref field, .. } if field == "posts"), "{err}");
}

#[test]
fn dataframe_results_are_stamped_with_the_community() {
    let catalog = test_catalog();
    let c = alpha();
    let combined = run_metrics(&catalog, &c, &[MetricCall::bare("per_post")]).unwrap();
    let CombinedData::Frame(f) = combined.data else { panic!("expected a frame") };
    assert_eq!(f.height(), 6);
    assert!(f.column(COMMUNITY_NAME).unwrap().iter().all(|v| v == &Value::from("alpha")));
}

#[test]
fn plain_results_are_listed_in_order() {
    let catalog = test_catalog();
    let c = alpha();
    let combined = run_metrics(&catalog, &c, &[MetricCall::bare("raw"), MetricCall::bare("raw")]).unwrap();
    let CombinedData::Plain(list) = combined.data else { panic!("expected plain data") };
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].scalar("hello"), Some(&Value::from("world")));
}

#[test]
fn mixed_index_kinds_are_coerced_to_strings() {
    let catalog = test_catalog();
    let c = alpha();
    let fields = catalog.metric("mixed_keys").unwrap().compute(&c, &pici::Params::new()).unwrap();
    assert!(matches!(pici::to_frame(&fields), Err(Error::MixedIndex { .. })));

    let f = pici::to_frame_coerced(&fields).unwrap();
    assert_eq!(f.index(), vec![Key::from("1"), Key::from("t1")]);
    assert_eq!(f.value(&key("t1"), "mixed"), Some(Value::Float(2.0)));
}

#[test]
fn unknown_metric_names_its_kind() {
    let catalog = test_catalog();
    let err = catalog.metric("nope").unwrap_err();
    assert!(err.to_string().contains("metric"), "{err}");
}

fn frame(keys: &[&str], columns: &[(&str, &[i64])]) -> Frame {
    let mut f = Frame::new("id", keys.iter().map(|k| Key::from(*k)).collect());
    for (name, values) in columns {
        f.push_column(*name, values.iter().map(|v| Value::Int(*v)).collect()).unwrap();
    }
    f
}

#[test]
fn merge_keeps_one_copy_of_shared_columns() {
    let a = frame(&["x", "y"], &[("shared", &[1, 2]), ("a", &[10, 20])]);
    let b = frame(&["y", "z"], &[("shared", &[2, 3]), ("b", &[200, 300])]);

    let merged = merge_frames(&[a.clone(), b.clone()], false).unwrap();
    assert_eq!(merged.column_names(), vec!["shared", "a", "b"]);
    assert_eq!(merged.height(), 3);
    assert_eq!(merged.value(&key("z"), "shared"), Some(Value::Int(3)));
    assert_eq!(merged.value(&key("z"), "a"), Some(Value::Null));
    assert_eq!(merged.value(&key("y"), "b"), Some(Value::Int(200)));

    let unique = merge_frames(&[a, b], true).unwrap();
    assert_eq!(unique.column_names(), vec!["a", "b"]);
}
