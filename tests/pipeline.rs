#[path = "common/mod.rs"]
mod common;

use common::*;
use pici::{
    CommunityDataLevel, Error, FeaturePipeline, Fields, MetricCatalog, MetricDef, MetricFilter, MetricReturnType, Params,
    Pici, Series, Value, COMMUNITY_NAME, LABELLER, THREAD_TEXT,
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn topics_pipeline(pici: &Pici) -> FeaturePipeline {
    FeaturePipeline::new(pici.catalog().clone(), CommunityDataLevel::Topics)
}

#[test]
fn features_are_stacked_per_community() {
    let pici = session();
    let pipe = topics_pipeline(&pici).with_metrics(["number_of_posts_per_topic", "number_of_contributors_per_topic"]);
    let f = pipe.transform(pici.communities()).unwrap();

    assert_eq!(f.index_name(), "topic");
    assert_eq!(f.height(), 5);
    assert_eq!(f.column_names(), vec!["number of posts", "number of contributors", COMMUNITY_NAME]);
    assert_eq!(f.value(&key("t1"), "number of posts"), Some(Value::Int(3)));
    assert_eq!(f.value(&key("u2"), COMMUNITY_NAME), Some(Value::from("beta")));
}

#[test]
fn community_selection_sets_the_order() {
    let pici = session();
    let pipe = topics_pipeline(&pici).with_metric("number_of_posts_per_topic").with_communities(["beta", "alpha"]);
    let f = pipe.transform(pici.communities()).unwrap();
    assert_eq!(f.column(COMMUNITY_NAME).unwrap()[0], Value::from("beta"));
    assert_eq!(f.column(COMMUNITY_NAME).unwrap()[2], Value::from("alpha"));

    let err = topics_pipeline(&pici).with_communities(["gamma"]).transform(pici.communities()).unwrap_err();
    assert!(matches!(err, Error::Unknown { kind: "community", .. }), "{err}");
}

#[test]
fn first_metric_wins_on_field_name_clashes() {
    let catalog = Arc::new(
        MetricCatalog::builder()
            .with_builtins()
            .metric(MetricDef::topics("constant_posts", |c, _| {
                let s: Series = c.topics().index().iter().map(|k| (k.clone(), -1i64)).collect();
                Ok(Fields::new().with("number of posts", s.clone()).with("flag", s))
            }))
            .build(),
    );
    let c = alpha();
    let f = FeaturePipeline::new(catalog, CommunityDataLevel::Topics)
        .with_metrics(["number_of_posts_per_topic", "constant_posts"])
        .features(&c)
        .unwrap();
    assert_eq!(f.value(&key("t1"), "number of posts"), Some(Value::Int(3)));
    assert_eq!(f.value(&key("t1"), "flag"), Some(Value::Int(-1)));
}

#[test]
fn metrics_of_another_level_are_rejected() {
    let pici = session();
    let err = topics_pipeline(&pici).with_metric("number_of_posts").features(&alpha()).unwrap_err();
    assert!(matches!(err, Error::IncompatibleMetrics { .. }), "{err}");
}

#[test]
fn kept_view_columns_are_passed_through() {
    let mut pici = session();
    pici.preprocess_all(THREAD_TEXT, &Params::new()).unwrap();
    let f = topics_pipeline(&pici)
        .with_metric("number_of_posts_per_topic")
        .with_keep([THREAD_TEXT])
        .transform(pici.communities())
        .unwrap();
    assert_eq!(f.column_names(), vec!["number of posts", THREAD_TEXT, COMMUNITY_NAME]);
    assert_eq!(f.value(&key("t3"), THREAD_TEXT), Some(Value::List(vec![Value::from("Another idea for a holder")])));

    let err = topics_pipeline(&pici).with_keep(["nope"]).features(pici.community("alpha").unwrap()).unwrap_err();
    assert!(matches!(err, Error::MissingColumn { .. }), "{err}");
}

#[test]
fn params_can_differ_per_community() {
    let pici = session();
    let pipe = FeaturePipeline::new(pici.catalog().clone(), CommunityDataLevel::Posts)
        .with_metric("posts_word_occurrence")
        .with_params("posts_word_occurrence", Params::new().with("words", vec!["idea"]).with("normalize", false))
        .with_community_params("beta", "posts_word_occurrence", Params::new().with("words", vec!["design"]));

    assert_eq!(pipe.params_for("beta", "posts_word_occurrence").get("normalize"), Some(&Value::Bool(false)));
    let f = pipe.transform(pici.communities()).unwrap();
    assert_eq!(f.height(), 9);
    assert_eq!(f.value(&key("p1"), "occurrence of idea"), Some(Value::Int(1)));
    assert_eq!(f.value(&key("q1"), "occurrence of design"), Some(Value::Int(1)));
    assert_eq!(f.value(&key("q1"), "occurrence of idea"), Some(Value::Null));
}

#[test]
fn parallel_transform_matches_sequential() {
    let pici = preprocessed_session();
    let names: Vec<String> = pici
        .get_metrics(&MetricFilter::any().with_level(CommunityDataLevel::Topics))
        .into_iter()
        .map(|m| m.name().to_string())
        .collect();
    let sequential = topics_pipeline(&pici).with_metrics(names.clone()).transform(pici.communities()).unwrap();
    let parallel = topics_pipeline(&pici).with_metrics(names).with_concurrency(2).transform(pici.communities()).unwrap();
    assert_eq!(sequential, parallel);
}

#[test]
fn available_metrics_depend_on_preprocessing() {
    let filter = MetricFilter::any().with_level(CommunityDataLevel::Topics).with_returntype(MetricReturnType::DataFrame);
    let popularity = "idea_popularity_by_number_of_unique_users_commenting";

    let pici = session();
    assert!(!pici.get_metrics(&filter).iter().any(|m| m.name() == popularity));
    let pici = preprocessed_session();
    assert!(pici.get_metrics(&filter).iter().any(|m| m.name() == popularity));
}

#[test]
fn topic_features_join_labels_on_id_and_community() {
    let mut pici = preprocessed_session();
    pici.add_labels(innovation_labels()).unwrap();

    let (x, y) = pici.topic_features(true, &[], &BTreeMap::new()).unwrap();
    let y = y.unwrap();
    // alpha/t1 twice, alpha/t2, beta/u1
    assert_eq!(x.height(), 4);
    assert_eq!(y.height(), 4);
    assert_eq!(x.index(), y.index());
    assert_eq!(x.index_name(), "id");
    assert!(x.has_column("idea popularity: number of comments"));
    assert!(!x.has_column("label_idea"));
    assert_eq!(y.column_names()[0], LABELLER);
    assert!(y.has_column("label_has_potential"));
    assert_eq!(x.value(&key("t1"), "idea popularity: number of unique commenters"), Some(Value::Int(2)));

    let (all, none) = pici.topic_features(false, &[], &BTreeMap::new()).unwrap();
    assert!(none.is_none());
    assert_eq!(all.height(), 5);
}

#[test]
fn topic_features_without_labels_are_unlabelled() {
    let pici = preprocessed_session();
    let mut params = BTreeMap::new();
    params.insert("initiator_helpfulness_by_contribution_regularity".to_string(), Params::new().with("lookback_days", 7i64));
    let (x, y) = pici.topic_features(true, &[], &params).unwrap();
    assert!(y.is_none());
    assert_eq!(x.height(), 5);
    assert!(x.has_column("initiator helpfulness: past (7 days) contribution regularity"));
}
