#[path = "common/mod.rs"]
mod common;

use common::*;
use pici::{Community, CommunitySchema, Error, Frame, GraphKind, MetricRegistry, MetricCatalog, Params, Value};
use std::sync::Arc;

#[test]
fn co_contributor_network_counts_shared_topics() {
    let c = alpha();
    let g = c.co_contributor_graph();
    assert!(!g.is_directed());
    assert_eq!(g.node_count(), 3);
    assert_eq!(g.edge_count(), 3);
    // alice and bob meet in t1 and t2
    assert_eq!(g.weight(&key("alice"), &key("bob")), Some(2));
    assert_eq!(g.weight(&key("bob"), &key("alice")), Some(2));
    assert_eq!(g.weight(&key("carol"), &key("bob")), Some(1));
    assert_eq!(g.degree_centrality(), vec![(key("alice"), 1.0), (key("bob"), 1.0), (key("carol"), 1.0)]);
}

#[test]
fn commenter_network_points_at_initiators() {
    let c = alpha();
    let g = c.commenter_graph();
    assert!(g.is_directed());
    assert_eq!(g.edge_count(), 3);
    assert_eq!(g.weight(&key("bob"), &key("alice")), Some(1));
    assert_eq!(g.weight(&key("alice"), &key("bob")), Some(1));
    assert_eq!(g.weight(&key("alice"), &key("carol")), None);
    assert_eq!(g.in_degree_centrality(), vec![(key("alice"), 1.0), (key("bob"), 0.5), (key("carol"), 0.0)]);
    assert_eq!(g.degrees(), vec![(key("alice"), 3), (key("bob"), 2), (key("carol"), 1)]);
}

#[test]
fn temporal_networks_are_cached_per_window() {
    let c = alpha();
    let end = Some(date("2021-01-03"));
    let first = c.temporal_graph(None, end, GraphKind::Commenter);
    let again = c.temporal_graph(None, end, GraphKind::Commenter);
    assert!(Arc::ptr_eq(&first, &again));
    // only p1 and p2 are before Jan 3
    assert_eq!(first.node_count(), 2);
    assert_eq!(first.weight(&key("bob"), &key("alice")), Some(1));

    let empty = c.temporal_graph(None, Some(date("2021-01-01")), GraphKind::Commenter);
    assert_eq!(empty.node_count(), 0);
    assert!(empty.in_degree_centrality().is_empty());
}

#[test]
fn betweenness_and_eigenvector_centralities() {
    let c = alpha();
    let commenter = c.commenter_graph();
    // carol reaches bob only through alice
    assert_eq!(commenter.betweenness_centrality(), vec![(key("alice"), 0.5), (key("bob"), 0.0), (key("carol"), 0.0)]);
    let eigen = commenter.eigenvector_centrality().unwrap();
    assert_eq!(eigen.len(), 3);
    assert!((eigen[0].1 - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-4, "{eigen:?}");
    assert!((eigen[1].1 - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-4, "{eigen:?}");
    assert!(eigen[2].1.abs() < 1e-4, "{eigen:?}");

    let triangle = c.co_contributor_graph();
    assert!(triangle.betweenness_centrality().iter().all(|(_, b)| *b == 0.0));
    let eigen = triangle.eigenvector_centrality().unwrap();
    assert!(eigen.iter().all(|(_, x)| (x - 1.0 / 3f64.sqrt()).abs() < 1e-9), "{eigen:?}");

    let empty = c.temporal_graph(None, Some(date("2021-01-01")), GraphKind::Commenter);
    assert!(empty.betweenness_centrality().is_empty());
    assert_eq!(empty.eigenvector_centrality(), Some(Vec::new()));
}

#[test]
fn network_metrics_per_contributor() {
    let catalog = MetricCatalog::builtin();
    let c = alpha();
    let registry = MetricRegistry::new(&catalog, &c);

    let degree = registry.unwrapped("contributor_degree", &Params::new()).unwrap();
    let degree = degree.series("degree").unwrap();
    assert_eq!(degree.get(&key("carol")), Some(&Value::Int(2)));

    let commenter = Params::new().with("kind", "commenter");
    let fields = registry.unwrapped("contributor_centralities", &commenter).unwrap();
    assert_eq!(fields.series("in_degree_centrality").unwrap().get(&key("bob")), Some(&Value::Float(0.5)));
    assert_eq!(fields.series("out_degree_centrality").unwrap().get(&key("carol")), Some(&Value::Float(0.5)));
    assert_eq!(fields.series("degree_centrality").unwrap().get(&key("alice")), Some(&Value::Float(1.5)));

    assert_eq!(fields.series("betweenness_centrality").unwrap().get(&key("alice")), Some(&Value::Float(0.5)));
    assert!(fields.contains("eigenvector_centrality"));

    let undirected = registry.unwrapped("contributor_centralities", &Params::new()).unwrap();
    assert!(!undirected.contains("in_degree_centrality"));
    assert_eq!(undirected.series("betweenness_centrality").unwrap().get(&key("bob")), Some(&Value::Float(0.0)));

    let err = registry.unwrapped("contributor_degree", &Params::new().with("kind", "friends")).unwrap_err();
    assert!(matches!(err, Error::Metric { .. }), "{err}");
}

#[test]
fn timeslice_keeps_referenced_rows_only() {
    let c = alpha();
    let sliced = c.timeslice(Some(date("2021-01-02")), Some(date("2021-01-05"))).unwrap();
    assert_eq!(sliced.posts().index(), vec![key("p2"), key("p4"), key("p5")]);
    assert_eq!(sliced.contributors().index(), vec![key("alice"), key("bob")]);
    assert_eq!(sliced.topics().index(), vec![key("t1"), key("t2")]);
    assert_eq!(sliced.name(), "alpha");

    let open = c.timeslice(None, None).unwrap();
    assert_eq!(open.posts().height(), 6);
}

#[test]
fn lookups_by_post_and_topic() {
    let c = alpha();
    assert_eq!(c.contributor_by_post_id(&key("p4")).unwrap().key(), &key("bob"));
    assert!(c.contributor_by_post_id(&key("p99")).is_none());
    assert_eq!(c.contributors_by_topic_id(&key("t1")), vec![key("alice"), key("bob"), key("carol")]);
    assert_eq!(c.contributors_by_topic_id(&key("t2")), vec![key("bob"), key("alice")]);
    assert!(c.contributors_by_topic_id(&key("t9")).is_empty());
}

#[test]
fn posts_must_reference_known_rows() {
    let posts = posts_frame(&ALPHA);
    let contributors = Frame::new("contributor", vec![key("alice"), key("bob")]);
    let topics = Frame::new("topic", vec![key("t1"), key("t2"), key("t3")]);
    let err = Community::new("alpha", CommunitySchema::default(), posts, contributors, topics).unwrap_err();
    assert!(matches!(err, Error::Integrity { .. }), "{err}");

    let mut duplicated = ALPHA.to_vec();
    duplicated.push(("p1", "t3", "alice", "2021-01-11", "again"));
    let err = Community::from_posts("alpha", CommunitySchema::default(), posts_frame(&duplicated)).unwrap_err();
    assert!(matches!(err, Error::Integrity { .. }), "{err}");
}

#[test]
fn core_post_columns_cannot_be_overwritten() {
    let mut c = alpha();
    let values = c.posts().series("topic").unwrap();
    assert!(matches!(c.set_posts_column("date", &values), Err(Error::Invalid(_))));
    c.set_posts_column("topic_copy", &values).unwrap();
    assert_eq!(c.posts().value(&key("p5"), "topic_copy"), Some(Value::from("t2")));
}
