#[path = "common/mod.rs"]
mod common;

use common::*;
use pici::{
    CommunityDataLevel, Error, Key, LabelRow, LabelType, Labels, MetricCall, MetricReturnType, Params, Pici, ReportData, Value,
    COMMUNITY_NAME, LABELLER, POST_POSITION,
};

#[test]
fn table_report_has_one_row_per_community() {
    let pici = session();
    let report = pici
        .generate_report(&[MetricCall::bare("number_of_posts"), MetricCall::bare("agg_posts_per_topic")])
        .unwrap();

    assert_eq!(report.level(), CommunityDataLevel::Community);
    assert_eq!(report.returntype(), MetricReturnType::Table);
    let f = report.frame().unwrap();
    assert_eq!(f.index_name(), COMMUNITY_NAME);
    assert_eq!(f.index(), vec![Key::from("alpha"), Key::from("beta")]);
    assert_eq!(f.value(&key("alpha"), "number of posts"), Some(Value::Int(6)));
    assert_eq!(f.value(&key("beta"), "number of posts"), Some(Value::Int(3)));
    assert_eq!(f.value(&key("alpha"), "mean posts per topic"), Some(Value::Float(2.0)));
    assert_eq!(f.value(&key("beta"), "mean posts per topic"), Some(Value::Float(1.5)));
    assert_eq!(f.value(&key("beta"), "max posts per topic"), Some(Value::Float(2.0)));
    assert!(report.fields().contains("sum posts per topic"));
}

#[test]
fn builtin_summary_runs_over_every_community() {
    let pici = session();
    let report = pici.reports().call("summary", &Params::new()).unwrap();
    let f = report.frame().unwrap();
    assert_eq!(f.height(), 2);
    // alpha spans Jan 1 to Jan 10: ten daily bins holding six posts
    assert_eq!(f.value(&key("alpha"), "sum number of posts per 1d"), Some(Value::Float(6.0)));
    assert_eq!(f.value(&key("alpha"), "mean number of posts per 1d"), Some(Value::Float(0.6)));
    assert_eq!(f.value(&key("alpha"), "mean number of posts per 1M"), Some(Value::Float(6.0)));
}

#[test]
fn topic_reports_stack_entities_with_their_community() {
    let pici = session();
    let report = pici.run_report("topics_summary", &Params::new()).unwrap();
    let f = report.frame().unwrap();

    assert_eq!(f.height(), 5);
    let communities = f.column(COMMUNITY_NAME).unwrap();
    assert_eq!(communities.iter().filter(|v| **v == Value::from("alpha")).count(), 3);
    assert_eq!(f.value(&key("t1"), "number of contributors"), Some(Value::Int(3)));
    assert_eq!(f.value(&key("t1"), "delay first last post"), Some(Value::Int(4)));
    assert_eq!(f.value(&key("t1"), "delay first second post"), Some(Value::Int(1)));
    assert_eq!(f.value(&key("t3"), "delay first last post"), Some(Value::Int(0)));
    assert_eq!(f.value(&key("u1"), "number of posts"), Some(Value::Int(2)));
}

#[test]
fn interval_report_keeps_empty_bins() {
    let pici = session();
    let report = pici
        .run_report("posts_contributors_per_interval", &Params::new().with("interval", "1d"))
        .unwrap();
    let f = report.frame().unwrap();
    assert_eq!(f.index_name(), "date");
    assert_eq!(f.height(), 10 + 4);
    assert_eq!(f.value(&key("2021-01-06"), "number of posts per 1d"), Some(Value::Int(0)));
    assert_eq!(f.value(&key("2021-01-01"), "number of contributors per 1d"), Some(Value::Int(1)));
    assert_eq!(f.value(&key("2021-02-04"), "number of posts per 1d"), Some(Value::Int(1)));
}

#[test]
fn report_parameters_are_validated() {
    let pici = session();
    let err = pici.run_report("posts_contributors_per_interval", &Params::new()).unwrap_err();
    assert!(err.to_string().contains("interval"), "{err}");
}

#[test]
fn results_project_to_the_metric_fields() {
    let pici = preprocessed_session();
    let report = pici.run_report("post_length", &Params::new()).unwrap();
    let ReportData::Frame(f) = report.results() else { panic!("expected a frame") };
    assert_eq!(f.column_names(), vec!["number of words", COMMUNITY_NAME]);
    assert_eq!(f.height(), 9);
}

#[test]
fn lorenz_curve_ends_at_all_posts() {
    let pici = session();
    let report = pici.run_report("lorenz_curve", &Params::new()).unwrap();
    let f = report.frame().unwrap();
    // alpha: 3 contributors + origin, beta: 2 contributors + origin
    assert_eq!(f.height(), 7);
    let last = f.column("% posts").unwrap()[3].as_f64().unwrap();
    assert!((last - 100.0).abs() < 1e-9);
    let first_step = f.column("% posts").unwrap()[1].as_f64().unwrap();
    assert!((first_step - 100.0 / 6.0).abs() < 1e-9);
}

#[test]
fn labelled_data_repeats_rows_per_labeller() {
    let pici = Pici::builder()
        .with_community(alpha())
        .with_community(beta())
        .with_labels(innovation_labels())
        .build()
        .unwrap();
    let report = pici.run_report("topics_summary", &Params::new()).unwrap();

    let ReportData::Frame(f) = report.labelled_data().unwrap() else { panic!("expected a frame") };
    // t1 twice (two labellers), t2, t3 unlabelled, u1, u2 unlabelled
    assert_eq!(f.height(), 6);
    assert!(f.has_column("label_idea"));
    assert!(f.has_column(LABELLER));
    let t3 = f.rows().find(|r| r.key() == &key("t3")).unwrap();
    assert_eq!(t3.get("label_idea"), Some(Value::Null));
    let u1 = f.rows().find(|r| r.key() == &key("u1")).unwrap();
    assert_eq!(u1.get("label_potential"), Some(Value::Null));
    assert_eq!(u1.get("label_idea"), Some(Value::Bool(false)));

    let ReportData::Frame(r) = report.labelled_results().unwrap() else { panic!("expected a frame") };
    assert_eq!(r.height(), 6);
}

#[test]
fn community_tables_join_community_labels() {
    let quality = Labels::new("quality", CommunityDataLevel::Community, vec![("label_good".to_string(), LabelType::Bool)])
        .with_rows([LabelRow::new("alpha", "alpha", "ann").with("label_good", true)]);
    let pici = Pici::builder()
        .with_community(alpha())
        .with_community(beta())
        .with_labels(quality)
        .build()
        .unwrap();
    let report = pici.generate_report(&[MetricCall::bare("number_of_posts")]).unwrap();

    let ReportData::Frame(f) = report.labelled_results().unwrap() else { panic!("expected a frame") };
    assert_eq!(f.index_name(), COMMUNITY_NAME);
    assert_eq!(f.height(), 2);
    assert_eq!(f.value(&key("alpha"), "label_good"), Some(Value::Bool(true)));
    assert_eq!(f.value(&key("alpha"), LABELLER), Some(Value::from("ann")));
    assert_eq!(f.value(&key("beta"), "label_good"), Some(Value::Null));
    assert_eq!(f.value(&key("beta"), "number of posts"), Some(Value::Int(3)));
}

#[test]
fn reports_without_labels_come_back_unjoined() {
    let pici = session();
    let report = pici.run_report("topics_summary", &Params::new()).unwrap();
    assert_eq!(&report.labelled_data().unwrap(), report.data());
}

#[test]
fn ad_hoc_reports_are_checked_against_their_declaration() {
    let mut pici = session();
    pici.add_report(
        "sizes",
        vec![MetricCall::bare("number_of_posts"), MetricCall::bare("number_of_contributors")],
        CommunityDataLevel::Community,
        MetricReturnType::Table,
    )
    .unwrap();
    let report = pici.reports().call("sizes", &Params::new()).unwrap();
    assert_eq!(report.frame().unwrap().value(&key("beta"), "number of contributors"), Some(Value::Int(2)));
    assert!(pici.reports().names().contains(&"sizes".to_string()));

    pici.add_report("wrong", vec![MetricCall::bare("number_of_posts")], CommunityDataLevel::Topics, MetricReturnType::DataFrame)
        .unwrap();
    let err = pici.run_report("wrong", &Params::new()).unwrap_err();
    assert!(matches!(err, Error::IncompatibleMetrics { .. }), "{err}");

    let err = pici
        .add_report("broken", vec![MetricCall::bare("no_such_metric")], CommunityDataLevel::Community, MetricReturnType::Table)
        .unwrap_err();
    assert!(matches!(err, Error::Unknown { kind: "metric", .. }), "{err}");
}

#[test]
fn unknown_reports_and_wrong_kinds() {
    let pici = session();
    assert!(matches!(pici.run_report("nope", &Params::new()), Err(Error::Unknown { kind: "report", .. })));
    assert!(matches!(
        pici.run_report("number_of_posts", &Params::new()),
        Err(Error::WrongKind { expected: "report", found: "metric", .. })
    ));
}

#[test]
fn one_failing_community_fails_the_report() {
    let mut pici = session();
    pici.preprocess("alpha", POST_POSITION, &Params::new()).unwrap();
    let err = pici
        .generate_report(&[MetricCall::bare("idea_popularity_by_number_of_unique_users_commenting")])
        .unwrap_err();
    match err {
        Error::MissingColumn { column, context } => {
            assert_eq!(column, POST_POSITION);
            assert!(context.contains("beta"), "{context}");
        }
        other => panic!("unexpected error: {other}"),
    }
}
