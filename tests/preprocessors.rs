#[path = "common/mod.rs"]
mod common;

use common::*;
use pici::{Error, MetricCatalog, Params, PreprocessorRegistry, Value, NUMBER_OF_WORDS, POST_POSITION, ROUNDED_DATE, THREAD_TEXT};

#[test]
fn post_positions_follow_dates_within_each_topic() {
    let catalog = MetricCatalog::builtin();
    let mut c = alpha();
    PreprocessorRegistry::new(&catalog, &mut c).call(POST_POSITION, &Params::new()).unwrap();

    let posts = c.posts();
    assert_eq!(posts.value(&key("p1"), POST_POSITION), Some(Value::Int(1)));
    assert_eq!(posts.value(&key("p3"), POST_POSITION), Some(Value::Int(3)));
    assert_eq!(posts.value(&key("p4"), POST_POSITION), Some(Value::Int(1)));
    assert_eq!(posts.value(&key("p5"), POST_POSITION), Some(Value::Int(2)));
    assert_eq!(posts.value(&key("p6"), POST_POSITION), Some(Value::Int(1)));
}

#[test]
fn rerunning_a_preprocessor_replaces_its_column() {
    let catalog = MetricCatalog::builtin();
    let mut c = alpha();
    let mut registry = PreprocessorRegistry::new(&catalog, &mut c);
    registry.call(NUMBER_OF_WORDS, &Params::new()).unwrap();
    registry.call(NUMBER_OF_WORDS, &Params::new()).unwrap();

    let names = c.posts().column_names();
    assert_eq!(names.iter().filter(|n| **n == NUMBER_OF_WORDS).count(), 1);
    // "Nice idea!" is two words and a mark
    assert_eq!(c.posts().value(&key("p2"), NUMBER_OF_WORDS), Some(Value::Int(3)));
    // markup is not counted
    assert_eq!(c.posts().value(&key("p1"), NUMBER_OF_WORDS), Some(Value::Int(7)));
}

#[test]
fn rounded_dates_drop_the_time_of_day() {
    let catalog = MetricCatalog::builtin();
    let (_dir, base) = make_snapshot();
    let opts = pici::LoadOptions::default().with_data_dir(&base);
    let mut c = pici::load_community(&base.join("alpha"), "alpha", &pici::CommunitySchema::default(), &opts).unwrap();
    PreprocessorRegistry::new(&catalog, &mut c).call(ROUNDED_DATE, &Params::new()).unwrap();

    assert_eq!(c.posts().value(&key("p1"), "date"), Some(Value::Date(date("2021-01-01").replace_hour(12).unwrap())));
    assert_eq!(c.posts().value(&key("p1"), ROUNDED_DATE), Some(Value::Date(date("2021-01-01"))));
}

#[test]
fn thread_text_collects_posts_per_topic() {
    let mut pici = session();
    pici.preprocess("alpha", THREAD_TEXT, &Params::new()).unwrap();
    let topics = pici.community("alpha").unwrap().topics();
    assert_eq!(
        topics.value(&key("t2"), THREAD_TEXT),
        Some(Value::List(vec![Value::from("Printer holder needs a new idea"), Value::from("Try my holder.")]))
    );
    assert!(!pici.community("beta").unwrap().topics().has_column(THREAD_TEXT));
}

#[test]
fn unknown_preprocessors_are_reported() {
    let mut pici = session();
    assert!(matches!(pici.preprocess("alpha", "nope", &Params::new()), Err(Error::Unknown { kind: "preprocessor", .. })));
    assert!(matches!(
        pici.preprocess("alpha", "lorenz", &Params::new()),
        Err(Error::WrongKind { expected: "preprocessor", found: "metric", .. })
    ));
    assert!(matches!(pici.preprocess("gamma", POST_POSITION, &Params::new()), Err(Error::Unknown { kind: "community", .. })));
}
