// tests/expression_eval.rs
use feed_dispatch::filters::{
    evaluate_expression, validate_json, CompiledFilter, Expression, RelationalOperator,
};
use feed_dispatch::Article;
use serde_json::json;

fn article() -> Article {
    Article::from_pairs([
        ("id", "42"),
        ("title", "Rust 1.80 released"),
        ("author", "Ferris"),
    ])
    .unwrap()
}

fn eval(e: &Expression) -> bool {
    evaluate_expression(e, &article()).unwrap()
}

#[test]
fn operators_on_present_fields() {
    use RelationalOperator::*;
    assert!(eval(&Expression::string(Eq, "author", "Ferris")));
    assert!(!eval(&Expression::string(Eq, "author", "ferris")));
    assert!(eval(&Expression::string(NotEq, "author", "Other")));
    assert!(eval(&Expression::string(Contains, "title", "1.80")));
    assert!(eval(&Expression::string(NotContain, "title", "Go")));
    assert!(eval(&Expression::regexp(Matches, "title", r"\d+\.\d+")));
    assert!(eval(&Expression::regexp(Contains, "title", "(?i)RUST")));
    // EQ against a regex must cover the whole value
    assert!(!eval(&Expression::regexp(Eq, "title", "Rust")));
    assert!(eval(&Expression::regexp(Eq, "title", "Rust.*")));
}

#[test]
fn missing_fields_follow_operator_polarity() {
    use RelationalOperator::*;
    assert!(!eval(&Expression::string(Eq, "summary", "")));
    assert!(!eval(&Expression::string(Contains, "summary", "x")));
    assert!(!eval(&Expression::regexp(Matches, "summary", ".*")));
    assert!(eval(&Expression::string(NotEq, "summary", "x")));
    assert!(eval(&Expression::string(NotContain, "summary", "x")));
}

#[test]
fn logical_combinators() {
    use RelationalOperator::*;
    let yes = Expression::string(Eq, "author", "Ferris");
    let no = Expression::string(Eq, "author", "Nobody");
    assert!(eval(&Expression::and(vec![yes.clone(), yes.clone()])));
    assert!(!eval(&Expression::and(vec![yes.clone(), no.clone()])));
    assert!(eval(&Expression::or(vec![no.clone(), yes.clone()])));
    assert!(eval(&Expression::not(no)));
    assert!(!eval(&Expression::not(yes)));
    assert!(eval(&Expression::and(vec![])));
    assert!(!eval(&Expression::or(vec![])));
}

#[test]
fn persisted_json_round_trips_and_evaluates() {
    let raw = json!({
        "type": "LOGICAL",
        "op": "OR",
        "children": [
            { "type": "RELATIONAL", "op": "NOT_CONTAIN",
              "left": { "type": "ARTICLE", "value": "title" },
              "right": { "type": "STRING", "value": "released" } },
            { "type": "LOGICAL", "op": "NOT", "children": [
                { "type": "RELATIONAL", "op": "EQ",
                  "left": { "type": "ARTICLE", "value": "author" },
                  "right": { "type": "STRING", "value": "Ferris" } }
            ]}
        ]
    });
    let e = Expression::from_json(raw.clone()).unwrap();
    assert_eq!(serde_json::to_value(&e).unwrap(), raw);
    assert!(!eval(&e));
}

#[test]
fn unknown_operator_is_rejected() {
    let err = Expression::from_json(json!({
        "type": "RELATIONAL", "op": "STARTS_WITH",
        "left": { "type": "ARTICLE", "value": "title" },
        "right": { "type": "STRING", "value": "R" }
    }))
    .unwrap_err();
    assert_eq!(err.issues[0].path, "$");
}

#[test]
fn validation_collects_every_issue_with_paths() {
    let issues = validate_json(json!({
        "type": "LOGICAL", "op": "AND", "children": [
            { "type": "RELATIONAL", "op": "MATCHES",
              "left": { "type": "ARTICLE", "value": "title" },
              "right": { "type": "REGEXP", "value": "[" } },
            { "type": "RELATIONAL", "op": "EQ",
              "left": { "type": "ARTICLE", "value": " " },
              "right": { "type": "STRING", "value": "x" } },
            { "type": "LOGICAL", "op": "NOT", "children": [] }
        ]
    }));
    let paths: Vec<&str> = issues.iter().map(|i| i.path.as_str()).collect();
    assert_eq!(
        paths,
        [
            "$.children[0].right.value",
            "$.children[1].left.value",
            "$.children[2].children"
        ]
    );
}

#[test]
fn compiled_filter_is_reusable_across_articles() {
    let f = CompiledFilter::compile(&Expression::string(
        RelationalOperator::Contains,
        "title",
        "Rust",
    ))
    .unwrap();
    let other = Article::from_pairs([("id", "1"), ("title", "Go 2")]).unwrap();
    assert!(f.evaluate(&article()));
    assert!(!f.evaluate(&other));
}
