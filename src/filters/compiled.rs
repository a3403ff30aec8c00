// src/filters/compiled.rs
//! Compiled filters: regexes are built once, when the expression is validated,
//! so evaluation itself cannot fail.
//!
//! Operator semantics:
//! - `EQ`:          exact, case-sensitive; a `REGEXP` right side must match the whole value
//! - `CONTAINS`:    substring, or regex search for `REGEXP`
//! - `MATCHES`:     regex search (match anywhere) for either right kind
//! - `NOT_EQ` / `NOT_CONTAIN`: negations; a missing field counts as a match
//! - `AND` of nothing is true, `OR` of nothing is false, `NOT` takes exactly one child

use regex::Regex;

use crate::article::FieldSource;
use crate::error::{ExpressionIssue, InvalidExpressionError};
use crate::filters::expression::{
    Expression, LogicalOperator, RelationalExpression, RelationalOperator, RelationalRight,
};

/// Deepest nesting accepted from stored configuration.
pub const MAX_EXPRESSION_DEPTH: usize = 32;

#[derive(Debug, Clone)]
enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    Relation {
        op: RelationalOperator,
        field: String,
        matcher: Matcher,
    },
}

#[derive(Debug, Clone)]
enum Matcher {
    Literal(String),
    Pattern(Regex),
}

/// A validated, ready-to-evaluate filter.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    root: Node,
}

impl CompiledFilter {
    /// Validate and compile. Every issue in the tree is reported, not just the first.
    pub fn compile(expr: &Expression) -> Result<Self, InvalidExpressionError> {
        let mut issues = Vec::new();
        let root = compile_node(expr, "$", 0, &mut issues);
        match root {
            Some(root) if issues.is_empty() => Ok(Self { root }),
            _ => Err(InvalidExpressionError { issues }),
        }
    }

    pub fn evaluate<S: FieldSource + ?Sized>(&self, source: &S) -> bool {
        eval(&self.root, source)
    }
}

/// Compile then evaluate in one go. Used when a stored expression has not
/// been prepared ahead of time.
pub fn evaluate_expression<S: FieldSource + ?Sized>(
    expr: &Expression,
    source: &S,
) -> Result<bool, InvalidExpressionError> {
    Ok(CompiledFilter::compile(expr)?.evaluate(source))
}

/// Validation entry point for raw JSON coming from the outside. Returns the
/// full list of issues; empty means the expression is usable.
pub fn validate_json(value: serde_json::Value) -> Vec<ExpressionIssue> {
    match Expression::from_json(value) {
        Ok(expr) => match CompiledFilter::compile(&expr) {
            Ok(_) => Vec::new(),
            Err(e) => e.issues,
        },
        Err(e) => e.issues,
    }
}

fn compile_node(
    expr: &Expression,
    path: &str,
    depth: usize,
    issues: &mut Vec<ExpressionIssue>,
) -> Option<Node> {
    if depth >= MAX_EXPRESSION_DEPTH {
        issues.push(ExpressionIssue::new(
            path,
            format!("expression nested deeper than {MAX_EXPRESSION_DEPTH} levels"),
        ));
        return None;
    }

    match expr {
        Expression::Logical(logical) => {
            let children: Vec<Option<Node>> = logical
                .children
                .iter()
                .enumerate()
                .map(|(i, c)| compile_node(c, &format!("{path}.children[{i}]"), depth + 1, issues))
                .collect();
            let children: Option<Vec<Node>> = children.into_iter().collect();

            match logical.op {
                LogicalOperator::And => children.map(Node::And),
                LogicalOperator::Or => children.map(Node::Or),
                LogicalOperator::Not => {
                    if logical.children.len() != 1 {
                        issues.push(ExpressionIssue::new(
                            format!("{path}.children"),
                            format!(
                                "NOT takes exactly one child, got {}",
                                logical.children.len()
                            ),
                        ));
                        return None;
                    }
                    children
                        .and_then(|mut v| v.pop())
                        .map(|child| Node::Not(Box::new(child)))
                }
            }
        }
        Expression::Relational(rel) => compile_relation(rel, path, issues),
    }
}

fn compile_relation(
    rel: &RelationalExpression,
    path: &str,
    issues: &mut Vec<ExpressionIssue>,
) -> Option<Node> {
    let field = rel.left.field();
    let mut ok = true;
    if field.trim().is_empty() {
        issues.push(ExpressionIssue::new(
            format!("{path}.left.value"),
            "article field name must not be empty",
        ));
        ok = false;
    }

    let pattern_source = match (&rel.right, rel.op) {
        (RelationalRight::Regexp { value }, RelationalOperator::Eq | RelationalOperator::NotEq) => {
            Some(format!("^(?:{value})$"))
        }
        (RelationalRight::Regexp { value }, _) => Some(value.clone()),
        (RelationalRight::String { value }, RelationalOperator::Matches) => Some(value.clone()),
        (RelationalRight::String { .. }, _) => None,
    };

    let matcher = match pattern_source {
        Some(src) => match Regex::new(&src) {
            Ok(re) => Some(Matcher::Pattern(re)),
            Err(e) => {
                issues.push(ExpressionIssue::new(
                    format!("{path}.right.value"),
                    format!("invalid regex: {e}"),
                ));
                None
            }
        },
        None => Some(Matcher::Literal(rel.right.value().to_string())),
    };

    match matcher {
        Some(matcher) if ok => Some(Node::Relation {
            op: rel.op,
            field: field.to_string(),
            matcher,
        }),
        _ => None,
    }
}

fn eval<S: FieldSource + ?Sized>(node: &Node, source: &S) -> bool {
    match node {
        Node::And(children) => children.iter().all(|c| eval(c, source)),
        Node::Or(children) => children.iter().any(|c| eval(c, source)),
        Node::Not(child) => !eval(child, source),
        Node::Relation { op, field, matcher } => {
            let Some(value) = source.field(field) else {
                return op.is_negated();
            };
            let hit = match (op, matcher) {
                (RelationalOperator::Eq | RelationalOperator::NotEq, Matcher::Literal(s)) => value == s,
                (RelationalOperator::Contains | RelationalOperator::NotContain, Matcher::Literal(s)) => {
                    value.contains(s.as_str())
                }
                // MATCHES always compiles to a pattern
                (RelationalOperator::Matches, Matcher::Literal(s)) => value.contains(s.as_str()),
                (_, Matcher::Pattern(re)) => re.is_match(value),
            };
            if op.is_negated() {
                !hit
            } else {
                hit
            }
        }
    }
}
