// src/filters/mod.rs
pub mod compiled;
pub mod expression;
pub mod legacy;

pub use compiled::{evaluate_expression, validate_json, CompiledFilter, MAX_EXPRESSION_DEPTH};
pub use expression::{
    Expression, FilterExpression, LogicalExpression, LogicalOperator, RelationalExpression,
    RelationalLeft, RelationalOperator, RelationalRight,
};
