//! Rule expression evaluation
//!
//! A column may carry a single stage or an ordered chain. Chains thread the
//! coerced value from one stage into the next and accumulate every error
//! along the way, so a report line can show all failures at once.

use crate::ingest::Value;

use super::types::RuleExpr;
use super::validators::{CellContext, apply_fallback, apply_stage};

/// Evaluate one rule expression against a cell
pub fn evaluate(expr: &RuleExpr, value: Value, ctx: &CellContext<'_>) -> (Value, Vec<String>) {
    match expr {
        RuleExpr::Stage(stage) => apply_stage(stage, value, ctx),
        RuleExpr::Chain(stages) => {
            let mut current = value;
            let mut errors = Vec::new();
            for stage in stages {
                let (next, stage_errors) = evaluate(stage, current, ctx);
                current = next;
                errors.extend(stage_errors);
            }
            (current, errors)
        }
    }
}

/// Evaluate every rule bound to a column; with no rules the declared data
/// type still applies through the fallback parser
pub fn evaluate_all(
    exprs: &[RuleExpr],
    value: Value,
    ctx: &CellContext<'_>,
) -> (Value, Vec<String>) {
    if exprs.is_empty() {
        return apply_fallback(value, None, ctx);
    }
    let mut current = value;
    let mut errors = Vec::new();
    for expr in exprs {
        let (next, expr_errors) = evaluate(expr, current, ctx);
        current = next;
        errors.extend(expr_errors);
    }
    (current, errors)
}
