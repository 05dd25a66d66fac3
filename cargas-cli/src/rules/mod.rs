//! Rule model: JSON payloads parsed once into a typed tree, then evaluated
//! per cell against the frozen row snapshot.

pub mod chain;
pub mod parse;
pub mod parsers;
pub mod types;
pub mod validators;

pub use chain::{evaluate, evaluate_all};
pub use parse::parse_rule;
pub use parsers::parse_value;
pub use types::{DataType, DuplicateConfig, RuleCheck, RuleExpr, RuleStage, fold_label};
pub use validators::CellContext;
