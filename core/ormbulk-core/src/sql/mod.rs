// SQL module entry point
pub mod ast;
pub mod generator;
pub mod parser;

pub use ast::{
    Assignment, BinaryOperator, BulkStatement, ParamSpec, ScalarValue, SqlExpr, StatementKind,
    bind_params,
};
pub use generator::{
    AssignmentFragment, ColumnStyle, TranslatedFragment, translate_assignments,
    translate_predicate,
};
pub use parser::BulkStatementParser;
