//! Bulk-statement front door — sqlparser-rs
//!
//! Parses the textual form of a bulk statement (`insert` / `update` /
//! `delete` only) into the compiled [`BulkStatement`] tree. Entity and
//! property names pass through as written; resolution against the physical
//! topology happens later, in the generator.

use sqlparser::ast::{
    BinaryOperator as SqlBinaryOp, Expr as ParsedExpr, FromTable, SetExpr, Statement, TableFactor,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::{BulkError, BulkResult};
use crate::sql::ast::{Assignment, BinaryOperator, BulkStatement, ScalarValue, SqlExpr};

/// Parsed-operator → compiled-operator conversion.
fn convert_binary_op(op: &SqlBinaryOp) -> BulkResult<BinaryOperator> {
    match op {
        SqlBinaryOp::Plus => Ok(BinaryOperator::Plus),
        SqlBinaryOp::Minus => Ok(BinaryOperator::Minus),
        SqlBinaryOp::Multiply => Ok(BinaryOperator::Multiply),
        SqlBinaryOp::Divide => Ok(BinaryOperator::Divide),
        SqlBinaryOp::Modulo => Ok(BinaryOperator::Modulo),
        SqlBinaryOp::Eq => Ok(BinaryOperator::Eq),
        SqlBinaryOp::NotEq => Ok(BinaryOperator::NotEq),
        SqlBinaryOp::Lt => Ok(BinaryOperator::Lt),
        SqlBinaryOp::LtEq => Ok(BinaryOperator::LtEq),
        SqlBinaryOp::Gt => Ok(BinaryOperator::Gt),
        SqlBinaryOp::GtEq => Ok(BinaryOperator::GtEq),
        SqlBinaryOp::And => Ok(BinaryOperator::And),
        SqlBinaryOp::Or => Ok(BinaryOperator::Or),
        _ => Err(BulkError::SqlNotSupported {
            feature: format!("binary operator: {:?}", op),
            hint: "use arithmetic, comparison, and/or operators".to_string(),
        }),
    }
}

/// Target entity of an UPDATE/DELETE, without any alias (`Person p` → `Person`).
fn entity_name(relation: &TableFactor) -> BulkResult<String> {
    match relation {
        TableFactor::Table { name, .. } => Ok(name.to_string()),
        other => Err(BulkError::SqlNotSupported {
            feature: format!("statement target: {}", other),
            hint: "target a single named entity".to_string(),
        }),
    }
}

/// Tracks the next index handed to a bare `?` placeholder.
struct ExprConverter {
    next_param: usize,
}

impl ExprConverter {
    fn new() -> Self {
        Self { next_param: 0 }
    }

    fn placeholder_index(&mut self, token: &str) -> usize {
        let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.parse::<usize>() {
            // `?3` / `$3` are one-based
            Ok(n) if n > 0 => n - 1,
            _ => {
                let index = self.next_param;
                self.next_param += 1;
                index
            }
        }
    }

    fn convert(&mut self, expr: &ParsedExpr) -> BulkResult<SqlExpr> {
        match expr {
            ParsedExpr::Identifier(ident) => Ok(SqlExpr::Column {
                qualifier: None,
                name: ident.value.clone(),
            }),
            ParsedExpr::CompoundIdentifier(idents) => {
                let name = idents.last().map(|i| i.value.clone()).unwrap_or_default();
                let qualifier = idents.first().map(|i| i.value.clone());
                Ok(SqlExpr::Column { qualifier, name })
            }
            ParsedExpr::Value(value) => {
                use sqlparser::ast::Value;
                let scalar = match value {
                    Value::Number(n, _) => {
                        if let Ok(i) = n.parse::<i64>() {
                            ScalarValue::Int(i)
                        } else if let Ok(f) = n.parse::<f64>() {
                            ScalarValue::Float(f)
                        } else {
                            return Err(BulkError::SqlNotSupported {
                                feature: format!("numeric literal: {}", n),
                                hint: "use an integer or float literal".to_string(),
                            });
                        }
                    }
                    Value::SingleQuotedString(s) => ScalarValue::Text(s.clone()),
                    Value::Boolean(b) => ScalarValue::Bool(*b),
                    Value::Null => ScalarValue::Null,
                    Value::Placeholder(token) => {
                        return Ok(SqlExpr::Param(self.placeholder_index(token)));
                    }
                    _ => {
                        return Err(BulkError::SqlNotSupported {
                            feature: format!("literal: {:?}", value),
                            hint: "use number, string, boolean, null, or ?".to_string(),
                        });
                    }
                };
                Ok(SqlExpr::Literal(scalar))
            }
            ParsedExpr::BinaryOp { left, op, right } => Ok(SqlExpr::BinaryOp {
                left: Box::new(self.convert(left)?),
                op: convert_binary_op(op)?,
                right: Box::new(self.convert(right)?),
            }),
            ParsedExpr::IsNull(inner) => Ok(SqlExpr::IsNull(Box::new(self.convert(inner)?))),
            ParsedExpr::IsNotNull(inner) => Ok(SqlExpr::IsNotNull(Box::new(self.convert(inner)?))),
            ParsedExpr::InList {
                expr,
                list,
                negated,
            } => Ok(SqlExpr::InList {
                expr: Box::new(self.convert(expr)?),
                list: list
                    .iter()
                    .map(|e| self.convert(e))
                    .collect::<BulkResult<Vec<_>>>()?,
                negated: *negated,
            }),
            ParsedExpr::Nested(inner) => self.convert(inner),
            _ => Err(BulkError::SqlNotSupported {
                feature: format!("expression: {:?}", expr),
                hint: "bulk statements support columns, literals, parameters, \
                       binary operators, is null, and in-lists"
                    .to_string(),
            }),
        }
    }
}

/// Bulk-statement parser over `GenericDialect`.
pub struct BulkStatementParser {
    dialect: GenericDialect,
}

impl BulkStatementParser {
    pub fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }

    /// Parse exactly one bulk INSERT/UPDATE/DELETE.
    pub fn parse(&self, sql: &str) -> BulkResult<BulkStatement> {
        let statements = Parser::parse_sql(&self.dialect, sql).map_err(|e| BulkError::SqlParse {
            message: e.to_string(),
            sql: sql.to_string(),
        })?;
        let [statement] = statements.as_slice() else {
            return Err(BulkError::SqlParse {
                message: format!("expected exactly one statement, found {}", statements.len()),
                sql: sql.to_string(),
            });
        };
        let mut converter = ExprConverter::new();
        match statement {
            Statement::Insert(insert) => {
                let entity = insert.table_name.to_string();
                let properties: Vec<String> =
                    insert.columns.iter().map(|c| c.value.clone()).collect();
                let Some(source) = &insert.source else {
                    return Err(BulkError::SqlNotSupported {
                        feature: "INSERT without VALUES".to_string(),
                        hint: "INSERT INTO ... VALUES (...) is required".to_string(),
                    });
                };
                let SetExpr::Values(values) = source.body.as_ref() else {
                    return Err(BulkError::SqlNotSupported {
                        feature: "INSERT with SELECT".to_string(),
                        hint: "Only INSERT INTO ... VALUES (...) is supported".to_string(),
                    });
                };
                let mut rows = Vec::with_capacity(values.rows.len());
                for row in &values.rows {
                    rows.push(
                        row.iter()
                            .map(|e| converter.convert(e))
                            .collect::<BulkResult<Vec<_>>>()?,
                    );
                }
                Ok(BulkStatement::Insert {
                    entity,
                    properties,
                    rows,
                })
            }
            Statement::Update {
                table,
                assignments,
                selection,
                ..
            } => {
                let entity = entity_name(&table.relation)?;
                let mut converted = Vec::with_capacity(assignments.len());
                for assignment in assignments {
                    let target = assignment.target.to_string();
                    // `alias.prop` targets keep only the property segment
                    let property = target.rsplit('.').next().unwrap_or(&target).to_string();
                    converted.push(Assignment {
                        property,
                        value: converter.convert(&assignment.value)?,
                    });
                }
                let predicate = selection
                    .as_ref()
                    .map(|s| converter.convert(s))
                    .transpose()?;
                Ok(BulkStatement::Update {
                    entity,
                    assignments: converted,
                    predicate,
                })
            }
            Statement::Delete(delete) => {
                let tables = match &delete.from {
                    FromTable::WithFromKeyword(t) => t,
                    FromTable::WithoutKeyword(t) => t,
                };
                let entity = tables
                    .first()
                    .map(|t| entity_name(&t.relation))
                    .transpose()?
                    .unwrap_or_default();
                let predicate = delete
                    .selection
                    .as_ref()
                    .map(|s| converter.convert(s))
                    .transpose()?;
                Ok(BulkStatement::Delete { entity, predicate })
            }
            _ => Err(BulkError::SqlNotSupported {
                feature: "non-bulk statement".to_string(),
                hint: "only INSERT, UPDATE, and DELETE are bulk statements".to_string(),
            }),
        }
    }
}

impl Default for BulkStatementParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::StatementKind;

    #[test]
    fn parse_delete_with_predicate() {
        let parser = BulkStatementParser::new();
        let stmt = parser.parse("DELETE FROM Person WHERE name = 'joe'").unwrap();
        assert_eq!(stmt.entity(), "Person");
        assert_eq!(stmt.kind(), StatementKind::Delete);
        assert!(stmt.predicate().is_some());
    }

    #[test]
    fn parse_update_assignments_and_params() {
        let parser = BulkStatementParser::new();
        let stmt = parser
            .parse("UPDATE Person SET name = ?, age = 30 WHERE id = ?")
            .unwrap();
        let BulkStatement::Update {
            assignments,
            predicate,
            ..
        } = stmt
        else {
            panic!("expected update");
        };
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].property, "name");
        assert_eq!(assignments[0].value, SqlExpr::Param(0));
        assert_eq!(
            assignments[1].value,
            SqlExpr::Literal(ScalarValue::Int(30))
        );
        // Bare placeholders number sequentially across the whole statement
        let predicate = predicate.unwrap();
        let SqlExpr::BinaryOp { right, .. } = predicate else {
            panic!("expected binary predicate");
        };
        assert_eq!(*right, SqlExpr::Param(1));
    }

    #[test]
    fn parse_numbered_placeholders() {
        let parser = BulkStatementParser::new();
        let stmt = parser.parse("DELETE FROM Foo WHERE x = ?2").unwrap();
        let SqlExpr::BinaryOp { right, .. } = stmt.predicate().unwrap() else {
            panic!("expected binary predicate");
        };
        assert_eq!(**right, SqlExpr::Param(1));
    }

    #[test]
    fn parse_insert_values() {
        let parser = BulkStatementParser::new();
        let stmt = parser
            .parse("INSERT INTO Person (id, name) VALUES (1, 'joe'), (2, 'jane')")
            .unwrap();
        let BulkStatement::Insert {
            properties, rows, ..
        } = stmt
        else {
            panic!("expected insert");
        };
        assert_eq!(properties, vec!["id", "name"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], SqlExpr::Literal(ScalarValue::Int(2)));
    }

    #[test]
    fn parse_qualified_column() {
        let parser = BulkStatementParser::new();
        let stmt = parser
            .parse("DELETE FROM Person WHERE person.name IS NOT NULL")
            .unwrap();
        let SqlExpr::IsNotNull(inner) = stmt.predicate().unwrap() else {
            panic!("expected is-not-null");
        };
        assert_eq!(
            **inner,
            SqlExpr::qualified_column("person", "name")
        );
    }

    #[test]
    fn reject_select() {
        let parser = BulkStatementParser::new();
        let err = parser.parse("SELECT * FROM person").unwrap_err();
        assert!(matches!(err, BulkError::SqlNotSupported { .. }));
    }

    #[test]
    fn reject_malformed_sql() {
        let parser = BulkStatementParser::new();
        // Incomplete where-clause expression
        let err = parser.parse("DELETE FROM person WHERE name =").unwrap_err();
        assert!(matches!(err, BulkError::SqlParse { .. }));
    }

    #[test]
    fn aliased_target_keeps_entity_name() {
        let parser = BulkStatementParser::new();
        let stmt = parser
            .parse("DELETE FROM Person AS p WHERE p.name = 'joe'")
            .unwrap();
        assert_eq!(stmt.entity(), "Person");

        let stmt = parser
            .parse("UPDATE Person p SET p.name = 'x' WHERE p.name = 'y'")
            .unwrap();
        assert_eq!(stmt.entity(), "Person");
    }

    #[test]
    fn reject_insert_select() {
        let parser = BulkStatementParser::new();
        let err = parser
            .parse("INSERT INTO a (x) SELECT x FROM b")
            .unwrap_err();
        assert!(matches!(err, BulkError::SqlNotSupported { .. }));
    }
}
