//! Compiled bulk-statement tree.
//!
//! A [`BulkStatement`] is the already-compiled form of a logical bulk
//! INSERT/UPDATE/DELETE: the target entity, the SET assignments, and the
//! where-clause as an expression tree a SQL generator can visit. Statements
//! are built once per execution and consumed immediately.

/// Literal value carried by the statement tree and bound into physical
/// statements at execution time.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Binary operators understood by the predicate translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Logical
    And,
    Or,
}

impl BinaryOperator {
    /// SQL rendering of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Expression node of a compiled where-clause or assignment value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    /// Property or column reference, optionally qualified (`alias.name`)
    Column {
        qualifier: Option<String>,
        name: String,
    },
    /// Literal value — rendered as a `?` placeholder and bound positionally
    Literal(ScalarValue),
    /// Positional query parameter (zero-based)
    Param(usize),
    /// Binary operation
    BinaryOp {
        left: Box<SqlExpr>,
        op: BinaryOperator,
        right: Box<SqlExpr>,
    },
    /// IS NULL
    IsNull(Box<SqlExpr>),
    /// IS NOT NULL
    IsNotNull(Box<SqlExpr>),
    /// IN (...)
    InList {
        expr: Box<SqlExpr>,
        list: Vec<SqlExpr>,
        negated: bool,
    },
}

impl SqlExpr {
    /// Unqualified column reference.
    pub fn column(name: impl Into<String>) -> Self {
        SqlExpr::Column {
            qualifier: None,
            name: name.into(),
        }
    }

    /// Qualified column reference (`alias.name`).
    pub fn qualified_column(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        SqlExpr::Column {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }

    /// `left op right` convenience constructor.
    pub fn binary(left: SqlExpr, op: BinaryOperator, right: SqlExpr) -> Self {
        SqlExpr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// `column = literal` convenience constructor.
    pub fn eq_value(column: impl Into<String>, value: ScalarValue) -> Self {
        Self::binary(
            Self::column(column),
            BinaryOperator::Eq,
            SqlExpr::Literal(value),
        )
    }
}

/// One `SET` assignment of a bulk update.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Target property (resolved to a physical column by the topology)
    pub property: String,
    /// Assigned value expression
    pub value: SqlExpr,
}

impl Assignment {
    pub fn new(property: impl Into<String>, value: SqlExpr) -> Self {
        Self {
            property: property.into(),
            value,
        }
    }
}

/// Statement kind of a bulk statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
}

/// Compiled bulk statement descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkStatement {
    /// `insert into Entity (props) values (...), (...)`
    Insert {
        entity: String,
        properties: Vec<String>,
        rows: Vec<Vec<SqlExpr>>,
    },
    /// `update Entity set prop = expr, ... where ...`
    Update {
        entity: String,
        assignments: Vec<Assignment>,
        predicate: Option<SqlExpr>,
    },
    /// `delete from Entity where ...`
    Delete {
        entity: String,
        predicate: Option<SqlExpr>,
    },
}

impl BulkStatement {
    /// Target entity name.
    pub fn entity(&self) -> &str {
        match self {
            Self::Insert { entity, .. } | Self::Update { entity, .. } | Self::Delete { entity, .. } => {
                entity
            }
        }
    }

    /// Statement kind.
    pub fn kind(&self) -> StatementKind {
        match self {
            Self::Insert { .. } => StatementKind::Insert,
            Self::Update { .. } => StatementKind::Update,
            Self::Delete { .. } => StatementKind::Delete,
        }
    }

    /// Where-clause tree, if any.
    pub fn predicate(&self) -> Option<&SqlExpr> {
        match self {
            Self::Update { predicate, .. } | Self::Delete { predicate, .. } => predicate.as_ref(),
            Self::Insert { .. } => None,
        }
    }
}

/// Ordered bind-site descriptor extracted from a translated fragment.
///
/// The order of specs exactly matches the order of `?` placeholders in the
/// generated SQL, across every physical statement that reuses the fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSpec {
    /// Bind the caller-supplied positional parameter at this index
    Positional(usize),
    /// Bind this literal (or resolved discriminator) value
    Literal(ScalarValue),
}

impl ParamSpec {
    /// Resolve the spec against the caller's positional parameters.
    pub fn resolve(&self, params: &[ScalarValue]) -> crate::error::BulkResult<ScalarValue> {
        match self {
            ParamSpec::Literal(value) => Ok(value.clone()),
            ParamSpec::Positional(index) => params.get(*index).cloned().ok_or(
                crate::error::BulkError::ParameterCount {
                    index: *index,
                    available: params.len(),
                },
            ),
        }
    }
}

/// Resolve an ordered spec list into the concrete bind values for one
/// physical statement.
pub fn bind_params(
    specs: &[ParamSpec],
    params: &[ScalarValue],
) -> crate::error::BulkResult<Vec<ScalarValue>> {
    specs.iter().map(|spec| spec.resolve(params)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_accessors() {
        let stmt = BulkStatement::Delete {
            entity: "Person".to_string(),
            predicate: Some(SqlExpr::eq_value("name", ScalarValue::Text("x".into()))),
        };
        assert_eq!(stmt.entity(), "Person");
        assert_eq!(stmt.kind(), StatementKind::Delete);
        assert!(stmt.predicate().is_some());
    }

    #[test]
    fn bind_params_in_declared_order() {
        let specs = vec![
            ParamSpec::Literal(ScalarValue::Int(1)),
            ParamSpec::Positional(1),
            ParamSpec::Positional(0),
        ];
        let params = vec![ScalarValue::Text("a".into()), ScalarValue::Int(42)];
        let bound = bind_params(&specs, &params).unwrap();
        assert_eq!(
            bound,
            vec![
                ScalarValue::Int(1),
                ScalarValue::Int(42),
                ScalarValue::Text("a".into()),
            ]
        );
    }

    #[test]
    fn bind_params_out_of_range() {
        let specs = vec![ParamSpec::Positional(3)];
        let err = bind_params(&specs, &[]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::BulkError::ParameterCount {
                index: 3,
                available: 0
            }
        ));
    }

    #[test]
    fn operator_sql_rendering() {
        assert_eq!(BinaryOperator::NotEq.as_sql(), "<>");
        assert_eq!(BinaryOperator::And.as_sql(), "and");
    }
}
