//! Bulk-statement executors.
//!
//! Strategy selection is an explicit classifier function, not inheritance:
//! [`plan_executor`] inspects how many physical tables the target entity
//! spans and which tables the where-clause and SET clause touch, then picks
//! one [`StatementExecutor`] variant. The chosen executor is run once per
//! logical statement; some strategies internally issue several physical
//! statements within the caller's transaction boundary.

pub mod id_subselect;
pub mod multi_table;
pub mod simple;
pub mod temp_table;

pub use id_subselect::IdSubselectExecutor;
pub use multi_table::{MultiTableExecutor, PhysicalStatement};
pub use simple::SimpleExecutor;
pub use temp_table::TempIdTableCoordinator;

use tracing::debug;

use crate::dialect::DialectCapabilities;
use crate::error::{BulkError, BulkResult};
use crate::metadata::EntityTopology;
use crate::session::{SqlSession, StatementOptions};
use crate::sql::ast::{BulkStatement, ParamSpec, ScalarValue, SqlExpr, bind_params};
use crate::sql::generator::{ColumnStyle, translate_assignments, translate_predicate};

/// One bulk-statement execution strategy.
#[derive(Debug, Clone)]
pub enum StatementExecutor {
    /// Exactly one physical statement against one table
    Simple(SimpleExecutor),
    /// One statement scoped by an id-subselect over the joined hierarchy
    IdSubselect(IdSubselectExecutor),
    /// Temp-table snapshot plus one statement per physical table
    MultiTable(MultiTableExecutor),
}

impl StatementExecutor {
    /// The ordered physical mutation statements this strategy will issue,
    /// for introspection and logging.
    pub fn sql_statements(&self) -> Vec<&str> {
        match self {
            Self::Simple(e) => vec![e.sql()],
            Self::IdSubselect(e) => vec![e.sql()],
            Self::MultiTable(e) => e.sql_statements(),
        }
    }

    /// Run the statement to completion on the calling thread, returning the
    /// logical affected-row count.
    pub fn execute(
        &self,
        params: &[ScalarValue],
        session: &mut dyn SqlSession,
        options: &StatementOptions,
    ) -> BulkResult<usize> {
        match self {
            Self::Simple(e) => e.execute(params, session, options),
            Self::IdSubselect(e) => e.execute(params, session, options),
            Self::MultiTable(e) => e.execute(params, session, options),
        }
    }
}

/// Select the execution strategy for a compiled bulk statement.
///
/// A pure function of the entity's table count and the tables referenced by
/// the statement's where-clause and SET clause.
pub fn plan_executor(
    statement: &BulkStatement,
    topology: &EntityTopology,
    dialect: &DialectCapabilities,
) -> BulkResult<StatementExecutor> {
    if statement.entity() != topology.entity() {
        return Err(BulkError::Mapping(format!(
            "statement targets entity '{}' but topology describes '{}'",
            statement.entity(),
            topology.entity()
        )));
    }
    let executor = match statement {
        BulkStatement::Insert {
            properties, rows, ..
        } => {
            if topology.is_multi_table() {
                StatementExecutor::MultiTable(MultiTableExecutor::insert(
                    topology, properties, rows,
                )?)
            } else {
                StatementExecutor::Simple(SimpleExecutor::insert(topology, properties, rows)?)
            }
        }
        BulkStatement::Delete { predicate, .. } => {
            if topology.is_multi_table() {
                // Deleting from a joined hierarchy always touches every table
                let fragment = predicate
                    .as_ref()
                    .map(|p| translate_predicate(p, topology, ColumnStyle::Qualified))
                    .transpose()?;
                StatementExecutor::MultiTable(MultiTableExecutor::delete(
                    topology,
                    fragment.as_ref(),
                    dialect,
                )?)
            } else {
                StatementExecutor::Simple(SimpleExecutor::delete(topology, predicate.as_ref())?)
            }
        }
        BulkStatement::Update {
            assignments,
            predicate,
            ..
        } => {
            if assignments.is_empty() {
                return Err(BulkError::SqlNotSupported {
                    feature: "bulk update without assignments".to_string(),
                    hint: "provide at least one SET assignment".to_string(),
                });
            }
            let fragments = translate_assignments(assignments, topology)?;
            if !topology.is_multi_table() {
                StatementExecutor::Simple(SimpleExecutor::update(
                    topology,
                    &fragments[0],
                    predicate.as_ref(),
                )?)
            } else {
                let qualified = predicate
                    .as_ref()
                    .map(|p| translate_predicate(p, topology, ColumnStyle::Qualified))
                    .transpose()?;
                if let [fragment] = fragments.as_slice() {
                    let confined = qualified
                        .as_ref()
                        .map(|f| f.referenced_tables.iter().all(|t| *t == fragment.table))
                        .unwrap_or(true);
                    if confined {
                        StatementExecutor::Simple(SimpleExecutor::update(
                            topology,
                            fragment,
                            predicate.as_ref(),
                        )?)
                    } else {
                        StatementExecutor::IdSubselect(IdSubselectExecutor::update(
                            topology,
                            &fragments,
                            qualified.as_ref(),
                            dialect,
                        )?)
                    }
                } else {
                    StatementExecutor::MultiTable(MultiTableExecutor::update(
                        topology,
                        &fragments,
                        qualified.as_ref(),
                        dialect,
                    )?)
                }
            }
        }
    };
    Ok(executor)
}

/// Resolve the specs against the caller's parameters and run one physical
/// statement, wrapping driver failures with the offending SQL.
pub(crate) fn run_update(
    session: &mut dyn SqlSession,
    sql: &str,
    specs: &[ParamSpec],
    params: &[ScalarValue],
    options: &StatementOptions,
) -> BulkResult<usize> {
    let binds = bind_params(specs, params)?;
    debug!(sql = %sql, binds = binds.len(), "executing physical statement");
    session
        .execute_update(sql, &binds, options)
        .map_err(|e| BulkError::from_driver(e, sql))
}

/// Insert VALUES entries must be bindable as-is.
pub(crate) fn value_spec(expr: &SqlExpr) -> BulkResult<ParamSpec> {
    match expr {
        SqlExpr::Literal(value) => Ok(ParamSpec::Literal(value.clone())),
        SqlExpr::Param(index) => Ok(ParamSpec::Positional(*index)),
        other => Err(BulkError::SqlNotSupported {
            feature: format!("expression in INSERT VALUES: {:?}", other),
            hint: "use literal values or positional parameters".to_string(),
        }),
    }
}
