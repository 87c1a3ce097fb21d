//! Single-table executor.
//!
//! Used when the target entity maps to exactly one physical table, or when a
//! multi-table entity's mutation and where-clause are both confined to the
//! one table being mutated. Generates exactly one SQL statement.

use tracing::debug;

use crate::cache::{RegionInvalidation, schedule_invalidation};
use crate::error::BulkResult;
use crate::metadata::EntityTopology;
use crate::session::{SqlSession, StatementOptions};
use crate::sql::ast::{ParamSpec, ScalarValue, SqlExpr};
use crate::sql::generator::{self, AssignmentFragment, ColumnStyle, translate_predicate};

use super::{run_update, value_spec};

/// One-statement executor for single-table inserts, updates, and deletes.
#[derive(Debug, Clone)]
pub struct SimpleExecutor {
    sql: String,
    param_rows: Vec<Vec<ParamSpec>>,
    invalidation: RegionInvalidation,
}

/// Combine a translated predicate with the entity's discriminator
/// restriction, when the mutated table carries one.
fn restricted_where(
    topology: &EntityTopology,
    target_is_root: bool,
    predicate: Option<&SqlExpr>,
) -> BulkResult<(Option<String>, Vec<ParamSpec>)> {
    let fragment = predicate
        .map(|p| translate_predicate(p, topology, ColumnStyle::Bare))
        .transpose()?;
    let discriminator = topology.discriminator().filter(|_| target_is_root);
    let mut params = Vec::new();
    let mut parts = Vec::new();
    if let Some(fragment) = fragment {
        parts.push(fragment.sql);
        params.extend(fragment.params);
    }
    if let Some(disc) = discriminator {
        parts.push(format!("{} = ?", disc.column));
        params.push(ParamSpec::Literal(disc.value.clone()));
    }
    if parts.is_empty() {
        Ok((None, params))
    } else {
        Ok((Some(parts.join(" and ")), params))
    }
}

impl SimpleExecutor {
    /// Delete against the root table of a single-table entity.
    pub(crate) fn delete(
        topology: &EntityTopology,
        predicate: Option<&SqlExpr>,
    ) -> BulkResult<Self> {
        let (where_sql, params) = restricted_where(topology, true, predicate)?;
        Ok(Self {
            sql: generator::delete_sql(&topology.root_table().name, where_sql.as_deref()),
            param_rows: vec![params],
            invalidation: RegionInvalidation::for_entity(topology),
        })
    }

    /// Update confined to one physical table: SET params first, then the
    /// where-clause params, matching placeholder order.
    pub(crate) fn update(
        topology: &EntityTopology,
        fragment: &AssignmentFragment,
        predicate: Option<&SqlExpr>,
    ) -> BulkResult<Self> {
        let target_is_root = fragment.table == topology.root_table().name;
        let (where_sql, where_params) = restricted_where(topology, target_is_root, predicate)?;
        let mut params = fragment.params.clone();
        params.extend(where_params);
        Ok(Self {
            sql: generator::update_sql(&fragment.table, &fragment.set_sql, where_sql.as_deref()),
            param_rows: vec![params],
            invalidation: RegionInvalidation::for_entity(topology),
        })
    }

    /// Insert into the single table of the entity, one execution per row.
    /// A discriminator column, when mapped, is injected with its resolved
    /// value on every row.
    pub(crate) fn insert(
        topology: &EntityTopology,
        properties: &[String],
        rows: &[Vec<SqlExpr>],
    ) -> BulkResult<Self> {
        let table = topology.root_table();
        let mut columns = Vec::with_capacity(properties.len() + 1);
        for property in properties {
            let (_, column) = topology
                .resolve_column(None, property)
                .ok_or_else(|| crate::error::BulkError::SqlNotSupported {
                    feature: format!(
                        "insert into unmapped property '{}' of entity '{}'",
                        property,
                        topology.entity()
                    ),
                    hint: "insert into mapped properties only".to_string(),
                })?;
            columns.push(column);
        }
        let discriminator = topology.discriminator();
        if let Some(disc) = discriminator {
            columns.push(disc.column.clone());
        }
        let mut param_rows = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != properties.len() {
                return Err(crate::error::BulkError::SqlNotSupported {
                    feature: format!(
                        "insert row with {} value(s) for {} column(s)",
                        row.len(),
                        properties.len()
                    ),
                    hint: "every row must bind every listed column".to_string(),
                });
            }
            let mut specs = row.iter().map(value_spec).collect::<BulkResult<Vec<_>>>()?;
            if let Some(disc) = discriminator {
                specs.push(ParamSpec::Literal(disc.value.clone()));
            }
            param_rows.push(specs);
        }
        Ok(Self {
            sql: generator::insert_sql(&table.name, &columns),
            param_rows,
            invalidation: RegionInvalidation::for_entity(topology),
        })
    }

    /// The one generated physical statement.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind sites per execution of the statement (one row for update/delete).
    pub fn param_rows(&self) -> &[Vec<ParamSpec>] {
        &self.param_rows
    }

    pub(crate) fn execute(
        &self,
        params: &[ScalarValue],
        session: &mut dyn SqlSession,
        options: &StatementOptions,
    ) -> BulkResult<usize> {
        schedule_invalidation(session, self.invalidation.clone());
        debug!(sql = %self.sql, "executing single-table bulk statement");
        let mut affected = 0;
        for specs in &self.param_rows {
            affected += run_update(session, &self.sql, specs, params, options)?;
        }
        Ok(affected)
    }
}
