//! Multi-table executor.
//!
//! One logical bulk statement against a joined hierarchy becomes several
//! physical statements sharing a single identifier snapshot: the temp id
//! table is populated once from the where-clause, then every per-table
//! statement scopes itself with `(key) IN (SELECT ... FROM temp)`.
//! Statement order is a correctness requirement under enforced foreign keys:
//! children before parents for delete, parents before children for insert.
//!
//! On any physical-statement failure the error propagates immediately without
//! attempting the remaining statements, but temp-table cleanup always runs.

use tracing::{debug, warn};

use crate::cache::{RegionInvalidation, schedule_invalidation};
use crate::dialect::DialectCapabilities;
use crate::error::{BulkError, BulkResult};
use crate::metadata::EntityTopology;
use crate::session::{SqlSession, StatementOptions};
use crate::sql::ast::{ParamSpec, ScalarValue, SqlExpr};
use crate::sql::generator::{self, AssignmentFragment, TranslatedFragment};

use super::{run_update, value_spec};

/// One physical statement with its per-execution bind sites.
#[derive(Debug, Clone)]
pub struct PhysicalStatement {
    sql: String,
    param_rows: Vec<Vec<ParamSpec>>,
}

impl PhysicalStatement {
    fn once(sql: String, params: Vec<ParamSpec>) -> Self {
        Self {
            sql,
            param_rows: vec![params],
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_rows(&self) -> &[Vec<ParamSpec>] {
        &self.param_rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MultiTableKind {
    Insert { row_count: usize },
    Mutation,
}

/// Executor issuing one statement per physical table of the hierarchy.
#[derive(Debug, Clone)]
pub struct MultiTableExecutor {
    kind: MultiTableKind,
    temp: Option<super::temp_table::TempIdTableCoordinator>,
    statements: Vec<PhysicalStatement>,
    skipped_collection_roles: Vec<String>,
    invalidation: RegionInvalidation,
}

impl MultiTableExecutor {
    /// Delete spanning the hierarchy: join-table cleanup first, then entity
    /// tables children-first, every statement scoped by the temp snapshot.
    pub(crate) fn delete(
        topology: &EntityTopology,
        predicate: Option<&TranslatedFragment>,
        dialect: &DialectCapabilities,
    ) -> BulkResult<Self> {
        let temp = super::temp_table::TempIdTableCoordinator::new(topology, dialect, predicate)?;
        let mut statements = Vec::new();
        let mut skipped_collection_roles = Vec::new();
        for collection in topology.collection_tables() {
            if topology.has_composite_id() && !dialect.supports_tuple_in_subquery {
                // No safe single-column substitute exists for a composite key
                // tuple; the join rows are left behind (known limitation).
                skipped_collection_roles.push(collection.role.clone());
                continue;
            }
            let where_sql =
                generator::in_temp_table_fragment(&collection.key_columns, topology, dialect);
            statements.push(PhysicalStatement::once(
                generator::delete_sql(&collection.table, Some(&where_sql)),
                Vec::new(),
            ));
        }
        for table in topology.tables_child_first() {
            let where_sql =
                generator::in_temp_table_fragment(&table.key_columns, topology, dialect);
            statements.push(PhysicalStatement::once(
                generator::delete_sql(&table.name, Some(&where_sql)),
                Vec::new(),
            ));
        }
        Ok(Self {
            kind: MultiTableKind::Mutation,
            temp: Some(temp),
            statements,
            skipped_collection_roles,
            invalidation: RegionInvalidation::for_entity(topology),
        })
    }

    /// Update whose SET clause spans tables: each owning table receives its
    /// own `UPDATE ... WHERE (key) IN (temp subselect)`.
    pub(crate) fn update(
        topology: &EntityTopology,
        fragments: &[AssignmentFragment],
        predicate: Option<&TranslatedFragment>,
        dialect: &DialectCapabilities,
    ) -> BulkResult<Self> {
        let temp = super::temp_table::TempIdTableCoordinator::new(topology, dialect, predicate)?;
        let mut statements = Vec::new();
        for fragment in fragments {
            let table = topology.table_named(&fragment.table).ok_or_else(|| {
                BulkError::AssertionFailure(format!(
                    "assigned table '{}' not in the closure of entity '{}'",
                    fragment.table,
                    topology.entity()
                ))
            })?;
            let where_sql =
                generator::in_temp_table_fragment(&table.key_columns, topology, dialect);
            statements.push(PhysicalStatement::once(
                generator::update_sql(&fragment.table, &fragment.set_sql, Some(&where_sql)),
                fragment.params.clone(),
            ));
        }
        Ok(Self {
            kind: MultiTableKind::Mutation,
            temp: Some(temp),
            statements,
            skipped_collection_roles: Vec::new(),
            invalidation: RegionInvalidation::for_entity(topology),
        })
    }

    /// Insert into a joined hierarchy: the root table row first, then each
    /// dependent table's row, per inserted tuple. Requires explicit
    /// identifier values so every table's key columns can be bound.
    pub(crate) fn insert(
        topology: &EntityTopology,
        properties: &[String],
        rows: &[Vec<SqlExpr>],
    ) -> BulkResult<Self> {
        for row in rows {
            if row.len() != properties.len() {
                return Err(BulkError::SqlNotSupported {
                    feature: format!(
                        "insert row with {} value(s) for {} column(s)",
                        row.len(),
                        properties.len()
                    ),
                    hint: "every row must bind every listed column".to_string(),
                });
            }
        }

        // Position of each id column among the inserted properties
        let id_names = topology.id_column_names();
        let mut id_positions = Vec::with_capacity(id_names.len());
        for id in &id_names {
            let position = properties.iter().position(|p| {
                topology
                    .resolve_column(None, p)
                    .is_some_and(|(t, c)| t.name == topology.root_table().name && c == *id)
            });
            match position {
                Some(p) => id_positions.push(p),
                None => {
                    return Err(BulkError::SqlNotSupported {
                        feature: format!(
                            "multi-table insert into entity '{}' without identifier value for '{}'",
                            topology.entity(),
                            id
                        ),
                        hint: "list the identifier property in the insert column list".to_string(),
                    });
                }
            }
        }

        // Group the non-id properties by owning table, keeping topology order
        let mut statements = Vec::new();
        for table in topology.tables_parent_first() {
            let mut columns: Vec<String> =
                table.key_columns.iter().map(|k| k.to_string()).collect();
            let mut positions: Vec<usize> = id_positions.clone();
            for (i, property) in properties.iter().enumerate() {
                if id_positions.contains(&i) {
                    continue;
                }
                if let Some(column) = table.column_for(property) {
                    columns.push(column.to_string());
                    positions.push(i);
                }
            }
            // Secondary tables with no inserted state are skipped entirely;
            // mandatory tables always receive their key row.
            if table.optional && positions.len() == id_positions.len() {
                continue;
            }
            let mut param_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let mut specs = Vec::with_capacity(positions.len());
                for &position in &positions {
                    specs.push(value_spec(&row[position])?);
                }
                param_rows.push(specs);
            }
            statements.push(PhysicalStatement {
                sql: generator::insert_sql(&table.name, &columns),
                param_rows,
            });
        }
        Ok(Self {
            kind: MultiTableKind::Insert {
                row_count: rows.len(),
            },
            temp: None,
            statements,
            skipped_collection_roles: Vec::new(),
            invalidation: RegionInvalidation::for_entity(topology),
        })
    }

    /// The per-table mutation statements, in execution order. The temp-table
    /// population statement is available through [`temp_coordinator`](Self::temp_coordinator).
    pub fn statements(&self) -> &[PhysicalStatement] {
        &self.statements
    }

    /// Temp id table coordinator, absent for the insert strategy.
    pub fn temp_coordinator(&self) -> Option<&super::temp_table::TempIdTableCoordinator> {
        self.temp.as_ref()
    }

    pub(crate) fn sql_statements(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.sql.as_str()).collect()
    }

    pub(crate) fn execute(
        &self,
        params: &[ScalarValue],
        session: &mut dyn SqlSession,
        options: &StatementOptions,
    ) -> BulkResult<usize> {
        for role in &self.skipped_collection_roles {
            warn!(
                role = %role,
                "skipping join-table cleanup: composite identifier with a dialect \
                 lacking tuple subqueries; orphaned join rows are possible"
            );
        }
        match self.kind {
            MultiTableKind::Insert { row_count } => {
                for row in 0..row_count {
                    for statement in &self.statements {
                        run_update(
                            session,
                            &statement.sql,
                            &statement.param_rows[row],
                            params,
                            options,
                        )?;
                    }
                }
                schedule_invalidation(session, self.invalidation.clone());
                Ok(row_count)
            }
            MultiTableKind::Mutation => {
                let temp = self.temp.as_ref().ok_or_else(|| {
                    BulkError::AssertionFailure(
                        "multi-table mutation without a temp table coordinator".to_string(),
                    )
                })?;
                temp.create_if_necessary(session);
                let result = self.run_mutation(temp, params, session, options);
                // Cleanup runs whether or not a statement failed
                temp.cleanup(session);
                result
            }
        }
    }

    fn run_mutation(
        &self,
        temp: &super::temp_table::TempIdTableCoordinator,
        params: &[ScalarValue],
        session: &mut dyn SqlSession,
        options: &StatementOptions,
    ) -> BulkResult<usize> {
        let affected = temp.populate(session, params, options)?;
        debug!(
            table = %temp.table(),
            rows = affected,
            "temp id table populated; issuing per-table statements"
        );
        for statement in &self.statements {
            run_update(session, &statement.sql, &statement.param_rows[0], params, options)?;
        }
        schedule_invalidation(session, self.invalidation.clone());
        Ok(affected)
    }
}
