//! Temporary id table coordination.
//!
//! Multi-table strategies snapshot the identifiers matching a bulk
//! statement's where-clause into an ephemeral table shaped like the entity
//! identifier, then scope every per-table statement to that snapshot. The
//! where-clause is evaluated exactly once, at population time; re-evaluating
//! it per table would let earlier deletes change which rows later statements
//! see.

use tracing::{debug, warn};

use crate::dialect::DialectCapabilities;
use crate::error::{BulkError, BulkResult};
use crate::metadata::EntityTopology;
use crate::session::{SqlSession, StatementOptions};
use crate::sql::ast::{ParamSpec, bind_params};
use crate::sql::generator::{self, TranslatedFragment};

/// Coordinates the create/populate/cleanup lifecycle of one temp id table.
///
/// DDL failures are recovered locally: create and cleanup outcomes are logged
/// and discarded, and any real problem surfaces on the dependent statements,
/// which do propagate. Cleanup is idempotent toward the caller.
#[derive(Debug, Clone)]
pub struct TempIdTableCoordinator {
    table: String,
    create_sql: String,
    drop_sql: String,
    delete_all_sql: String,
    populate_sql: String,
    populate_params: Vec<ParamSpec>,
    drop_after_use: bool,
    ddl_requires_isolation: bool,
}

impl TempIdTableCoordinator {
    /// Build the coordinator for one bulk statement. Fails when the dialect
    /// has no temporary tables at all — the multi-table strategies cannot run
    /// without them.
    pub fn new(
        topology: &EntityTopology,
        dialect: &DialectCapabilities,
        predicate: Option<&TranslatedFragment>,
    ) -> BulkResult<Self> {
        if !dialect.supports_temporary_tables {
            return Err(BulkError::SqlNotSupported {
                feature: format!(
                    "multi-table bulk statement on entity '{}'",
                    topology.entity()
                ),
                hint: format!(
                    "dialect '{}' does not support temporary tables",
                    dialect.name
                ),
            });
        }
        let table = dialect.temp_table_name(&topology.root_table().name);
        Ok(Self {
            create_sql: dialect.create_temp_table_sql(&table, &topology.id_ddl_columns()),
            drop_sql: dialect.drop_temp_table_sql(&table),
            delete_all_sql: generator::delete_sql(&table, None),
            populate_sql: generator::populate_temp_table_sql(topology, dialect, predicate),
            populate_params: predicate.map(|p| p.params.clone()).unwrap_or_default(),
            drop_after_use: dialect.drop_temporary_table_after_use,
            ddl_requires_isolation: dialect.ddl_requires_isolation,
            table,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn populate_sql(&self) -> &str {
        &self.populate_sql
    }

    /// Bind sites consumed by [`populate`](Self::populate), in placeholder
    /// order — callers re-bind these for any statement reusing the predicate.
    pub fn populate_params(&self) -> &[ParamSpec] {
        &self.populate_params
    }

    fn run_ddl(&self, session: &mut dyn SqlSession, sql: &str) -> Result<(), crate::error::DriverError> {
        // Dialects that implicitly commit DDL would abort the enclosing
        // transaction, so DDL moves to an isolated unit of work when one is
        // in progress.
        if self.ddl_requires_isolation && session.is_transaction_in_progress() {
            session.execute_isolated_ddl(sql)
        } else {
            session.execute_ddl(sql)
        }
    }

    /// Issue the table-creation DDL. Failure is logged at debug level and
    /// swallowed; execution proceeds optimistically and a missing table
    /// surfaces on the population insert.
    pub fn create_if_necessary(&self, session: &mut dyn SqlSession) {
        if let Err(err) = self.run_ddl(session, &self.create_sql) {
            debug!(
                table = %self.table,
                error = %err,
                "temp id table creation failed; continuing"
            );
        }
    }

    /// Fill the temp table with the identifiers matching the where-clause.
    /// Returns the matched row count — the logical affected-row count of the
    /// whole multi-table statement.
    pub fn populate(
        &self,
        session: &mut dyn SqlSession,
        params: &[crate::sql::ast::ScalarValue],
        options: &StatementOptions,
    ) -> BulkResult<usize> {
        let binds = bind_params(&self.populate_params, params)?;
        debug!(sql = %self.populate_sql, "populating temp id table");
        session
            .execute_update(&self.populate_sql, &binds, options)
            .map_err(|e| BulkError::from_driver(e, &self.populate_sql))
    }

    /// Release the snapshot: drop the table when the dialect allows it,
    /// otherwise delete its rows so no identifiers leak into a later bulk
    /// statement on the same session. Never raises; a second call is a no-op
    /// or a silently ignored failure.
    pub fn cleanup(&self, session: &mut dyn SqlSession) {
        if self.drop_after_use {
            if let Err(err) = self.run_ddl(session, &self.drop_sql) {
                debug!(
                    table = %self.table,
                    error = %err,
                    "temp id table drop failed; ignoring"
                );
            }
        } else if let Err(err) =
            session.execute_update(&self.delete_all_sql, &[], &StatementOptions::new())
        {
            warn!(
                table = %self.table,
                error = %err,
                "temp id table row cleanup failed; residual rows possible"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DriverError, SqlErrorCategory};
    use crate::metadata::{IdColumn, TableMapping};
    use crate::session::RecordingSession;

    fn topology() -> EntityTopology {
        EntityTopology::new(
            "Person",
            vec![IdColumn::bigint("id")],
            vec![
                TableMapping::new("person", &["id"]).with_property("name", "name"),
                TableMapping::new("employee", &["person_id"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn create_populate_cleanup_round_trip() {
        let topo = topology();
        let dialect = DialectCapabilities::generic();
        let coordinator = TempIdTableCoordinator::new(&topo, &dialect, None).unwrap();
        let mut session = RecordingSession::new().with_match_count(5);

        coordinator.create_if_necessary(&mut session);
        assert_eq!(session.ddl.len(), 1);
        assert!(session.ddl[0].starts_with("create temporary table ht_person"));

        let rows = coordinator
            .populate(&mut session, &[], &StatementOptions::new())
            .unwrap();
        assert_eq!(rows, 5);
        assert_eq!(session.temp_row_count("ht_person"), 5);

        coordinator.cleanup(&mut session);
        assert_eq!(session.temp_row_count("ht_person"), 0);
    }

    #[test]
    fn create_failure_is_swallowed() {
        let topo = topology();
        let dialect = DialectCapabilities::generic();
        let coordinator = TempIdTableCoordinator::new(&topo, &dialect, None).unwrap();
        let mut session = RecordingSession::new().fail_matching(
            "create temporary table",
            DriverError::new("already exists", SqlErrorCategory::Other),
        );
        // No panic, no error surfaced
        coordinator.create_if_necessary(&mut session);
        assert!(session.ddl.is_empty());
    }

    #[test]
    fn row_delete_fallback_when_drop_unsupported() {
        let topo = topology();
        let dialect = DialectCapabilities::h2();
        let coordinator = TempIdTableCoordinator::new(&topo, &dialect, None).unwrap();
        let mut session = RecordingSession::new().with_match_count(3);

        coordinator.create_if_necessary(&mut session);
        coordinator
            .populate(&mut session, &[], &StatementOptions::new())
            .unwrap();
        coordinator.cleanup(&mut session);

        // Table kept (no drop), rows deleted
        assert!(session.executed_sql().contains(&"delete from ht_person"));
        assert_eq!(session.temp_row_count("ht_person"), 0);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let topo = topology();
        let dialect = DialectCapabilities::h2();
        let coordinator = TempIdTableCoordinator::new(&topo, &dialect, None).unwrap();
        let mut session = RecordingSession::new();
        coordinator.cleanup(&mut session);
        coordinator.cleanup(&mut session);
        assert_eq!(
            session
                .executed_sql()
                .iter()
                .filter(|s| **s == "delete from ht_person")
                .count(),
            2
        );
    }

    #[test]
    fn isolation_flag_routes_ddl_when_transactional() {
        let topo = topology();
        let dialect = DialectCapabilities::h2();
        let coordinator = TempIdTableCoordinator::new(&topo, &dialect, None).unwrap();
        let mut session = RecordingSession::transactional();
        coordinator.create_if_necessary(&mut session);
        assert!(session.ddl.is_empty());
        assert_eq!(session.isolated_ddl.len(), 1);
    }

    #[test]
    fn unsupported_dialect_is_rejected() {
        let topo = topology();
        let dialect = DialectCapabilities {
            supports_temporary_tables: false,
            ..DialectCapabilities::generic()
        };
        let err = TempIdTableCoordinator::new(&topo, &dialect, None).unwrap_err();
        assert!(matches!(err, BulkError::SqlNotSupported { .. }));
    }
}
