//! Id-subselect executor.
//!
//! Handles the shape where a multi-table entity's update assigns columns of
//! exactly one physical table while the where-clause reads others: the final
//! statement targets only the owning table, scoped by
//! `(key-columns) IN (<select of identifiers over the joined hierarchy>)`.
//! Whether that subselect needs the per-dialect self-reference rewrite is
//! decided at construction.

use tracing::debug;

use crate::cache::{RegionInvalidation, schedule_invalidation};
use crate::dialect::DialectCapabilities;
use crate::error::{BulkError, BulkResult};
use crate::metadata::EntityTopology;
use crate::session::{SqlSession, StatementOptions};
use crate::sql::ast::{ParamSpec, ScalarValue};
use crate::sql::generator::{self, AssignmentFragment, TranslatedFragment};

use super::run_update;

/// Single-target-table update scoped by an id-subselect.
#[derive(Debug, Clone)]
pub struct IdSubselectExecutor {
    sql: String,
    params: Vec<ParamSpec>,
    invalidation: RegionInvalidation,
}

impl IdSubselectExecutor {
    /// Precondition: the SET clause resolves to exactly one physical table.
    /// An assignment spread across tables here is a mapping inconsistency,
    /// not a recoverable runtime condition.
    pub(crate) fn update(
        topology: &EntityTopology,
        fragments: &[AssignmentFragment],
        predicate: Option<&TranslatedFragment>,
        dialect: &DialectCapabilities,
    ) -> BulkResult<Self> {
        let [fragment] = fragments else {
            return Err(BulkError::AssertionFailure(format!(
                "id-subselect update of entity '{}' assigns columns in {} tables; expected exactly one",
                topology.entity(),
                fragments.len()
            )));
        };
        let table = topology
            .table_named(&fragment.table)
            .ok_or_else(|| {
                BulkError::AssertionFailure(format!(
                    "assigned table '{}' not in the closure of entity '{}'",
                    fragment.table,
                    topology.entity()
                ))
            })?;
        let where_sql = generator::in_id_select_fragment(
            &table.key_columns,
            &table.name,
            topology,
            dialect,
            predicate,
        );
        // SET bind sites precede the subselect's, matching placeholder order
        let mut params = fragment.params.clone();
        if let Some(predicate) = predicate {
            params.extend(predicate.params.iter().cloned());
        }
        Ok(Self {
            sql: generator::update_sql(&fragment.table, &fragment.set_sql, Some(&where_sql)),
            params,
            invalidation: RegionInvalidation::for_entity(topology),
        })
    }

    /// The one generated physical statement.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind sites in placeholder order.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub(crate) fn execute(
        &self,
        params: &[ScalarValue],
        session: &mut dyn SqlSession,
        options: &StatementOptions,
    ) -> BulkResult<usize> {
        schedule_invalidation(session, self.invalidation.clone());
        debug!(sql = %self.sql, "executing id-subselect bulk update");
        run_update(session, &self.sql, &self.params, params, options)
    }
}
