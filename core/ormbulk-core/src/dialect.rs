//! Dialect capability configuration.
//!
//! Executors never consult a global dialect registry. Every capability that
//! changes generated SQL or DDL sequencing is an explicit field on
//! [`DialectCapabilities`], passed in at construction time. Profiles are plain
//! data and can be loaded from JSON.

use serde::{Deserialize, Serialize};

use crate::error::BulkResult;

/// Capability flags and DDL templates for one SQL dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialectCapabilities {
    /// Human-readable dialect name, used only in logs
    pub name: String,

    /// Whether session-scoped temporary tables exist at all.
    /// Multi-table strategies are unavailable without them.
    pub supports_temporary_tables: bool,

    /// Whether the temp id table should be dropped after each bulk statement.
    /// When false, cleanup falls back to `DELETE FROM` so no identifiers leak
    /// into a later bulk statement on the same session.
    pub drop_temporary_table_after_use: bool,

    /// Whether temp-table DDL must run in an isolated, separately committed
    /// unit of work (dialects that implicitly commit on DDL would otherwise
    /// abort the enclosing transaction).
    pub ddl_requires_isolation: bool,

    /// Whether `(a, b) IN (SELECT x, y ...)` tuple subqueries parse and plan.
    /// Without this, join-table cleanup is skipped for composite identifiers.
    pub supports_tuple_in_subquery: bool,

    /// Per-dialect rewrite rule: wrap an id-subselect that reads the table
    /// being mutated in an extra aliased indirection, for optimizers that
    /// cannot push down a self-referencing `IN (subselect)`.
    pub rewrite_self_referencing_in_subselect: bool,

    /// Prefix prepended to the root table name to form the temp id table name
    pub temporary_table_prefix: String,

    /// Leading DDL keywords, e.g. `create temporary table`
    pub create_temporary_table_string: String,

    /// Trailing DDL clause, e.g. `on commit delete rows` (may be empty)
    pub create_temporary_table_postfix: String,

    /// Leading DDL keywords for dropping the temp table
    pub drop_temporary_table_string: String,
}

impl DialectCapabilities {
    /// Conservative baseline profile: temp tables supported, dropped after
    /// use, no isolation requirement, tuple subqueries available.
    pub fn generic() -> Self {
        Self {
            name: "generic".to_string(),
            supports_temporary_tables: true,
            drop_temporary_table_after_use: true,
            ddl_requires_isolation: false,
            supports_tuple_in_subquery: true,
            rewrite_self_referencing_in_subselect: false,
            temporary_table_prefix: "ht_".to_string(),
            create_temporary_table_string: "create temporary table".to_string(),
            create_temporary_table_postfix: String::new(),
            drop_temporary_table_string: "drop table".to_string(),
        }
    }

    /// MySQL-family profile. The optimizer cannot evaluate a subselect against
    /// the table being mutated, so the self-referencing rewrite is enabled.
    pub fn mysql() -> Self {
        Self {
            name: "mysql".to_string(),
            supports_tuple_in_subquery: false,
            rewrite_self_referencing_in_subselect: true,
            create_temporary_table_string: "create temporary table if not exists".to_string(),
            ..Self::generic()
        }
    }

    /// PostgreSQL-family profile.
    pub fn postgres() -> Self {
        Self {
            name: "postgres".to_string(),
            create_temporary_table_postfix: "on commit drop".to_string(),
            ..Self::generic()
        }
    }

    /// H2-style profile: global temp tables kept for the session lifetime,
    /// rows deleted after use instead of dropping the table.
    pub fn h2() -> Self {
        Self {
            name: "h2".to_string(),
            drop_temporary_table_after_use: false,
            ddl_requires_isolation: true,
            create_temporary_table_string: "create local temporary table".to_string(),
            ..Self::generic()
        }
    }

    /// Load a profile from a JSON document.
    pub fn from_json(json: &str) -> BulkResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Temp id table name for an entity rooted at `root_table`.
    pub fn temp_table_name(&self, root_table: &str) -> String {
        format!("{}{}", self.temporary_table_prefix, root_table)
    }

    /// Render the CREATE statement for a temp id table with the given
    /// `(column, ddl-type)` pairs.
    pub fn create_temp_table_sql(&self, table: &str, columns: &[(String, String)]) -> String {
        let body = columns
            .iter()
            .map(|(name, ty)| format!("{} {} not null", name, ty))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("{} {} ({})", self.create_temporary_table_string, table, body);
        if !self.create_temporary_table_postfix.is_empty() {
            sql.push(' ');
            sql.push_str(&self.create_temporary_table_postfix);
        }
        sql
    }

    /// Render the DROP statement for a temp id table.
    pub fn drop_temp_table_sql(&self, table: &str) -> String {
        format!("{} {}", self.drop_temporary_table_string, table)
    }
}

impl Default for DialectCapabilities {
    fn default() -> Self {
        Self::generic()
    }
}
