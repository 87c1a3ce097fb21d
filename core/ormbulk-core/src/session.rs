//! Execution boundary between executors and the owning session.
//!
//! Executors never touch a connection directly; everything goes through
//! [`SqlSession`]. Sessions are single-owner and not thread-safe — one bulk
//! statement runs synchronously to completion on the calling thread, and the
//! session's connection and transaction are exclusively owned for the whole
//! multi-statement sequence.

use std::time::Duration;

use ahash::AHashMap;

use crate::cache::BulkOperationAction;
use crate::error::DriverError;
use crate::sql::ast::ScalarValue;

/// Options applied to each physical statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementOptions {
    /// Row-selection timeout, applied where the driver supports it.
    /// There is no mid-statement cancellation.
    pub timeout: Option<Duration>,
}

impl StatementOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The session contract executors run against.
///
/// Driver failures are reported as [`DriverError`] with a vendor-neutral
/// category; the executor layer attaches the offending SQL.
pub trait SqlSession {
    /// Execute a mutation statement, returning affected rows.
    fn execute_update(
        &mut self,
        sql: &str,
        binds: &[ScalarValue],
        options: &StatementOptions,
    ) -> Result<usize, DriverError>;

    /// Execute a scalar `COUNT` query (temp-table verification reads).
    fn query_count(&mut self, sql: &str) -> Result<u64, DriverError>;

    /// Run DDL on the session connection, inside the current transaction.
    fn execute_ddl(&mut self, sql: &str) -> Result<(), DriverError>;

    /// Run DDL in an isolated, separately committed unit of work. Used when
    /// the dialect implicitly commits DDL.
    fn execute_isolated_ddl(&mut self, sql: &str) -> Result<(), DriverError>;

    /// Whether a transaction is currently in progress on this session.
    fn is_transaction_in_progress(&self) -> bool;

    /// Whether cache invalidation should go through the per-transaction
    /// action queue instead of running inline.
    fn supports_action_queue(&self) -> bool {
        self.is_transaction_in_progress()
    }

    /// Invalidate a second-level cache region immediately.
    fn invalidate_region(&mut self, region: &str);

    /// Append an action for execution at post-transaction completion.
    fn add_action(&mut self, action: BulkOperationAction);
}

/// One statement as a [`RecordingSession`] saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub binds: Vec<ScalarValue>,
    pub timeout: Option<Duration>,
}

/// In-memory session double.
///
/// Records every statement, simulates temp-id-table row counts, and can be
/// scripted to fail on a matching statement. Used by this crate's tests and
/// useful for asserting statement order and bind order downstream.
#[derive(Debug, Default)]
pub struct RecordingSession {
    /// Mutation statements in execution order
    pub executed: Vec<ExecutedStatement>,
    /// In-transaction DDL in execution order
    pub ddl: Vec<String>,
    /// Isolated DDL in execution order
    pub isolated_ddl: Vec<String>,
    /// Regions invalidated inline
    pub invalidated: Vec<String>,
    /// Queued post-transaction actions
    pub actions: Vec<BulkOperationAction>,
    transactional: bool,
    match_count: usize,
    temp_prefix: String,
    temp_rows: AHashMap<String, u64>,
    fail_matching: Option<(String, DriverError)>,
}

impl RecordingSession {
    /// Non-transactional session: invalidations run inline.
    pub fn new() -> Self {
        Self {
            temp_prefix: "ht_".to_string(),
            ..Self::default()
        }
    }

    /// Session with a transaction in progress: invalidations are queued.
    pub fn transactional() -> Self {
        Self {
            transactional: true,
            ..Self::new()
        }
    }

    /// Rows the simulated predicate matches (drives populate/update counts).
    pub fn with_match_count(mut self, rows: usize) -> Self {
        self.match_count = rows;
        self
    }

    /// Fail any statement whose SQL contains `needle`.
    pub fn fail_matching(mut self, needle: impl Into<String>, error: DriverError) -> Self {
        self.fail_matching = Some((needle.into(), error));
        self
    }

    /// Current simulated row count of a temp table (by full table name).
    pub fn temp_row_count(&self, table: &str) -> u64 {
        self.temp_rows.get(table).copied().unwrap_or(0)
    }

    /// Drain the action queue the way a transaction coordinator would at
    /// post-commit, applying each queued invalidation.
    pub fn after_transaction_completion(&mut self) {
        let actions = std::mem::take(&mut self.actions);
        for action in actions {
            for region in action.invalidation().regions() {
                self.invalidated.push(region.clone());
            }
        }
    }

    /// SQL texts of the recorded mutation statements, in order.
    pub fn executed_sql(&self) -> Vec<&str> {
        self.executed.iter().map(|s| s.sql.as_str()).collect()
    }

    fn check_failure(&self, sql: &str) -> Result<(), DriverError> {
        if let Some((needle, error)) = &self.fail_matching {
            if sql.contains(needle.as_str()) {
                return Err(error.clone());
            }
        }
        Ok(())
    }

    fn target_table<'a>(sql: &'a str, verb: &str) -> Option<&'a str> {
        let rest = sql.strip_prefix(verb)?;
        let table = rest.split_whitespace().next()?;
        Some(table.trim_end_matches('('))
    }

    fn is_temp(&self, table: &str) -> bool {
        table.starts_with(&self.temp_prefix)
    }
}

impl SqlSession for RecordingSession {
    fn execute_update(
        &mut self,
        sql: &str,
        binds: &[ScalarValue],
        options: &StatementOptions,
    ) -> Result<usize, DriverError> {
        self.check_failure(sql)?;
        self.executed.push(ExecutedStatement {
            sql: sql.to_string(),
            binds: binds.to_vec(),
            timeout: options.timeout,
        });
        if let Some(table) = Self::target_table(sql, "insert into ") {
            if self.is_temp(table) {
                self.temp_rows
                    .insert(table.to_string(), self.match_count as u64);
                return Ok(self.match_count);
            }
            return Ok(1);
        }
        if let Some(table) = Self::target_table(sql, "delete from ") {
            if self.is_temp(table) {
                let removed = self.temp_rows.insert(table.to_string(), 0).unwrap_or(0);
                return Ok(removed as usize);
            }
        }
        Ok(self.match_count)
    }

    fn query_count(&mut self, sql: &str) -> Result<u64, DriverError> {
        self.check_failure(sql)?;
        if let Some(table) = sql.rsplit(" from ").next() {
            let table = table.trim();
            if self.is_temp(table) {
                return Ok(self.temp_row_count(table));
            }
        }
        Ok(self.match_count as u64)
    }

    fn execute_ddl(&mut self, sql: &str) -> Result<(), DriverError> {
        self.check_failure(sql)?;
        self.ddl.push(sql.to_string());
        if let Some(table) = Self::target_table(sql, "drop table ") {
            self.temp_rows.remove(table);
        }
        Ok(())
    }

    fn execute_isolated_ddl(&mut self, sql: &str) -> Result<(), DriverError> {
        self.check_failure(sql)?;
        self.isolated_ddl.push(sql.to_string());
        if let Some(table) = Self::target_table(sql, "drop table ") {
            self.temp_rows.remove(table);
        }
        Ok(())
    }

    fn is_transaction_in_progress(&self) -> bool {
        self.transactional
    }

    fn invalidate_region(&mut self, region: &str) {
        self.invalidated.push(region.to_string());
    }

    fn add_action(&mut self, action: BulkOperationAction) {
        self.actions.push(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SqlErrorCategory;

    #[test]
    fn records_statements_with_binds_and_timeout() {
        let mut session = RecordingSession::new().with_match_count(3);
        let options = StatementOptions::new().with_timeout(Duration::from_secs(5));
        let rows = session
            .execute_update("update person set name = ?", &[ScalarValue::Int(1)], &options)
            .unwrap();
        assert_eq!(rows, 3);
        assert_eq!(session.executed.len(), 1);
        assert_eq!(session.executed[0].timeout, Some(Duration::from_secs(5)));
        assert_eq!(session.executed[0].binds, vec![ScalarValue::Int(1)]);
    }

    #[test]
    fn temp_table_rows_populate_and_clear() {
        let mut session = RecordingSession::new().with_match_count(4);
        let options = StatementOptions::new();
        session
            .execute_update(
                "insert into ht_person (id) select person.id from person",
                &[],
                &options,
            )
            .unwrap();
        assert_eq!(session.temp_row_count("ht_person"), 4);
        assert_eq!(
            session.query_count("select count(*) from ht_person").unwrap(),
            4
        );
        session
            .execute_update("delete from ht_person", &[], &options)
            .unwrap();
        assert_eq!(session.temp_row_count("ht_person"), 0);
    }

    #[test]
    fn scripted_failure_fires_on_matching_sql() {
        let mut session = RecordingSession::new().fail_matching(
            "delete from employee",
            DriverError::new("fk violation", SqlErrorCategory::ConstraintViolation),
        );
        let options = StatementOptions::new();
        assert!(session
            .execute_update("delete from person", &[], &options)
            .is_ok());
        assert!(session
            .execute_update("delete from employee where 1 = 1", &[], &options)
            .is_err());
    }
}
