//! # ormbulk — Bulk DML Execution Engine
//!
//! ormbulk translates one logical bulk INSERT/UPDATE/DELETE against a mapped
//! entity into the physical SQL statements that honor the entity's
//! multi-table topology, and runs them transactionally through a session
//! boundary.
//!
//! ## Execution pipeline
//!
//! ```text
//! statement text → BulkStatementParser → BulkStatement
//!               → plan_executor → StatementExecutor → SqlSession
//! ```
//!
//! Strategy selection is a pure function of the entity's table count and the
//! tables the statement touches:
//!
//! - **Simple** — one table mutated, predicate confined to it: one statement.
//! - **IdSubselect** — one table mutated, predicate spans the hierarchy: the
//!   statement is scoped by `(key) IN (<id select over the joined closure>)`.
//! - **MultiTable** — several tables mutated: the matching identifiers are
//!   snapshotted once into a temporary id table, then one statement per
//!   physical table runs in foreign-key dependency order.
//!
//! ## Quick start
//!
//! ```rust
//! use ormbulk_core::dialect::DialectCapabilities;
//! use ormbulk_core::executor::plan_executor;
//! use ormbulk_core::metadata::{EntityTopology, IdColumn, TableMapping};
//! use ormbulk_core::session::{RecordingSession, StatementOptions};
//! use ormbulk_core::sql::BulkStatementParser;
//!
//! # fn main() -> ormbulk_core::BulkResult<()> {
//! let topology = EntityTopology::new(
//!     "Person",
//!     vec![IdColumn::bigint("id")],
//!     vec![TableMapping::new("person", &["id"]).with_property("name", "name")],
//! )?;
//! let statement = BulkStatementParser::new().parse("DELETE FROM Person WHERE name = ?")?;
//! let executor = plan_executor(&statement, &topology, &DialectCapabilities::generic())?;
//! assert_eq!(executor.sql_statements().len(), 1);
//!
//! let mut session = RecordingSession::new().with_match_count(2);
//! let rows = executor.execute(
//!     &[ormbulk_core::sql::ScalarValue::Text("joe".into())],
//!     &mut session,
//!     &StatementOptions::new(),
//! )?;
//! assert_eq!(rows, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module structure
//!
//! - [`metadata`] — entity table topology ([`metadata::EntityTopology`])
//! - [`sql`] — compiled statement tree, parser, SQL generation
//! - [`executor`] — strategy classifier and the three executors
//! - [`dialect`] — explicit dialect capability configuration
//! - [`session`] — execution boundary and statement options
//! - [`cache`] — bulk-operation second-level-cache invalidation

pub mod cache;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod session;
pub mod sql;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use dialect::DialectCapabilities;
pub use error::{BulkError, BulkResult, DriverError, SqlErrorCategory};
pub use executor::{StatementExecutor, plan_executor};
pub use metadata::EntityTopology;
pub use session::{SqlSession, StatementOptions};
pub use sql::{BulkStatement, BulkStatementParser};
