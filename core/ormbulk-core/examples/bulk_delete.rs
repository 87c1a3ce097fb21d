//! Multi-table bulk delete walkthrough
//!
//! Run: cargo run --example bulk_delete

use ormbulk_core::dialect::DialectCapabilities;
use ormbulk_core::executor::plan_executor;
use ormbulk_core::metadata::{EntityTopology, IdColumn, TableMapping};
use ormbulk_core::session::{RecordingSession, StatementOptions};
use ormbulk_core::sql::{BulkStatementParser, ScalarValue};

fn main() -> ormbulk_core::BulkResult<()> {
    println!("=== ormbulk multi-table delete ===\n");

    // Person is a joined hierarchy: person <- employee, customer
    let topology = EntityTopology::new(
        "Person",
        vec![IdColumn::bigint("id")],
        vec![
            TableMapping::new("person", &["id"]).with_property("name", "name"),
            TableMapping::new("employee", &["person_id"]).with_property("salary", "salary"),
            TableMapping::new("customer", &["person_id"]).with_property("tier", "tier"),
        ],
    )?;

    let statement = BulkStatementParser::new().parse("DELETE FROM Person WHERE name = ?")?;
    let executor = plan_executor(&statement, &topology, &DialectCapabilities::generic())?;

    println!("Physical statements, in execution order:");
    for sql in executor.sql_statements() {
        println!("  {}", sql);
    }

    let mut session = RecordingSession::new().with_match_count(3);
    let rows = executor.execute(
        &[ScalarValue::Text("joe".into())],
        &mut session,
        &StatementOptions::new(),
    )?;
    println!("\nAffected rows: {}", rows);

    println!("\nEverything the session saw:");
    for ddl in &session.ddl {
        println!("  [ddl] {}", ddl);
    }
    for stmt in &session.executed {
        println!("  [dml] {} (binds: {:?})", stmt.sql, stmt.binds);
    }
    println!("\nInvalidated cache regions: {:?}", session.invalidated);

    Ok(())
}
