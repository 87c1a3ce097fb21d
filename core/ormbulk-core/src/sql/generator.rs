//! SQL string generation.
//!
//! Translates a compiled predicate tree into a dialect-neutral SQL fragment
//! plus the ordered [`ParamSpec`] list matching its `?` placeholders, and
//! builds the physical SELECT/INSERT/UPDATE/DELETE statements the executors
//! run. A fragment is translated once per logical statement; every physical
//! statement that reuses it re-binds the same specs in the same order.

use crate::error::{BulkError, BulkResult};
use crate::dialect::DialectCapabilities;
use crate::metadata::{EntityTopology, TableMapping};
use crate::sql::ast::{Assignment, ParamSpec, SqlExpr};

/// How column references are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnStyle {
    /// Bare column names — single-table statements
    Bare,
    /// `table.column` — statements joining the hierarchy closure
    Qualified,
}

/// A translated where-clause or value fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedFragment {
    /// SQL text, without a leading `where`
    pub sql: String,
    /// Bind sites in placeholder order
    pub params: Vec<ParamSpec>,
    /// Physical tables the fragment references, in topology order
    pub referenced_tables: Vec<String>,
}

struct PredicateTranslator<'a> {
    topology: &'a EntityTopology,
    style: ColumnStyle,
    sql: String,
    params: Vec<ParamSpec>,
    tables: Vec<String>,
}

impl<'a> PredicateTranslator<'a> {
    fn new(topology: &'a EntityTopology, style: ColumnStyle) -> Self {
        Self {
            topology,
            style,
            sql: String::new(),
            params: Vec::new(),
            tables: Vec::new(),
        }
    }

    fn note_table(&mut self, table: &str) {
        if !self.tables.iter().any(|t| t == table) {
            self.tables.push(table.to_string());
        }
    }

    fn walk(&mut self, expr: &SqlExpr) -> BulkResult<()> {
        match expr {
            SqlExpr::Column { qualifier, name } => {
                let (table, column) = self
                    .topology
                    .resolve_column(qualifier.as_deref(), name)
                    .ok_or_else(|| BulkError::SqlNotSupported {
                        feature: format!(
                            "column '{}' not mapped by entity '{}'",
                            name,
                            self.topology.entity()
                        ),
                        hint: "reference a mapped property or physical column".to_string(),
                    })?;
                let table_name = table.name.clone();
                match self.style {
                    ColumnStyle::Bare => self.sql.push_str(&column),
                    ColumnStyle::Qualified => {
                        self.sql.push_str(&table_name);
                        self.sql.push('.');
                        self.sql.push_str(&column);
                    }
                }
                self.note_table(&table_name);
            }
            SqlExpr::Literal(value) => {
                self.sql.push('?');
                self.params.push(ParamSpec::Literal(value.clone()));
            }
            SqlExpr::Param(index) => {
                self.sql.push('?');
                self.params.push(ParamSpec::Positional(*index));
            }
            SqlExpr::BinaryOp { left, op, right } => {
                self.sql.push('(');
                self.walk(left)?;
                self.sql.push(' ');
                self.sql.push_str(op.as_sql());
                self.sql.push(' ');
                self.walk(right)?;
                self.sql.push(')');
            }
            SqlExpr::IsNull(inner) => {
                self.walk(inner)?;
                self.sql.push_str(" is null");
            }
            SqlExpr::IsNotNull(inner) => {
                self.walk(inner)?;
                self.sql.push_str(" is not null");
            }
            SqlExpr::InList {
                expr,
                list,
                negated,
            } => {
                self.walk(expr)?;
                self.sql
                    .push_str(if *negated { " not in (" } else { " in (" });
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.walk(item)?;
                }
                self.sql.push(')');
            }
        }
        Ok(())
    }

    fn finish(mut self) -> TranslatedFragment {
        // Report referenced tables in topology order, not visit order
        let order: Vec<String> = self
            .topology
            .tables_parent_first()
            .map(|t| t.name.clone())
            .collect();
        self.tables
            .sort_by_key(|t| order.iter().position(|o| o == t).unwrap_or(usize::MAX));
        TranslatedFragment {
            sql: self.sql,
            params: self.params,
            referenced_tables: self.tables,
        }
    }
}

/// Translate a where-clause tree once, producing the SQL fragment, its
/// ordered parameter specs, and the set of physical tables it touches.
pub fn translate_predicate(
    expr: &SqlExpr,
    topology: &EntityTopology,
    style: ColumnStyle,
) -> BulkResult<TranslatedFragment> {
    let mut translator = PredicateTranslator::new(topology, style);
    translator.walk(expr)?;
    Ok(translator.finish())
}

/// Per-table slice of a bulk update's SET clause.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentFragment {
    /// Physical table owning every assigned column in this slice
    pub table: String,
    /// `col = ?, col2 = (...)` SET body
    pub set_sql: String,
    /// Bind sites of the SET body, in placeholder order
    pub params: Vec<ParamSpec>,
}

/// Group a bulk update's assignments by the physical table owning each
/// assigned column, preserving topology order across tables and declaration
/// order within one table.
pub fn translate_assignments(
    assignments: &[Assignment],
    topology: &EntityTopology,
) -> BulkResult<Vec<AssignmentFragment>> {
    let mut fragments: Vec<AssignmentFragment> = Vec::new();
    for table in topology.tables_parent_first() {
        let mut set_sql = String::new();
        let mut params = Vec::new();
        for assignment in assignments {
            let Some(column) = table.column_for(&assignment.property) else {
                continue;
            };
            if !set_sql.is_empty() {
                set_sql.push_str(", ");
            }
            set_sql.push_str(column);
            set_sql.push_str(" = ");
            let value = translate_predicate(&assignment.value, topology, ColumnStyle::Bare)?;
            set_sql.push_str(&value.sql);
            params.extend(value.params);
        }
        if !set_sql.is_empty() {
            fragments.push(AssignmentFragment {
                table: table.name.clone(),
                set_sql,
                params,
            });
        }
    }
    // Every assignment must land somewhere
    for assignment in assignments {
        if topology.table_for_property(&assignment.property).is_none() {
            return Err(BulkError::SqlNotSupported {
                feature: format!(
                    "assignment to '{}' not mapped by entity '{}'",
                    assignment.property,
                    topology.entity()
                ),
                hint: "assign to a mapped property".to_string(),
            });
        }
    }
    Ok(fragments)
}

fn join_condition(table: &TableMapping, topology: &EntityTopology) -> String {
    let root = topology.root_table();
    table
        .key_columns
        .iter()
        .zip(topology.id_column_names())
        .map(|(key, id)| format!("{}.{} = {}.{}", table.name, key, root.name, id))
        .collect::<Vec<_>>()
        .join(" and ")
}

/// `SELECT <id-columns> FROM root [joins for referenced tables] [WHERE ...]` —
/// the identifier snapshot query honoring the statement's where-clause.
///
/// Only non-root tables the predicate actually references are joined:
/// mandatory tables with `inner join`, secondary tables with `left join`.
pub fn id_select_sql(topology: &EntityTopology, predicate: Option<&TranslatedFragment>) -> String {
    let root = topology.root_table();
    let id_list = topology
        .id_column_names()
        .iter()
        .map(|c| format!("{}.{}", root.name, c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("select {} from {}", id_list, root.name);
    if let Some(predicate) = predicate {
        for table_name in &predicate.referenced_tables {
            if *table_name == root.name {
                continue;
            }
            let Some(table) = topology.table_named(table_name) else {
                continue;
            };
            let keyword = if table.optional {
                "left join"
            } else {
                "inner join"
            };
            sql.push_str(&format!(
                " {} {} on {}",
                keyword,
                table.name,
                join_condition(table, topology)
            ));
        }
        sql.push_str(" where ");
        sql.push_str(&predicate.sql);
    }
    sql
}

/// `INSERT INTO temp (ids) SELECT ids FROM ...` — the temp-table population
/// statement. Binds are exactly the predicate's specs.
pub fn populate_temp_table_sql(
    topology: &EntityTopology,
    dialect: &DialectCapabilities,
    predicate: Option<&TranslatedFragment>,
) -> String {
    let temp = dialect.temp_table_name(&topology.root_table().name);
    let id_list = topology.id_column_names().join(", ");
    format!(
        "insert into {} ({}) {}",
        temp,
        id_list,
        id_select_sql(topology, predicate)
    )
}

fn key_tuple(key_columns: &[String]) -> String {
    if key_columns.len() == 1 {
        key_columns[0].clone()
    } else {
        format!("({})", key_columns.join(", "))
    }
}

/// `(key-columns) IN (SELECT id-columns FROM temp)` — scopes one per-table
/// statement to the snapshotted identifier set.
pub fn in_temp_table_fragment(
    key_columns: &[String],
    topology: &EntityTopology,
    dialect: &DialectCapabilities,
) -> String {
    let temp = dialect.temp_table_name(&topology.root_table().name);
    format!(
        "{} in (select {} from {})",
        key_tuple(key_columns),
        topology.id_column_names().join(", "),
        temp
    )
}

/// `(key-columns) IN (<id-select>)` for the id-subselect strategy.
///
/// When the dialect flags `rewrite_self_referencing_in_subselect` and the
/// id-select reads the table being mutated, the subselect is wrapped in an
/// aliased indirection so the optimizer never sees a direct self-reference.
pub fn in_id_select_fragment(
    key_columns: &[String],
    mutated_table: &str,
    topology: &EntityTopology,
    dialect: &DialectCapabilities,
    predicate: Option<&TranslatedFragment>,
) -> String {
    let select = id_select_sql(topology, predicate);
    let self_referencing = mutated_table == topology.root_table().name
        || predicate
            .map(|p| p.referenced_tables.iter().any(|t| t == mutated_table))
            .unwrap_or(false);
    let subselect = if dialect.rewrite_self_referencing_in_subselect && self_referencing {
        format!(
            "select {} from ({}) ht_ids",
            topology.id_column_names().join(", "),
            select
        )
    } else {
        select
    };
    format!("{} in ({})", key_tuple(key_columns), subselect)
}

/// `UPDATE table SET ... [WHERE ...]`
pub fn update_sql(table: &str, set_sql: &str, where_sql: Option<&str>) -> String {
    match where_sql {
        Some(w) => format!("update {} set {} where {}", table, set_sql, w),
        None => format!("update {} set {}", table, set_sql),
    }
}

/// `DELETE FROM table [WHERE ...]`
pub fn delete_sql(table: &str, where_sql: Option<&str>) -> String {
    match where_sql {
        Some(w) => format!("delete from {} where {}", table, w),
        None => format!("delete from {}", table),
    }
}

/// `INSERT INTO table (cols) VALUES (?, ...)`
pub fn insert_sql(table: &str, columns: &[String]) -> String {
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "insert into {} ({}) values ({})",
        table,
        columns.join(", "),
        placeholders
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{IdColumn, TableMapping};
    use crate::sql::ast::{BinaryOperator, ScalarValue};

    fn person() -> EntityTopology {
        EntityTopology::new(
            "Person",
            vec![IdColumn::bigint("id")],
            vec![
                TableMapping::new("person", &["id"]).with_property("name", "name"),
                TableMapping::new("employee", &["person_id"]).with_property("salary", "salary"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn translate_bare_fragment_with_params() {
        let topo = person();
        let expr = SqlExpr::binary(
            SqlExpr::eq_value("name", ScalarValue::Text("joe".into())),
            BinaryOperator::And,
            SqlExpr::binary(
                SqlExpr::column("id"),
                BinaryOperator::Gt,
                SqlExpr::Param(0),
            ),
        );
        let fragment = translate_predicate(&expr, &topo, ColumnStyle::Bare).unwrap();
        assert_eq!(fragment.sql, "((name = ?) and (id > ?))");
        assert_eq!(
            fragment.params,
            vec![
                ParamSpec::Literal(ScalarValue::Text("joe".into())),
                ParamSpec::Positional(0),
            ]
        );
        assert_eq!(fragment.referenced_tables, vec!["person"]);
    }

    #[test]
    fn translate_qualified_tracks_cross_table_refs() {
        let topo = person();
        let expr = SqlExpr::eq_value("salary", ScalarValue::Int(100));
        let fragment = translate_predicate(&expr, &topo, ColumnStyle::Qualified).unwrap();
        assert_eq!(fragment.sql, "(employee.salary = ?)");
        assert_eq!(fragment.referenced_tables, vec!["employee"]);
    }

    #[test]
    fn unmapped_column_is_rejected() {
        let topo = person();
        let expr = SqlExpr::column("no_such_thing");
        let err = translate_predicate(&expr, &topo, ColumnStyle::Bare).unwrap_err();
        assert!(matches!(err, BulkError::SqlNotSupported { .. }));
    }

    #[test]
    fn id_select_joins_only_referenced_tables() {
        let topo = person();
        let expr = SqlExpr::eq_value("salary", ScalarValue::Int(100));
        let fragment = translate_predicate(&expr, &topo, ColumnStyle::Qualified).unwrap();
        let sql = id_select_sql(&topo, Some(&fragment));
        assert_eq!(
            sql,
            "select person.id from person inner join employee \
             on employee.person_id = person.id where (employee.salary = ?)"
        );
    }

    #[test]
    fn id_select_without_predicate_scans_root_only() {
        let topo = person();
        assert_eq!(id_select_sql(&topo, None), "select person.id from person");
    }

    #[test]
    fn populate_statement_shape() {
        let topo = person();
        let dialect = DialectCapabilities::generic();
        let sql = populate_temp_table_sql(&topo, &dialect, None);
        assert_eq!(
            sql,
            "insert into ht_person (id) select person.id from person"
        );
    }

    #[test]
    fn in_temp_table_single_and_tuple_keys() {
        let topo = person();
        let dialect = DialectCapabilities::generic();
        let single = in_temp_table_fragment(&["person_id".to_string()], &topo, &dialect);
        assert_eq!(single, "person_id in (select id from ht_person)");

        let composite = EntityTopology::new(
            "Pair",
            vec![IdColumn::bigint("a"), IdColumn::bigint("b")],
            vec![TableMapping::new("pair", &["a", "b"])],
        )
        .unwrap();
        let tuple = in_temp_table_fragment(
            &["a".to_string(), "b".to_string()],
            &composite,
            &dialect,
        );
        assert_eq!(tuple, "(a, b) in (select a, b from ht_pair)");
    }

    #[test]
    fn self_referencing_subselect_rewritten_for_mysql() {
        let topo = person();
        let expr = SqlExpr::eq_value("salary", ScalarValue::Int(1));
        let fragment = translate_predicate(&expr, &topo, ColumnStyle::Qualified).unwrap();
        let plain = in_id_select_fragment(
            &["person_id".to_string()],
            "employee",
            &topo,
            &DialectCapabilities::generic(),
            Some(&fragment),
        );
        assert!(!plain.contains("ht_ids"));

        let rewritten = in_id_select_fragment(
            &["person_id".to_string()],
            "employee",
            &topo,
            &DialectCapabilities::mysql(),
            Some(&fragment),
        );
        assert!(rewritten.contains("(select id from (select person.id from person"));
        assert!(rewritten.ends_with("ht_ids)"));
    }

    #[test]
    fn assignments_grouped_by_owning_table() {
        let topo = person();
        let fragments = translate_assignments(
            &[
                Assignment::new("salary", SqlExpr::Literal(ScalarValue::Int(1))),
                Assignment::new("name", SqlExpr::Param(0)),
            ],
            &topo,
        )
        .unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].table, "person");
        assert_eq!(fragments[0].set_sql, "name = ?");
        assert_eq!(fragments[1].table, "employee");
        assert_eq!(fragments[1].set_sql, "salary = ?");
    }

    #[test]
    fn unmapped_assignment_rejected() {
        let topo = person();
        let err = translate_assignments(
            &[Assignment::new("ghost", SqlExpr::Param(0))],
            &topo,
        )
        .unwrap_err();
        assert!(matches!(err, BulkError::SqlNotSupported { .. }));
    }
}
