//! Entity table topology.
//!
//! An [`EntityTopology`] is the ordered list of physical tables carrying one
//! entity hierarchy's state: the root table first, then joined-subclass and
//! secondary tables in foreign-key dependency order (parents before
//! children). Executors iterate it forward for inserts and reversed for
//! deletes; violating that order under enforced foreign keys is a referential
//! integrity error, not a performance detail.

use smallvec::SmallVec;

use crate::error::{BulkError, BulkResult};
use crate::sql::ast::ScalarValue;

/// One identifier column, with the DDL type used when shaping the temp table.
#[derive(Debug, Clone, PartialEq)]
pub struct IdColumn {
    pub name: String,
    pub ddl_type: String,
}

impl IdColumn {
    pub fn new(name: impl Into<String>, ddl_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ddl_type: ddl_type.into(),
        }
    }

    /// Shorthand for the common `bigint` identifier column.
    pub fn bigint(name: impl Into<String>) -> Self {
        Self::new(name, "bigint")
    }
}

/// Property-to-column mapping within one table.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMapping {
    pub property: String,
    pub column: String,
}

impl PropertyMapping {
    pub fn new(property: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            column: column.into(),
        }
    }
}

/// One physical table in the hierarchy closure.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMapping {
    /// Physical table name
    pub name: String,
    /// Key columns of this table; for non-root tables these reference the
    /// root identifier. Same arity as the topology's id columns.
    pub key_columns: SmallVec<[String; 2]>,
    /// Properties physically stored in this table
    pub properties: Vec<PropertyMapping>,
    /// Secondary (optional) table, as opposed to a mandatory superclass table
    pub optional: bool,
}

impl TableMapping {
    pub fn new(name: impl Into<String>, key_columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
            properties: Vec::new(),
            optional: false,
        }
    }

    /// Add a property stored in this table.
    pub fn with_property(mut self, property: &str, column: &str) -> Self {
        self.properties.push(PropertyMapping::new(property, column));
        self
    }

    /// Mark this table as a secondary (optional) table.
    pub fn secondary(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Column mapped to `property` in this table, if stored here.
    pub fn column_for(&self, property: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.property == property)
            .map(|p| p.column.as_str())
    }

    fn has_column(&self, column: &str) -> bool {
        self.properties.iter().any(|p| p.column == column)
            || self.key_columns.iter().any(|k| k == column)
    }
}

/// Join table owned by the entity (many-to-many or element collection),
/// cleaned up alongside multi-table deletes.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionTable {
    /// Collection role, also the cache region name
    pub role: String,
    /// Physical join table
    pub table: String,
    /// Columns referencing the owner's identifier
    pub key_columns: SmallVec<[String; 2]>,
}

impl CollectionTable {
    pub fn new(role: impl Into<String>, table: impl Into<String>, key_columns: &[&str]) -> Self {
        Self {
            role: role.into(),
            table: table.into(),
            key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Discriminator column for single-table-per-hierarchy entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Discriminator {
    pub column: String,
    pub value: ScalarValue,
}

/// Ordered physical-table topology of one entity hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTopology {
    entity: String,
    id_columns: Vec<IdColumn>,
    tables: Vec<TableMapping>,
    collection_tables: Vec<CollectionTable>,
    discriminator: Option<Discriminator>,
    region: String,
}

impl EntityTopology {
    /// Build a topology. `tables` must be in dependency order, root first.
    ///
    /// Validates the closure invariants: at least one table, key-column arity
    /// identical to the identifier across every table, a mandatory root, and
    /// each property mapped to exactly one table.
    pub fn new(
        entity: impl Into<String>,
        id_columns: Vec<IdColumn>,
        tables: Vec<TableMapping>,
    ) -> BulkResult<Self> {
        let entity = entity.into();
        if tables.is_empty() {
            return Err(BulkError::Mapping(format!(
                "entity '{}' has no tables",
                entity
            )));
        }
        if id_columns.is_empty() {
            return Err(BulkError::Mapping(format!(
                "entity '{}' has no identifier columns",
                entity
            )));
        }
        if tables[0].optional {
            return Err(BulkError::Mapping(format!(
                "root table '{}' of entity '{}' cannot be optional",
                tables[0].name, entity
            )));
        }
        for table in &tables {
            if table.key_columns.len() != id_columns.len() {
                return Err(BulkError::Mapping(format!(
                    "table '{}' has {} key column(s) but entity '{}' identifier has {}",
                    table.name,
                    table.key_columns.len(),
                    entity,
                    id_columns.len()
                )));
            }
        }
        for (i, table) in tables.iter().enumerate() {
            if tables[..i].iter().any(|t| t.name == table.name) {
                return Err(BulkError::Mapping(format!(
                    "duplicate table '{}' in entity '{}'",
                    table.name, entity
                )));
            }
            for prop in &table.properties {
                let elsewhere = tables
                    .iter()
                    .filter(|t| t.name != table.name)
                    .any(|t| t.column_for(&prop.property).is_some());
                if elsewhere {
                    return Err(BulkError::Mapping(format!(
                        "property '{}' of entity '{}' mapped to more than one table",
                        prop.property, entity
                    )));
                }
            }
        }
        let region = entity.clone();
        Ok(Self {
            entity,
            id_columns,
            tables,
            collection_tables: Vec::new(),
            discriminator: None,
            region,
        })
    }

    /// Register a join table owned by this entity.
    pub fn with_collection_table(mut self, table: CollectionTable) -> Self {
        self.collection_tables.push(table);
        self
    }

    /// Single-table-inheritance discriminator restriction.
    pub fn with_discriminator(mut self, column: impl Into<String>, value: ScalarValue) -> Self {
        self.discriminator = Some(Discriminator {
            column: column.into(),
            value,
        });
        self
    }

    /// Override the entity cache region (defaults to the entity name).
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// More than one physical table in the closure.
    pub fn is_multi_table(&self) -> bool {
        self.tables.len() > 1
    }

    pub fn root_table(&self) -> &TableMapping {
        &self.tables[0]
    }

    /// Tables in dependency order: referenced tables before dependents.
    /// This is insert order.
    pub fn tables_parent_first(&self) -> impl Iterator<Item = &TableMapping> {
        self.tables.iter()
    }

    /// Tables in reverse dependency order: dependents before the tables they
    /// reference. This is delete order.
    pub fn tables_child_first(&self) -> impl Iterator<Item = &TableMapping> {
        self.tables.iter().rev()
    }

    pub fn table_named(&self, name: &str) -> Option<&TableMapping> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Table that physically stores `property`, with its column name.
    pub fn table_for_property(&self, property: &str) -> Option<(&TableMapping, &str)> {
        self.tables
            .iter()
            .find_map(|t| t.column_for(property).map(|c| (t, c)))
    }

    /// Resolve a possibly-qualified column/property reference to the physical
    /// table and column that carry it.
    ///
    /// A qualifier naming a table in the closure restricts the search to that
    /// table; the entity name (or any alias) as qualifier searches the whole
    /// closure. Identifier columns resolve to the root table.
    pub fn resolve_column(&self, qualifier: Option<&str>, name: &str) -> Option<(&TableMapping, String)> {
        if let Some(q) = qualifier {
            if let Some(table) = self.table_named(q) {
                if let Some(col) = table.column_for(name) {
                    return Some((table, col.to_string()));
                }
                if table.has_column(name) {
                    return Some((table, name.to_string()));
                }
                return None;
            }
        }
        if self.id_columns.iter().any(|c| c.name == name) {
            return Some((self.root_table(), name.to_string()));
        }
        if let Some((table, col)) = self.table_for_property(name) {
            return Some((table, col.to_string()));
        }
        self.tables
            .iter()
            .find(|t| t.has_column(name))
            .map(|t| (t, name.to_string()))
    }

    pub fn id_columns(&self) -> &[IdColumn] {
        &self.id_columns
    }

    pub fn id_column_names(&self) -> Vec<&str> {
        self.id_columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Composite identifier (more than one column).
    pub fn has_composite_id(&self) -> bool {
        self.id_columns.len() > 1
    }

    /// `(column, ddl-type)` pairs for shaping the temp id table.
    pub fn id_ddl_columns(&self) -> Vec<(String, String)> {
        self.id_columns
            .iter()
            .map(|c| (c.name.clone(), c.ddl_type.clone()))
            .collect()
    }

    pub fn collection_tables(&self) -> &[CollectionTable] {
        &self.collection_tables
    }

    pub fn discriminator(&self) -> Option<&Discriminator> {
        self.discriminator.as_ref()
    }

    /// Entity cache region name.
    pub fn entity_region(&self) -> &str {
        &self.region
    }

    /// Cache regions of collections owned by this entity.
    pub fn collection_regions(&self) -> impl Iterator<Item = &str> {
        self.collection_tables.iter().map(|c| c.role.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_hierarchy() -> EntityTopology {
        EntityTopology::new(
            "Person",
            vec![IdColumn::bigint("id")],
            vec![
                TableMapping::new("person", &["id"]).with_property("name", "name"),
                TableMapping::new("employee", &["person_id"]).with_property("salary", "salary"),
                TableMapping::new("customer", &["person_id"]).with_property("tier", "tier"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn dependency_order_is_root_first_and_reversible() {
        let topo = person_hierarchy();
        let forward: Vec<_> = topo.tables_parent_first().map(|t| t.name.as_str()).collect();
        assert_eq!(forward, vec!["person", "employee", "customer"]);
        let reverse: Vec<_> = topo.tables_child_first().map(|t| t.name.as_str()).collect();
        assert_eq!(reverse, vec!["customer", "employee", "person"]);
    }

    #[test]
    fn resolve_property_to_owning_table() {
        let topo = person_hierarchy();
        let (table, column) = topo.resolve_column(None, "salary").unwrap();
        assert_eq!(table.name, "employee");
        assert_eq!(column, "salary");
    }

    #[test]
    fn resolve_id_column_to_root() {
        let topo = person_hierarchy();
        let (table, column) = topo.resolve_column(None, "id").unwrap();
        assert_eq!(table.name, "person");
        assert_eq!(column, "id");
    }

    #[test]
    fn resolve_with_table_qualifier() {
        let topo = person_hierarchy();
        let (table, _) = topo.resolve_column(Some("customer"), "tier").unwrap();
        assert_eq!(table.name, "customer");
        assert!(topo.resolve_column(Some("customer"), "salary").is_none());
    }

    #[test]
    fn key_arity_mismatch_rejected() {
        let err = EntityTopology::new(
            "Broken",
            vec![IdColumn::bigint("id")],
            vec![
                TableMapping::new("broken", &["id"]),
                TableMapping::new("broken_ext", &["a", "b"]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, BulkError::Mapping(_)));
    }

    #[test]
    fn property_in_two_tables_rejected() {
        let err = EntityTopology::new(
            "Dup",
            vec![IdColumn::bigint("id")],
            vec![
                TableMapping::new("a", &["id"]).with_property("x", "x"),
                TableMapping::new("b", &["id"]).with_property("x", "x"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, BulkError::Mapping(_)));
    }

    #[test]
    fn optional_root_rejected() {
        let err = EntityTopology::new(
            "Bad",
            vec![IdColumn::bigint("id")],
            vec![TableMapping::new("bad", &["id"]).secondary()],
        )
        .unwrap_err();
        assert!(matches!(err, BulkError::Mapping(_)));
    }

    #[test]
    fn collection_regions_follow_roles() {
        let topo = person_hierarchy().with_collection_table(CollectionTable::new(
            "Person.aliases",
            "person_aliases",
            &["person_id"],
        ));
        let regions: Vec<_> = topo.collection_regions().collect();
        assert_eq!(regions, vec!["Person.aliases"]);
        assert_eq!(topo.entity_region(), "Person");
    }
}
