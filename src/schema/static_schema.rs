//! Offline, DDL-parsed schema: no driver connection, usable directly in
//! tests and fixture-driven analysis. Walks `CREATE TABLE`/`CREATE INDEX`
//! statements (`sqlparser::ast::Statement` match) to build an in-memory
//! table/column/index catalog.

use std::collections::BTreeMap;

use sqlparser::{dialect::GenericDialect, parser::Parser};

use crate::error::{AppResult, query_parse_error};

/// Column metadata extracted from `CREATE TABLE`.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name:        String,
    pub data_type:   String,
    pub is_nullable: bool,
    pub is_primary:  bool
}

/// Index metadata extracted from `CREATE INDEX` or table constraints.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub name:      String,
    pub columns:   Vec<String>,
    pub is_unique: bool
}

/// Complete information about one table.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name:    String,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>
}

/// A schema parsed from a batch of DDL statements, stored in a
/// `BTreeMap` for deterministic iteration.
#[derive(Debug, Default, Clone)]
pub struct StaticSchema {
    pub tables: BTreeMap<String, TableInfo>
}

impl StaticSchema {
    /// Parse `CREATE TABLE`/`CREATE INDEX` statements from `sql`.
    pub fn parse(sql: &str) -> AppResult<Self> {
        let dialect = GenericDialect {};
        let statements = Parser::parse_sql(&dialect, sql).map_err(|e| query_parse_error(e.to_string()))?;

        let mut schema = Self::default();
        for stmt in statements {
            schema.process_statement(stmt);
        }
        Ok(schema)
    }

    fn process_statement(&mut self, stmt: sqlparser::ast::Statement) {
        use sqlparser::ast::Statement;

        match stmt {
            Statement::CreateTable(create) => {
                let table_name = create.name.to_string();
                let mut columns = Vec::new();
                let mut indexes = Vec::new();

                for column in create.columns {
                    let is_primary = column.options.iter().any(|opt| {
                        matches!(
                            opt.option,
                            sqlparser::ast::ColumnOption::Unique {
                                is_primary: true,
                                ..
                            }
                        )
                    });

                    columns.push(ColumnInfo {
                        name: column.name.to_string(),
                        data_type: column.data_type.to_string(),
                        is_nullable: !column
                            .options
                            .iter()
                            .any(|opt| matches!(opt.option, sqlparser::ast::ColumnOption::NotNull)),
                        is_primary
                    });
                }

                for constraint in create.constraints {
                    if let sqlparser::ast::TableConstraint::Index {
                        name,
                        columns: idx_cols,
                        ..
                    } = constraint
                    {
                        indexes.push(IndexInfo {
                            name:      name.map(|n| n.to_string()).unwrap_or_default(),
                            columns:   idx_cols.iter().map(|c| c.to_string()).collect(),
                            is_unique: false
                        });
                    }
                }

                self.tables.insert(
                    table_name.clone(),
                    TableInfo {
                        name: table_name,
                        columns,
                        indexes
                    }
                );
            }
            Statement::CreateIndex(create_index) => {
                let table_name = create_index.table_name.to_string();
                if let Some(table) = self.tables.get_mut(&table_name) {
                    table.indexes.push(IndexInfo {
                        name:      create_index.name.map(|n| n.to_string()).unwrap_or_default(),
                        columns:   create_index.columns.iter().map(|c| c.to_string()).collect(),
                        is_unique: create_index.unique
                    });
                }
            }
            _ => {}
        }
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.keys().any(|t| t.eq_ignore_ascii_case(name))
    }

    pub fn column_exists(&self, table: &str, column: &str) -> bool {
        self.tables
            .values()
            .find(|t| t.name.eq_ignore_ascii_case(table))
            .is_some_and(|t| t.columns.iter().any(|c| c.name.eq_ignore_ascii_case(column)))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.values().map(|t| t.name.as_str()).collect()
    }

    pub fn column_names(&self, table: &str) -> Vec<&str> {
        self.tables
            .values()
            .find(|t| t.name.eq_ignore_ascii_case(table))
            .map(|t| t.columns.iter().map(|c| c.name.as_str()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DDL: &str = r#"
        CREATE TABLE users (
            id INT PRIMARY KEY,
            email VARCHAR(255) NOT NULL
        );
        CREATE INDEX idx_email ON users(email);
    "#;

    #[test]
    fn parses_table_and_index() {
        let schema = StaticSchema::parse(DDL).unwrap();
        let users = schema.tables.get("users").unwrap();
        assert_eq!(users.columns.len(), 2);
        assert_eq!(users.indexes.len(), 1);
    }

    #[test]
    fn table_and_column_existence_are_case_insensitive() {
        let schema = StaticSchema::parse(DDL).unwrap();
        assert!(schema.table_exists("USERS"));
        assert!(schema.column_exists("users", "EMAIL"));
        assert!(!schema.column_exists("users", "nonexistent"));
    }
}
