//! Schema introspection: a thin typo-aware wrapper over [`Driver`]'s
//! catalog lookups, plus a DDL-parsing offline introspector for tests
//! and fixture-driven analysis that never touches a live connection.
//!
//! Table/column lookup is driver-specific, so rather than inventing a
//! parallel connection abstraction, this module wraps `&dyn Driver`
//! directly and layers Levenshtein typo suggestion on top.

pub mod static_schema;
pub mod typo;

pub use static_schema::{ColumnInfo, IndexInfo, StaticSchema, TableInfo};
pub use typo::{STATIC_KEYWORD_TYPOS, levenshtein_distance, suggest};

use crate::{
    driver::{Driver, SchemaRecord},
    error::AppResult
};

/// Driver-backed schema lookups with typo-suggestion on miss.
pub struct SchemaIntrospector<'a> {
    driver: &'a dyn Driver
}

impl<'a> SchemaIntrospector<'a> {
    pub fn new(driver: &'a dyn Driver) -> Self {
        Self {
            driver
        }
    }

    pub async fn table_exists(&self, name: &str) -> AppResult<Option<SchemaRecord>> {
        self.driver.table_exists(name).await
    }

    pub async fn list_tables(&self) -> AppResult<Vec<SchemaRecord>> {
        self.driver.list_tables().await
    }

    pub async fn column_exists(&self, table: &str, column: &str) -> AppResult<Option<SchemaRecord>> {
        self.driver.column_exists(table, column).await
    }

    pub async fn list_columns(&self, table: &str) -> AppResult<Vec<SchemaRecord>> {
        self.driver.list_columns(table).await
    }

    /// Nearest known table name by Levenshtein distance <= 2, case-insensitive.
    pub async fn suggest_table(&self, name: &str) -> AppResult<Option<String>> {
        let tables = self.list_tables().await?;
        let candidates: Vec<&str> = tables.iter().map(|t| t.table_name.as_str()).collect();
        Ok(suggest(name, &candidates))
    }

    /// Nearest known column name within one table by Levenshtein distance <= 2.
    pub async fn suggest_column(&self, table: &str, name: &str) -> AppResult<Option<String>> {
        let columns = self.list_columns(table).await?;
        let candidates: Vec<&str> = columns.iter().filter_map(|c| c.column_name.as_deref()).collect();
        Ok(suggest(name, &candidates))
    }
}
