//! In-memory [`Driver`] double for integration tests: a fixed table/column
//! schema and a canned EXPLAIN ANALYZE plan, with no network calls.
//!
//! Integration tests are a separate compilation unit from `src/`'s
//! `#[cfg(test)]` modules and cannot reach the `FakeDriver` already defined
//! inside `src/analyzers/hypothetical_index.rs`'s test module, so this is a
//! second, purpose-built fixture rather than a shared one.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use compact_str::CompactString;
use sql_diag::{
    driver::{Capabilities, ColumnStats, Driver, ExplainRow, SchemaRecord},
    error::{AppResult, driver_error},
    plan::AccessType
};

pub struct FakeDriver {
    schema:        HashMap<String, Vec<String>>,
    plan_text:     Mutex<String>,
    explain_error: Option<String>,
    capabilities:  Capabilities,
    version:       CompactString
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            schema:        HashMap::new(),
            plan_text:     Mutex::new(String::new()),
            explain_error: None,
            capabilities:  Capabilities {
                explain_analyze:     true,
                histograms:          true,
                json_explain:        true,
                covering_index_info: true,
                parallel_query:      false
            },
            version:       CompactString::from("8.0.34")
        }
    }

    pub fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        self.schema.insert(table.to_lowercase(), columns.iter().map(|c| c.to_lowercase()).collect());
        self
    }

    pub fn with_plan_text(self, text: impl Into<String>) -> Self {
        self.set_plan_text(text);
        self
    }

    #[allow(dead_code)]
    pub fn with_explain_error(mut self, message: impl Into<String>) -> Self {
        self.explain_error = Some(message.into());
        self
    }

    /// Swap the canned plan text after construction, e.g. between two
    /// `diagnose` calls against the same driver instance.
    pub fn set_plan_text(&self, text: impl Into<String>) {
        *self.plan_text.lock().expect("plan_text lock poisoned") = text.into();
    }
}

#[async_trait]
impl Driver for FakeDriver {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn get_version(&self) -> AppResult<CompactString> {
        Ok(self.version.clone())
    }

    async fn capabilities(&self) -> AppResult<Capabilities> {
        Ok(self.capabilities)
    }

    async fn supports_analyze(&self) -> AppResult<bool> {
        Ok(self.capabilities.explain_analyze)
    }

    async fn run_explain(&self, _sql: &str) -> AppResult<Vec<ExplainRow>> {
        if let Some(message) = &self.explain_error {
            return Err(driver_error(message.clone()));
        }
        Ok(Vec::new())
    }

    async fn run_explain_analyze(&self, _sql: &str) -> AppResult<String> {
        if let Some(message) = &self.explain_error {
            return Err(driver_error(message.clone()));
        }
        Ok(self.plan_text.lock().expect("plan_text lock poisoned").clone())
    }

    fn normalize_access_type(&self, raw: &str) -> Option<AccessType> {
        match raw {
            "system" | "const" => Some(AccessType::ConstRow),
            "eq_ref" => Some(AccessType::SingleRowLookup),
            "ref" | "ref_or_null" => Some(AccessType::IndexLookup),
            "range" => Some(AccessType::IndexRangeScan),
            "index" | "index_merge" => Some(AccessType::IndexScan),
            "ALL" => Some(AccessType::TableScan),
            _ => None
        }
    }

    fn normalize_join_type(&self, raw: &str) -> CompactString {
        CompactString::from(raw.to_lowercase())
    }

    async fn run_analyze_table(&self, _table: &str) -> AppResult<()> {
        Ok(())
    }

    async fn get_column_stats(&self, _table: &str, _column: &str) -> AppResult<ColumnStats> {
        Ok(ColumnStats::default())
    }

    async fn table_exists(&self, name: &str) -> AppResult<Option<SchemaRecord>> {
        Ok(self.schema.contains_key(&name.to_lowercase()).then(|| SchemaRecord {
            table_name:  name.to_string(),
            column_name: None
        }))
    }

    async fn list_tables(&self) -> AppResult<Vec<SchemaRecord>> {
        Ok(self
            .schema
            .keys()
            .map(|t| SchemaRecord {
                table_name:  t.clone(),
                column_name: None
            })
            .collect())
    }

    async fn column_exists(&self, table: &str, column: &str) -> AppResult<Option<SchemaRecord>> {
        Ok(self
            .schema
            .get(&table.to_lowercase())
            .and_then(|cols| cols.iter().find(|c| c.eq_ignore_ascii_case(column)))
            .map(|c| SchemaRecord {
                table_name:  table.to_string(),
                column_name: Some(c.clone())
            }))
    }

    async fn list_columns(&self, table: &str) -> AppResult<Vec<SchemaRecord>> {
        Ok(self
            .schema
            .get(&table.to_lowercase())
            .map(|cols| {
                cols.iter()
                    .map(|c| SchemaRecord {
                        table_name:  table.to_string(),
                        column_name: Some(c.clone())
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn run_ddl(&self, _ddl: &str) -> AppResult<()> {
        Ok(())
    }
}
