//! ExplainExecutor: runs `EXPLAIN ANALYZE` against a validated statement
//! and turns a driver-level failure into a [`ValidationFailureReport`]
//! rather than letting it surface as an infrastructure error.

use crate::{
    driver::{Driver, ExplainRow},
    error::AppResult,
    report::{FailureStage, ValidationFailureReport}
};

/// Outcome of attempting to EXPLAIN ANALYZE one statement.
pub enum ExplainResult {
    Success {
        plan_text: String,
        rows:      Vec<ExplainRow>
    },
    Failure(ValidationFailureReport)
}

/// Run `EXPLAIN ANALYZE` and, on success, best-effort enrich it with a
/// tabular `EXPLAIN` (failures there are swallowed - the tree-format plan
/// text is the only input the rest of the pipeline needs).
pub async fn execute(sql: &str, driver: &dyn Driver) -> AppResult<ExplainResult> {
    let plan_text = match driver.run_explain_analyze(sql).await {
        Ok(text) => text,
        Err(e) => return Ok(ExplainResult::Failure(decode_failure(&e.to_string())))
    };

    let rows = driver.run_explain(sql).await.unwrap_or_default();
    Ok(ExplainResult::Success {
        plan_text,
        rows
    })
}

fn decode_failure(message: &str) -> ValidationFailureReport {
    ValidationFailureReport::new(FailureStage::Explain, "ERROR - Explain Failed", message.to_string())
        .with_recommendation("Only SELECT queries can be analyzed")
}
