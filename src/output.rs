//! Rendering [`EngineOutcome`] into the three output formats the
//! reference CLI and CI integrations consume: colored text, pretty
//! JSON, and YAML.

use colored::Colorize;

use crate::{
    consistency::ConsistencyViolation,
    report::{DiagnosticReport, EngineOutcome, Finding, Report, Severity, ValidationFailureReport}
};

/// Output format for a rendered report.
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml
}

/// Rendering options shared by every format.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool,
    pub verbose: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Text,
            colored: true,
            verbose: false
        }
    }
}

/// Render an [`EngineOutcome`] - either a [`DiagnosticReport`] or a
/// [`ValidationFailureReport`] - in the requested format.
pub fn format_outcome(outcome: &EngineOutcome, opts: &OutputOptions) -> String {
    match outcome {
        EngineOutcome::Report(diagnostic) => format_diagnostic_report(diagnostic, opts),
        EngineOutcome::Rejected(failure) => format_failure_report(failure, opts)
    }
}

/// Render a shallow [`Report`] (from `analyze_sql`, with no deep analyzer
/// output) in the requested format.
pub fn format_report(report: &Report, opts: &OutputOptions) -> String {
    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(report).unwrap_or_default(),
        OutputFormat::Text => format_report_text(report, opts)
    }
}

fn format_diagnostic_report(diagnostic: &DiagnosticReport, opts: &OutputOptions) -> String {
    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(diagnostic).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(diagnostic).unwrap_or_default(),
        OutputFormat::Text => {
            let mut out = format_report_text(&diagnostic.report, opts);
            out.push_str(&format!(
                "Adjusted grade: {} (score {:.1})\n",
                diagnostic.adjusted_grade, diagnostic.adjusted_score
            ));
            if !diagnostic.consistency_violations.is_empty() {
                out.push('\n');
                out.push_str(&format_consistency_violations(&diagnostic.consistency_violations, opts));
            }
            out
        }
    }
}

fn format_report_text(report: &Report, opts: &OutputOptions) -> String {
    let mut out = String::new();

    let header = format!(
        "=== SQL Diagnostic Report ({}) ===\n",
        report.result.driver
    );
    out.push_str(&colorize(&header, |s| s.bold().to_string(), opts));

    out.push_str(&format!("Grade: {}  Composite score: {:.1}\n", report.grade, report.composite_score));
    out.push_str(&format!("Passed: {}\n", report.passed));
    out.push_str(&format!("Execution time: {:.3} ms\n", report.result.execution_time_ms));
    out.push_str(&format!(
        "Scalability risk: {} (complexity {})\n\n",
        report.scalability.risk, report.result.metrics.complexity_label
    ));

    if report.result.findings.is_empty() {
        out.push_str("No findings.\n");
    } else {
        out.push_str("Findings:\n");
        for finding in &report.result.findings {
            out.push_str(&format_finding(finding, opts));
        }
    }

    if opts.verbose {
        out.push_str("\nPlan:\n");
        out.push_str(&report.result.plan_text);
        out.push('\n');
    }

    out
}

fn format_finding(finding: &Finding, opts: &OutputOptions) -> String {
    let label = format!("{} {} [{}] {}", finding.severity.icon(), finding.severity, finding.category, finding.title);
    let label = if opts.colored {
        colorize_severity(&label, finding.severity)
    } else {
        label
    };
    let mut line = format!("  {label}\n    {}\n", finding.description);
    if let Some(rec) = &finding.recommendation {
        line.push_str(&format!("    -> {rec}\n"));
    }
    line
}

fn format_consistency_violations(violations: &[ConsistencyViolation], opts: &OutputOptions) -> String {
    let mut out = colorize("Consistency violations (log-only, non-fatal):\n", |s| s.yellow().to_string(), opts);
    for violation in violations {
        out.push_str(&format!("  [{}] {}\n", violation.rule, violation.message));
    }
    out
}

fn format_failure_report(failure: &ValidationFailureReport, opts: &OutputOptions) -> String {
    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(failure).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(failure).unwrap_or_default(),
        OutputFormat::Text => {
            let mut out = colorize(&format!("{}\n", failure.status), |s| s.red().bold().to_string(), opts);
            out.push_str(&format!("Stage: {}\n", failure.failure_stage));
            out.push_str(&format!("Detail: {}\n", failure.detailed_error));
            if let Some(sqlstate) = &failure.sqlstate {
                out.push_str(&format!("SQLSTATE: {sqlstate}\n"));
            }
            if let Some(line) = failure.line_number {
                out.push_str(&format!("Line: {line}\n"));
            }
            if let Some(table) = &failure.missing_table {
                out.push_str(&format!("Missing table: {table}\n"));
            }
            if let Some(column) = &failure.missing_column {
                out.push_str(&format!("Missing column: {column}\n"));
            }
            if let Some(suggestion) = &failure.typo_suggestion {
                out.push_str(&format!("Did you mean: {suggestion}?\n"));
            }
            for rec in &failure.recommendations {
                out.push_str(&format!("-> {rec}\n"));
            }
            out
        }
    }
}

fn colorize_severity(s: &str, severity: Severity) -> String {
    match severity {
        Severity::Critical => s.red().bold().to_string(),
        Severity::Warning => s.yellow().to_string(),
        Severity::Optimization => s.blue().to_string(),
        Severity::Info => s.white().to_string()
    }
}

fn colorize(s: &str, f: impl Fn(&str) -> String, opts: &OutputOptions) -> String {
    if opts.colored {
        f(s)
    } else {
        s.to_string()
    }
}

/// Map the CI-relevant exit code for one outcome: 0 on success, non-zero
/// when `fail_on_warning`/`fail_on_grade_below` trips, and always
/// non-zero on a rejected (validation/explain failure) outcome.
pub fn exit_code_for(outcome: &EngineOutcome) -> i32 {
    match outcome {
        EngineOutcome::Report(diagnostic) => {
            if diagnostic.report.passed {
                0
            } else {
                1
            }
        }
        EngineOutcome::Rejected(_) => 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FailureStage;

    #[test]
    fn exit_code_nonzero_on_rejected_outcome() {
        let outcome = EngineOutcome::Rejected(ValidationFailureReport::new(
            FailureStage::TableValidation,
            "ERROR - Table Not Found",
            "table `usres` does not exist"
        ));
        assert_eq!(exit_code_for(&outcome), 2);
    }

    #[test]
    fn text_failure_report_includes_stage_and_detail() {
        let failure = ValidationFailureReport::new(FailureStage::TableValidation, "ERROR - Table Not Found", "table `usres` does not exist")
            .with_typo_suggestion("users")
            .with_missing_table("usres");
        let opts = OutputOptions {
            colored: false,
            ..Default::default()
        };
        let text = format_failure_report(&failure, &opts);
        assert!(text.contains("Table Validation"));
        assert!(text.contains("usres"));
        assert!(text.contains("Did you mean: users?"));
    }
}
