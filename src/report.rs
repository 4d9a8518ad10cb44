//! Core DTOs shared by every pipeline stage: [`Severity`], [`Finding`],
//! [`Report`], [`DiagnosticReport`], [`ValidationFailureReport`].
//!
//! Everything here is a typed struct rather than an untyped map, so the
//! JSON shape is fixed by `serde` derives instead of by convention.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use indexmap::IndexMap;
use serde::Serialize;

use crate::{metrics::Metrics, scoring::Scores};

/// Severity of a [`Finding`]. Ordered from least to most severe so that
/// `Severity::Critical < Severity::Info` is false and sorting puts the
/// worst finding first when reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Optimization,
    Warning,
    Critical
}

impl Severity {
    /// Priority rank used for display ordering: Critical=1 ... Info=4.
    pub fn priority_rank(self) -> u8 {
        match self {
            Self::Critical => 1,
            Self::Warning => 2,
            Self::Optimization => 3,
            Self::Info => 4
        }
    }

    /// Numeric weight for aggregation (e.g. averaging confidence impact).
    pub fn weight(self) -> f64 {
        match self {
            Self::Critical => 1.0,
            Self::Warning => 0.6,
            Self::Optimization => 0.3,
            Self::Info => 0.1
        }
    }

    pub fn color_tag(self) -> &'static str {
        match self {
            Self::Critical => "red",
            Self::Warning => "yellow",
            Self::Optimization => "blue",
            Self::Info => "white"
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Critical => "✖",
            Self::Warning => "▲",
            Self::Optimization => "i",
            Self::Info => "·"
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Optimization => write!(f, "OPTIMIZATION"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL")
        }
    }
}

/// A single finding emitted by a rule or analyzer. Immutable once produced;
/// two findings with the same `(category, title, recommendation)` are a
/// [`crate::consistency`] violation, not a valid pair of distinct findings.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub severity:       Severity,
    pub category:       CompactString,
    pub title:          CompactString,
    pub description:    String,
    pub recommendation: Option<String>,
    pub metadata:       IndexMap<CompactString, CompactString>
}

impl Finding {
    pub fn new(
        severity: Severity,
        category: impl Into<CompactString>,
        title: impl Into<CompactString>,
        description: impl Into<String>
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            title: title.into(),
            description: description.into(),
            recommendation: None,
            metadata: IndexMap::new()
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<CompactString>, value: impl Into<CompactString>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Identity used by [`crate::consistency`]'s duplicate-finding check.
    pub fn identity(&self) -> (&str, &str, Option<&str>) {
        (
            self.category.as_str(),
            self.title.as_str(),
            self.recommendation.as_deref()
        )
    }
}

/// Where the SQL under analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Sql,
    Builder,
    Profiler
}

/// Bundle of raw inputs and intermediate outputs for one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub sql:            String,
    pub driver:         CompactString,
    pub plan_text:       String,
    pub metrics:         Metrics,
    pub scores:          Scores,
    pub findings:        Vec<Finding>,
    pub execution_time_ms: f64
}

/// A scored, graded diagnostic pass over one statement.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub result:          AnalysisResult,
    pub grade:           char,
    pub passed:          bool,
    pub composite_score: f64,
    pub recommendations: Vec<String>,
    pub scalability:     crate::analyzers::scalability::ScalabilityProjection,
    pub analyzed_at:     DateTime<Utc>,
    pub mode:            AnalysisMode
}

impl Report {
    pub fn worst_severity(&self) -> Option<Severity> {
        self.result.findings.iter().map(|f| f.severity).max()
    }

    pub fn finding_counts(&self) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        for f in &self.result.findings {
            *counts.entry(severity_key(f.severity)).or_insert(0) += 1;
        }
        counts
    }
}

fn severity_key(s: Severity) -> &'static str {
    match s {
        Severity::Info => "info",
        Severity::Optimization => "optimization",
        Severity::Warning => "warning",
        Severity::Critical => "critical"
    }
}

/// Outputs of the individual deep analyzers, each optional because an
/// analyzer may be skipped (environment-gated) or soft-fail.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyzerOutputs {
    pub cardinality_drift: Option<crate::analyzers::cardinality::CardinalityDriftReport>,
    pub anti_patterns:     Option<Vec<Finding>>,
    pub index_synthesis:   Option<Vec<crate::analyzers::index_synthesis::IndexProposal>>,
    pub hypothetical_index: Option<crate::analyzers::hypothetical_index::HypotheticalIndexReport>,
    pub regression:        Option<crate::analyzers::regression::RegressionReport>,
    pub concurrency:       Option<crate::analyzers::concurrency::ConcurrencyReport>,
    pub memory_pressure:   Option<crate::analyzers::memory::MemoryPressureReport>,
    pub confidence:        Option<crate::analyzers::confidence::ConfidenceReport>
}

/// A [`Report`] enriched with per-analyzer outputs and a confidence-adjusted
/// grade/score. Criticals cap the grade at B/75; confidence < 0.5 caps at
/// C/50; confidence in [0.5, 0.7) caps at B/75.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    #[serde(flatten)]
    pub report:     Report,
    pub analyzers:  AnalyzerOutputs,
    pub adjusted_grade: char,
    pub adjusted_score: f64,
    /// Graceful, log-only invariant breaches from
    /// [`crate::consistency::validate`]. Never aborts the report - see the
    /// "graceful degradation" requirement.
    pub consistency_violations: Vec<crate::consistency::ConsistencyViolation>
}

impl DiagnosticReport {
    pub fn new(
        report: Report,
        analyzers: AnalyzerOutputs,
        consistency_violations: Vec<crate::consistency::ConsistencyViolation>
    ) -> Self {
        let confidence = analyzers
            .confidence
            .as_ref()
            .map(|c| c.score)
            .unwrap_or(1.0);
        let has_critical = report
            .result
            .findings
            .iter()
            .any(|f| f.severity == Severity::Critical);

        let mut score = report.composite_score;
        if has_critical {
            score = score.min(75.0);
        }
        if confidence < 0.5 {
            score = score.min(50.0);
        } else if confidence < 0.7 {
            score = score.min(75.0);
        }
        let grade = crate::scoring::grade_for_score(score, None);

        Self {
            report,
            analyzers,
            adjusted_grade: grade,
            adjusted_score: score,
            consistency_violations
        }
    }
}

/// Stage at which validation aborted the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureStage {
    TableValidation,
    ColumnValidation,
    JoinValidation,
    SyntaxValidation,
    Explain,
    Safety
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TableValidation => "Table Validation",
            Self::ColumnValidation => "Column Validation",
            Self::JoinValidation => "Join Validation",
            Self::SyntaxValidation => "Syntax Validation",
            Self::Explain => "Explain",
            Self::Safety => "Safety"
        };
        write!(f, "{s}")
    }
}

/// Replaces a [`Report`] whenever validation or EXPLAIN aborts the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationFailureReport {
    pub status:           String,
    pub failure_stage:    FailureStage,
    pub detailed_error:   String,
    pub sqlstate:         Option<String>,
    pub line_number:      Option<u32>,
    pub recommendations:  Vec<String>,
    pub typo_suggestion:  Option<String>,
    pub missing_table:    Option<String>,
    pub missing_column:   Option<String>,
    pub database:         Option<String>
}

impl ValidationFailureReport {
    pub fn new(stage: FailureStage, status: impl Into<String>, detailed_error: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            failure_stage: stage,
            detailed_error: detailed_error.into(),
            sqlstate: None,
            line_number: None,
            recommendations: Vec::new(),
            typo_suggestion: None,
            missing_table: None,
            missing_column: None,
            database: None
        }
    }

    pub fn with_recommendation(mut self, rec: impl Into<String>) -> Self {
        self.recommendations.push(rec.into());
        self
    }

    pub fn with_typo_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.typo_suggestion = Some(suggestion.into());
        self
    }

    pub fn with_missing_table(mut self, table: impl Into<String>) -> Self {
        self.missing_table = Some(table.into());
        self
    }

    pub fn with_missing_column(mut self, column: impl Into<String>) -> Self {
        self.missing_column = Some(column.into());
        self
    }

    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }

    pub fn with_line_number(mut self, line: u32) -> Self {
        self.line_number = Some(line);
        self
    }
}

/// The Engine's top-level return type: a successful analysis, or an
/// expected pipeline abort. Neither variant is a Rust error - a missing
/// table is not exceptional, it is a normal outcome the caller must match
/// on, never something swallowed by a broad `catch`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EngineOutcome {
    Report(DiagnosticReport),
    Rejected(ValidationFailureReport)
}

impl EngineOutcome {
    pub fn report(&self) -> Option<&DiagnosticReport> {
        match self {
            Self::Report(r) => Some(r),
            Self::Rejected(_) => None
        }
    }

    pub fn is_passed(&self) -> bool {
        match self {
            Self::Report(r) => r.report.passed,
            Self::Rejected(_) => false
        }
    }
}
